//! Configuration for bundle assembly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::EvidenceKind;

/// Configuration for the bundle assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Timeout applied to a source with no override (ms)
    pub default_timeout_ms: u64,
    /// Per-source timeout overrides (ms)
    pub source_timeouts_ms: BTreeMap<EvidenceKind, u64>,
    /// Ledger lookback window (days)
    pub ledger_lookback_days: u32,
    /// Imagery lookback window (days)
    pub imagery_lookback_days: u32,
    /// Base URL of the evidence gateway, when HTTP adapters are used
    pub gateway_url: Option<String>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            source_timeouts_ms: BTreeMap::new(),
            ledger_lookback_days: 365,
            imagery_lookback_days: 360, // 12 months of 30 days
            gateway_url: None,
        }
    }
}

impl AssemblerConfig {
    /// Timeout for one source.
    pub fn timeout_for(&self, kind: EvidenceKind) -> Duration {
        let ms = self
            .source_timeouts_ms
            .get(&kind)
            .copied()
            .unwrap_or(self.default_timeout_ms);
        Duration::from_millis(ms)
    }

    /// Builder: override one source's timeout.
    pub fn with_timeout(mut self, kind: EvidenceKind, timeout_ms: u64) -> Self {
        self.source_timeouts_ms.insert(kind, timeout_ms);
        self
    }

    /// Lookback window for a source, if it has one.
    pub fn lookback_days(&self, kind: EvidenceKind) -> Option<u32> {
        match kind {
            EvidenceKind::Ledger => Some(self.ledger_lookback_days),
            EvidenceKind::Imagery => Some(self.imagery_lookback_days),
            _ => None,
        }
    }

    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
