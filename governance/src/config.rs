//! Configuration for the governance engine.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use evidence::AssemblerConfig;

use crate::roles::{Role, ESCALATION_CHAIN};
use crate::types::{GovernanceError, Priority, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub voting: VotingConfig,
    pub escalation: EscalationConfig,
    pub evidence: AssemblerConfig,
}

impl GovernanceConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| GovernanceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| GovernanceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| GovernanceError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.voting.validate()?;
        self.escalation.validate()
    }
}

/// Weighted approval thresholds (percent) by case priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub low_threshold: f64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            high_threshold: 80.0,
            medium_threshold: 70.0,
            low_threshold: 60.0,
        }
    }
}

impl VotingConfig {
    pub fn threshold(&self, priority: Priority) -> f64 {
        match priority {
            Priority::High => self.high_threshold,
            Priority::Medium => self.medium_threshold,
            Priority::Low => self.low_threshold,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("high_threshold", self.high_threshold),
            ("medium_threshold", self.medium_threshold),
            ("low_threshold", self.low_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(GovernanceError::Config(format!(
                    "{name} must be within 0..=100, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Escalation scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Resolution timeout before a case escalates (hours)
    pub timeout_hours: u32,
    /// Interval between scans (seconds)
    pub scan_interval_secs: u64,
    /// Roles appended in order when a case stalls
    pub chain: Vec<Role>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            timeout_hours: 72,
            scan_interval_secs: 300, // 5 minutes
            chain: ESCALATION_CHAIN.to_vec(),
        }
    }
}

impl EscalationConfig {
    pub fn timeout(&self) -> ChronoDuration {
        ChronoDuration::hours(i64::from(self.timeout_hours))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// First chain role not already on `roster`.
    pub fn next_role(&self, roster: &[Role]) -> Option<Role> {
        self.chain.iter().copied().find(|role| !roster.contains(role))
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_hours == 0 {
            return Err(GovernanceError::Config("timeout_hours must be positive".to_string()));
        }
        if self.scan_interval_secs == 0 {
            return Err(GovernanceError::Config(
                "scan_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
