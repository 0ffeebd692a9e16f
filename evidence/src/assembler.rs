//! Bundle assembler - fans out to every evidence source and seals the result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::adapters::{AdapterError, EvidenceAdapter, SourceQuery};
use crate::config::AssemblerConfig;
use crate::fingerprint::FingerprintError;
use crate::types::{Coordinates, DateRange, EvidenceBundle, EvidenceItem, EvidenceKind, EvidenceSet};

/// Outcome of one source during a collection run.
#[derive(Debug)]
struct SourceOutcome {
    kind: EvidenceKind,
    items: Vec<EvidenceItem>,
    failed: bool,
}

/// Collects evidence from all registered adapters and builds bundles.
///
/// Holds no mutable state, so any number of bundles can be generated
/// concurrently from one assembler.
pub struct BundleAssembler {
    config: AssemblerConfig,
    adapters: HashMap<EvidenceKind, Arc<dyn EvidenceAdapter>>,
}

impl BundleAssembler {
    /// Create an assembler with no adapters.
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            adapters: HashMap::new(),
        }
    }

    /// Create a builder.
    pub fn builder() -> BundleAssemblerBuilder {
        BundleAssemblerBuilder::new()
    }

    /// Register an adapter, replacing any previous one for the same source.
    pub fn register(&mut self, adapter: Arc<dyn EvidenceAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    /// Sources with a registered adapter.
    pub fn registered_sources(&self) -> Vec<EvidenceKind> {
        let mut kinds: Vec<_> = self.adapters.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Generate a sealed evidence bundle for a case.
    ///
    /// Every applicable adapter runs in its own task under its own timeout.
    /// Imagery is skipped without coordinates. A failing or slow source
    /// contributes nothing and is listed in the summary; it never fails
    /// the bundle. Items with non-finite numbers are dropped, so sealing
    /// only fails if the evidence cannot be serialized.
    pub async fn generate_bundle(
        &self,
        case_id: &str,
        property_id: &str,
        coordinates: Option<Coordinates>,
    ) -> Result<EvidenceBundle, FingerprintError> {
        let started = Instant::now();
        let created_at = Utc::now();

        info!(
            case_id = %case_id,
            property_id = %property_id,
            with_coordinates = coordinates.is_some(),
            "Generating evidence bundle"
        );

        let collections = EvidenceKind::ALL
            .iter()
            .filter(|kind| **kind != EvidenceKind::Imagery || coordinates.is_some())
            .filter_map(|kind| self.adapters.get(kind).map(|adapter| (*kind, adapter)))
            .map(|(kind, adapter)| {
                let query = self.query_for(kind, case_id, property_id, coordinates, created_at);
                collect(kind, Arc::clone(adapter), query, self.config.timeout_for(kind))
            });

        let outcomes = join_all(collections).await;

        let mut evidence = EvidenceSet::new();
        let mut unavailable = Vec::new();
        for outcome in outcomes {
            if outcome.failed {
                unavailable.push(outcome.kind);
            }
            for item in outcome.items {
                evidence.push(item);
            }
        }
        unavailable.sort();

        let generation_ms = started.elapsed().as_millis() as u64;
        let bundle = EvidenceBundle::seal(
            case_id,
            property_id,
            created_at,
            evidence,
            unavailable,
            generation_ms,
        )?;

        info!(
            case_id = %case_id,
            bundle_id = %bundle.bundle_id(),
            completeness = bundle.completeness_score(),
            confidence = %bundle.confidence().as_str(),
            fingerprint = %bundle.fingerprint(),
            duration_ms = generation_ms,
            "Evidence bundle generated"
        );

        Ok(bundle)
    }

    fn query_for(
        &self,
        kind: EvidenceKind,
        case_id: &str,
        property_id: &str,
        coordinates: Option<Coordinates>,
        now: chrono::DateTime<Utc>,
    ) -> SourceQuery {
        let key = if kind.keyed_by_case() { case_id } else { property_id };
        let mut query = SourceQuery::new(key);

        if kind == EvidenceKind::Imagery {
            query.coordinates = coordinates;
        }
        if let Some(days) = self.config.lookback_days(kind) {
            query = query.with_date_range(DateRange::days_back(now, days));
        }
        query
    }
}

/// Run one adapter on its own task under `timeout`, absorbing any failure.
///
/// The timeout is enforced on the task handle, so an adapter that blocks
/// its thread still cannot hold up the bundle past its deadline.
async fn collect(
    kind: EvidenceKind,
    adapter: Arc<dyn EvidenceAdapter>,
    query: SourceQuery,
    timeout: Duration,
) -> SourceOutcome {
    let key = query.key.clone();
    let mut task = tokio::spawn(async move { adapter.fetch(&query).await });

    let result = match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(AdapterError::Unavailable(format!("source task failed: {e}"))),
        Err(_) => {
            task.abort();
            Err(AdapterError::Timeout(timeout.as_millis() as u64))
        }
    };

    match result {
        Ok(items) => {
            let fetched = items.len();
            let items: Vec<EvidenceItem> = items
                .into_iter()
                .filter(|item| item.kind() == kind)
                .collect();
            if items.len() != fetched {
                warn!(
                    source = %kind,
                    dropped = fetched - items.len(),
                    "Dropped items of a foreign source"
                );
            }

            let sourced = items.len();
            let items: Vec<EvidenceItem> = items.into_iter().filter(|item| item.is_finite()).collect();
            if items.len() != sourced {
                warn!(
                    source = %kind,
                    dropped = sourced - items.len(),
                    "Dropped items with non-finite numbers"
                );
            }
            debug!(source = %kind, count = items.len(), "Source collected");

            SourceOutcome {
                kind,
                items,
                failed: false,
            }
        }
        Err(e) => {
            warn!(source = %kind, key = %key, error = %e, "Evidence source unavailable");
            SourceOutcome {
                kind,
                items: Vec::new(),
                failed: true,
            }
        }
    }
}

/// Builder for [`BundleAssembler`].
pub struct BundleAssemblerBuilder {
    config: AssemblerConfig,
    adapters: Vec<Arc<dyn EvidenceAdapter>>,
}

impl BundleAssemblerBuilder {
    pub fn new() -> Self {
        Self {
            config: AssemblerConfig::default(),
            adapters: Vec::new(),
        }
    }

    pub fn config(mut self, config: AssemblerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn EvidenceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn build(self) -> BundleAssembler {
        let mut assembler = BundleAssembler::new(self.config);
        for adapter in self.adapters {
            assembler.register(adapter);
        }
        assembler
    }
}

impl Default for BundleAssemblerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
