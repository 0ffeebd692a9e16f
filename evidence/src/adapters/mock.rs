//! Static evidence adapter.
//!
//! Serves a fixed item list. Used for offline fixtures and as a test double
//! that can be told to fail or to stall.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use super::traits::*;
use crate::types::{EvidenceItem, EvidenceKind};

/// Adapter returning preconfigured items.
pub struct StaticAdapter {
    kind: EvidenceKind,
    items: Vec<EvidenceItem>,
    available: AtomicBool,
    delay: Option<Duration>,
    respect_date_range: bool,
    call_count: AtomicU32,
}

impl StaticAdapter {
    /// Create an adapter for a source with no items.
    pub fn new(kind: EvidenceKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            available: AtomicBool::new(true),
            delay: None,
            respect_date_range: false,
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the items returned on every fetch.
    pub fn with_items(mut self, items: Vec<EvidenceItem>) -> Self {
        self.items = items;
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Drop items observed outside the query's date range.
    pub fn filtering_by_date(mut self) -> Self {
        self.respect_date_range = true;
        self
    }

    /// Toggle availability after construction.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Get the number of times fetch was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvidenceAdapter for StaticAdapter {
    fn kind(&self) -> EvidenceKind {
        self.kind
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<EvidenceItem>, AdapterError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable(format!(
                "{} source disabled",
                self.kind
            )));
        }

        let items = match (self.respect_date_range, query.date_range) {
            (true, Some(range)) => self
                .items
                .iter()
                .filter(|item| range.contains(item.observed_at()))
                .cloned()
                .collect(),
            _ => self.items.clone(),
        };

        Ok(items)
    }
}
