//! Core traits for evidence source adapters.
//!
//! This module defines the `EvidenceAdapter` trait - the abstraction over
//! the ledger, imagery, aerial-survey, legal and registry sources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Coordinates, DateRange, EvidenceItem, EvidenceKind};

/// Error types for evidence source operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Source is not available
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Request was rejected by the source
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Payload could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Source did not answer in time
    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

/// What an adapter is asked to look up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuery {
    /// Property id, or case id for the legal source
    pub key: String,
    /// Parcel location, needed by imagery
    pub coordinates: Option<Coordinates>,
    /// Optional time window
    pub date_range: Option<DateRange>,
}

impl SourceQuery {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            coordinates: None,
            date_range: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }
}

/// A pluggable source of evidence.
///
/// "No data" is `Ok(vec![])`. Errors are reported to the caller, and the
/// bundle assembler turns every error into an empty sequence, so an
/// implementation never has to guard other sources against its failures.
#[async_trait]
pub trait EvidenceAdapter: Send + Sync {
    /// Source this adapter serves.
    fn kind(&self) -> EvidenceKind;

    /// Fetch evidence items for the query.
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<EvidenceItem>, AdapterError>;
}
