//! Evidence source adapters.
//!
//! Provides a trait-based abstraction over the evidence sources:
//! - HTTP gateways (one per source)
//! - Static adapters for fixtures and tests

pub mod http;
pub mod mock;
pub mod traits;

pub use http::HttpEvidenceAdapter;
pub use mock::StaticAdapter;
pub use traits::{AdapterError, EvidenceAdapter, SourceQuery};
