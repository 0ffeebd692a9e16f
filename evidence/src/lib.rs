//! Evidence aggregation for land dispute cases.
//!
//! Collects evidence for a parcel from five independent sources and seals
//! it into a tamper-evident bundle:
//!
//! - **Ledger**: on-chain registry and freeze events
//! - **Imagery**: satellite captures (needs coordinates)
//! - **Aerial**: drone swarm survey validations
//! - **Legal**: typed output of the legal document parser (keyed by case)
//! - **Registry**: official government records
//!
//! # Key Components
//!
//! - [`EvidenceAdapter`]: Trait every source implements
//! - [`BundleAssembler`]: Timeout-bounded fan-out, one task per source
//! - [`EvidenceBundle`]: Immutable result with completeness score,
//!   SHA-256 fingerprint and confidence rating
//!
//! # Example
//!
//! ```ignore
//! use evidence::{BundleAssembler, StaticAdapter, EvidenceKind};
//!
//! let assembler = BundleAssembler::builder()
//!     .adapter(Arc::new(StaticAdapter::new(EvidenceKind::Ledger)))
//!     .build();
//!
//! let bundle = assembler.generate_bundle("CASE_2025_001", "GJ01AA1234567890", None).await?;
//! assert!(bundle.verify_integrity());
//! ```

pub mod adapters;
pub mod assembler;
pub mod config;
pub mod fingerprint;
pub mod scoring;
pub mod types;

// Re-export main types
pub use adapters::{AdapterError, EvidenceAdapter, HttpEvidenceAdapter, SourceQuery, StaticAdapter};
pub use assembler::{BundleAssembler, BundleAssemblerBuilder};
pub use config::AssemblerConfig;
pub use fingerprint::{fingerprint, FingerprintError};
pub use scoring::completeness_score;
pub use types::*;
