//! Weighted consensus governance for land dispute cases.
//!
//! Assigned officials vote on a case after reviewing its evidence bundle.
//! Votes are weighted by role and compared against a threshold that depends
//! on the case priority:
//!
//! - **Roles**: static weight and permission table
//! - **Voting**: one vote per official, atomic commit, quorum resolution
//! - **Audit**: append-only trail of every case action
//! - **Escalation**: stalled cases grow their roster along a fixed chain
//!
//! # Case lifecycle
//!
//! ```text
//!  OPEN ──vote──▶ VOTING ──quorum──▶ CONSENSUS_REACHED | REJECTED
//!    │              ▲  │
//!    └──timeout──▶ ESCALATED ◀─timeout
//! ```

pub mod audit;
pub mod config;
pub mod escalation;
pub mod identity;
pub mod locks;
pub mod roles;
pub mod seed;
pub mod service;
pub mod store;
pub mod types;
pub mod voting;

// Re-export main types
pub use audit::{AuditOrder, AuditTrail};
pub use config::{EscalationConfig, GovernanceConfig, VotingConfig};
pub use escalation::{EscalationOutcome, EscalationScheduler};
pub use identity::{Actor, IdentityResolver, InMemoryOfficialRegistry, Official};
pub use roles::{Permission, Role, ESCALATION_CHAIN};
pub use service::{CaseSummary, GovernanceService, NewCase};
pub use store::{GovernanceStore, InMemoryStore, StoreError};
pub use types::*;
pub use voting::{VoteReceipt, VoteTally, VotingEngine};
