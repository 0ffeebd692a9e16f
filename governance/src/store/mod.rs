//! Persistence contracts.
//!
//! Four logical tables: cases, evidence bundles, votes and audit records,
//! each keyed by id, with votes and audit records also indexed by case.
//! Any backend implementing these traits can sit under the engine.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use evidence::EvidenceBundle;

use crate::roles::Role;
use crate::types::{AuditRecord, Case, CaseStatus, GovernanceError, Vote};

pub use memory::InMemoryStore;

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// (case, voter) already has a vote
    #[error("Duplicate vote by {voter} on case {case_id}")]
    DuplicateVote { case_id: String, voter: String },

    /// Status change would break monotonicity
    #[error("Illegal transition for case {case_id}: {from} -> {to}")]
    IllegalTransition {
        case_id: String,
        from: CaseStatus,
        to: CaseStatus,
    },
}

impl From<StoreError> for GovernanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => GovernanceError::StorageFailure(msg),
            StoreError::NotFound(what) => GovernanceError::NotFound(what),
            StoreError::Conflict(msg) => GovernanceError::InvalidCase(msg),
            StoreError::DuplicateVote { case_id, voter } => {
                GovernanceError::DuplicateVote { case_id, voter }
            }
            StoreError::IllegalTransition { case_id, from, .. } if from.is_terminal() => {
                GovernanceError::CaseClosed {
                    case_id,
                    status: from,
                }
            }
            err @ StoreError::IllegalTransition { .. } => {
                GovernanceError::InvalidCase(err.to_string())
            }
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Case table.
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn insert_case(&self, case: Case) -> StoreResult<()>;

    async fn get_case(&self, case_id: &str) -> StoreResult<Case>;

    async fn list_cases(&self) -> StoreResult<Vec<Case>>;

    /// Move a case to `status`, rejecting non-monotonic transitions.
    async fn update_case_status(
        &self,
        case_id: &str,
        status: CaseStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Case>;

    async fn update_assigned_roles(&self, case_id: &str, roles: Vec<Role>) -> StoreResult<Case>;

    /// Apply an escalation as one unit: the grown roster, the
    /// `ESCALATED` and `VOTING` transitions, `last_escalated_at` and the
    /// `CASE_ESCALATED` record. Leaves nothing changed on any error.
    async fn commit_escalation(
        &self,
        case_id: &str,
        roster: Vec<Role>,
        at: DateTime<Utc>,
        record: AuditRecord,
    ) -> StoreResult<Case>;

    async fn link_bundle(
        &self,
        case_id: &str,
        bundle_id: &str,
        completeness: u8,
    ) -> StoreResult<Case>;
}

/// Evidence bundle table.
#[async_trait]
pub trait BundleStore: Send + Sync {
    async fn put_bundle(&self, bundle: EvidenceBundle) -> StoreResult<()>;

    async fn get_bundle(&self, bundle_id: &str) -> StoreResult<EvidenceBundle>;
}

/// Vote table.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Votes on a case in cast order.
    async fn votes_for_case(&self, case_id: &str) -> StoreResult<Vec<Vote>>;

    /// Insert a vote, move its case to `status` and append `audit`, all as
    /// one unit.
    ///
    /// Fails with `DuplicateVote` if the voter already voted on the case,
    /// and leaves nothing changed on any error.
    async fn commit_vote(
        &self,
        vote: Vote,
        status: CaseStatus,
        at: DateTime<Utc>,
        audit: Vec<AuditRecord>,
    ) -> StoreResult<Case>;
}

/// Audit table.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a record; the store assigns its sequence number.
    async fn append_audit(&self, record: AuditRecord) -> StoreResult<AuditRecord>;

    /// Records of a case in append order.
    async fn audit_for_case(&self, case_id: &str) -> StoreResult<Vec<AuditRecord>>;
}

/// Everything the governance engine persists.
pub trait GovernanceStore: CaseStore + BundleStore + VoteStore + AuditStore {}

impl<T> GovernanceStore for T where T: CaseStore + BundleStore + VoteStore + AuditStore {}
