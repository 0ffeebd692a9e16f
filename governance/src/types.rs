//! Core types for dispute governance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use evidence::Coordinates;

use crate::roles::Role;

/// Case priority. Selects the weighted approval threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl FromStr for Priority {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            other => Err(GovernanceError::InvalidCase(format!("unknown priority {other}"))),
        }
    }
}

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    /// No votes yet
    Open,
    /// At least one vote, quorum not reached
    Voting,
    /// Transient while the roster grows
    Escalated,
    /// Terminal: weighted approval met the threshold
    ConsensusReached,
    /// Terminal: weighted approval fell short
    Rejected,
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ConsensusReached | Self::Rejected)
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: CaseStatus) -> bool {
        use CaseStatus::*;
        match (self, next) {
            (ConsensusReached | Rejected, _) => false,
            (Open, Voting | Escalated | ConsensusReached | Rejected) => true,
            (Voting, Voting | Escalated | ConsensusReached | Rejected) => true,
            (Escalated, Voting) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Voting => "VOTING",
            Self::Escalated => "ESCALATED",
            Self::ConsensusReached => "CONSENSUS_REACHED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub status: CaseStatus,
    pub at: DateTime<Utc>,
}

/// A property dispute under resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub title: String,
    /// ULPIN of the disputed parcel
    pub property_id: String,
    /// Parcel location used for imagery lookups
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub priority: Priority,
    pub status: CaseStatus,
    /// Roles expected to vote, in assignment order
    pub assigned_roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub bundle_id: Option<String>,
    /// Completeness of the linked bundle
    pub evidence_completeness: Option<u8>,
    pub last_escalated_at: Option<DateTime<Utc>>,
    pub status_history: Vec<StatusTransition>,
}

impl Case {
    /// Create an open case. The roster is deduplicated, keeping first occurrence.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        property_id: impl Into<String>,
        priority: Priority,
        assigned_roles: Vec<Role>,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let mut roster: Vec<Role> = Vec::with_capacity(assigned_roles.len());
        for role in assigned_roles {
            if !roster.contains(&role) {
                roster.push(role);
            }
        }
        if roster.is_empty() {
            return Err(GovernanceError::InvalidCase(
                "a case needs at least one assigned role".to_string(),
            ));
        }

        let property_id = property_id.into();
        if property_id.trim().is_empty() {
            return Err(GovernanceError::InvalidCase("property id is empty".to_string()));
        }

        Ok(Self {
            id: id.into(),
            title: title.into(),
            property_id,
            coordinates: None,
            priority,
            status: CaseStatus::Open,
            assigned_roles: roster,
            created_at,
            created_by: created_by.into(),
            bundle_id: None,
            evidence_completeness: None,
            last_escalated_at: None,
            status_history: vec![StatusTransition {
                status: CaseStatus::Open,
                at: created_at,
            }],
        })
    }

    pub fn with_coordinates(mut self, coordinates: Option<Coordinates>) -> Self {
        self.coordinates = coordinates;
        self
    }

    pub fn is_assigned(&self, role: Role) -> bool {
        self.assigned_roles.contains(&role)
    }

    /// Votes needed for quorum.
    pub fn votes_required(&self) -> usize {
        self.assigned_roles.len()
    }

    /// Whether the case ever passed through `status`.
    pub fn passed_through(&self, status: CaseStatus) -> bool {
        self.status_history.iter().any(|t| t.status == status)
    }
}

/// A ballot value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteValue {
    Approve,
    Reject,
    NeedsMoreInfo,
    Abstain,
}

impl VoteValue {
    pub const ALL: [VoteValue; 4] = [
        VoteValue::Approve,
        VoteValue::Reject,
        VoteValue::NeedsMoreInfo,
        VoteValue::Abstain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::NeedsMoreInfo => "NEEDS_MORE_INFO",
            Self::Abstain => "ABSTAIN",
        }
    }
}

impl FromStr for VoteValue {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self> {
        VoteValue::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| GovernanceError::InvalidVote(format!("unknown vote type {s:?}")))
    }
}

/// A recorded vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub case_id: String,
    pub voter: String,
    /// Role at cast time
    pub voter_role: Role,
    pub value: VoteValue,
    pub reasoning: String,
    /// Weight at cast time
    pub weight: u32,
    pub cast_at: DateTime<Utc>,
    /// Bundle fingerprint the voter reviewed
    pub evidence_fingerprint: Option<String>,
}

/// Kind of audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CaseCreated,
    BundleLinked,
    EvidenceViewed,
    VoteCast,
    CaseResolved,
    CaseEscalated,
    AuditViewed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseCreated => "CASE_CREATED",
            Self::BundleLinked => "BUNDLE_LINKED",
            Self::EvidenceViewed => "EVIDENCE_VIEWED",
            Self::VoteCast => "VOTE_CAST",
            Self::CaseResolved => "CASE_RESOLVED",
            Self::CaseEscalated => "CASE_ESCALATED",
            Self::AuditViewed => "AUDIT_VIEWED",
        }
    }
}

/// An append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub case_id: String,
    /// Store-assigned, strictly increasing
    pub sequence: u64,
    pub action: AuditAction,
    pub actor: String,
    /// `None` for system actors such as the escalation scheduler
    pub actor_role: Option<Role>,
    pub at: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl AuditRecord {
    /// A record not yet stored. The store assigns `sequence` on insert.
    pub fn new(
        case_id: impl Into<String>,
        action: AuditAction,
        actor: impl Into<String>,
        actor_role: Option<Role>,
        at: DateTime<Utc>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            case_id: case_id.into(),
            sequence: 0,
            action,
            actor: actor.into(),
            actor_role,
            at,
            details,
        }
    }
}

/// Error types for governance operations.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// Role not assigned to the case, or identity not resolvable
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Voter already voted on this case
    #[error("{voter} has already voted on case {case_id}")]
    DuplicateVote { case_id: String, voter: String },

    /// Malformed vote
    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    /// Case, bundle or vote does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence unavailable
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Case already reached a terminal status
    #[error("Case {case_id} is closed ({status})")]
    CaseClosed { case_id: String, status: CaseStatus },

    /// Case could not be created
    #[error("Invalid case: {0}")]
    InvalidCase(String),

    /// Collected evidence could not be sealed into a bundle
    #[error("Evidence error: {0}")]
    Evidence(#[from] evidence::FingerprintError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
