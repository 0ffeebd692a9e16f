//! Weighted, role-based voting.
//!
//! Every assigned role gets one vote. Once all of them are in, the weighted
//! share of APPROVE votes is compared with the threshold for the case
//! priority and the case is closed either way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::VotingConfig;
use crate::identity::Actor;
use crate::locks::CaseLocks;
use crate::store::GovernanceStore;
use crate::types::{
    AuditAction, AuditRecord, Case, CaseStatus, GovernanceError, Result, Vote, VoteValue,
};

/// Outcome of a successful vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: String,
    /// Case status after the vote
    pub status: CaseStatus,
    /// Weighted approval over the votes cast so far
    pub approval_percentage: f64,
    pub votes_cast: usize,
    pub votes_required: usize,
}

/// Count and weight of one vote kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteBreakdown {
    pub count: usize,
    pub weight: u32,
}

/// All votes on a case with per-kind totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub case_id: String,
    pub total_votes: usize,
    pub breakdown: BTreeMap<VoteValue, VoteBreakdown>,
    /// Oldest first
    pub votes: Vec<Vote>,
}

impl VoteTally {
    pub fn from_votes(case_id: impl Into<String>, mut votes: Vec<Vote>) -> Self {
        votes.sort_by(|a, b| a.cast_at.cmp(&b.cast_at));

        let mut breakdown: BTreeMap<VoteValue, VoteBreakdown> = VoteValue::ALL
            .into_iter()
            .map(|value| (value, VoteBreakdown::default()))
            .collect();
        for vote in &votes {
            let entry = breakdown.entry(vote.value).or_default();
            entry.count += 1;
            entry.weight += vote.weight;
        }

        Self {
            case_id: case_id.into(),
            total_votes: votes.len(),
            breakdown,
            votes,
        }
    }
}

/// `100 × approve weight / total weight`, or 0 when nothing was cast.
pub fn weighted_approval(votes: &[Vote]) -> f64 {
    let total: u32 = votes.iter().map(|v| v.weight).sum();
    if total == 0 {
        return 0.0;
    }
    let approve: u32 = votes
        .iter()
        .filter(|v| v.value == VoteValue::Approve)
        .map(|v| v.weight)
        .sum();
    f64::from(approve) * 100.0 / f64::from(total)
}

/// Status a case should hold given its votes.
///
/// Below quorum the case keeps voting; at quorum it is decided against the
/// priority threshold.
pub fn resolve_status(case: &Case, votes: &[Vote], config: &VotingConfig) -> (CaseStatus, f64) {
    let approval = weighted_approval(votes);
    let mut voters: Vec<&str> = votes.iter().map(|v| v.voter.as_str()).collect();
    voters.sort_unstable();
    voters.dedup();

    if voters.len() < case.votes_required() {
        return (CaseStatus::Voting, approval);
    }

    if approval >= config.threshold(case.priority) {
        (CaseStatus::ConsensusReached, approval)
    } else {
        (CaseStatus::Rejected, approval)
    }
}

/// Records votes and drives cases to a decision.
pub struct VotingEngine {
    store: Arc<dyn GovernanceStore>,
    locks: Arc<CaseLocks>,
    config: VotingConfig,
}

impl VotingEngine {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        locks: Arc<CaseLocks>,
        config: VotingConfig,
    ) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    /// Cast a vote on a case.
    pub async fn cast_vote(
        &self,
        case_id: &str,
        actor: &Actor,
        value: VoteValue,
        reasoning: &str,
        evidence_fingerprint: Option<String>,
    ) -> Result<VoteReceipt> {
        self.cast_vote_at(case_id, actor, value, reasoning, evidence_fingerprint, Utc::now())
            .await
    }

    /// Cast a vote with an explicit timestamp.
    pub async fn cast_vote_at(
        &self,
        case_id: &str,
        actor: &Actor,
        value: VoteValue,
        reasoning: &str,
        evidence_fingerprint: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt> {
        let _guard = self.locks.acquire(case_id).await;

        let case = self.store.get_case(case_id).await?;

        if !case.is_assigned(actor.role) {
            warn!(
                case_id = %case_id,
                voter = %actor.identity,
                role = %actor.role,
                "Vote rejected: role not assigned to case"
            );
            return Err(GovernanceError::Unauthorized(format!(
                "role {} is not assigned to case {case_id}",
                actor.role
            )));
        }

        if case.status.is_terminal() {
            return Err(GovernanceError::CaseClosed {
                case_id: case_id.to_string(),
                status: case.status,
            });
        }

        if reasoning.trim().is_empty() {
            return Err(GovernanceError::InvalidVote("reasoning is required".to_string()));
        }

        let mut votes = self.store.votes_for_case(case_id).await?;
        if votes.iter().any(|v| v.voter == actor.identity) {
            return Err(GovernanceError::DuplicateVote {
                case_id: case_id.to_string(),
                voter: actor.identity.clone(),
            });
        }

        let vote = Vote {
            id: uuid::Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            voter: actor.identity.clone(),
            voter_role: actor.role,
            value,
            reasoning: reasoning.trim().to_string(),
            weight: actor.role.weight(),
            cast_at: now,
            evidence_fingerprint,
        };
        votes.push(vote.clone());

        let (status, approval) = resolve_status(&case, &votes, &self.config);
        let votes_cast = votes.len();
        let votes_required = case.votes_required();

        let mut audit = vec![AuditRecord::new(
            case_id,
            AuditAction::VoteCast,
            &actor.identity,
            Some(actor.role),
            now,
            serde_json::json!({
                "vote_id": vote.id,
                "vote_type": value.as_str(),
                "weight": vote.weight,
                "votes_cast": votes_cast,
                "votes_required": votes_required,
            }),
        )];
        let threshold = self.config.threshold(case.priority);
        if status.is_terminal() {
            audit.push(AuditRecord::new(
                case_id,
                AuditAction::CaseResolved,
                &actor.identity,
                Some(actor.role),
                now,
                serde_json::json!({
                    "status": status.as_str(),
                    "approval_percentage": approval,
                    "threshold": threshold,
                    "priority": case.priority.as_str(),
                    "votes_cast": votes_cast,
                }),
            ));
        }

        // Vote, status and audit records land together or not at all
        if let Err(e) = self.store.commit_vote(vote.clone(), status, now, audit).await {
            error!(case_id = %case_id, voter = %actor.identity, error = %e, "Vote commit failed");
            return Err(e.into());
        }

        debug!(
            case_id = %case_id,
            voter = %actor.identity,
            vote = %value.as_str(),
            weight = vote.weight,
            "Vote recorded"
        );

        if status.is_terminal() {
            info!(
                case_id = %case_id,
                status = %status,
                approval = approval,
                threshold = threshold,
                "Case resolved"
            );
        }

        Ok(VoteReceipt {
            vote_id: vote.id,
            status,
            approval_percentage: approval,
            votes_cast,
            votes_required,
        })
    }

    /// All votes on a case. Only assigned roles may look.
    pub async fn get_votes(&self, case_id: &str, actor: &Actor) -> Result<VoteTally> {
        let case = self.store.get_case(case_id).await?;
        if !case.is_assigned(actor.role) {
            return Err(GovernanceError::Unauthorized(format!(
                "role {} is not assigned to case {case_id}",
                actor.role
            )));
        }

        let votes = self.store.votes_for_case(case_id).await?;
        Ok(VoteTally::from_votes(case_id, votes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditOrder, AuditTrail};
    use crate::roles::Role;
    use crate::store::{CaseStore, InMemoryStore, VoteStore};
    use crate::types::Priority;

    const COLLECTOR: &str = "0x1234567890123456789012345678901234567890";
    const TEHSILDAR: &str = "0x2345678901234567890123456789012345678901";
    const PATWARI: &str = "0x3456789012345678901234567890123456789012";

    struct Fixture {
        store: Arc<InMemoryStore>,
        audit: Arc<AuditTrail>,
        engine: VotingEngine,
    }

    async fn fixture(priority: Priority) -> Fixture {
        fixture_with(
            priority,
            vec![Role::DistrictCollector, Role::Tehsildar, Role::Patwari],
        )
        .await
    }

    async fn fixture_with(priority: Priority, roles: Vec<Role>) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let audit = Arc::new(AuditTrail::new(store.clone()));
        let engine = VotingEngine::new(
            store.clone(),
            Arc::new(CaseLocks::new()),
            VotingConfig::default(),
        );

        let case = Case::new(
            "CASE_2025_001",
            "Boundary dispute",
            "GJ01AA1234567890",
            priority,
            roles,
            COLLECTOR,
            Utc::now(),
        )
        .unwrap();
        store.insert_case(case).await.unwrap();

        Fixture { store, audit, engine }
    }

    fn collector() -> Actor {
        Actor::new(COLLECTOR, Role::DistrictCollector)
    }

    fn tehsildar() -> Actor {
        Actor::new(TEHSILDAR, Role::Tehsildar)
    }

    fn patwari() -> Actor {
        Actor::new(PATWARI, Role::Patwari)
    }

    #[tokio::test]
    async fn test_weighted_consensus() {
        let f = fixture(Priority::High).await;

        let first = f
            .engine
            .cast_vote("CASE_2025_001", &collector(), VoteValue::Approve, "Deed verified", None)
            .await
            .unwrap();
        assert_eq!(first.status, CaseStatus::Voting);
        assert_eq!(first.votes_required, 3);

        f.engine
            .cast_vote("CASE_2025_001", &tehsildar(), VoteValue::Approve, "Survey matches", None)
            .await
            .unwrap();
        let last = f
            .engine
            .cast_vote("CASE_2025_001", &patwari(), VoteValue::Reject, "Boundary unclear", None)
            .await
            .unwrap();

        assert_eq!(last.status, CaseStatus::ConsensusReached);
        assert!((last.approval_percentage - 83.333).abs() < 0.01);
        assert_eq!(last.votes_cast, 3);
    }

    #[tokio::test]
    async fn test_rejected_below_threshold() {
        let f = fixture(Priority::High).await;

        for (actor, value) in [
            (collector(), VoteValue::Reject),
            (tehsildar(), VoteValue::Approve),
            (patwari(), VoteValue::Approve),
        ] {
            f.engine
                .cast_vote("CASE_2025_001", &actor, value, "reviewed", None)
                .await
                .unwrap();
        }

        let case = f.store.get_case("CASE_2025_001").await.unwrap();
        assert_eq!(case.status, CaseStatus::Rejected);

        let records = f.audit.query("CASE_2025_001", AuditOrder::Ascending).await.unwrap();
        assert_eq!(records.last().unwrap().action, AuditAction::CaseResolved);
    }

    #[tokio::test]
    async fn test_abstain_counts_toward_total_weight() {
        let f = fixture(Priority::Low).await;

        for (actor, value) in [
            (collector(), VoteValue::Approve),
            (tehsildar(), VoteValue::Abstain),
            (patwari(), VoteValue::NeedsMoreInfo),
        ] {
            f.engine
                .cast_vote("CASE_2025_001", &actor, value, "reviewed", None)
                .await
                .unwrap();
        }

        // 3 / 6 = 50% < 60%
        let case = f.store.get_case("CASE_2025_001").await.unwrap();
        assert_eq!(case.status, CaseStatus::Rejected);
    }

    #[tokio::test]
    async fn test_duplicate_vote() {
        let f = fixture(Priority::Medium).await;

        f.engine
            .cast_vote("CASE_2025_001", &tehsildar(), VoteValue::Approve, "first", None)
            .await
            .unwrap();
        let err = f
            .engine
            .cast_vote("CASE_2025_001", &tehsildar(), VoteValue::Reject, "second", None)
            .await
            .unwrap_err();

        assert!(matches!(err, GovernanceError::DuplicateVote { .. }));
        let tally = f.engine.get_votes("CASE_2025_001", &tehsildar()).await.unwrap();
        assert_eq!(tally.total_votes, 1);
        assert_eq!(tally.breakdown[&VoteValue::Approve].count, 1);
    }

    #[tokio::test]
    async fn test_unassigned_role() {
        let f = fixture(Priority::Medium).await;
        let advisor = Actor::new("0x4567890123456789012345678901234567890123", Role::LegalAdvisor);

        let err = f
            .engine
            .cast_vote("CASE_2025_001", &advisor, VoteValue::Approve, "looks fine", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Unauthorized(_)));
        assert!(matches!(
            f.engine.get_votes("CASE_2025_001", &advisor).await,
            Err(GovernanceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_reasoning() {
        let f = fixture(Priority::Medium).await;
        let err = f
            .engine
            .cast_vote("CASE_2025_001", &collector(), VoteValue::Approve, "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidVote(_)));
    }

    #[tokio::test]
    async fn test_missing_case() {
        let f = fixture(Priority::Medium).await;
        let err = f
            .engine
            .cast_vote("CASE_404", &collector(), VoteValue::Approve, "x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_closed_case() {
        let f = fixture(Priority::Medium).await;
        f.store
            .update_case_status("CASE_2025_001", CaseStatus::Rejected, Utc::now())
            .await
            .unwrap();

        let err = f
            .engine
            .cast_vote("CASE_2025_001", &collector(), VoteValue::Approve, "late", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::CaseClosed { .. }));
    }

    #[tokio::test]
    async fn test_low_threshold_met_exactly() {
        let f = fixture_with(Priority::Low, vec![Role::DistrictCollector, Role::Tehsildar]).await;

        f.engine
            .cast_vote("CASE_2025_001", &collector(), VoteValue::Approve, "Deed verified", None)
            .await
            .unwrap();
        let receipt = f
            .engine
            .cast_vote("CASE_2025_001", &tehsildar(), VoteValue::Reject, "Survey disagrees", None)
            .await
            .unwrap();

        // 3 / 5 = 60%
        assert_eq!(receipt.approval_percentage, 60.0);
        assert_eq!(receipt.status, CaseStatus::ConsensusReached);
    }

    #[tokio::test]
    async fn test_medium_threshold_met_exactly() {
        let f = fixture_with(
            Priority::Medium,
            vec![Role::DistrictCollector, Role::Tehsildar, Role::LegalAdvisor, Role::Patwari],
        )
        .await;
        let second_collector =
            Actor::new("0x6789012345678901234567890123456789012345", Role::DistrictCollector);
        let advisor = Actor::new("0x4567890123456789012345678901234567890123", Role::LegalAdvisor);

        for (actor, value) in [
            (collector(), VoteValue::Approve),
            (tehsildar(), VoteValue::Approve),
            (advisor, VoteValue::Approve),
        ] {
            f.engine
                .cast_vote("CASE_2025_001", &actor, value, "reviewed", None)
                .await
                .unwrap();
        }
        let receipt = f
            .engine
            .cast_vote("CASE_2025_001", &second_collector, VoteValue::Reject, "reviewed", None)
            .await
            .unwrap();

        // 7 / 10 = 70%
        assert_eq!(receipt.approval_percentage, 70.0);
        assert_eq!(receipt.status, CaseStatus::ConsensusReached);
    }

    #[tokio::test]
    async fn test_audit_failure_records_nothing() {
        let f = fixture(Priority::High).await;
        f.store.set_audit_available(false);

        let err = f
            .engine
            .cast_vote("CASE_2025_001", &tehsildar(), VoteValue::Approve, "Survey matches", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::StorageFailure(_)));

        f.store.set_audit_available(true);
        assert!(f.store.votes_for_case("CASE_2025_001").await.unwrap().is_empty());
        assert!(f
            .audit
            .query("CASE_2025_001", AuditOrder::Ascending)
            .await
            .unwrap()
            .is_empty());

        // The official can vote once the audit table is back
        let receipt = f
            .engine
            .cast_vote("CASE_2025_001", &tehsildar(), VoteValue::Approve, "Survey matches", None)
            .await
            .unwrap();
        assert_eq!(receipt.votes_cast, 1);
        let records = f.audit.query("CASE_2025_001", AuditOrder::Ascending).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::VoteCast);
    }

    #[test]
    fn test_weighted_approval_empty() {
        assert_eq!(weighted_approval(&[]), 0.0);
    }
}
