//! In-memory store.
//!
//! All four tables live behind one lock, so a vote insert, the status
//! change it triggers and its audit records are applied together or not
//! at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use evidence::EvidenceBundle;

use super::*;
use crate::types::StatusTransition;

#[derive(Default)]
struct Tables {
    cases: HashMap<String, Case>,
    bundles: HashMap<String, EvidenceBundle>,
    votes: HashMap<String, Vec<Vote>>,
    audit: HashMap<String, Vec<AuditRecord>>,
    audit_sequence: u64,
}

impl Tables {
    fn case(&self, case_id: &str) -> StoreResult<&Case> {
        self.cases
            .get(case_id)
            .ok_or_else(|| StoreError::NotFound(format!("case {case_id}")))
    }

    fn push_audit(&mut self, mut record: AuditRecord) -> AuditRecord {
        self.audit_sequence += 1;
        record.sequence = self.audit_sequence;
        self.audit
            .entry(record.case_id.clone())
            .or_default()
            .push(record.clone());
        record
    }

    fn case_mut(&mut self, case_id: &str) -> StoreResult<&mut Case> {
        self.cases
            .get_mut(case_id)
            .ok_or_else(|| StoreError::NotFound(format!("case {case_id}")))
    }
}

fn apply_status(case: &mut Case, status: CaseStatus, at: DateTime<Utc>) -> StoreResult<()> {
    if case.status == status {
        return Ok(());
    }
    if !case.status.can_transition_to(status) {
        return Err(StoreError::IllegalTransition {
            case_id: case.id.clone(),
            from: case.status,
            to: status,
        });
    }
    case.status = status;
    case.status_history.push(StatusTransition { status, at });
    Ok(())
}

/// Store kept entirely in process memory.
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    available: AtomicBool,
    audit_available: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            available: AtomicBool::new(true),
            audit_available: AtomicBool::new(true),
        }
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail audit writes only, including those bundled into a commit.
    pub fn set_audit_available(&self, available: bool) {
        self.audit_available.store(available, Ordering::SeqCst);
    }

    fn check_audit_available(&self) -> StoreResult<()> {
        if self.audit_available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("audit table offline".to_string()))
        }
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store offline".to_string()))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaseStore for InMemoryStore {
    async fn insert_case(&self, case: Case) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.cases.contains_key(&case.id) {
            return Err(StoreError::Conflict(format!("case {} already exists", case.id)));
        }
        tables.cases.insert(case.id.clone(), case);
        Ok(())
    }

    async fn get_case(&self, case_id: &str) -> StoreResult<Case> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables
            .cases
            .get(case_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("case {case_id}")))
    }

    async fn list_cases(&self) -> StoreResult<Vec<Case>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.cases.values().cloned().collect())
    }

    async fn update_case_status(
        &self,
        case_id: &str,
        status: CaseStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Case> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let case = tables.case_mut(case_id)?;
        apply_status(case, status, at)?;
        Ok(case.clone())
    }

    async fn update_assigned_roles(&self, case_id: &str, roles: Vec<Role>) -> StoreResult<Case> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let case = tables.case_mut(case_id)?;
        case.assigned_roles = roles;
        Ok(case.clone())
    }

    async fn commit_escalation(
        &self,
        case_id: &str,
        roster: Vec<Role>,
        at: DateTime<Utc>,
        record: AuditRecord,
    ) -> StoreResult<Case> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        let mut updated = tables.case(case_id)?.clone();
        updated.assigned_roles = roster;
        apply_status(&mut updated, CaseStatus::Escalated, at)?;
        apply_status(&mut updated, CaseStatus::Voting, at)?;
        updated.last_escalated_at = Some(at);
        self.check_audit_available()?;

        tables.cases.insert(updated.id.clone(), updated.clone());
        tables.push_audit(record);
        Ok(updated)
    }

    async fn link_bundle(
        &self,
        case_id: &str,
        bundle_id: &str,
        completeness: u8,
    ) -> StoreResult<Case> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.bundles.contains_key(bundle_id) {
            return Err(StoreError::NotFound(format!("bundle {bundle_id}")));
        }
        let case = tables.case_mut(case_id)?;
        case.bundle_id = Some(bundle_id.to_string());
        case.evidence_completeness = Some(completeness);
        Ok(case.clone())
    }
}

#[async_trait]
impl BundleStore for InMemoryStore {
    async fn put_bundle(&self, bundle: EvidenceBundle) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.bundles.contains_key(bundle.bundle_id()) {
            return Err(StoreError::Conflict(format!(
                "bundle {} already exists",
                bundle.bundle_id()
            )));
        }
        tables.bundles.insert(bundle.bundle_id().to_string(), bundle);
        Ok(())
    }

    async fn get_bundle(&self, bundle_id: &str) -> StoreResult<EvidenceBundle> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables
            .bundles
            .get(bundle_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("bundle {bundle_id}")))
    }
}

#[async_trait]
impl VoteStore for InMemoryStore {
    async fn votes_for_case(&self, case_id: &str) -> StoreResult<Vec<Vote>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.votes.get(case_id).cloned().unwrap_or_default())
    }

    async fn commit_vote(
        &self,
        vote: Vote,
        status: CaseStatus,
        at: DateTime<Utc>,
        audit: Vec<AuditRecord>,
    ) -> StoreResult<Case> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        let duplicate = tables
            .votes
            .get(&vote.case_id)
            .is_some_and(|votes| votes.iter().any(|v| v.voter == vote.voter));
        if duplicate {
            return Err(StoreError::DuplicateVote {
                case_id: vote.case_id,
                voter: vote.voter,
            });
        }

        // Validate everything before touching any table
        let mut updated = tables.case(&vote.case_id)?.clone();
        apply_status(&mut updated, status, at)?;
        if !audit.is_empty() {
            self.check_audit_available()?;
        }

        tables.cases.insert(updated.id.clone(), updated.clone());
        tables.votes.entry(vote.case_id.clone()).or_default().push(vote);
        for record in audit {
            tables.push_audit(record);
        }
        Ok(updated)
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append_audit(&self, record: AuditRecord) -> StoreResult<AuditRecord> {
        self.check_available()?;
        self.check_audit_available()?;
        let mut tables = self.tables.write().await;
        Ok(tables.push_audit(record))
    }

    async fn audit_for_case(&self, case_id: &str) -> StoreResult<Vec<AuditRecord>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.audit.get(case_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuditAction, Priority, VoteValue};

    fn case(id: &str) -> Case {
        Case::new(
            id,
            "Boundary dispute",
            "GJ01AA1234567890",
            Priority::High,
            vec![Role::DistrictCollector, Role::Tehsildar],
            "0xcreator",
            Utc::now(),
        )
        .unwrap()
    }

    fn vote(case_id: &str, voter: &str) -> Vote {
        Vote {
            id: uuid::Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            voter: voter.to_string(),
            voter_role: Role::Tehsildar,
            value: VoteValue::Approve,
            reasoning: "Deed and registry agree".to_string(),
            weight: 2,
            cast_at: Utc::now(),
            evidence_fingerprint: None,
        }
    }

    #[tokio::test]
    async fn test_case_roundtrip() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();

        assert_eq!(store.get_case("C1").await.unwrap().id, "C1");
        assert!(matches!(store.insert_case(case("C1")).await, Err(StoreError::Conflict(_))));
        assert!(matches!(store.get_case("C2").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();
        store.update_case_status("C1", CaseStatus::Rejected, Utc::now()).await.unwrap();

        let err = store
            .update_case_status("C1", CaseStatus::Voting, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
        assert!(matches!(
            GovernanceError::from(err),
            GovernanceError::CaseClosed { .. }
        ));
    }

    #[tokio::test]
    async fn test_commit_vote_is_unique() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();

        let updated = store
            .commit_vote(vote("C1", "0xaaa"), CaseStatus::Voting, Utc::now(), vec![])
            .await
            .unwrap();
        assert_eq!(updated.status, CaseStatus::Voting);

        let err = store
            .commit_vote(vote("C1", "0xaaa"), CaseStatus::Voting, Utc::now(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateVote { .. }));
        assert_eq!(store.votes_for_case("C1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_vote_rolls_back_on_bad_transition() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();
        store.update_case_status("C1", CaseStatus::ConsensusReached, Utc::now()).await.unwrap();

        let result = store
            .commit_vote(vote("C1", "0xaaa"), CaseStatus::Voting, Utc::now(), vec![])
            .await;
        assert!(result.is_err());
        assert!(store.votes_for_case("C1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_assigned_roles() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();

        let updated = store
            .update_assigned_roles("C1", vec![Role::Patwari])
            .await
            .unwrap();
        assert_eq!(updated.assigned_roles, vec![Role::Patwari]);
        assert!(matches!(
            store.update_assigned_roles("C2", vec![]).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_link_requires_bundle() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();
        assert!(matches!(
            store.link_bundle("C1", "missing", 45).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = InMemoryStore::new();
        store.set_available(false);

        let err = store.list_cases().await.unwrap_err();
        assert!(matches!(
            GovernanceError::from(err),
            GovernanceError::StorageFailure(_)
        ));

        store.set_available(true);
        assert!(store.list_cases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audit_sequence() {
        let store = InMemoryStore::new();
        let record = |case_id: &str| {
            AuditRecord::new(
                case_id,
                AuditAction::CaseCreated,
                "0xcreator",
                None,
                Utc::now(),
                serde_json::Value::Null,
            )
        };

        let a = store.append_audit(record("C1")).await.unwrap();
        let b = store.append_audit(record("C2")).await.unwrap();
        let c = store.append_audit(record("C1")).await.unwrap();
        assert!(a.sequence < b.sequence && b.sequence < c.sequence);
        assert_eq!(store.audit_for_case("C1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_commit_vote_writes_audit_with_vote() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();

        let cast = AuditRecord::new(
            "C1",
            AuditAction::VoteCast,
            "0xaaa",
            Some(Role::Tehsildar),
            Utc::now(),
            serde_json::Value::Null,
        );
        store
            .commit_vote(vote("C1", "0xaaa"), CaseStatus::Voting, Utc::now(), vec![cast])
            .await
            .unwrap();

        let records = store.audit_for_case("C1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].sequence > 0);
    }

    #[tokio::test]
    async fn test_commit_vote_rolls_back_when_audit_fails() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();
        store.set_audit_available(false);

        let cast = AuditRecord::new(
            "C1",
            AuditAction::VoteCast,
            "0xaaa",
            Some(Role::Tehsildar),
            Utc::now(),
            serde_json::Value::Null,
        );
        let err = store
            .commit_vote(vote("C1", "0xaaa"), CaseStatus::Voting, Utc::now(), vec![cast])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_audit_available(true);
        assert!(store.votes_for_case("C1").await.unwrap().is_empty());
        assert!(store.audit_for_case("C1").await.unwrap().is_empty());
        assert_eq!(store.get_case("C1").await.unwrap().status, CaseStatus::Open);
    }

    #[tokio::test]
    async fn test_commit_escalation() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();
        let at = Utc::now();
        let escalated = || {
            AuditRecord::new(
                "C1",
                AuditAction::CaseEscalated,
                "system",
                None,
                at,
                serde_json::Value::Null,
            )
        };
        let roster = vec![Role::DistrictCollector, Role::Tehsildar, Role::Patwari];

        store.set_audit_available(false);
        assert!(store
            .commit_escalation("C1", roster.clone(), at, escalated())
            .await
            .is_err());
        let untouched = store.get_case("C1").await.unwrap();
        assert_eq!(untouched.assigned_roles.len(), 2);
        assert_eq!(untouched.last_escalated_at, None);
        assert_eq!(untouched.status, CaseStatus::Open);

        store.set_audit_available(true);
        let updated = store
            .commit_escalation("C1", roster.clone(), at, escalated())
            .await
            .unwrap();
        assert_eq!(updated.assigned_roles, roster);
        assert_eq!(updated.status, CaseStatus::Voting);
        assert!(updated.passed_through(CaseStatus::Escalated));
        assert_eq!(updated.last_escalated_at, Some(at));
        assert_eq!(store.audit_for_case("C1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_escalation_refuses_closed_case() {
        let store = InMemoryStore::new();
        store.insert_case(case("C1")).await.unwrap();
        store.update_case_status("C1", CaseStatus::Rejected, Utc::now()).await.unwrap();

        let record = AuditRecord::new(
            "C1",
            AuditAction::CaseEscalated,
            "system",
            None,
            Utc::now(),
            serde_json::Value::Null,
        );
        let err = store
            .commit_escalation("C1", vec![Role::Patwari], Utc::now(), record)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
        assert!(store.audit_for_case("C1").await.unwrap().is_empty());
    }
}
