//! Governance service facade.
//!
//! Ties identity, evidence assembly, voting, audit and escalation together
//! behind one object. Every operation takes the resolved [`Actor`]
//! explicitly; nothing is read from ambient request state.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use evidence::{BundleAssembler, Coordinates, EvidenceBundle};

use crate::audit::{AuditOrder, AuditTrail};
use crate::config::GovernanceConfig;
use crate::escalation::EscalationScheduler;
use crate::identity::{Actor, IdentityResolver};
use crate::locks::CaseLocks;
use crate::roles::{Permission, Role};
use crate::store::GovernanceStore;
use crate::types::{
    AuditAction, AuditRecord, Case, GovernanceError, Priority, Result, VoteValue,
};
use crate::voting::{VoteReceipt, VoteTally, VotingEngine};

/// Actor recorded for bootstrap imports.
pub const SYSTEM_ACTOR: &str = "system";

/// Permissions allowed to read a case's audit trail.
const AUDIT_PERMISSIONS: [Permission; 2] = [Permission::FinalApproval, Permission::CaseReview];

/// Input for a new case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCase {
    /// Generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub property_id: String,
    pub priority: Priority,
    pub assigned_roles: Vec<Role>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

/// A case as listed for an official.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    #[serde(flatten)]
    pub case: Case,
    pub votes_cast: usize,
    pub votes_required: usize,
}

/// Entry point for all governance operations.
pub struct GovernanceService {
    store: Arc<dyn GovernanceStore>,
    identities: Arc<dyn IdentityResolver>,
    assembler: Arc<BundleAssembler>,
    audit: Arc<AuditTrail>,
    locks: Arc<CaseLocks>,
    voting: VotingEngine,
    config: GovernanceConfig,
}

impl GovernanceService {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        identities: Arc<dyn IdentityResolver>,
        assembler: BundleAssembler,
        config: GovernanceConfig,
    ) -> Self {
        let audit = Arc::new(AuditTrail::new(store.clone()));
        let locks = Arc::new(CaseLocks::new());
        let voting = VotingEngine::new(
            store.clone(),
            locks.clone(),
            config.voting.clone(),
        );

        Self {
            store,
            identities,
            assembler: Arc::new(assembler),
            audit,
            locks,
            voting,
            config,
        }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Scheduler sharing this service's store, audit trail and case locks.
    pub fn escalation_scheduler(&self) -> EscalationScheduler {
        EscalationScheduler::new(
            self.store.clone(),
            self.locks.clone(),
            self.config.escalation.clone(),
        )
    }

    /// Resolve a presented identity into an actor.
    pub async fn authenticate(&self, identity: &str) -> Result<Actor> {
        let official = self.identities.resolve(identity).await?;
        Ok(official.actor())
    }

    /// Open a new case. Requires the `case_assignment` permission.
    pub async fn create_case(&self, actor: &Actor, new_case: NewCase) -> Result<Case> {
        if !actor.role.has_permission(Permission::CaseAssignment) {
            return Err(GovernanceError::Unauthorized(format!(
                "role {} cannot create cases",
                actor.role
            )));
        }
        self.insert_case(new_case, &actor.identity, Some(actor.role), Utc::now())
            .await
    }

    /// Insert a case on behalf of the system, bypassing permission checks.
    ///
    /// Used when bootstrapping from seed data.
    pub async fn import_case(&self, new_case: NewCase, created_at: DateTime<Utc>) -> Result<Case> {
        self.insert_case(new_case, SYSTEM_ACTOR, None, created_at).await
    }

    async fn insert_case(
        &self,
        new_case: NewCase,
        actor: &str,
        actor_role: Option<Role>,
        created_at: DateTime<Utc>,
    ) -> Result<Case> {
        let id = new_case.id.unwrap_or_else(|| {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("CASE_{}_{}", created_at.format("%Y"), &suffix[..8].to_uppercase())
        });

        let case = Case::new(
            id,
            new_case.title,
            new_case.property_id,
            new_case.priority,
            new_case.assigned_roles,
            actor,
            created_at,
        )?
        .with_coordinates(new_case.coordinates);
        self.store.insert_case(case.clone()).await?;

        self.audit
            .append(
                &case.id,
                AuditAction::CaseCreated,
                actor,
                actor_role,
                created_at,
                serde_json::json!({
                    "property_id": case.property_id,
                    "priority": case.priority.as_str(),
                    "assigned_roles": case.assigned_roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                }),
            )
            .await?;

        info!(
            case_id = %case.id,
            property_id = %case.property_id,
            priority = %case.priority.as_str(),
            "Case created"
        );
        Ok(case)
    }

    /// Assemble a fresh evidence bundle and link it to the case.
    ///
    /// Open to assigned roles and to roles holding `case_assignment`.
    /// Without `coordinates` the case's stored location is used.
    pub async fn generate_evidence(
        &self,
        actor: &Actor,
        case_id: &str,
        coordinates: Option<Coordinates>,
    ) -> Result<EvidenceBundle> {
        let case = self.store.get_case(case_id).await?;
        if !case.is_assigned(actor.role) && !actor.role.has_permission(Permission::CaseAssignment) {
            return Err(GovernanceError::Unauthorized(format!(
                "role {} cannot generate evidence for case {case_id}",
                actor.role
            )));
        }
        self.link_evidence(&case, coordinates, &actor.identity, Some(actor.role))
            .await
    }

    /// Assemble and link evidence on behalf of the system.
    pub async fn import_evidence(
        &self,
        case_id: &str,
        coordinates: Option<Coordinates>,
    ) -> Result<EvidenceBundle> {
        let case = self.store.get_case(case_id).await?;
        self.link_evidence(&case, coordinates, SYSTEM_ACTOR, None).await
    }

    async fn link_evidence(
        &self,
        case: &Case,
        coordinates: Option<Coordinates>,
        actor: &str,
        actor_role: Option<Role>,
    ) -> Result<EvidenceBundle> {
        if case.status.is_terminal() {
            return Err(GovernanceError::CaseClosed {
                case_id: case.id.clone(),
                status: case.status,
            });
        }

        let coordinates = coordinates.or(case.coordinates);
        let bundle = self
            .assembler
            .generate_bundle(&case.id, &case.property_id, coordinates)
            .await?;

        self.store.put_bundle(bundle.clone()).await?;
        self.store
            .link_bundle(&case.id, bundle.bundle_id(), bundle.completeness_score())
            .await?;

        let summary = bundle.summary();
        self.audit
            .append(
                &case.id,
                AuditAction::BundleLinked,
                actor,
                actor_role,
                bundle.created_at(),
                serde_json::json!({
                    "bundle_id": bundle.bundle_id(),
                    "fingerprint": bundle.fingerprint(),
                    "completeness_score": bundle.completeness_score(),
                    "confidence": bundle.confidence().as_str(),
                    "unavailable_sources": summary
                        .unavailable_sources
                        .iter()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>(),
                }),
            )
            .await?;

        if !summary.unavailable_sources.is_empty() {
            warn!(
                case_id = %case.id,
                unavailable = summary.unavailable_sources.len(),
                "Bundle linked with unavailable sources"
            );
        }
        Ok(bundle)
    }

    /// The case's linked evidence bundle. Assigned roles only.
    pub async fn get_case_evidence(&self, actor: &Actor, case_id: &str) -> Result<EvidenceBundle> {
        let case = self.store.get_case(case_id).await?;
        if !case.is_assigned(actor.role) {
            return Err(GovernanceError::Unauthorized(format!(
                "access denied to case {case_id}"
            )));
        }

        let bundle_id = case
            .bundle_id
            .as_deref()
            .ok_or_else(|| GovernanceError::NotFound(format!("evidence bundle for case {case_id}")))?;
        let bundle = self.store.get_bundle(bundle_id).await?;

        self.audit
            .append(
                case_id,
                AuditAction::EvidenceViewed,
                &actor.identity,
                Some(actor.role),
                Utc::now(),
                serde_json::json!({ "bundle_id": bundle_id }),
            )
            .await?;

        Ok(bundle)
    }

    pub async fn cast_vote(
        &self,
        actor: &Actor,
        case_id: &str,
        value: VoteValue,
        reasoning: &str,
        evidence_fingerprint: Option<String>,
    ) -> Result<VoteReceipt> {
        self.voting
            .cast_vote(case_id, actor, value, reasoning, evidence_fingerprint)
            .await
    }

    pub async fn get_votes(&self, actor: &Actor, case_id: &str) -> Result<VoteTally> {
        self.voting.get_votes(case_id, actor).await
    }

    /// Audit records of a case, newest first.
    ///
    /// Requires `final_approval` or `case_review`. The read itself is
    /// audited after the records are fetched.
    pub async fn get_audit_trail(&self, actor: &Actor, case_id: &str) -> Result<Vec<AuditRecord>> {
        if !actor.role.has_any(&AUDIT_PERMISSIONS) {
            return Err(GovernanceError::Unauthorized(format!(
                "role {} cannot read audit trails",
                actor.role
            )));
        }

        self.store.get_case(case_id).await?;
        let records = self.audit.query(case_id, AuditOrder::Descending).await?;

        self.audit
            .append(
                case_id,
                AuditAction::AuditViewed,
                &actor.identity,
                Some(actor.role),
                Utc::now(),
                serde_json::json!({ "records": records.len() }),
            )
            .await?;

        Ok(records)
    }

    /// Cases the actor's role is assigned to, by priority then newest first.
    pub async fn list_cases_for_role(&self, actor: &Actor) -> Result<Vec<CaseSummary>> {
        let mut cases: Vec<Case> = self
            .store
            .list_cases()
            .await?
            .into_iter()
            .filter(|c| c.is_assigned(actor.role))
            .collect();
        cases.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.created_at.cmp(&a.created_at))
        });

        let vote_lists = join_all(cases.iter().map(|c| self.store.votes_for_case(&c.id))).await;

        let mut summaries = Vec::with_capacity(cases.len());
        for (case, votes) in cases.into_iter().zip(vote_lists) {
            let votes_cast = votes?.len();
            let votes_required = case.votes_required();
            summaries.push(CaseSummary {
                case,
                votes_cast,
                votes_required,
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{InMemoryOfficialRegistry, Official};
    use crate::store::InMemoryStore;
    use chrono::Duration;
    use evidence::{EvidenceKind, StaticAdapter};

    const COLLECTOR: &str = "0x1234567890123456789012345678901234567890";
    const PATWARI: &str = "0x3456789012345678901234567890123456789012";
    const ADVISOR: &str = "0x4567890123456789012345678901234567890123";

    async fn service() -> GovernanceService {
        let registry = InMemoryOfficialRegistry::new();
        registry
            .register(Official::new(COLLECTOR, "Rajesh Patel", Role::DistrictCollector))
            .await;
        registry
            .register(Official::new(PATWARI, "Amit Kumar", Role::Patwari))
            .await;
        registry
            .register(Official::new(ADVISOR, "Meera Joshi", Role::LegalAdvisor))
            .await;

        let assembler = BundleAssembler::builder()
            .adapter(Arc::new(StaticAdapter::new(EvidenceKind::Registry)))
            .build();

        GovernanceService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(registry),
            assembler,
            GovernanceConfig::default(),
        )
    }

    fn new_case(priority: Priority, roles: Vec<Role>) -> NewCase {
        NewCase {
            id: None,
            title: "Property Boundary Dispute - Village Bavla".to_string(),
            property_id: "GJ01AA1234567890".to_string(),
            priority,
            assigned_roles: roles,
            coordinates: None,
        }
    }

    #[tokio::test]
    async fn test_create_case_requires_assignment_permission() {
        let service = service().await;
        let patwari = service.authenticate(PATWARI).await.unwrap();

        let result = service
            .create_case(&patwari, new_case(Priority::High, vec![Role::Patwari]))
            .await;
        assert!(matches!(result, Err(GovernanceError::Unauthorized(_))));

        let collector = service.authenticate(COLLECTOR).await.unwrap();
        let case = service
            .create_case(&collector, new_case(Priority::High, vec![Role::Patwari]))
            .await
            .unwrap();
        assert!(case.id.starts_with("CASE_"));
        assert_eq!(case.created_by, COLLECTOR);
    }

    #[tokio::test]
    async fn test_evidence_flow() {
        let service = service().await;
        let collector = service.authenticate(COLLECTOR).await.unwrap();
        let case = service
            .create_case(&collector, new_case(Priority::High, vec![Role::DistrictCollector]))
            .await
            .unwrap();

        assert!(matches!(
            service.get_case_evidence(&collector, &case.id).await,
            Err(GovernanceError::NotFound(_))
        ));

        let bundle = service.generate_evidence(&collector, &case.id, None).await.unwrap();
        let viewed = service.get_case_evidence(&collector, &case.id).await.unwrap();
        assert_eq!(viewed.bundle_id(), bundle.bundle_id());
        assert!(viewed.verify_integrity());

        let advisor = service.authenticate(ADVISOR).await.unwrap();
        assert!(matches!(
            service.get_case_evidence(&advisor, &case.id).await,
            Err(GovernanceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_stored_coordinates_drive_imagery() {
        let registry = InMemoryOfficialRegistry::new();
        registry
            .register(Official::new(COLLECTOR, "Rajesh Patel", Role::DistrictCollector))
            .await;
        let imagery = Arc::new(StaticAdapter::new(EvidenceKind::Imagery));
        let service = GovernanceService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(registry),
            BundleAssembler::builder().adapter(imagery.clone()).build(),
            GovernanceConfig::default(),
        );
        let collector = service.authenticate(COLLECTOR).await.unwrap();

        let mut input = new_case(Priority::Medium, vec![Role::DistrictCollector]);
        input.coordinates = Some(Coordinates::new(23.0225, 72.5714));
        let case = service.create_case(&collector, input).await.unwrap();
        assert_eq!(case.coordinates, Some(Coordinates::new(23.0225, 72.5714)));

        service.generate_evidence(&collector, &case.id, None).await.unwrap();
        assert_eq!(imagery.call_count(), 1);

        // A case without a location skips imagery
        let bare = service
            .create_case(&collector, new_case(Priority::Medium, vec![Role::DistrictCollector]))
            .await
            .unwrap();
        service.generate_evidence(&collector, &bare.id, None).await.unwrap();
        assert_eq!(imagery.call_count(), 1);
    }

    #[tokio::test]
    async fn test_audit_trail_permission_and_order() {
        let service = service().await;
        let collector = service.authenticate(COLLECTOR).await.unwrap();
        let case = service
            .create_case(&collector, new_case(Priority::Low, vec![Role::DistrictCollector]))
            .await
            .unwrap();
        service
            .cast_vote(&collector, &case.id, VoteValue::Approve, "Records agree", None)
            .await
            .unwrap();

        let patwari = service.authenticate(PATWARI).await.unwrap();
        assert!(matches!(
            service.get_audit_trail(&patwari, &case.id).await,
            Err(GovernanceError::Unauthorized(_))
        ));

        let records = service.get_audit_trail(&collector, &case.id).await.unwrap();
        assert_eq!(records.first().unwrap().action, AuditAction::CaseResolved);
        assert_eq!(records.last().unwrap().action, AuditAction::CaseCreated);

        // The previous read is now on the trail
        let again = service.get_audit_trail(&collector, &case.id).await.unwrap();
        assert_eq!(again.first().unwrap().action, AuditAction::AuditViewed);
    }

    #[tokio::test]
    async fn test_list_cases_for_role() {
        let service = service().await;
        let now = Utc::now();
        for (id, priority, age) in [
            ("LOW_NEW", Priority::Low, 1),
            ("HIGH_OLD", Priority::High, 10),
            ("HIGH_NEW", Priority::High, 2),
            ("MED", Priority::Medium, 5),
        ] {
            let mut input = new_case(priority, vec![Role::Patwari]);
            input.id = Some(id.to_string());
            service
                .import_case(input, now - Duration::hours(age))
                .await
                .unwrap();
        }
        let mut other = new_case(Priority::High, vec![Role::LegalAdvisor]);
        other.id = Some("OTHER".to_string());
        service.import_case(other, now).await.unwrap();

        let patwari = service.authenticate(PATWARI).await.unwrap();
        let ids: Vec<String> = service
            .list_cases_for_role(&patwari)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.case.id)
            .collect();
        assert_eq!(ids, vec!["HIGH_NEW", "HIGH_OLD", "MED", "LOW_NEW"]);
    }

    #[tokio::test]
    async fn test_unknown_identity() {
        let service = service().await;
        assert!(matches!(
            service.authenticate("0xffffffffffffffffffffffffffffffffffffffff").await,
            Err(GovernanceError::Unauthorized(_))
        ));
    }
}
