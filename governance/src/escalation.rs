//! Escalation of stalled cases.
//!
//! A case that has neither reached quorum nor been escalated within the
//! resolution timeout gets the next role of the escalation chain appended to
//! its roster. A case that already holds the whole chain is left alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::EscalationConfig;
use crate::locks::CaseLocks;
use crate::roles::Role;
use crate::store::GovernanceStore;
use crate::types::{AuditAction, AuditRecord, Case, CaseStatus, Result};

/// Actor recorded on scheduler audit entries.
pub const SCHEDULER_ACTOR: &str = "system:escalation-scheduler";

/// One escalation applied during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationOutcome {
    pub case_id: String,
    pub added_role: Role,
    pub previous_status: CaseStatus,
    /// Roster after escalation
    pub roster: Vec<Role>,
}

/// Periodically escalates cases past their resolution timeout.
pub struct EscalationScheduler {
    store: Arc<dyn GovernanceStore>,
    locks: Arc<CaseLocks>,
    config: EscalationConfig,
}

impl EscalationScheduler {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        locks: Arc<CaseLocks>,
        config: EscalationConfig,
    ) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    /// Run one scan as of `now`.
    ///
    /// Failing to list cases aborts the scan. Failures on a single case are
    /// logged and the scan moves on.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<Vec<EscalationOutcome>> {
        let cases = self.store.list_cases().await?;
        let mut outcomes = Vec::new();

        for case in cases {
            if !matches!(
                case.status,
                CaseStatus::Open | CaseStatus::Voting | CaseStatus::Escalated
            ) {
                continue;
            }
            if !self.is_overdue(&case, now) {
                continue;
            }

            match self.escalate(&case.id, now).await {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(e) => {
                    error!(case_id = %case.id, error = %e, "Escalation failed");
                }
            }
        }

        let pruned = self.locks.prune();
        if !outcomes.is_empty() {
            info!(escalated = outcomes.len(), pruned_locks = pruned, "Escalation scan completed");
        }
        Ok(outcomes)
    }

    /// Past the timeout and not escalated within the current window.
    fn is_overdue(&self, case: &Case, now: DateTime<Utc>) -> bool {
        let timeout = self.config.timeout();
        if now - case.created_at <= timeout {
            return false;
        }
        match case.last_escalated_at {
            Some(at) => now - at >= timeout,
            None => true,
        }
    }

    /// Escalate one case under its lock. `None` when nothing was done.
    async fn escalate(&self, case_id: &str, now: DateTime<Utc>) -> Result<Option<EscalationOutcome>> {
        let _guard = self.locks.acquire(case_id).await;

        // Re-read: a vote may have landed since the scan listed the case
        let case = self.store.get_case(case_id).await?;

        if case.status == CaseStatus::Escalated {
            warn!(case_id = %case_id, "Resuming interrupted escalation");
            self.store.update_case_status(case_id, CaseStatus::Voting, now).await?;
            return Ok(None);
        }
        if case.status.is_terminal() || !self.is_overdue(&case, now) {
            return Ok(None);
        }

        let votes = self.store.votes_for_case(case_id).await?;
        if votes.len() >= case.votes_required() {
            return Ok(None);
        }

        let Some(added_role) = self.config.next_role(&case.assigned_roles) else {
            debug!(case_id = %case_id, "Escalation chain exhausted");
            return Ok(None);
        };

        let previous_status = case.status;
        let mut roster = case.assigned_roles.clone();
        roster.push(added_role);

        let record = AuditRecord::new(
            case_id,
            AuditAction::CaseEscalated,
            SCHEDULER_ACTOR,
            None,
            now,
            serde_json::json!({
                "added_role": added_role.as_str(),
                "previous_status": previous_status.as_str(),
                "roster": roster.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                "votes_cast": votes.len(),
            }),
        );
        self.store
            .commit_escalation(case_id, roster.clone(), now, record)
            .await?;

        info!(
            case_id = %case_id,
            added_role = %added_role,
            previous_status = %previous_status,
            "Case escalated"
        );

        Ok(Some(EscalationOutcome {
            case_id: case_id.to_string(),
            added_role,
            previous_status,
            roster,
        }))
    }

    /// Run scans on the configured interval until `shutdown` turns true.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.config.scan_interval());

            info!(
                interval_secs = self.config.scan_interval_secs,
                timeout_hours = self.config.timeout_hours,
                "Escalation scheduler started"
            );

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(e) = self.run_once(Utc::now()).await {
                            error!(error = %e, "Escalation scan failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Escalation scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}
