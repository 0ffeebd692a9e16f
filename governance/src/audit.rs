//! Append-only audit trail for case activity.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};

use crate::roles::Role;
use crate::store::GovernanceStore;
use crate::types::{AuditAction, AuditRecord, Result};

/// Sort order for audit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOrder {
    /// Oldest first
    Ascending,
    /// Newest first
    Descending,
}

/// Writes and reads audit records through the store.
pub struct AuditTrail {
    store: Arc<dyn GovernanceStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn GovernanceStore>) -> Self {
        Self { store }
    }

    /// Append a record. Storage failures are returned, never swallowed.
    pub async fn append(
        &self,
        case_id: &str,
        action: AuditAction,
        actor: &str,
        actor_role: Option<Role>,
        at: DateTime<Utc>,
        details: serde_json::Value,
    ) -> Result<AuditRecord> {
        let record = AuditRecord::new(case_id, action, actor, actor_role, at, details);

        match self.store.append_audit(record).await {
            Ok(stored) => {
                debug!(
                    case_id = %case_id,
                    action = %action.as_str(),
                    sequence = stored.sequence,
                    "Audit record appended"
                );
                Ok(stored)
            }
            Err(e) => {
                error!(
                    case_id = %case_id,
                    action = %action.as_str(),
                    error = %e,
                    "Failed to append audit record"
                );
                Err(e.into())
            }
        }
    }

    /// Records of a case ordered by (timestamp, sequence).
    pub async fn query(&self, case_id: &str, order: AuditOrder) -> Result<Vec<AuditRecord>> {
        let mut records = self.store.audit_for_case(case_id).await?;
        records.sort_by(|a, b| a.at.cmp(&b.at).then(a.sequence.cmp(&b.sequence)));
        if order == AuditOrder::Descending {
            records.reverse();
        }
        Ok(records)
    }
}
