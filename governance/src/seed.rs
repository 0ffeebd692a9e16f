//! Bootstrap data: officials and cases loaded at startup.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use evidence::Coordinates;

use crate::identity::{InMemoryOfficialRegistry, Official};
use crate::roles::Role;
use crate::service::{GovernanceService, NewCase};
use crate::types::{GovernanceError, Priority, Result};

/// A case entry in a seed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedCase {
    pub id: String,
    pub title: String,
    pub property_id: String,
    pub priority: Priority,
    pub assigned_roles: Vec<Role>,
    /// Defaults to load time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    /// Assemble and link an evidence bundle after import
    #[serde(default)]
    pub generate_evidence: bool,
}

impl SeedCase {
    fn to_new_case(&self) -> NewCase {
        NewCase {
            id: Some(self.id.clone()),
            title: self.title.clone(),
            property_id: self.property_id.clone(),
            priority: self.priority,
            assigned_roles: self.assigned_roles.clone(),
            coordinates: self.coordinates,
        }
    }
}

/// Contents of a seed file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub officials: Vec<Official>,
    pub cases: Vec<SeedCase>,
}

/// What a seed run loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub officials: usize,
    pub cases: usize,
    pub bundles: usize,
}

impl SeedData {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| GovernanceError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| GovernanceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&yaml)
    }

    /// Three district officials and one open boundary dispute.
    pub fn sample() -> Self {
        Self {
            officials: vec![
                Official::new(
                    "0x1234567890123456789012345678901234567890",
                    "Rajesh Patel",
                    Role::DistrictCollector,
                )
                .with_district("Gandhinagar"),
                Official::new(
                    "0x2345678901234567890123456789012345678901",
                    "Priya Shah",
                    Role::Tehsildar,
                )
                .with_district("Ahmedabad"),
                Official::new(
                    "0x3456789012345678901234567890123456789012",
                    "Amit Kumar",
                    Role::Patwari,
                )
                .with_district("Surat"),
            ],
            cases: vec![SeedCase {
                id: "CASE_2025_001".to_string(),
                title: "Property Boundary Dispute - Village Bavla".to_string(),
                property_id: "GJ01AA1234567890".to_string(),
                priority: Priority::High,
                assigned_roles: vec![Role::DistrictCollector, Role::Tehsildar, Role::Patwari],
                created_at: Utc.with_ymd_and_hms(2025, 7, 25, 0, 0, 0).single(),
                coordinates: Some(Coordinates::new(23.0225, 72.5714)),
                generate_evidence: true,
            }],
        }
    }

    /// Register officials, import cases and link requested evidence.
    pub async fn apply(
        &self,
        registry: &InMemoryOfficialRegistry,
        service: &GovernanceService,
    ) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        for official in &self.officials {
            registry.register(official.clone()).await;
            report.officials += 1;
        }

        for seed in &self.cases {
            let created_at = seed.created_at.unwrap_or_else(Utc::now);
            let case = service.import_case(seed.to_new_case(), created_at).await?;
            report.cases += 1;

            if seed.generate_evidence {
                service.import_evidence(&case.id, seed.coordinates).await?;
                report.bundles += 1;
            }
        }

        info!(
            officials = report.officials,
            cases = report.cases,
            bundles = report.bundles,
            "Seed data loaded"
        );
        Ok(report)
    }
}
