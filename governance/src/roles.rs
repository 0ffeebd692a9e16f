//! Official roles and their static voting profiles.
//!
//! Weight and permissions are a property of the role, never of an
//! individual official.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::GovernanceError;

/// Roles an official can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    DistrictCollector,
    Tehsildar,
    Patwari,
    LegalAdvisor,
    TechnicalExpert,
}

/// Actions a role may be entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    FinalApproval,
    CaseAssignment,
    PolicyOverride,
    RegionalApproval,
    CaseReview,
    EvidenceValidation,
    LocalVerification,
    FieldInspection,
    DataEntry,
    LegalReview,
    DocumentValidation,
    ComplianceCheck,
    SatelliteAnalysis,
    DroneValidation,
    TechnicalReview,
}

/// Static profile of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleProfile {
    /// Seniority level (5 = most senior)
    pub level: u8,
    /// Voting weight
    pub weight: u32,
    pub permissions: &'static [Permission],
}

/// Roles appended, in order, when a case stalls.
pub const ESCALATION_CHAIN: [Role; 3] = [Role::Patwari, Role::Tehsildar, Role::DistrictCollector];

impl Role {
    pub const ALL: [Role; 5] = [
        Role::DistrictCollector,
        Role::Tehsildar,
        Role::Patwari,
        Role::LegalAdvisor,
        Role::TechnicalExpert,
    ];

    /// The role's static profile.
    pub fn profile(&self) -> RoleProfile {
        use Permission::*;
        match self {
            Self::DistrictCollector => RoleProfile {
                level: 5,
                weight: 3,
                permissions: &[FinalApproval, CaseAssignment, PolicyOverride],
            },
            Self::Tehsildar => RoleProfile {
                level: 4,
                weight: 2,
                permissions: &[RegionalApproval, CaseReview, EvidenceValidation],
            },
            Self::Patwari => RoleProfile {
                level: 3,
                weight: 1,
                permissions: &[LocalVerification, FieldInspection, DataEntry],
            },
            Self::LegalAdvisor => RoleProfile {
                level: 3,
                weight: 2,
                permissions: &[LegalReview, DocumentValidation, ComplianceCheck],
            },
            Self::TechnicalExpert => RoleProfile {
                level: 2,
                weight: 1,
                permissions: &[SatelliteAnalysis, DroneValidation, TechnicalReview],
            },
        }
    }

    pub fn weight(&self) -> u32 {
        self.profile().weight
    }

    pub fn level(&self) -> u8 {
        self.profile().level
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.profile().permissions.contains(&permission)
    }

    /// Whether the role holds at least one of `permissions`.
    pub fn has_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has_permission(*p))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DistrictCollector => "DISTRICT_COLLECTOR",
            Self::Tehsildar => "TEHSILDAR",
            Self::Patwari => "PATWARI",
            Self::LegalAdvisor => "LEGAL_ADVISOR",
            Self::TechnicalExpert => "TECHNICAL_EXPERT",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = GovernanceError;

    /// Unknown roles are rejected, never defaulted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| GovernanceError::Unauthorized(format!("unknown role {s:?}")))
    }
}
