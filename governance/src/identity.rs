//! Identity resolution at the service boundary.
//!
//! The surrounding transport authenticates a caller and hands over an
//! identity key; this module turns it into an [`Actor`] carrying the role
//! every core operation is given explicitly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::roles::Role;
use crate::types::{GovernanceError, Result};

/// Shortest identity key accepted (wallet address form).
pub const MIN_IDENTITY_LEN: usize = 26;

/// A registered official.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Official {
    /// Wallet address
    pub identity: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Official {
    pub fn new(identity: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            identity: identity.into(),
            display_name: display_name.into(),
            role,
            district: None,
            active: true,
        }
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.identity.clone(), self.role)
    }
}

/// A resolved caller: identity plus role, passed to every operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub identity: String,
    pub role: Role,
}

impl Actor {
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self {
            identity: identity.into(),
            role,
        }
    }
}

/// Resolves presented identities to officials.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve an identity; unknown or inactive identities are `Unauthorized`.
    async fn resolve(&self, identity: &str) -> Result<Official>;
}

/// Official registry held in memory.
pub struct InMemoryOfficialRegistry {
    officials: Arc<RwLock<HashMap<String, Official>>>,
}

impl InMemoryOfficialRegistry {
    pub fn new() -> Self {
        Self {
            officials: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register or replace an official.
    pub async fn register(&self, official: Official) {
        let mut officials = self.officials.write().await;
        officials.insert(official.identity.clone(), official);
    }

    /// Mark an official active or inactive.
    pub async fn set_active(&self, identity: &str, active: bool) -> Result<()> {
        let mut officials = self.officials.write().await;
        let official = officials
            .get_mut(identity)
            .ok_or_else(|| GovernanceError::NotFound(format!("official {identity}")))?;
        official.active = active;
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.officials.read().await.len()
    }
}

impl Default for InMemoryOfficialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for InMemoryOfficialRegistry {
    async fn resolve(&self, identity: &str) -> Result<Official> {
        if identity.len() < MIN_IDENTITY_LEN {
            return Err(GovernanceError::Unauthorized("invalid identity key".to_string()));
        }

        let officials = self.officials.read().await;
        match officials.get(identity) {
            Some(official) if official.active => Ok(official.clone()),
            Some(_) => Err(GovernanceError::Unauthorized(format!(
                "official {identity} is inactive"
            ))),
            None => Err(GovernanceError::Unauthorized(format!(
                "unknown identity {identity}"
            ))),
        }
    }
}
