use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{util::random_string, HubError, UserId};

/// What a participant is allowed to do in a cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Moderator,
    Admin,
}

/// A resolved session: who is acting, and as what
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
    pub role: Role,
}

impl Role {
    /// Admins hold every moderator power
    pub fn is_moderator(&self) -> bool {
        matches!(self, Self::Moderator | Self::Admin)
    }
}

impl Identity {
    pub fn require_moderator(&self, action: &'static str) -> Result<(), HubError> {
        if self.role.is_moderator() {
            Ok(())
        } else {
            Err(HubError::Unauthorized { action })
        }
    }
}

/// The authorization collaborator: resolves a session token to an
/// identity. Session issuance and credential handling live outside the
/// hub; this is only the seam the hub consumes.
#[async_trait]
pub trait Authority: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity, HubError>;
}

/// A token-table authority for tests and single-process deployments
#[derive(Default)]
pub struct StaticAuthority {
    sessions: Mutex<HashMap<String, Identity>>,
}

impl StaticAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity and returns its session token
    pub fn issue(&self, identity: Identity) -> String {
        let token = random_string(32);

        self.sessions.lock().insert(token.clone(), identity);
        token
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.lock().remove(token);
    }
}

#[async_trait]
impl Authority for StaticAuthority {
    async fn resolve(&self, token: &str) -> Result<Identity, HubError> {
        self.sessions
            .lock()
            .get(token)
            .cloned()
            .ok_or(HubError::InvalidSession)
    }
}
