use thiserror::Error;

/// The error taxonomy shared by every hub operation.
///
/// Errors are returned synchronously to the originating caller only and
/// never leave a room's state partially updated: every check runs before
/// the first mutation inside the room's serialization point.
#[derive(Debug, Error)]
pub enum HubError {
    /// The actor lacks the role required for this operation
    #[error("{action} requires a moderator role")]
    Unauthorized { action: &'static str },
    /// The supplied session token does not resolve to an identity
    #[error("session token is not valid")]
    InvalidSession,
    /// The sender is in the room's ban set at admission time
    #[error("user {user_id} is banned from this cohort")]
    Banned { user_id: String },
    /// The operation contradicts current state
    #[error("{resource}: {detail}")]
    Conflict {
        resource: &'static str,
        detail: String,
    },
    /// The payload is malformed
    #[error("{field}: {detail}")]
    Validation {
        field: &'static str,
        detail: String,
    },
    /// The addressed resource does not exist
    #[error("{resource}:{identifier} does not exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    /// A collaborator call failed in a retryable way
    #[error("{collaborator} is unavailable: {detail}")]
    Transient {
        collaborator: &'static str,
        detail: String,
    },
}

impl HubError {
    pub fn not_found(resource: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            identifier: identifier.into(),
        }
    }

    pub fn validation(field: &'static str, detail: impl Into<String>) -> Self {
        Self::Validation {
            field,
            detail: detail.into(),
        }
    }

    pub fn conflict(resource: &'static str, detail: impl Into<String>) -> Self {
        Self::Conflict {
            resource,
            detail: detail.into(),
        }
    }
}
