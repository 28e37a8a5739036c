use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

use crate::HubError;

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// An unknown or internal error happened in the store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A record doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
}

impl From<PersistenceError> for HubError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::NotFound {
                resource,
                identifier,
            } => HubError::NotFound {
                resource,
                identifier,
            },
            e => HubError::Transient {
                collaborator: "persistence",
                detail: e.to_string(),
            },
        }
    }
}

/// The persistence collaborator: durable notification history, per-user
/// notification preferences, and scheduled-stream records.
///
/// The hub's in-memory room state never depends on these calls
/// succeeding; a failing store surfaces as a transient error to the
/// caller and nothing else.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>>;
    async fn append_notification(&self, new: NewNotification) -> Result<Notification>;
    async fn clear_notifications(&self, user_id: &str) -> Result<()>;

    async fn preferences(&self, user_id: &str) -> Result<NotificationPreferences>;
    async fn update_preferences(
        &self,
        user_id: &str,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences>;

    async fn scheduled_streams(&self, cohort_id: &str) -> Result<Vec<ScheduledStream>>;
    async fn scheduled_stream_by_id(&self, stream_id: PrimaryKey) -> Result<ScheduledStream>;
    async fn create_scheduled_stream(&self, new: NewScheduledStream) -> Result<ScheduledStream>;
}
