use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{
    NewNotification, NewScheduledStream, Notification, NotificationPreferences, Persistence,
    PersistenceError, PrimaryKey, Result, ScheduledStream,
};

/// An in-process [Persistence] implementation, backing tests and
/// single-process deployments. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryPersistence {
    next_key: Mutex<PrimaryKey>,
    notifications: Mutex<HashMap<String, Vec<Notification>>>,
    preferences: Mutex<HashMap<String, NotificationPreferences>>,
    streams: Mutex<Vec<ScheduledStream>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_key(&self) -> PrimaryKey {
        let mut key = self.next_key.lock();
        *key += 1;
        *key
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        Ok(self
            .notifications
            .lock()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_notification(&self, new: NewNotification) -> Result<Notification> {
        let notification = Notification {
            id: self.next_key(),
            user_id: new.user_id.clone(),
            kind: new.kind,
            title: new.title,
            message: new.message,
            created_at: Utc::now(),
        };

        self.notifications
            .lock()
            .entry(new.user_id)
            .or_default()
            .push(notification.clone());

        Ok(notification)
    }

    async fn clear_notifications(&self, user_id: &str) -> Result<()> {
        self.notifications.lock().remove(user_id);
        Ok(())
    }

    async fn preferences(&self, user_id: &str) -> Result<NotificationPreferences> {
        Ok(self
            .preferences
            .lock()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        self.preferences
            .lock()
            .insert(user_id.to_string(), preferences.clone());

        Ok(preferences)
    }

    async fn scheduled_streams(&self, cohort_id: &str) -> Result<Vec<ScheduledStream>> {
        Ok(self
            .streams
            .lock()
            .iter()
            .filter(|s| s.cohort_id == cohort_id)
            .cloned()
            .collect())
    }

    async fn scheduled_stream_by_id(&self, stream_id: PrimaryKey) -> Result<ScheduledStream> {
        self.streams
            .lock()
            .iter()
            .find(|s| s.id == stream_id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound {
                resource: "scheduled stream",
                identifier: stream_id.to_string(),
            })
    }

    async fn create_scheduled_stream(&self, new: NewScheduledStream) -> Result<ScheduledStream> {
        let stream = ScheduledStream {
            id: self.next_key(),
            cohort_id: new.cohort_id,
            title: new.title,
            starts_at: new.starts_at,
            description: new.description,
            created_by: new.created_by,
        };

        self.streams.lock().push(stream.clone());
        Ok(stream)
    }
}
