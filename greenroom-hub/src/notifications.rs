use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};

use dashmap::DashMap;
use futures_util::Stream;
use log::debug;
use parking_lot::Mutex;

use crate::{
    db::{NewNotification, Notification, NotificationKind, NotificationPreferences, Persistence},
    util::Id,
    HubError, UserId,
};

pub type NotificationChannelId = Id<NotificationChannel>;

/// Delivers discrete per-user events, filtered by that user's
/// preferences. Room-wide state goes through the room broadcaster
/// instead; this never touches room state.
pub struct NotificationDispatcher {
    me: Weak<Self>,
    persistence: Arc<dyn Persistence>,
    channels: DashMap<UserId, Vec<NotificationChannel>>,
}

/// One live delivery channel for a user, typically an open dashboard tab
pub struct NotificationChannel {
    id: NotificationChannelId,
    queue: Arc<Mutex<VecDeque<Notification>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

/// The receiving end of a [NotificationChannel]; dropping it
/// deregisters the channel
pub struct NotificationHandle {
    user_id: UserId,
    channel_id: NotificationChannelId,
    queue: Arc<Mutex<VecDeque<Notification>>>,
    waker: Arc<Mutex<Option<Waker>>>,
    dispatcher: Weak<NotificationDispatcher>,
}

impl NotificationDispatcher {
    pub fn new(persistence: Arc<dyn Persistence>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            persistence,
            channels: Default::default(),
        })
    }

    /// Opens a live notification channel for the user
    pub fn subscribe(&self, user_id: &UserId) -> NotificationHandle {
        let channel = NotificationChannel {
            id: NotificationChannelId::new(),
            queue: Default::default(),
            waker: Default::default(),
        };

        let handle = NotificationHandle {
            user_id: user_id.clone(),
            channel_id: channel.id,
            queue: channel.queue.clone(),
            waker: channel.waker.clone(),
            dispatcher: self.me.clone(),
        };

        self.channels.entry(user_id.clone()).or_default().push(channel);

        handle
    }

    /// Delivers a notification to the user, unless their preferences
    /// disable the kind, in which case this is a silent no-op.
    ///
    /// Delivery means: append to the durable list through the
    /// persistence collaborator, then push to every live channel.
    pub async fn notify(
        &self,
        user_id: &UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Option<Notification>, HubError> {
        let preferences = self.persistence.preferences(user_id).await?;

        if !preferences.enabled(kind) {
            debug!("Notification {:?} for {} muted by preferences", kind, user_id);
            return Ok(None);
        }

        let notification = self
            .persistence
            .append_notification(NewNotification {
                user_id: user_id.clone(),
                kind,
                title: title.into(),
                message: message.into(),
            })
            .await?;

        if let Some(channels) = self.channels.get(user_id) {
            for channel in channels.iter() {
                channel.push(notification.clone());
            }
        }

        Ok(Some(notification))
    }

    /// The user's durable notification list, most recent last
    pub async fn history(&self, user_id: &UserId) -> Result<Vec<Notification>, HubError> {
        Ok(self.persistence.notifications(user_id).await?)
    }

    /// Empties the user's durable notification list
    pub async fn clear(&self, user_id: &UserId) -> Result<(), HubError> {
        Ok(self.persistence.clear_notifications(user_id).await?)
    }

    pub async fn preferences(&self, user_id: &UserId) -> Result<NotificationPreferences, HubError> {
        Ok(self.persistence.preferences(user_id).await?)
    }

    pub async fn update_preferences(
        &self,
        user_id: &UserId,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences, HubError> {
        Ok(self
            .persistence
            .update_preferences(user_id, preferences)
            .await?)
    }

    fn disconnect(&self, user_id: &UserId, channel_id: NotificationChannelId) {
        let now_empty = match self.channels.get_mut(user_id) {
            Some(mut channels) => {
                channels.retain(|c| c.id != channel_id);
                channels.is_empty()
            }
            None => return,
        };

        if now_empty {
            self.channels
                .remove_if(user_id, |_, channels| channels.is_empty());
        }
    }
}

impl NotificationChannel {
    fn push(&self, notification: Notification) {
        self.queue.lock().push_back(notification);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }
}

impl Stream for NotificationHandle {
    type Item = Notification;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next_notification = self.queue.lock().pop_front();

        if let Some(notification) = next_notification {
            return Poll::Ready(Some(notification));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for NotificationHandle {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.disconnect(&self.user_id, self.channel_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use crate::{db::MemoryPersistence, db::NotificationPreferences};

    use super::*;

    fn dispatcher() -> Arc<NotificationDispatcher> {
        NotificationDispatcher::new(Arc::new(MemoryPersistence::new()))
    }

    #[tokio::test]
    async fn delivery_appends_and_pushes() {
        let dispatcher = dispatcher();
        let user_id = "u1".to_string();

        let mut live = dispatcher.subscribe(&user_id);

        let delivered = dispatcher
            .notify(&user_id, NotificationKind::StreamStart, "Stream started", "Go!")
            .await
            .unwrap();
        assert!(delivered.is_some());

        let pushed = live.next().await.unwrap();
        assert_eq!(pushed.title, "Stream started");

        let history = dispatcher.history(&user_id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn disabled_kinds_are_a_silent_no_op() {
        let dispatcher = dispatcher();
        let user_id = "u1".to_string();

        dispatcher
            .update_preferences(
                &user_id,
                NotificationPreferences {
                    chat_mentions: false,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let muted = dispatcher
            .notify(&user_id, NotificationKind::ChatMention, "Mention", "hi")
            .await
            .unwrap();
        assert!(muted.is_none());

        assert!(dispatcher.history(&user_id).await.unwrap().is_empty());

        // Other kinds still get through
        let delivered = dispatcher
            .notify(&user_id, NotificationKind::StreamStart, "Stream started", "Go!")
            .await
            .unwrap();
        assert!(delivered.is_some());
    }

    #[tokio::test]
    async fn clearing_empties_the_list() {
        let dispatcher = dispatcher();
        let user_id = "u1".to_string();

        dispatcher
            .notify(&user_id, NotificationKind::NewParticipant, "New participant", "hi")
            .await
            .unwrap();

        dispatcher.clear(&user_id).await.unwrap();
        assert!(dispatcher.history(&user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_handles_deregister() {
        let dispatcher = dispatcher();
        let user_id = "u1".to_string();

        let live = dispatcher.subscribe(&user_id);
        assert_eq!(dispatcher.channels.len(), 1);

        drop(live);
        assert!(dispatcher.channels.is_empty());
    }
}
