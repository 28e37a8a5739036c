mod chat;
mod connection;
mod leaderboard;
mod poll;
mod room;
mod stream;

use std::sync::Arc;

use log::info;

use crate::{HubContext, HubError, Identity};

pub use chat::*;
pub use connection::*;
pub use leaderboard::*;
pub use poll::*;
pub use room::*;
pub use stream::*;

/// Creates rooms on first join and evicts them once they have been empty
/// past the grace window.
pub struct RoomManager {
    context: HubContext,
}

impl RoomManager {
    pub fn new(context: &HubContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Subscribes the identity to a cohort's room, creating the room if
    /// this is its first join. Safe to call concurrently for the same
    /// cohort; exactly one room is created.
    pub fn join(&self, cohort_id: &str, identity: &Identity) -> RoomConnectionHandle {
        let room = {
            let entry = self
                .context
                .rooms
                .entry(cohort_id.to_string())
                .or_insert_with(|| {
                    info!("Cohort room {} created", cohort_id);
                    Arc::new(Room::new(&self.context, cohort_id.to_string()))
                });

            entry.value().clone()
        };

        room.connect(identity)
    }

    /// Returns the room if it exists
    pub fn get(&self, cohort_id: &str) -> Result<Arc<Room>, HubError> {
        self.context
            .rooms
            .get(cohort_id)
            .map(|r| r.clone())
            .ok_or_else(|| HubError::not_found("cohort", cohort_id))
    }

    /// Get all rooms in memory
    pub fn list_all(&self) -> Vec<Arc<Room>> {
        self.context.rooms.iter().map(|r| r.clone()).collect()
    }

    /// Evicts rooms that have had no subscribers for the grace window.
    /// A room with any live subscriber is never evicted.
    pub fn sweep(&self) {
        let grace_period = self.context.config.room_grace_period;

        self.context.rooms.retain(|cohort_id, room| {
            if room.should_evict(grace_period) {
                info!("Cohort room {} evicted after grace period", cohort_id);
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{HubConfig, HubContext, Role};

    use super::*;

    fn manager(grace_period: Duration) -> RoomManager {
        let config = HubConfig {
            room_grace_period: grace_period,
            ..Default::default()
        };

        RoomManager::new(&HubContext::with_config(config))
    }

    fn identity(user_id: &str) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            display_name: user_id.to_string(),
            role: Role::Member,
        }
    }

    #[test]
    fn joining_creates_the_room_once() {
        let manager = manager(Duration::from_secs(30));

        let _first = manager.join("rust-101", &identity("u1"));
        let _second = manager.join("rust-101", &identity("u2"));

        assert_eq!(manager.list_all().len(), 1);
        assert_eq!(manager.get("rust-101").unwrap().current_connections().len(), 2);
    }

    #[test]
    fn unknown_rooms_are_not_found() {
        let manager = manager(Duration::from_secs(30));

        assert!(manager.get("nope").is_err());
    }

    #[test]
    fn rooms_survive_while_subscribed() {
        let manager = manager(Duration::ZERO);

        let handle = manager.join("rust-101", &identity("u1"));

        manager.sweep();
        assert!(manager.get("rust-101").is_ok());

        drop(handle);
    }

    #[test]
    fn empty_rooms_are_evicted_after_the_grace_window() {
        let manager = manager(Duration::ZERO);

        let handle = manager.join("rust-101", &identity("u1"));
        drop(handle);

        manager.sweep();
        assert!(manager.get("rust-101").is_err());
    }

    #[test]
    fn the_grace_window_is_honored() {
        let manager = manager(Duration::from_secs(3600));

        let handle = manager.join("rust-101", &identity("u1"));
        drop(handle);

        manager.sweep();
        assert!(manager.get("rust-101").is_ok());
    }
}
