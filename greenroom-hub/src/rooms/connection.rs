use std::{
    collections::VecDeque,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

use futures_util::Stream;
use parking_lot::Mutex;

use crate::{events::RoomUpdate, util::Id, CohortId, HubContext, Role, UserId};

pub type RoomConnectionId = Id<RoomConnection>;

/// Represents a user's live subscription to a room.
///
/// Owned by the room's subscriber list; the outbound queue is appended
/// under the room lock so the subscriber observes updates in version order.
#[derive(Debug, Clone)]
pub struct RoomConnection {
    pub id: RoomConnectionId,
    pub user_id: UserId,
    pub display_name: String,
    pub role: Role,
    queue: Arc<Mutex<VecDeque<RoomUpdate>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

/// The subscriber's end of a [RoomConnection].
///
/// Yields every [RoomUpdate] for the room in version order, starting with
/// the snapshot seeded at join time. Dropping it deregisters the
/// connection; a reconnect is simply a fresh join.
pub struct RoomConnectionHandle {
    connection_id: RoomConnectionId,
    cohort_id: CohortId,
    context: HubContext,
    queue: Arc<Mutex<VecDeque<RoomUpdate>>>,
    waker: Arc<Mutex<Option<Waker>>>,
    last_seen_version: u64,
}

impl RoomConnection {
    pub fn new(user_id: UserId, display_name: String, role: Role) -> Self {
        Self {
            id: RoomConnectionId::new(),
            user_id,
            display_name,
            role,
            queue: Default::default(),
            waker: Default::default(),
        }
    }

    /// Appends an update to the subscriber's outbound queue
    pub fn push(&self, update: RoomUpdate) {
        self.queue.lock().push_back(update);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    pub fn handle(&self, context: &HubContext, cohort_id: CohortId) -> RoomConnectionHandle {
        RoomConnectionHandle {
            connection_id: self.id,
            cohort_id,
            context: context.clone(),
            queue: self.queue.clone(),
            waker: self.waker.clone(),
            last_seen_version: 0,
        }
    }
}

impl RoomConnectionHandle {
    /// The version of the last update this subscriber has pulled
    pub fn last_seen_version(&self) -> u64 {
        self.last_seen_version
    }
}

impl Stream for RoomConnectionHandle {
    type Item = RoomUpdate;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let next_update = this.queue.lock().pop_front();

        if let Some(update) = next_update {
            this.last_seen_version = update.version;
            return Poll::Ready(Some(update));
        }

        *this.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for RoomConnectionHandle {
    fn drop(&mut self) {
        if let Some(room) = self.context.rooms.get(&self.cohort_id) {
            room.remove_connection(self.connection_id)
        }
    }
}
