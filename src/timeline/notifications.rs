//! Change notifications published by the timeline engine.
//!
//! The engine never calls into rendering code. It publishes
//! [`TimelineNotification`]s on a broadcast channel and any number of
//! observers subscribe to it.

use log::trace;
use tokio::sync::broadcast;

/// Number of notifications buffered for slow subscribers.
const NOTIFICATION_CAPACITY: usize = 256;

/// A change observers may react to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimelineNotification {
    /// A timeline was created for the room
    RoomAdded(String),
    /// The user selected another room
    ActiveRoomChanged(String),
    /// Events or pending messages of the room changed
    TimelineChanged(String),
    /// The typing users of the room changed
    TypingUsersChanged(String),
    /// A sync batch was processed, carries the new initial-sync flag
    InitialSyncChanged(bool),
}

/// Publish point for [`TimelineNotification`]s.
///
/// Cloning a `Notifier` yields another handle on the same channel, so every
/// timeline publishes to the subscribers of the manager that created it.
#[derive(Clone, Debug)]
pub struct Notifier {
    sender: broadcast::Sender<TimelineNotification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Notifier { sender }
    }

    /// Registers a new observer.
    ///
    /// The receiver only sees notifications published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineNotification> {
        self.sender.subscribe()
    }

    /// Publishes a notification to the current subscribers.
    pub fn notify(&self, notification: TimelineNotification) {
        trace!("notify {:?}", notification);
        // Nobody listening is not an error
        let _ = self.sender.send(notification);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
