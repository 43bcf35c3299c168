//! Per-room timeline state.
//!
//! A [`TimelineModel`] owns the ordered event log of one room together with
//! its ephemeral state: typing users, events marked as read and messages sent
//! from this client that the server has not echoed back yet.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use log::{debug, trace, warn};
use mockall::automock;
use tokio::sync::mpsc::UnboundedSender;

use crate::timeline::{
    events::{EncryptedFile, EventContent, Message, StateContent, TimelineEvent},
    notifications::{Notifier, TimelineNotification},
    outgoing::{OutgoingMessage, RelatedInfo},
};

/// Counter making transaction ids unique within a millisecond.
static TRANSACTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Service decrypting encrypted attachments when they are displayed.
///
/// Every timeline registers the encryption descriptor of the encrypted images
/// it sees or sends, so the image loader can decrypt them later.
#[automock]
pub trait MediaRegistry: Send + Sync {
    /// Registers the descriptor of an encrypted attachment.
    fn add_encryption_info(&self, file: &EncryptedFile);
}

/// Ordered event log and ephemeral state of one room.
pub struct TimelineModel {
    /// Id of the room
    room_id: String,
    /// Events in the order they were received
    events: Vec<TimelineEvent>,
    /// Users currently typing, in server order
    typing_users: Vec<String>,
    /// Event ids marked as read
    read: HashSet<String>,
    /// Sent messages waiting for their remote echo
    pending: Vec<OutgoingMessage>,
    /// Queue of the transmission task
    outbox: UnboundedSender<OutgoingMessage>,
    /// Encrypted media registration service
    media_registry: Arc<dyn MediaRegistry>,
    notifier: Notifier,
}

impl TimelineModel {
    /// Creates an empty timeline wired to the given services.
    pub fn new(
        room_id: &str,
        outbox: UnboundedSender<OutgoingMessage>,
        media_registry: Arc<dyn MediaRegistry>,
        notifier: Notifier,
    ) -> Self {
        TimelineModel {
            room_id: room_id.to_owned(),
            events: Vec::new(),
            typing_users: Vec::new(),
            read: HashSet::new(),
            pending: Vec::new(),
            outbox,
            media_registry,
            notifier,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Events in insertion order.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn typing_users(&self) -> &[String] {
        &self.typing_users
    }

    /// Messages sent from this client that were not echoed back yet.
    pub fn pending_messages(&self) -> &[OutgoingMessage] {
        &self.pending
    }

    /// Looks up an event of the log by id.
    pub fn find_event(&self, event_id: &str) -> Option<&TimelineEvent> {
        self.events.iter().find(|event| event.event_id == event_id)
    }

    /// Appends events at the end of the log, keeping their order.
    ///
    /// An event carrying the transaction id of a pending message is its
    /// remote echo and resolves that message.
    pub fn add_events(&mut self, events: Vec<TimelineEvent>) {
        if events.is_empty() {
            return;
        }

        debug!("add {} events to room {}", events.len(), self.room_id);

        for event in events {
            if let Some(transaction_id) = &event.transaction_id {
                self.pending
                    .retain(|pending| &pending.transaction_id != transaction_id);
            }

            if let Some(file) = event.as_message().and_then(Message::encrypted_image) {
                self.media_registry.add_encryption_info(file);
            }

            self.events.push(event);
        }

        self.notifier
            .notify(TimelineNotification::TimelineChanged(self.room_id.clone()));
    }

    /// Replaces the set of typing users.
    ///
    /// Repeated ids are kept once, at their first position.
    pub fn update_typing_users(&mut self, users: Vec<String>) {
        let mut seen = HashSet::new();
        let users: Vec<String> = users
            .into_iter()
            .filter(|user| seen.insert(user.clone()))
            .collect();

        if self.typing_users == users {
            return;
        }

        trace!("typing users in room {}: {:?}", self.room_id, users);
        self.typing_users = users;
        self.notifier
            .notify(TimelineNotification::TypingUsersChanged(self.room_id.clone()));
    }

    /// Marks events as read. Marking an event twice has no further effect.
    pub fn mark_events_as_read(&mut self, event_ids: &[String]) {
        for event_id in event_ids {
            self.read.insert(event_id.clone());
        }
    }

    pub fn is_read(&self, event_id: &str) -> bool {
        self.read.contains(event_id)
    }

    /// Queues a message for transmission and returns its transaction id.
    ///
    /// The message stays pending until its remote echo is received. The
    /// transmission itself is not awaited.
    pub fn send_message(&mut self, message: Message) -> String {
        let outgoing = OutgoingMessage {
            room_id: self.room_id.clone(),
            transaction_id: new_transaction_id(),
            message,
        };
        let transaction_id = outgoing.transaction_id.clone();

        debug!(
            "queue {} message {} in room {}",
            outgoing.message.msgtype(),
            transaction_id,
            self.room_id
        );

        if let Some(file) = outgoing.message.encrypted_image() {
            self.media_registry.add_encryption_info(file);
        }

        if self.outbox.send(outgoing.clone()).is_err() {
            warn!("outgoing queue closed, message {} not sent", transaction_id);
        }

        self.pending.push(outgoing);
        self.notifier
            .notify(TimelineNotification::TimelineChanged(self.room_id.clone()));

        transaction_id
    }

    /// Builds the reply context of a message of the log.
    ///
    /// Returns `None` when the event is unknown or is not a message.
    pub fn related_info(&self, event_id: &str) -> Option<RelatedInfo> {
        let event = self.find_event(event_id)?;
        let message = event.as_message()?;

        Some(RelatedInfo {
            related_event: event.event_id.clone(),
            room_id: self.room_id.clone(),
            quoted_user: event.sender.clone(),
            quoted_body: message.body().to_owned(),
            quoted_formatted_body: message.formatted_body().map(str::to_owned),
        })
    }

    /// Aliases of the room, from the latest `m.room.aliases` state event.
    pub fn aliases(&self) -> Vec<String> {
        self.events
            .iter()
            .rev()
            .find_map(|event| match &event.content {
                EventContent::State(state) => match &state.content {
                    StateContent::Aliases(content) => Some(content.aliases.clone()),
                    StateContent::Other(_) => None,
                },
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Generates a transaction id unique for this client.
fn new_transaction_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let count = TRANSACTION_COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("m{}.{}", millis, count)
}
