//! Room timeline synchronization engine.
//!
//! This module keeps an in-memory timeline per joined room, fed by sync
//! batches, and builds the messages the user sends.
//!
//! # Modules
//!
//! - `events` - Event payloads received from and sent to the homeserver
//! - `manager` - Entry point dispatching sync batches and user actions
//! - `model` - Timeline of a single room
//! - `notifications` - Change notifications published to observers
//! - `outgoing` - Construction of outgoing messages
//! - `registry` - Room id to timeline mapping
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use lattice::{
//!     markup::MarkdownConverter,
//!     matrix::EncryptedMediaCache,
//!     settings::UserSettings,
//!     timeline::TimelineManager,
//! };
//!
//! let (outbox, mut receiver) = tokio::sync::mpsc::unbounded_channel();
//! let mut manager = TimelineManager::new(
//!     "@me:example.com",
//!     Arc::new(UserSettings::default()),
//!     Arc::new(MarkdownConverter),
//!     outbox,
//!     Arc::new(EncryptedMediaCache::new()),
//! );
//!
//! manager.add_room("!room:example.com");
//! manager.set_active_room("!room:example.com");
//! manager.queue_text_message("**hello**", None);
//!
//! let outgoing = receiver.try_recv().unwrap();
//! assert_eq!(outgoing.message.formatted_body(), Some("<strong>hello</strong>"));
//! ```

use std::fmt;

mod events;
mod manager;
mod model;
mod notifications;
mod outgoing;
mod registry;

pub use crate::timeline::events::{
    AliasesContent, EncryptedFile, EphemeralEvent, EventContent, HTML_FORMAT, InReplyTo,
    MediaContent, MediaInfo, Message, ROOM_MESSAGE_TYPE, Relation, StateContent, StateEvent,
    TextContent, TimelineEvent,
};
#[cfg(test)]
pub(crate) use crate::timeline::events::create_encrypted_file;
pub use crate::timeline::manager::{RoomDelta, SyncBatch, TimelineManager};
#[cfg(test)]
pub use crate::timeline::model::MockMediaRegistry;
pub use crate::timeline::model::{MediaRegistry, TimelineModel};
pub use crate::timeline::notifications::{Notifier, TimelineNotification};
pub use crate::timeline::outgoing::{
    Dimensions, MediaAttachment, MediaKind, OutgoingMessage, RelatedInfo, build_emote_message,
    build_media_message, build_text_message,
};
pub use crate::timeline::registry::RoomRegistry;

/// Errors returned by timeline operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// No timeline exists for the given room id.
    RoomNotFound(String),
}

impl fmt::Display for TimelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineError::RoomNotFound(room_id) => write!(f, "room {} not found", room_id),
        }
    }
}

impl std::error::Error for TimelineError {}
