//! Timeline manager dispatching sync batches and queuing outgoing messages.
//!
//! This module provides the [`TimelineManager`], the entry point of the
//! timeline engine. It owns the [`RoomRegistry`], routes every room delta of
//! a [`SyncBatch`] to the right timeline, tracks the active room and turns
//! user input into messages queued on the timelines' send path.

use std::{collections::BTreeMap, sync::Arc};

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc::UnboundedSender};

use crate::{
    markup::MarkupConverter,
    settings::Settings,
    timeline::{
        TimelineError,
        events::TimelineEvent,
        model::{MediaRegistry, TimelineModel},
        notifications::{Notifier, TimelineNotification},
        outgoing::{
            Dimensions, MediaAttachment, MediaKind, OutgoingMessage, RelatedInfo,
            build_emote_message, build_media_message, build_text_message,
        },
        registry::RoomRegistry,
    },
};

/// Updates of one room received in a sync response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoomDelta {
    /// New timeline events, in server order
    pub events: Vec<TimelineEvent>,
    /// Users currently typing, the local user included
    pub typing: Vec<String>,
    /// Event ids that received a read receipt
    pub receipts: Vec<String>,
}

/// Room updates of one sync response, indexed by room id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncBatch {
    pub rooms: BTreeMap<String, RoomDelta>,
}

impl SyncBatch {
    /// Returns the delta of `room_id`, creating an empty one when needed.
    pub fn room(&mut self, room_id: &str) -> &mut RoomDelta {
        self.rooms.entry(room_id.to_owned()).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// Entry point of the timeline engine.
///
/// The manager is the single writer of every timeline: sync batches and user
/// actions both go through it, and observers follow the changes through
/// [`TimelineManager::subscribe`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use lattice::{
///     markup::MarkdownConverter,
///     matrix::EncryptedMediaCache,
///     settings::UserSettings,
///     timeline::{SyncBatch, TimelineManager},
/// };
///
/// let (outbox, _receiver) = tokio::sync::mpsc::unbounded_channel();
/// let mut manager = TimelineManager::new(
///     "@me:example.com",
///     Arc::new(UserSettings::default()),
///     Arc::new(MarkdownConverter),
///     outbox,
///     Arc::new(EncryptedMediaCache::new()),
/// );
///
/// let mut batch = SyncBatch::default();
/// batch.room("!room:example.com");
/// manager.sync(batch);
///
/// assert!(!manager.is_initial_sync());
/// assert!(manager.timeline("!room:example.com").is_some());
/// ```
pub struct TimelineManager {
    /// Timelines of the known rooms
    registry: RoomRegistry,
    /// Room selected by the user, target of text and emote messages
    active_room: Option<String>,
    /// Whether no sync batch was processed yet
    is_initial_sync: bool,
    /// Id of the logged in user, never listed as typing
    local_user_id: String,
    settings: Arc<dyn Settings>,
    converter: Arc<dyn MarkupConverter>,
    notifier: Notifier,
}

impl TimelineManager {
    /// Creates a manager without any room.
    ///
    /// # Arguments
    ///
    /// * `local_user_id` - Id of the logged in user
    /// * `settings` - Settings provider, read on every operation
    /// * `converter` - Markdown renderer for message bodies
    /// * `outbox` - Queue of the transmission task
    /// * `media_registry` - Service registering encrypted attachments
    pub fn new(
        local_user_id: &str,
        settings: Arc<dyn Settings>,
        converter: Arc<dyn MarkupConverter>,
        outbox: UnboundedSender<OutgoingMessage>,
        media_registry: Arc<dyn MediaRegistry>,
    ) -> Self {
        let notifier = Notifier::new();
        let registry = RoomRegistry::new(outbox, media_registry, notifier.clone());

        TimelineManager {
            registry,
            active_room: None,
            is_initial_sync: true,
            local_user_id: local_user_id.to_owned(),
            settings,
            converter,
            notifier,
        }
    }

    /// Registers an observer of the engine's changes.
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineNotification> {
        self.notifier.subscribe()
    }

    /// Whether no sync batch was processed since startup.
    pub fn is_initial_sync(&self) -> bool {
        self.is_initial_sync
    }

    /// Processes the room updates of one sync response.
    ///
    /// For every room, in room id order: the timeline is created if needed,
    /// the new events are appended in server order and the receipted events
    /// are marked as read. When typing notifications are enabled, the typing
    /// users are replaced by the delta's list without the local user.
    ///
    /// Once all rooms are processed, the initial sync flag is cleared and a
    /// single [`TimelineNotification::InitialSyncChanged`] is published,
    /// however many rooms the batch touched.
    pub fn sync(&mut self, batch: SyncBatch) {
        debug!("sync {} rooms", batch.rooms.len());

        let typing_enabled = self.settings.is_typing_notifications_enabled();

        for (room_id, delta) in batch.rooms {
            let model = self.registry.get_or_add(&room_id);
            model.add_events(delta.events);

            if !delta.receipts.is_empty() {
                model.mark_events_as_read(&delta.receipts);
            }

            if typing_enabled {
                let typing = delta
                    .typing
                    .into_iter()
                    .filter(|user_id| user_id != &self.local_user_id)
                    .collect();
                model.update_typing_users(typing);
            }
        }

        self.is_initial_sync = false;
        self.notifier
            .notify(TimelineNotification::InitialSyncChanged(false));
    }

    /// Creates the timeline of `room_id` if it does not exist yet.
    ///
    /// Returns `true` when a timeline was created.
    pub fn add_room(&mut self, room_id: &str) -> bool {
        self.registry.add_room(room_id)
    }

    /// Seeds timelines with cached events, without counting as a sync.
    pub fn init_with_messages(&mut self, messages: BTreeMap<String, Vec<TimelineEvent>>) {
        for (room_id, events) in messages {
            self.registry.get_or_add(&room_id).add_events(events);
        }
    }

    /// Selects the room text and emote messages are sent to.
    ///
    /// Returns `false` and keeps the current selection when the room is
    /// unknown.
    pub fn set_active_room(&mut self, room_id: &str) -> bool {
        info!("trying to activate room {}", room_id);

        if !self.registry.contains(room_id) {
            warn!("cannot activate unknown room {}", room_id);
            return false;
        }

        self.active_room = Some(room_id.to_owned());
        self.notifier
            .notify(TimelineNotification::ActiveRoomChanged(room_id.to_owned()));
        info!("activated room {}", room_id);

        true
    }

    pub fn active_room(&self) -> Option<&str> {
        self.active_room.as_deref()
    }

    pub fn active_timeline(&self) -> Option<&TimelineModel> {
        self.active_room
            .as_deref()
            .and_then(|room_id| self.registry.find(room_id))
    }

    pub fn timeline(&self, room_id: &str) -> Option<&TimelineModel> {
        self.registry.find(room_id)
    }

    /// Ids of the known rooms, sorted.
    pub fn room_ids(&self) -> Vec<String> {
        self.registry.room_ids()
    }

    /// Marks events of `room_id` as read.
    ///
    /// Returns `false` when the room is unknown, which is not an error.
    pub fn update_read_receipts(&mut self, room_id: &str, event_ids: &[String]) -> bool {
        match self.registry.find_mut(room_id) {
            Some(model) => {
                model.mark_events_as_read(event_ids);
                true
            }
            None => {
                debug!("read receipts for unknown room {}", room_id);
                false
            }
        }
    }

    /// Queues a text message in the active room.
    ///
    /// Returns the transaction id of the queued message, or `None` when no
    /// room is active, in which case nothing is sent.
    pub fn queue_text_message(
        &mut self,
        msg: &str,
        related: Option<&RelatedInfo>,
    ) -> Option<String> {
        let message = build_text_message(msg, related, &*self.settings, &*self.converter);
        self.active_model()
            .map(|model| model.send_message(message))
    }

    /// Queues an emote message in the active room.
    ///
    /// Like [`Self::queue_text_message`], nothing is sent without an active
    /// room.
    pub fn queue_emote_message(&mut self, msg: &str) -> Option<String> {
        let message = build_emote_message(msg, &*self.settings, &*self.converter);
        self.active_model()
            .map(|model| model.send_message(message))
    }

    /// Queues an image message in `room_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::RoomNotFound`] when the room is unknown.
    pub fn queue_image_message(
        &mut self,
        room_id: &str,
        attachment: MediaAttachment,
        dimensions: Option<Dimensions>,
        blurhash: Option<String>,
        related: Option<&RelatedInfo>,
    ) -> Result<String, TimelineError> {
        self.queue_media_message(
            room_id,
            MediaKind::Image,
            attachment,
            dimensions,
            blurhash,
            related,
        )
    }

    /// Queues a file message in `room_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::RoomNotFound`] when the room is unknown.
    pub fn queue_file_message(
        &mut self,
        room_id: &str,
        attachment: MediaAttachment,
        related: Option<&RelatedInfo>,
    ) -> Result<String, TimelineError> {
        self.queue_media_message(room_id, MediaKind::File, attachment, None, None, related)
    }

    /// Queues an audio message in `room_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::RoomNotFound`] when the room is unknown.
    pub fn queue_audio_message(
        &mut self,
        room_id: &str,
        attachment: MediaAttachment,
        related: Option<&RelatedInfo>,
    ) -> Result<String, TimelineError> {
        self.queue_media_message(room_id, MediaKind::Audio, attachment, None, None, related)
    }

    /// Queues a video message in `room_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::RoomNotFound`] when the room is unknown.
    pub fn queue_video_message(
        &mut self,
        room_id: &str,
        attachment: MediaAttachment,
        dimensions: Option<Dimensions>,
        blurhash: Option<String>,
        related: Option<&RelatedInfo>,
    ) -> Result<String, TimelineError> {
        self.queue_media_message(
            room_id,
            MediaKind::Video,
            attachment,
            dimensions,
            blurhash,
            related,
        )
    }

    fn queue_media_message(
        &mut self,
        room_id: &str,
        kind: MediaKind,
        attachment: MediaAttachment,
        dimensions: Option<Dimensions>,
        blurhash: Option<String>,
        related: Option<&RelatedInfo>,
    ) -> Result<String, TimelineError> {
        let model = self
            .registry
            .find_mut(room_id)
            .ok_or_else(|| TimelineError::RoomNotFound(room_id.to_owned()))?;

        let message = build_media_message(kind, attachment, dimensions, blurhash, related);
        Ok(model.send_message(message))
    }

    fn active_model(&mut self) -> Option<&mut TimelineModel> {
        let Some(room_id) = self.active_room.as_deref() else {
            debug!("no active room, message dropped");
            return None;
        };
        self.registry.find_mut(room_id)
    }
}
