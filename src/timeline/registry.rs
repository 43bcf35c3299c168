//! Room registry mapping room ids to their timelines.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use log::info;
use tokio::sync::mpsc::UnboundedSender;

use crate::timeline::{
    model::{MediaRegistry, TimelineModel},
    notifications::{Notifier, TimelineNotification},
    outgoing::OutgoingMessage,
};

/// Owns the [`TimelineModel`] of every known room.
///
/// A room id maps to at most one timeline. Timelines are created on first
/// reference and never replaced or removed.
pub struct RoomRegistry {
    /// Timelines indexed by room id
    models: HashMap<String, TimelineModel>,
    /// Queue handed to every new timeline
    outbox: UnboundedSender<OutgoingMessage>,
    /// Encrypted media service handed to every new timeline
    media_registry: Arc<dyn MediaRegistry>,
    notifier: Notifier,
}

impl RoomRegistry {
    pub fn new(
        outbox: UnboundedSender<OutgoingMessage>,
        media_registry: Arc<dyn MediaRegistry>,
        notifier: Notifier,
    ) -> Self {
        RoomRegistry {
            models: HashMap::new(),
            outbox,
            media_registry,
            notifier,
        }
    }

    /// Creates the timeline of `room_id` if it does not exist yet.
    ///
    /// Returns `true` when a timeline was created.
    pub fn add_room(&mut self, room_id: &str) -> bool {
        let exists = self.models.contains_key(room_id);
        self.get_or_add(room_id);
        !exists
    }

    pub fn find(&self, room_id: &str) -> Option<&TimelineModel> {
        self.models.get(room_id)
    }

    pub fn find_mut(&mut self, room_id: &str) -> Option<&mut TimelineModel> {
        self.models.get_mut(room_id)
    }

    /// Returns the timeline of `room_id`, creating it when needed.
    ///
    /// A new timeline is wired to the outgoing queue, the encrypted media
    /// service and the notifier of the registry.
    pub fn get_or_add(&mut self, room_id: &str) -> &mut TimelineModel {
        match self.models.entry(room_id.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                info!("add room {}", room_id);

                let model = TimelineModel::new(
                    room_id,
                    self.outbox.clone(),
                    Arc::clone(&self.media_registry),
                    self.notifier.clone(),
                );
                self.notifier
                    .notify(TimelineNotification::RoomAdded(room_id.to_owned()));
                entry.insert(model)
            }
        }
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.models.contains_key(room_id)
    }

    /// Ids of the known rooms, sorted.
    pub fn room_ids(&self) -> Vec<String> {
        let mut room_ids: Vec<String> = self.models.keys().cloned().collect();
        room_ids.sort();
        room_ids
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;
    use crate::timeline::{
        events::{Message, TextContent, TimelineEvent},
        model::MockMediaRegistry,
    };

    fn registry() -> (RoomRegistry, Notifier) {
        let (outbox, _) = unbounded_channel();
        let notifier = Notifier::new();
        let registry = RoomRegistry::new(
            outbox,
            Arc::new(MockMediaRegistry::new()),
            notifier.clone(),
        );
        (registry, notifier)
    }

    #[test]
    fn test_add_room_twice_keeps_model() {
        let (mut registry, _) = registry();

        assert!(registry.add_room("!a:x"));
        registry.find_mut("!a:x").unwrap().add_events(vec![TimelineEvent::message(
            "$1",
            "@a:x",
            Message::Text(TextContent::default()),
        )]);

        assert!(!registry.add_room("!a:x"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("!a:x").unwrap().events().len(), 1);
    }

    #[test]
    fn test_add_room_notifies_on_creation_only() {
        let (mut registry, notifier) = registry();
        let mut notifications = notifier.subscribe();

        registry.add_room("!a:x");
        registry.add_room("!a:x");

        assert_eq!(
            notifications.try_recv().unwrap(),
            TimelineNotification::RoomAdded("!a:x".to_owned())
        );
        assert!(notifications.try_recv().is_err());
    }

    #[test]
    fn test_find_unknown_room() {
        let (registry, _) = registry();
        assert!(registry.find("!missing:x").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_or_add() {
        let (mut registry, _) = registry();

        assert_eq!(registry.get_or_add("!b:x").room_id(), "!b:x");
        registry.get_or_add("!a:x");
        registry.get_or_add("!b:x");

        assert_eq!(registry.room_ids(), vec!["!a:x", "!b:x"]);
        assert!(registry.contains("!a:x"));
    }
}
