//! Matrix client synchronization and event batching.
//!
//! The [`MatrixSync::sync`] loop turns the joined room updates of each sync
//! response into a [`SyncBatch`], then hands the batch to the
//! [`TimelineManager`]. Every joined room of the response gets a delta, even
//! without events. Left and invited rooms are not part of the batch. The
//! first dispatched batch is the initial sync.

use std::sync::Arc;

use anyhow::Result;
use log::{debug, error, info, trace, warn};
use matrix_sdk::{
    Client, LoopCtrl, Room,
    config::SyncSettings,
    ruma::{api::client::filter::FilterDefinition, events::room::member::StrippedRoomMemberEvent},
    sync::JoinedRoomUpdate,
};
use tokio::{
    sync::Mutex,
    time::{Duration, sleep},
};

use crate::{
    matrix::session::SessionStore,
    timeline::{EphemeralEvent, SyncBatch, TimelineEvent, TimelineManager},
};

/// Accumulates the room events of one sync response.
#[derive(Default)]
pub struct BatchCollector {
    batch: SyncBatch,
}

impl BatchCollector {
    /// Adds the timeline and ephemeral events of a joined room update.
    ///
    /// The room is part of the batch even when the update carries nothing.
    pub fn add_joined_room(&mut self, room_id: &str, update: &JoinedRoomUpdate) {
        self.batch.room(room_id);

        for event in &update.timeline.events {
            self.add_timeline_event(room_id, event.raw().json().get());
        }
        for event in &update.ephemeral {
            self.add_ephemeral_event(room_id, event.json().get());
        }
    }

    /// Appends a timeline event given as JSON. Undecodable events are skipped.
    pub fn add_timeline_event(&mut self, room_id: &str, json: &str) {
        match TimelineEvent::from_json(json) {
            Ok(event) => self.batch.room(room_id).events.push(event),
            Err(e) => warn!("skip undecodable event in room {}: {}", room_id, e),
        }
    }

    /// Records an ephemeral event given as JSON.
    ///
    /// The last typing event of a room wins, receipts accumulate.
    pub fn add_ephemeral_event(&mut self, room_id: &str, json: &str) {
        match EphemeralEvent::from_json(json) {
            Ok(EphemeralEvent::Typing(users)) => self.batch.room(room_id).typing = users,
            Ok(EphemeralEvent::Receipts(event_ids)) => {
                self.batch.room(room_id).receipts.extend(event_ids)
            }
            Ok(EphemeralEvent::Other(event_type)) => {
                trace!("ignore ephemeral event {} in room {}", event_type, room_id)
            }
            Err(e) => warn!("skip undecodable ephemeral event in room {}: {}", room_id, e),
        }
    }

    /// Returns the collected batch and starts a new one.
    pub fn take(&mut self) -> SyncBatch {
        std::mem::take(&mut self.batch)
    }
}

/// Runs the sync loop of an authenticated client.
pub struct MatrixSync {
    client: Client,
    store: Arc<SessionStore>,
}

impl MatrixSync {
    pub fn new(client: &Client, store: Arc<SessionStore>) -> Self {
        MatrixSync {
            client: client.to_owned(),
            store,
        }
    }

    /// Syncs forever, dispatching every response to `manager`.
    ///
    /// Sync tokens are persisted after each response so a restart resumes
    /// where the previous run stopped. Persistence errors are logged and do
    /// not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync loop fails.
    pub async fn sync(&self, manager: Arc<Mutex<TimelineManager>>) -> Result<()> {
        info!("start syncing");

        // Auto join rooms when invited
        self.client.add_event_handler(auto_join_rooms);

        // Enable room members lazy-loading
        // See <https://spec.matrix.org/v1.6/client-server-api/#lazy-loading-room-members>.
        let filter = FilterDefinition::with_lazy_loading();
        let mut sync_settings = SyncSettings::default().filter(filter.into());

        if let Some(sync_token) = self.store.sync_token().await {
            debug!("resume sync from stored token");
            sync_settings = sync_settings.token(sync_token);
        }

        self.client
            .sync_with_result_callback(sync_settings, |sync_result| {
                let manager = Arc::clone(&manager);
                async move {
                    let response = sync_result?;

                    let mut collector = BatchCollector::default();
                    for (room_id, update) in &response.rooms.joined {
                        collector.add_joined_room(room_id.as_str(), update);
                    }
                    manager.lock().await.sync(collector.take());

                    if let Err(err) = self.store.persist_sync_token(&response.next_batch).await {
                        error!("failed to persist sync token: {:?}", err);
                    }

                    Ok(LoopCtrl::Continue)
                }
            })
            .await?;

        Ok(())
    }
}

/// Automatically joins rooms when the user receives an invitation.
///
/// See <https://github.com/matrix-org/synapse/issues/4345> for the Synapse
/// issue that makes the retry logic necessary.
async fn auto_join_rooms(room_member: StrippedRoomMemberEvent, client: Client, room: Room) {
    let Some(user_id) = client.user_id() else {
        warn!("could not get user id from client");
        return;
    };

    // Ignore if the invite is not for us
    if room_member.state_key != user_id {
        return;
    }

    tokio::spawn(async move {
        info!("auto joining room {}", room.room_id());
        let mut delay = 2;

        while let Err(err) = room.join().await {
            error!(
                "failed to join room {} ({err:?}), retrying in {delay}s",
                room.room_id()
            );

            sleep(Duration::from_secs(delay)).await;
            delay *= 2;

            if delay > 3600 {
                error!("can't join room {} ({err:?})", room.room_id());
                return;
            }
        }
        info!("successfully joined room {}", room.room_id());
    });
}
