//! Matrix client wrapper for synchronization and message transmission.
//!
//! This module provides a high-level [`MatrixClient`] interface that wraps the
//! Matrix SDK client, feeds sync responses to the timeline engine and sends
//! the messages it queues. On restart it also fetches the messages seen up
//! to the stored sync token, so timelines are not empty before the first
//! sync.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;
use log::{debug, error, info, warn};
use matrix_sdk::{
    Client,
    room::MessagesOptions,
    ruma::{OwnedTransactionId, RoomId, UInt},
};
use tokio::{
    sync::{Mutex, mpsc::UnboundedReceiver},
    task::JoinHandle,
};

use crate::{
    matrix::{UserCredentials, login::setup_client, session::SessionStore, sync::MatrixSync},
    timeline::{OutgoingMessage, ROOM_MESSAGE_TYPE, TimelineEvent, TimelineManager},
};

/// High-level Matrix client of the timeline engine.
pub struct MatrixClient {
    /// Synchronization service for handling real-time events
    matrix_sync: MatrixSync,
    /// Underlying Matrix SDK client
    client: Client,
    store: Arc<SessionStore>,
}

impl MatrixClient {
    /// Creates a client for the account, restoring the session stored in
    /// `data_path` or logging in.
    ///
    /// # Arguments
    ///
    /// * `user_credentials` - User id and password of the account
    /// * `data_path` - Directory storing the session and the SQLite database
    ///
    /// # Errors
    ///
    /// Returns an error if the login or the session restoration fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lattice::matrix::{MatrixClient, UserCredentials};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), anyhow::Error> {
    /// let credentials = UserCredentials {
    ///     user_id: "@lattice:example.com".to_string(),
    ///     password: "secure_password".to_string(),
    /// };
    ///
    /// let client = MatrixClient::new(&credentials, "./data").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(user_credentials: &UserCredentials, data_path: &str) -> anyhow::Result<Self> {
        let store = Arc::new(SessionStore::open(data_path).await);

        let client = setup_client(user_credentials, &store)
            .await
            .context("failed to setup matrix client")?;

        let matrix_sync = MatrixSync::new(&client, Arc::clone(&store));

        Ok(MatrixClient {
            matrix_sync,
            client,
            store,
        })
    }

    /// Id of the logged in user, as returned by the homeserver.
    pub fn user_id(&self) -> Option<String> {
        self.client.user_id().map(|user_id| user_id.to_string())
    }

    /// Fetches the last `limit` messages of every joined room that precede
    /// the stored sync token, oldest first.
    ///
    /// Returns nothing on a first run: the initial sync carries the recent
    /// history then. A room whose history cannot be fetched is skipped.
    pub async fn stored_history(&self, limit: u32) -> BTreeMap<String, Vec<TimelineEvent>> {
        let mut history = BTreeMap::new();

        let Some(sync_token) = self.store.sync_token().await else {
            return history;
        };

        for room in self.client.joined_rooms() {
            let room_id = room.room_id().to_string();

            let mut options = MessagesOptions::backward().from(sync_token.as_str());
            options.limit = UInt::from(limit);

            match room.messages(options).await {
                Ok(messages) => {
                    let newest_first: Vec<&str> = messages
                        .chunk
                        .iter()
                        .map(|event| event.raw().json().get())
                        .collect();
                    let events = chronological_events(&room_id, &newest_first);
                    debug!("fetched {} stored events of room {}", events.len(), room_id);
                    history.insert(room_id, events);
                }
                Err(e) => warn!("failed to fetch history of room {}: {:?}", room_id, e),
            }
        }

        history
    }

    /// Starts the sync loop, dispatching every sync response to `manager`.
    ///
    /// Never returns under normal operation.
    pub async fn sync(&self, manager: Arc<Mutex<TimelineManager>>) {
        match self.matrix_sync.sync(manager).await {
            Ok(_) => info!("matrix sync ended successfully"),
            Err(e) => error!("matrix sync ended with error: {:?}", e),
        }
    }

    /// Spawns the transmission task sending queued messages in order.
    ///
    /// The task ends when every sender of the queue is dropped. A failed
    /// transmission is logged and the next message is sent.
    pub fn start_sender(&self, mut outbox: UnboundedReceiver<OutgoingMessage>) -> JoinHandle<()> {
        let client = self.client.clone();

        tokio::spawn(async move {
            while let Some(outgoing) = outbox.recv().await {
                let transaction_id = outgoing.transaction_id.clone();
                if let Err(e) = transmit(&client, outgoing).await {
                    error!("failed to send message {}: {:?}", transaction_id, e);
                }
            }
            info!("outgoing queue closed");
        })
    }
}

/// Decodes a backward pagination chunk into timeline order.
///
/// Undecodable events are skipped.
fn chronological_events(room_id: &str, newest_first: &[&str]) -> Vec<TimelineEvent> {
    newest_first
        .iter()
        .rev()
        .filter_map(|json| match TimelineEvent::from_json(json) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("skip undecodable event in room {}: {}", room_id, e);
                None
            }
        })
        .collect()
}

/// Sends a message with its transaction id so the remote echo can be matched.
async fn transmit(client: &Client, outgoing: OutgoingMessage) -> anyhow::Result<()> {
    let room_id = RoomId::parse(&outgoing.room_id)?;
    let room = client
        .get_room(&room_id)
        .with_context(|| format!("unknown room {}", outgoing.room_id))?;

    let content = serde_json::to_value(&outgoing.message)?;
    let transaction_id = OwnedTransactionId::from(outgoing.transaction_id);

    room.send_raw(ROOM_MESSAGE_TYPE, content)
        .with_transaction_id(&transaction_id)
        .await?;

    debug!("message sent in room {}", outgoing.room_id);
    Ok(())
}
