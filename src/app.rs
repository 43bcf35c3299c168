//! Application wiring the Matrix client, the timeline engine and the console.
//!
//! # Architecture
//!
//! The application runs four concurrent tasks around a shared
//! [`TimelineManager`]:
//!
//! 1. **Matrix Sync Task**: Receives sync responses and dispatches them to
//!    the manager as batches.
//! 2. **Transmission Task**: Sends the messages queued by the timelines, in
//!    queue order.
//! 3. **Console Task**: Reads commands and messages from the standard input.
//! 4. **Notification Task**: Logs the changes published by the manager.
//!
//! # Example
//!
//! ```no_run
//! # use lattice::{app::App, config::Config};
//! # async fn run() -> Result<(), anyhow::Error> {
//! let config = Config::load("config.yaml")?;
//!
//! let app = App::new(config, "./data").await?;
//! app.start().await; // Runs indefinitely
//! # Ok(())
//! # }
//! ```

use std::{path::Path, sync::Arc};

use log::{debug, info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{
        Mutex,
        broadcast::{self, error::RecvError},
        mpsc::{self, UnboundedReceiver},
    },
};

use crate::{
    config::Config,
    console::{Console, ConsoleError},
    markup::MarkdownConverter,
    matrix::{EncryptedMediaCache, MatrixClient},
    timeline::{OutgoingMessage, TimelineManager, TimelineNotification},
};

/// Messages fetched per room when restoring the timelines on restart
const STORED_HISTORY_LIMIT: u32 = 20;

pub struct App {
    matrix_client: Arc<MatrixClient>,

    manager: Arc<Mutex<TimelineManager>>,

    /// Receiving end of the timelines' outgoing queue
    outbox: UnboundedReceiver<OutgoingMessage>,

    console: Arc<Console>,
}

impl App {
    /// Logs in and builds the timeline engine, seeded with the messages
    /// seen before the last stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the Matrix client cannot be set up.
    pub async fn new(config: Config, data_path: &str) -> Result<Self, anyhow::Error> {
        let session_path = Path::new(data_path).join("session");
        let matrix_client = Arc::new(
            MatrixClient::new(&config.credentials(), &session_path.to_string_lossy()).await?,
        );

        let user_id = local_user_id(matrix_client.user_id(), &config.matrix.user_id);
        debug!("logged in as {}", user_id);

        let (sender, outbox) = mpsc::unbounded_channel();
        let mut manager = TimelineManager::new(
            &user_id,
            Arc::new(config.settings),
            Arc::new(MarkdownConverter),
            sender,
            Arc::new(EncryptedMediaCache::new()),
        );
        manager.init_with_messages(matrix_client.stored_history(STORED_HISTORY_LIMIT).await);

        Ok(App {
            matrix_client,
            manager: Arc::new(Mutex::new(manager)),
            outbox,
            console: Arc::new(Console::new()),
        })
    }

    /// Starts every task and syncs until the process is terminated.
    pub async fn start(self) {
        self.matrix_client.start_sender(self.outbox);

        let notifications = self.manager.lock().await.subscribe();
        start_notification_task(notifications);
        start_console_task(Arc::clone(&self.console), Arc::clone(&self.manager));

        self.matrix_client.sync(Arc::clone(&self.manager)).await;
    }
}

/// Id the homeserver knows the user by, falling back to the configured one.
fn local_user_id(session_user_id: Option<String>, configured: &str) -> String {
    session_user_id.unwrap_or_else(|| configured.to_owned())
}

fn start_notification_task(mut notifications: broadcast::Receiver<TimelineNotification>) {
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => log_notification(notification),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("notification logger lagging, {} skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn log_notification(notification: TimelineNotification) {
    match notification {
        TimelineNotification::RoomAdded(room_id) => info!("new room {}", room_id),
        TimelineNotification::ActiveRoomChanged(room_id) => info!("active room {}", room_id),
        TimelineNotification::TimelineChanged(room_id) => debug!("timeline of {} changed", room_id),
        TimelineNotification::TypingUsersChanged(room_id) => {
            debug!("typing users of {} changed", room_id)
        }
        TimelineNotification::InitialSyncChanged(initial) => {
            debug!("initial sync is now {}", initial)
        }
    }
}

fn start_console_task(console: Arc<Console>, manager: Arc<Mutex<TimelineManager>>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            let output = match console.parse(&line) {
                Ok(command) => console.execute(command, &mut *manager.lock().await),
                Err(ConsoleError::Empty) => continue,
                Err(e) => e.to_string(),
            };
            println!("{}", output);
        }

        info!("console closed");
    });
}
