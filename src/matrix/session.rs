use std::path::{Path, PathBuf};

use log::{debug, trace};
use matrix_sdk::authentication::matrix::MatrixSession;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};

/// Session data persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    /// Access token and device of the logged in user.
    user_session: MatrixSession,

    /// Token of the last processed sync response.
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_token: Option<String>,
}

/// Persistence of the Matrix session in the data directory.
///
/// # File Structure
///
/// - `session`: JSON file with the user session and the sync token
/// - `sqlite`: SQLite store of the Matrix SDK
pub struct SessionStore {
    /// Session loaded from disk or persisted since
    session: Mutex<Option<StoredSession>>,
    /// Value is `dir_path/sqlite`
    sqlite_path: PathBuf,
    /// Value is `dir_path/session`
    session_path: PathBuf,
}

impl SessionStore {
    /// Opens the store of `dir_path`, loading the session file if any.
    ///
    /// A missing or unreadable session file leaves the store empty, which
    /// leads to a fresh login.
    pub async fn open(dir_path: &str) -> SessionStore {
        debug!("open session store at {}", dir_path);

        let sqlite_path = Path::new(dir_path).join("sqlite");
        let session_path = Path::new(dir_path).join("session");

        let session = match read_session(&session_path).await {
            Ok(session) => Some(session),
            Err(e) => {
                debug!("no user session loaded: {}", e);
                None
            }
        };

        SessionStore {
            session: Mutex::new(session),
            sqlite_path,
            session_path,
        }
    }

    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Path of the SQLite store of the Matrix SDK.
    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub async fn user_session(&self) -> Option<MatrixSession> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.user_session.clone())
    }

    pub async fn sync_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.sync_token.clone())
    }

    /// Persists a new user session, dropping the previous sync token.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written.
    pub async fn persist_user_session(&self, user_session: &MatrixSession) -> anyhow::Result<()> {
        trace!("persist user session");

        let session = StoredSession {
            user_session: user_session.clone(),
            sync_token: None,
        };
        self.write(session).await
    }

    /// Persists the token of the last processed sync response.
    ///
    /// # Errors
    ///
    /// Returns an error if no user session is stored or the session file
    /// cannot be written.
    pub async fn persist_sync_token(&self, sync_token: &str) -> anyhow::Result<()> {
        trace!("persist sync token {}", sync_token);

        let Some(mut session) = self.session.lock().await.clone() else {
            anyhow::bail!("no user session to attach the sync token to");
        };
        session.sync_token = Some(sync_token.to_owned());
        self.write(session).await
    }

    async fn write(&self, session: StoredSession) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(&session)?;
        fs::write(&self.session_path, serialized).await?;
        *self.session.lock().await = Some(session);

        trace!("session persisted");
        Ok(())
    }
}

async fn read_session(session_path: &Path) -> anyhow::Result<StoredSession> {
    if !fs::try_exists(session_path).await.unwrap_or_default() {
        anyhow::bail!("session file does not exist");
    }

    let serialized = fs::read_to_string(session_path).await?;
    Ok(serde_json::from_str(&serialized)?)
}
