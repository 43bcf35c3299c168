//! Matrix protocol integration.
//!
//! This module connects the timeline engine to a homeserver:
//! - Session management and persistence
//! - Login or session restoration
//! - Sync loop feeding the [`crate::timeline::TimelineManager`]
//! - Transmission of queued messages
//! - Registry of encrypted attachments
//!
//! # Architecture
//!
//! The module is structured around the [`MatrixClient`] which coordinates:
//! - **Login**: password login or restoration via the login submodule
//! - **Session**: session and sync token persistence via the session submodule
//! - **Sync**: batching of sync responses via the sync submodule
//!
//! # Examples
//!
//! ```no_run
//! use lattice::matrix::{MatrixClient, UserCredentials};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let credentials = UserCredentials {
//!     user_id: "@lattice:example.com".to_string(),
//!     password: "password".to_string(),
//! };
//!
//! let client = MatrixClient::new(&credentials, "./data").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod login;
mod media;
mod session;
mod sync;

pub use crate::matrix::client::MatrixClient;
pub use crate::matrix::media::EncryptedMediaCache;
pub use crate::matrix::session::SessionStore;

/// User credentials for a Matrix account
#[derive(Debug, Clone)]
pub struct UserCredentials {
    /// User ID of the matrix account
    pub user_id: String,
    /// Password of the matrix account
    pub password: String,
}
