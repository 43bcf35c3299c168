//! Login and session restoration.

use anyhow::Context;
use log::{debug, info};
use matrix_sdk::{Client, ruma::OwnedUserId};

use crate::matrix::{UserCredentials, session::SessionStore};

/// Display name of the devices created by this client.
const DEVICE_DISPLAY_NAME: &str = "lattice";

/// Builds a client for the account, restoring the stored session when there
/// is one and logging in with the password otherwise.
///
/// # Errors
///
/// Returns an error if the user id is invalid, the homeserver cannot be
/// discovered, or the login or restoration fails.
pub async fn setup_client(
    user_credentials: &UserCredentials,
    store: &SessionStore,
) -> anyhow::Result<Client> {
    info!(
        "setting up matrix client for user {}",
        user_credentials.user_id
    );

    let user_id: OwnedUserId = user_credentials.user_id.clone().try_into()?;
    let client = Client::builder()
        .server_name(user_id.server_name())
        .sqlite_store(store.sqlite_path(), None)
        .build()
        .await?;

    debug!("matrix client created");

    match store.user_session().await {
        Some(user_session) => {
            info!("restoring matrix session from disk");
            client.restore_session(user_session).await?;
        }
        None => login(&client, user_id, user_credentials, store).await?,
    }

    info!("matrix client ready");
    Ok(client)
}

async fn login(
    client: &Client,
    user_id: OwnedUserId,
    user_credentials: &UserCredentials,
    store: &SessionStore,
) -> anyhow::Result<()> {
    info!("logging in as {}", user_id);

    client
        .matrix_auth()
        .login_username(user_id, &user_credentials.password)
        .initial_device_display_name(DEVICE_DISPLAY_NAME)
        .send()
        .await?;

    let user_session = client
        .matrix_auth()
        .session()
        .context("no session after login")?;
    store
        .persist_user_session(&user_session)
        .await
        .context("error persisting user session")?;

    Ok(())
}
