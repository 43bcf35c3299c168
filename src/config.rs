//! Configuration file structures for Lattice.
//!
//! The configuration is read from a YAML file, and every value can be
//! overridden by an environment variable prefixed with `LATTICE_`, nested keys
//! being separated by a double underscore.
//!
//! # Configuration File Format
//!
//! ```yaml
//! # Matrix account
//! matrix:
//!   # Fully qualified Matrix user ID
//!   user_id: "@lattice:matrix.org"
//!   # Account password, only used when no session is stored
//!   password: "secret-password"
//!
//! # User settings, all optional
//! settings:
//!   markdown: true
//!   typing_notifications: true
//!   theme: "light"
//! ```
//!
//! # Environment Variable Overrides
//!
//! ```bash
//! export LATTICE_MATRIX__PASSWORD="secret-from-env"
//! export LATTICE_SETTINGS__MARKDOWN=false
//! ```

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;

use crate::{matrix::UserCredentials, settings::UserSettings};

/// Root configuration structure.
#[derive(Deserialize, Debug)]
pub struct Config {
    /// Matrix account configuration
    pub matrix: Matrix,
    /// User settings consumed by the timeline engine
    #[serde(default)]
    pub settings: UserSettings,
}

/// Matrix account configuration.
#[derive(Deserialize, Debug)]
pub struct Matrix {
    /// Fully qualified Matrix user ID, e.g. `@lattice:matrix.org`.
    ///
    /// The homeserver is discovered from its server name.
    pub user_id: String,

    /// Matrix account password.
    ///
    /// Used for the first login only. The session is then persisted in the
    /// data directory and restored on the next start.
    pub password: String,
}

impl Config {
    /// Loads the configuration from `path`, applying the `LATTICE_`
    /// environment overrides on top of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a required value is
    /// missing from both the file and the environment.
    pub fn load(path: &str) -> Result<Config, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("LATTICE_").split("__"))
            .extract()
    }

    /// Credentials of the configured Matrix account.
    pub fn credentials(&self) -> UserCredentials {
        UserCredentials {
            user_id: self.matrix.user_id.clone(),
            password: self.matrix.password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_load_config_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                matrix:
                  user_id: "@lattice:example.com"
                  password: "password"
                settings:
                  markdown: false
                  theme: "dark"
                "#,
            )?;

            let config = Config::load("config.yaml")?;

            assert_eq!(config.matrix.user_id, "@lattice:example.com");
            assert_eq!(config.matrix.password, "password");
            assert!(!config.settings.markdown);
            assert!(config.settings.typing_notifications);
            assert_eq!(config.settings.theme, "dark");
            Ok(())
        });
    }

    #[test]
    fn test_settings_default_when_missing() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                matrix:
                  user_id: "@lattice:example.com"
                  password: "password"
                "#,
            )?;

            let config = Config::load("config.yaml")?;

            assert_eq!(config.settings, UserSettings::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                matrix:
                  user_id: "@lattice:example.com"
                  password: "password"
                "#,
            )?;
            jail.set_env("LATTICE_MATRIX__PASSWORD", "from-env");
            jail.set_env("LATTICE_SETTINGS__TYPING_NOTIFICATIONS", "false");

            let config = Config::load("config.yaml")?;

            assert_eq!(config.matrix.password, "from-env");
            assert!(!config.settings.typing_notifications);
            Ok(())
        });
    }

    #[test]
    fn test_missing_user_id_fails() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                matrix:
                  password: "password"
                "#,
            )?;

            assert!(Config::load("config.yaml").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_credentials() {
        Jail::expect_with(|jail| {
            jail.set_env("LATTICE_MATRIX__USER_ID", "@env:example.com");
            jail.set_env("LATTICE_MATRIX__PASSWORD", "password");

            let credentials = Config::load("missing.yaml")?.credentials();

            assert_eq!(credentials.user_id, "@env:example.com");
            assert_eq!(credentials.password, "password");
            Ok(())
        });
    }
}
