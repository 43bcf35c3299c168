//! User settings consumed by the timeline engine.

use serde::Deserialize;

/// Settings provider.
///
/// The engine reads settings on every operation, so an implementation may
/// change its answers at runtime.
pub trait Settings: Send + Sync {
    /// Whether message bodies are interpreted as markdown.
    fn is_markdown_enabled(&self) -> bool;
    /// Whether typing users are tracked.
    fn is_typing_notifications_enabled(&self) -> bool;
    /// Name of the active theme.
    fn theme(&self) -> String;
}

/// Settings read from the `settings` section of the configuration file.
///
/// ```yaml
/// settings:
///   markdown: true
///   typing_notifications: true
///   theme: "dark"
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserSettings {
    pub markdown: bool,
    pub typing_notifications: bool,
    pub theme: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        UserSettings {
            markdown: true,
            typing_notifications: true,
            theme: "light".to_owned(),
        }
    }
}

impl Settings for UserSettings {
    fn is_markdown_enabled(&self) -> bool {
        self.markdown
    }

    fn is_typing_notifications_enabled(&self) -> bool {
        self.typing_notifications
    }

    fn theme(&self) -> String {
        self.theme.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: UserSettings = serde_json::from_str(r#"{"theme": "dark"}"#).unwrap();

        assert!(settings.is_markdown_enabled());
        assert!(settings.is_typing_notifications_enabled());
        assert_eq!(settings.theme(), "dark");
    }
}
