//! Configuration loading and defaults for idle-manager.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{EventName, IdleState, VISIBILITY_CHANGE};

/// Default inactivity window in milliseconds.
pub const DEFAULT_TIME_TO_IDLE_MS: u64 = 5000;

/// The platform-standard set of activity signals.
///
/// Pointer, touch, keyboard, focus and scroll events plus the
/// visibility-change signal.
pub fn default_active_events() -> Vec<EventName> {
    [
        "click",
        "mousemove",
        "keydown",
        "touchstart",
        "touchend",
        "focus",
        "scroll",
        VISIBILITY_CHANGE,
    ]
    .iter()
    .map(|name| EventName::from(*name))
    .collect()
}

/// Configuration for an idle machine.
///
/// Supplied once at construction and immutable for the lifetime of the
/// instance. All fields are optional in serialized form and default per
/// [`IdleConfig::default`]. Ill-formed values (unrecognized event names,
/// a zero timeout) are not validated; callers are trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Input events that count as activity signals.
    pub active_events: Vec<EventName>,

    /// Inactivity window after which the machine goes idle (default: 5000).
    pub time_to_idle_ms: u64,

    /// Events to exclude from subscription despite being in
    /// `active_events`. The filter is applied once, at construction.
    pub ignored_events: Vec<EventName>,

    /// State the machine starts in (default: active).
    pub initial_state: IdleState,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            active_events: default_active_events(),
            time_to_idle_ms: DEFAULT_TIME_TO_IDLE_MS,
            ignored_events: Vec::new(),
            initial_state: IdleState::Active,
        }
    }
}

impl IdleConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: IdleConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        // Try default config path
        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("idle-manager").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// The inactivity window as a [`Duration`].
    pub fn time_to_idle(&self) -> Duration {
        Duration::from_millis(self.time_to_idle_ms)
    }

    /// The set of events the machine actually listens for:
    /// `active_events` minus `ignored_events`.
    pub fn subscribed_events(&self) -> HashSet<EventName> {
        self.active_events
            .iter()
            .filter(|name| !self.ignored_events.contains(name))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IdleConfig::default();
        assert_eq!(config.time_to_idle_ms, 5000);
        assert_eq!(config.initial_state, IdleState::Active);
        assert!(config.ignored_events.is_empty());
        assert!(config.active_events.contains(&EventName::from("mousemove")));
        assert!(
            config
                .active_events
                .contains(&EventName::from(VISIBILITY_CHANGE))
        );
    }

    #[test]
    fn test_subscribed_events_filters_ignored() {
        let config = IdleConfig {
            ignored_events: vec![EventName::from("mousemove"), EventName::from("scroll")],
            ..Default::default()
        };

        let subscribed = config.subscribed_events();
        assert!(!subscribed.contains(&EventName::from("mousemove")));
        assert!(!subscribed.contains(&EventName::from("scroll")));
        assert!(subscribed.contains(&EventName::from("click")));
        assert!(subscribed.contains(&EventName::from(VISIBILITY_CHANGE)));
    }

    #[test]
    fn test_ignoring_unknown_event_is_harmless() {
        let config = IdleConfig {
            ignored_events: vec![EventName::from("no-such-event")],
            ..Default::default()
        };

        assert_eq!(
            config.subscribed_events().len(),
            config.active_events.len()
        );
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            time_to_idle_ms = 10000
            ignored_events = ["mousemove"]
            initial_state = "idle"
        "#;

        let config: IdleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.time_to_idle_ms, 10000);
        assert_eq!(config.ignored_events, vec![EventName::from("mousemove")]);
        assert_eq!(config.initial_state, IdleState::Idle);
        // Unspecified fields fall back to defaults
        assert_eq!(config.active_events, default_active_events());
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time_to_idle_ms = 2500").unwrap();
        writeln!(file, r#"active_events = ["click", "keydown"]"#).unwrap();

        let config = IdleConfig::load(file.path()).unwrap();
        assert_eq!(config.time_to_idle(), Duration::from_millis(2500));
        assert_eq!(
            config.active_events,
            vec![EventName::from("click"), EventName::from("keydown")]
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(IdleConfig::load(Path::new("/nonexistent/config.toml")).is_err());
    }
}
