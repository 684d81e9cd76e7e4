//! Configuration for the live writer and the event flusher

use crate::error::ConfigError;
use crate::graph::LogLevel;
use crate::render::keys::{KeyAction, KeyBinding, KeyDispatcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration, usually loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub terminal: TerminalConfig,
    pub events: EventConfig,
    /// Extra key bindings, e.g. `"esc" = "quit"` or `"w" = "level:warn"`.
    pub keys: BTreeMap<String, String>,
}

/// Terminal rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Most verbose level shown on screen
    pub severity_threshold: LogLevel,
    /// Spinner animation tick
    pub spinner_interval_ms: u64,
    /// Live-stream notifications closer together than this are coalesced
    pub burst_window_ms: u64,
    /// Columns kept free on the right when wrapping
    pub wrap_margin: u16,
    /// Apply burst coalescing to structured entries too
    pub throttle_structured: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            severity_threshold: LogLevel::Info,
            spinner_interval_ms: 60,
            burst_window_ms: 600,
            wrap_margin: 2,
            throttle_structured: false,
        }
    }
}

impl TerminalConfig {
    pub fn spinner_interval(&self) -> Duration {
        Duration::from_millis(self.spinner_interval_ms)
    }

    pub fn burst_window(&self) -> Duration {
        Duration::from_millis(self.burst_window_ms)
    }
}

/// Outbound event batching settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Identifier attached to every outbound batch
    pub session_id: String,
    /// Period of the background flush
    pub flush_interval_ms: u64,
    /// Maximum records per periodic batch
    pub batch_cap: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            session_id: String::from("local"),
            flush_interval_ms: 3000,
            batch_cap: 200,
        }
    }
}

impl EventConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl LiveConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: LiveConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("terminal.spinner_interval_ms", self.terminal.spinner_interval_ms),
            ("terminal.burst_window_ms", self.terminal.burst_window_ms),
            ("events.flush_interval_ms", self.events.flush_interval_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.events.batch_cap == 0 {
            return Err(ConfigError::Invalid {
                field: "events.batch_cap",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.key_dispatcher().map(|_| ())
    }

    /// Default bindings with the configured overrides applied.
    pub fn key_dispatcher(&self) -> Result<KeyDispatcher, ConfigError> {
        let mut dispatcher = KeyDispatcher::with_defaults();
        for (key, action) in &self.keys {
            let binding: KeyBinding = key
                .parse()
                .map_err(|reason| ConfigError::Invalid { field: "keys", reason })?;
            let action: KeyAction = action
                .parse()
                .map_err(|reason| ConfigError::Invalid { field: "keys", reason })?;
            dispatcher.bind(binding, action);
        }
        Ok(dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = LiveConfig::from_toml_str("").unwrap();
        assert_eq!(config, LiveConfig::default());
        assert_eq!(config.terminal.burst_window(), Duration::from_millis(600));
        assert_eq!(config.events.batch_cap, 200);
    }

    #[test]
    fn test_partial_document() {
        let config = LiveConfig::from_toml_str(
            r#"
            [terminal]
            severity_threshold = "debug"
            throttle_structured = true

            [events]
            session_id = "ci-42"

            [keys]
            esc = "quit"
            "#,
        )
        .unwrap();

        assert_eq!(config.terminal.severity_threshold, LogLevel::Debug);
        assert!(config.terminal.throttle_structured);
        assert_eq!(config.terminal.spinner_interval_ms, 60);
        assert_eq!(config.events.session_id, "ci-42");

        let keys = config.key_dispatcher().unwrap();
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(keys.dispatch(&esc), Some(KeyAction::Quit));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let err = LiveConfig::from_toml_str("[events]\nbatch_cap = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "events.batch_cap", .. }));

        let err = LiveConfig::from_toml_str("[terminal]\nburst_window_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "terminal.burst_window_ms", .. }));
    }

    #[test]
    fn test_bad_key_binding_is_rejected() {
        let err = LiveConfig::from_toml_str("[keys]\n\"hyper+x\" = \"quit\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "keys", .. }));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            LiveConfig::from_toml_str("[terminal\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
