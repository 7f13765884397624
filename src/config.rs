//! Probe configuration parsing, validation, and duration accessors.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Handling of the server's stderr stream.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StderrMode {
    /// Child stderr passes straight through to the probe's own stderr.
    Inherit,
    /// Child stderr is captured and merged into the observed line stream.
    ///
    /// Required when the readiness marker is logged to stderr, which is
    /// where typical server loggers write.
    Merge,
}

fn default_server_command() -> String {
    "codereviewserver".into()
}

fn default_server_args() -> Vec<String> {
    vec!["-server".into()]
}

fn default_stderr_mode() -> StderrMode {
    StderrMode::Merge
}

fn default_ready_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_response_timeout_ms() -> u64 {
    30_000
}

fn default_drain_window_ms() -> u64 {
    5_000
}

fn default_max_line_bytes() -> usize {
    1_048_576
}

/// Global configuration parsed from an optional TOML file.
///
/// Every field is defaulted so an empty file (or no file at all) yields a
/// working configuration for the stock `codereviewserver -server` target.
/// CLI flags override individual fields after parsing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProbeConfig {
    /// Server executable launched for the exchange.
    #[serde(default = "default_server_command")]
    pub server_command: String,
    /// Arguments passed to the server executable.
    #[serde(default = "default_server_args")]
    pub server_args: Vec<String>,
    /// Handling of the server's stderr stream.
    #[serde(default = "default_stderr_mode")]
    pub stderr_mode: StderrMode,
    /// Marker substring gating the request; `None` sends immediately.
    #[serde(default)]
    pub ready_marker: Option<String>,
    /// Overall readiness deadline in milliseconds.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    /// Per-iteration poll wait in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Overall single-line response deadline in milliseconds.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Overall bounded-drain window in milliseconds.
    #[serde(default = "default_drain_window_ms")]
    pub drain_window_ms: u64,
    /// Fixed delay before the request is written, in milliseconds.
    #[serde(default)]
    pub send_delay_ms: u64,
    /// Maximum accepted line length on server streams, in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            server_command: default_server_command(),
            server_args: default_server_args(),
            stderr_mode: default_stderr_mode(),
            ready_marker: None,
            ready_timeout_ms: default_ready_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            drain_window_ms: default_drain_window_ms(),
            send_delay_ms: 0,
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl ProbeConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the file cannot be read, is not
    /// valid TOML, or fails [`ProbeConfig::validate`].
    pub fn from_toml_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("cannot read {}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] on a TOML parse error or a failed
    /// validation invariant.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the server command is empty, the
    /// poll interval or line limit is zero, or a configured readiness
    /// marker is blank (a blank marker would match every line).
    pub fn validate(&self) -> Result<()> {
        if self.server_command.trim().is_empty() {
            return Err(AppError::Config("server_command must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config("poll_interval_ms must be positive".into()));
        }
        if self.max_line_bytes == 0 {
            return Err(AppError::Config("max_line_bytes must be positive".into()));
        }
        if let Some(marker) = &self.ready_marker {
            if marker.trim().is_empty() {
                return Err(AppError::Config("ready_marker must not be blank".into()));
            }
        }
        Ok(())
    }

    /// Overall readiness deadline.
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Per-iteration poll wait.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Overall single-line response deadline.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Overall bounded-drain window.
    #[must_use]
    pub fn drain_window(&self) -> Duration {
        Duration::from_millis(self.drain_window_ms)
    }

    /// Fixed pre-send delay; zero disables it.
    #[must_use]
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}
