//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files.  Missing keys fall back
//! to their defaults, so a settings file only needs the values it overrides.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// RecognitionConfig
// ---------------------------------------------------------------------------

/// Settings for the recognition session and command dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Keep the engine listening across utterances.
    pub continuous: bool,
    /// Maximum alternatives the engine reports per result.
    pub max_alternatives: u32,
    /// Results below this confidence are routed to the unrecognized callback
    /// instead of being matched against commands.
    pub confidence_threshold: f32,
    /// Delay between start-up and the first `start()` request, in milliseconds.
    pub start_delay_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            max_alternatives: 3,
            confidence_threshold: 0.5,
            start_delay_ms: 3_000,
        }
    }
}

// ---------------------------------------------------------------------------
// ConsoleConfig
// ---------------------------------------------------------------------------

/// Settings for the stdin-backed console engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Confidence assigned to typed utterances that do not carry `@<value>`.
    pub default_confidence: f32,
    /// Seconds without input after which the engine drops the session, the
    /// way speech engines end a continuous session after silence.
    /// `0` disables the timeout.
    pub silence_timeout_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            default_confidence: 0.9,
            silence_timeout_secs: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_commands::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Session and dispatch settings.
    pub recognition: RecognitionConfig,
    /// Console engine settings.
    pub console: ConsoleConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the session cannot work with.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.recognition.confidence_threshold;
        ensure!(
            (0.0..=1.0).contains(&threshold),
            "recognition.confidence_threshold must be within [0, 1], got {threshold}"
        );
        ensure!(
            self.recognition.max_alternatives > 0,
            "recognition.max_alternatives must be at least 1"
        );
        let confidence = self.console.default_confidence;
        ensure!(
            (0.0..=1.0).contains(&confidence),
            "console.default_confidence must be within [0, 1], got {confidence}"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
