// Configuration for the AquaAnalyzer pipeline and server

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What the analysis loop does when the input runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndOfInput {
    /// Rewind the input and start over with cleared state
    Loop,
    /// Terminate the loop gracefully
    Stop,
}

/// Input source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Recorded tracker output, one JSON array of detections per line
    pub path: PathBuf,
    /// Used when the source does not report a frame rate
    pub default_fps: f64,
    /// Class names indexed by the detector's class id
    pub class_names: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/tracks.jsonl"),
            default_fps: 30.0,
            class_names: Vec::new(),
        }
    }
}

/// Analysis loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Process every Nth frame
    pub frame_stride: u64,
    /// Frames a track may go unobserved before it is evicted
    pub lifetime_frames: u64,
    /// Image-space y coordinate of the geofence line
    pub boundary_y: f32,
    pub end_of_input: EndOfInput,
    /// Pace the loop to the source frame rate
    pub realtime: bool,
    /// Capacity of the recent per-frame error log
    pub max_recent_errors: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_stride: 2,
            lifetime_frames: 30,
            boundary_y: 50.0,
            end_of_input: EndOfInput::Loop,
            realtime: true,
            max_recent_errors: 32,
        }
    }
}

/// Boundary alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub alert_enabled: bool,
    pub sms_enabled: bool,
    pub cooldown_secs: u64,
    pub notify_timeout_secs: u64,
    pub message: String,
    pub startup_message: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            alert_enabled: false,
            sms_enabled: true,
            cooldown_secs: 3600,
            notify_timeout_secs: 10,
            message: "ALERT: Geofence line crossed! Oxygen levels may be low.".to_string(),
            startup_message: "AquaAnalyzer System is Live: Monitoring has started.".to_string(),
        }
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

/// SMS transport credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub api_base: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            to_number: None,
            api_base: "https://api.twilio.com".to_string(),
        }
    }
}

impl NotifierConfig {
    /// True when every credential needed to send an SMS is present
    pub fn has_credentials(&self) -> bool {
        [&self.account_sid, &self.auth_token, &self.from_number, &self.to_number]
            .iter()
            .all(|v| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Poll interval of each streaming consumer
    pub stream_poll_ms: u64,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            stream_poll_ms: 100,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn stream_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stream_poll_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete AquaAnalyzer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AquaConfig {
    pub source: SourceConfig,
    pub analysis: AnalysisConfig,
    pub alerts: AlertConfig,
    pub notifier: NotifierConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl AquaConfig {
    /// Load configuration from file. The extension picks the format;
    /// unknown extensions fall back to trying every format.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string())),
            Some("toml") => toml::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string())),
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string())),
            _ => Self::from_str(&content),
        }
    }

    /// Load configuration from string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        if let Ok(config) = serde_json::from_str::<AquaConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = toml::from_str::<AquaConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = serde_yaml::from_str::<AquaConfig>(content) {
            return Ok(config);
        }

        Err(ConfigError::ParseError("Unknown format".to_string()))
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay values found through `lookup` onto this configuration
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("AQUA_SOURCE").or_else(|| lookup("VIDEO_FEED")) {
            self.source.path = PathBuf::from(path);
        }

        if let Some(host) = lookup("AQUA_HOST") {
            self.server.bind_address = host;
        }

        if let Some(port) = lookup("AQUA_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }

        if let Some(level) = lookup("AQUA_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(enabled) = lookup("AQUA_ALERT_ENABLED").and_then(|v| parse_bool(&v)) {
            self.alerts.alert_enabled = enabled;
        }

        if let Some(enabled) = lookup("AQUA_SMS_ENABLED").and_then(|v| parse_bool(&v)) {
            self.alerts.sms_enabled = enabled;
        }

        if let Some(sid) = lookup("TWILIO_ACCOUNT_SID") {
            self.notifier.account_sid = Some(sid);
        }
        if let Some(token) = lookup("TWILIO_AUTH_TOKEN") {
            self.notifier.auth_token = Some(token);
        }
        if let Some(from) = lookup("TWILIO_NUMBER") {
            self.notifier.from_number = Some(from);
        }
        if let Some(to) = lookup("RECIPIENT_NUMBER") {
            self.notifier.to_number = Some(to);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.frame_stride == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.frame_stride must be > 0".to_string()
            ));
        }

        if !self.analysis.boundary_y.is_finite() {
            return Err(ConfigError::ValidationError(
                "analysis.boundary_y must be a finite number".to_string()
            ));
        }

        if self.analysis.max_recent_errors == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.max_recent_errors must be > 0".to_string()
            ));
        }

        if !(self.source.default_fps > 0.0 && self.source.default_fps <= 240.0) {
            return Err(ConfigError::ValidationError(
                "source.default_fps must be in (0, 240]".to_string()
            ));
        }

        if self.alerts.cooldown_secs == 0 {
            return Err(ConfigError::ValidationError(
                "alerts.cooldown_secs must be > 0".to_string()
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port cannot be 0".to_string()
            ));
        }

        if self.server.stream_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "server.stream_poll_ms must be > 0".to_string()
            ));
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Parse error: {}", e),
            ConfigError::ValidationError(e) => write!(f, "Validation error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Configuration(err.to_string())
    }
}
