// meridian/core/verifier/src/logging.rs

//! Structured logging for nodes embedding the verifier.
//!
//! Levels and format come from the `[log]` section of the verifier
//! configuration, overridable through the environment:
//! - `RUST_LOG`: full filter directive, wins over the configured levels
//! - `LOG_FORMAT`: `pretty`, `json` or `compact`
//! - `LOG_ANSI`: `true` or `false`

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a level name, falling back to `Info`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line
    Pretty,
    /// One JSON object per event
    Json,
    /// Single line
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub ansi_colors: bool,
    /// Emit span open/close events
    pub span_events: bool,
    /// Per-target overrides, e.g. `("meridian_vm", Debug)`
    pub module_levels: Vec<(String, LogLevel)>,
    pub include_location: bool,
    pub include_thread_id: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            ansi_colors: true,
            span_events: false,
            module_levels: Vec::new(),
            include_location: false,
            include_thread_id: false,
        }
    }
}

impl LogConfig {
    /// Apply `RUST_LOG`, `LOG_FORMAT` and `LOG_ANSI` on top of `self`.
    fn with_env(mut self) -> Self {
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            if let Some(level) = rust_log.split(',').next() {
                self.level = LogLevel::parse(level);
            }
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        if let Ok(ansi) = std::env::var("LOG_ANSI") {
            self.ansi_colors = ansi.eq_ignore_ascii_case("true");
        }
        self
    }

    fn build_filter(&self) -> String {
        let mut filter = self.level.as_str().to_string();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.as_str()));
        }
        filter
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let config = config.clone().with_env();
    let filter = match std::env::var("RUST_LOG") {
        Ok(rust_log) => EnvFilter::new(rust_log),
        Err(_) => EnvFilter::new(config.build_filter()),
    };
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_id)
        .with_span_events(span_events);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry.with(layer.json().with_ansi(false)).try_init(),
        LogFormat::Pretty => registry
            .with(layer.pretty().with_ansi(config.ansi_colors))
            .try_init(),
        LogFormat::Compact => registry
            .with(layer.compact().with_ansi(config.ansi_colors))
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))
}
