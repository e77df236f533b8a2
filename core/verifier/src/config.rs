// meridian/core/verifier/src/config.rs

use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Block generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One transaction at a time
    Serial,
    /// Parallel batches of up to `thread` transactions
    Batch,
}

impl Mode {
    /// Code recorded in block info.
    pub fn code(self) -> u8 {
        match self {
            Mode::Serial => 0,
            Mode::Batch => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Mode> {
        match code {
            0 => Some(Mode::Serial),
            1 => Some(Mode::Batch),
            _ => None,
        }
    }
}

/// Generation/verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_mode")]
    pub mode: Mode,

    /// Total generation budget in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Nominal per-transaction budget in milliseconds
    #[serde(default = "default_tx_time_limit_ms")]
    pub tx_time_limit_ms: u64,

    /// Batch width in batch mode
    #[serde(default = "default_thread")]
    pub thread: usize,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_mode() -> Mode {
    Mode::Serial
}

fn default_timeout_ms() -> u64 {
    500
}

fn default_tx_time_limit_ms() -> u64 {
    100
}

fn default_thread() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            timeout_ms: default_timeout_ms(),
            tx_time_limit_ms: default_tx_time_limit_ms(),
            thread: default_thread(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn serial(timeout: Duration, tx_time_limit: Duration) -> Self {
        Self {
            mode: Mode::Serial,
            timeout_ms: timeout.as_millis() as u64,
            tx_time_limit_ms: tx_time_limit.as_millis() as u64,
            thread: 1,
            log: LogConfig::default(),
        }
    }

    pub fn batch(timeout: Duration, tx_time_limit: Duration, thread: usize) -> Self {
        Self {
            mode: Mode::Batch,
            thread,
            ..Self::serial(timeout, tx_time_limit)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn tx_time_limit(&self) -> Duration {
        Duration::from_millis(self.tx_time_limit_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.thread == 0 {
            return Err("thread must be at least 1".to_string());
        }
        if self.tx_time_limit_ms == 0 {
            return Err("tx_time_limit_ms must be positive".to_string());
        }
        Ok(())
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Save as TOML
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: Config = toml::from_str("mode = \"batch\"\nthread = 8\n").unwrap();
        assert_eq!(config.mode, Mode::Batch);
        assert_eq!(config.thread, 8);
        assert_eq!(config.tx_time_limit(), Duration::from_millis(100));
        assert_eq!(config.timeout(), Duration::from_millis(500));
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_log_section() {
        let text = "mode = \"serial\"\n\n[log]\nlevel = \"debug\"\nformat = \"json\"\n";
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.log.level, crate::logging::LogLevel::Debug);
        assert_eq!(config.log.format, crate::logging::LogFormat::Json);
        assert!(config.log.ansi_colors);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/verifier.toml");
        let config = Config::batch(Duration::from_secs(2), Duration::from_millis(50), 3);
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.mode, Mode::Batch);
        assert_eq!(loaded.timeout_ms, 2_000);
        assert_eq!(loaded.tx_time_limit_ms, 50);
        assert_eq!(loaded.thread, 3);
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());
        let mut config = Config::default();
        config.thread = 0;
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "thread = 0\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_mode_codes() {
        assert_eq!(Mode::Serial.code(), 0);
        assert_eq!(Mode::Batch.code(), 1);
        assert_eq!(Mode::from_code(1), Some(Mode::Batch));
        assert_eq!(Mode::from_code(0), Some(Mode::Serial));
        assert_eq!(Mode::from_code(2), None);
    }
}
