use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::invoker::CallingMode;

pub const CONFIG_ENV: &str = "FRONTIER_BRIDGE_CONFIG";

const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_HANDLES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bridge config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid bridge config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub default_mode: CallingMode,
    /// Zero disables the out-of-process call timeout.
    pub call_timeout_ms: u64,
    pub max_handles: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_mode: CallingMode::default(),
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            max_handles: DEFAULT_MAX_HANDLES,
        }
    }
}

impl BridgeConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                serde_yaml::from_str(&contents)?
            }
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
    }

    pub fn with_mode(mut self, mode: CallingMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_handles == 0 {
            return Err(ConfigError::Invalid("max_handles must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_default() {
        let config = BridgeConfig::load(None).unwrap();
        assert_eq!(config.default_mode, CallingMode::OutOfProcess);
        assert_eq!(config.call_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = BridgeConfig::load(Some(PathBuf::from("/nonexistent/bridge.yaml"))).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "default_mode: in-process\ncall_timeout_ms: 0").unwrap();
        let config = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.default_mode, CallingMode::InProcess);
        assert_eq!(config.call_timeout(), None);
        assert_eq!(config.max_handles, DEFAULT_MAX_HANDLES);
    }

    #[test]
    fn rejects_zero_handles() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_handles: 0").unwrap();
        assert!(matches!(
            BridgeConfig::load(Some(file.path().to_path_buf())),
            Err(ConfigError::Invalid(_))
        ));
    }
}
