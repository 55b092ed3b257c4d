//! Configuration loading.
//!
//! Compiled defaults, then an optional TOML file, then environment
//! variables (later wins). The service credential is only validated when
//! a composition actually needs it, via [`Config::require_key`].

use crate::{ComposeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const LOCAL_CONFIG: &str = "overdub.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the OpenAI-compatible completion endpoint.
    pub service_url: String,
    /// Model name passed through to the service.
    pub model: String,
    /// Bearer credential for the service. Usually set via OVERDUB_API_KEY.
    pub api_key: Option<String>,
    /// Request timeout for one generative call, in seconds.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:2020".to_string(),
            model: "default".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// File-level view of [`Config`]: every field optional so partial files
/// override only what they mention.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    service_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration: defaults, `./overdub.toml` if present, env vars.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an explicit file path taking the place of
    /// the local `./overdub.toml` override.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        let local = Path::new(LOCAL_CONFIG);
        let path = config_path.or_else(|| local.exists().then_some(local));

        if let Some(path) = path {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                ComposeError::Configuration(format!(
                    "failed to read config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let file: FileConfig = toml::from_str(&contents).map_err(|e| {
                ComposeError::Configuration(format!(
                    "failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            config.apply_file(file);
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.service_url {
            self.service_url = v;
        }
        if let Some(v) = file.model {
            self.model = v;
        }
        if let Some(v) = file.api_key {
            self.api_key = Some(v);
        }
        if let Some(v) = file.timeout_secs {
            self.timeout_secs = v;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("OVERDUB_SERVICE_URL") {
            self.service_url = v;
        }
        if let Ok(v) = std::env::var("OVERDUB_MODEL") {
            self.model = v;
        }
        if let Ok(v) = std::env::var("OVERDUB_API_KEY") {
            self.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("OVERDUB_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.timeout_secs = secs;
            }
        }
    }

    /// The service credential, or a configuration error when absent.
    ///
    /// Checked once up front so a missing credential fails before any
    /// generative call is attempted.
    pub fn require_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ComposeError::Configuration(
                    "no service credential configured (set OVERDUB_API_KEY)".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.service_url, "http://127.0.0.1:2020");
        assert_eq!(config.timeout_secs, 120);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let config = Config::default();
        assert!(matches!(
            config.require_key(),
            Err(ComposeError::Configuration(_))
        ));
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "service_url = \"https://svc.example\"\napi_key = \"k-123\""
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.service_url, "https://svc.example");
        assert_eq!(config.require_key().unwrap(), "k-123");
        // untouched fields keep their defaults
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn unreadable_file_is_a_configuration_error() {
        let result = Config::load_from(Some(Path::new("/does/not/exist.toml")));
        assert!(matches!(result, Err(ComposeError::Configuration(_))));
    }
}
