//! Layered configuration.
//!
//! Precedence (lowest to highest):
//! 1. Programmatic defaults
//! 2. An optional YAML file
//! 3. `EVOLVE_`-prefixed environment variables, `__` separating nested keys
//!    (`EVOLVE_GATEWAY__MODEL=gemini-pro`)

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::errors::{EvolveError, EvolveResult};
use crate::models::{Mode, MAX_SUGGESTIONS};
use crate::source::cache::DEFAULT_CACHE_ENTRIES;

pub const ENV_PREFIX: &str = "EVOLVE_";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Credentials given directly.
    pub api_keys: Vec<String>,
    /// Environment variables read for further credentials, in order.
    pub api_key_env: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 30,
            api_keys: Vec::new(),
            api_key_env: vec![
                "GEMINI_API_KEY".to_string(),
                "GEMINI_API_KEY1".to_string(),
                "GEMINI_API_KEY2".to_string(),
            ],
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_ENTRIES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolveConfig {
    /// `"development"` enables analysis; anything else is a passthrough.
    pub mode: String,
    pub max_suggestions: usize,
    pub gateway: GatewayConfig,
    pub cache: CacheConfig,
}

impl Default for EvolveConfig {
    fn default() -> Self {
        Self {
            mode: "production".to_string(),
            max_suggestions: MAX_SUGGESTIONS,
            gateway: GatewayConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl EvolveConfig {
    /// Defaults overridden by `EVOLVE_*` environment variables.
    pub fn load() -> EvolveResult<Self> {
        Self::extract(Self::figment())
    }

    /// Defaults, then `path`, then `EVOLVE_*` environment variables.
    pub fn load_from_file(path: impl AsRef<Path>) -> EvolveResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EvolveError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(EvolveConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(EvolveConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn extract(figment: Figment) -> EvolveResult<Self> {
        let config: EvolveConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EvolveResult<()> {
        if self.max_suggestions == 0 {
            return Err(EvolveError::Config("max_suggestions must be at least 1".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(EvolveError::Config("cache.max_entries must be at least 1".into()));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(EvolveError::Config("gateway.timeout_secs must be at least 1".into()));
        }
        if self.gateway.base_url.trim().is_empty() || self.gateway.model.trim().is_empty() {
            return Err(EvolveError::Config("gateway.base_url and gateway.model are required".into()));
        }
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        Mode::from_setting(&self.mode)
    }
}
