use std::fs;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::core::error::{DataError, DataResult};

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Config::validate_cache_scopes"))]
pub struct Config {
    #[validate(nested)]
    #[serde(default)]
    pub log: Option<Log>,

    #[validate(nested)]
    #[serde(default)]
    pub loader: Loader,

    #[validate(nested)]
    #[serde(default)]
    pub recommendations: Recommendations,

    #[validate(nested)]
    #[serde(default)]
    pub shipping: Shipping,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> DataResult<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).map_err(|e| {
            DataError::Configuration(format!("Unable to read conf file from {path}: {e}"))
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> DataResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> DataResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate_cache_scopes(&self) -> Result<(), ValidationError> {
        // tracking state changes too often to share between callers
        if self.shipping.cache_scope == CacheScope::Shared {
            return Err(ValidationError::new("shipping_cache_must_be_request_scoped"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    #[validate(length(min = 1))]
    pub path: String,
    #[serde(default = "Log::default_level")]
    pub level: log::LevelFilter,
}

impl Log {
    fn default_level() -> log::LevelFilter {
        log::LevelFilter::Info
    }
}

/// What a loader does with a per-key or whole-batch failure
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Every demand for the failed key receives the error
    #[default]
    Propagate,
    /// The failure is logged and the key resolves as not found
    Absent,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Loader {
    /// Scheduler yields a demand waits before its window closes
    #[serde(default = "Loader::default_yield_count")]
    #[validate(range(max = 1000))]
    pub yield_count: usize,
    #[validate(range(min = 1))]
    pub max_batch_size: Option<usize>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            yield_count: Self::default_yield_count(),
            max_batch_size: None,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl Loader {
    pub fn default_yield_count() -> usize {
        10
    }
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// One cache for the whole process, entries live for the TTL
    Shared,
    /// A fresh cache per request context
    #[default]
    Request,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Recommendations {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "Recommendations::default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
    #[serde(default = "Recommendations::default_ttl_secs")]
    #[validate(range(min = 1))]
    pub ttl_secs: u64,
    #[serde(default = "Recommendations::default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub default_limit: usize,
    #[serde(default = "Recommendations::default_cache_scope")]
    pub cache_scope: CacheScope,
}

impl Default for Recommendations {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_ms: Self::default_timeout_ms(),
            ttl_secs: Self::default_ttl_secs(),
            default_limit: Self::default_limit(),
            cache_scope: Self::default_cache_scope(),
        }
    }
}

impl Recommendations {
    fn default_timeout_ms() -> u64 {
        2000
    }

    fn default_ttl_secs() -> u64 {
        3600
    }

    fn default_limit() -> usize {
        5
    }

    fn default_cache_scope() -> CacheScope {
        CacheScope::Shared
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Shipping {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "Shipping::default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
    #[serde(default = "Shipping::default_ttl_secs")]
    #[validate(range(min = 1))]
    pub ttl_secs: u64,
    #[serde(default)]
    pub cache_scope: CacheScope,
}

impl Default for Shipping {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_ms: Self::default_timeout_ms(),
            ttl_secs: Self::default_ttl_secs(),
            cache_scope: CacheScope::Request,
        }
    }
}

impl Shipping {
    fn default_timeout_ms() -> u64 {
        1500
    }

    fn default_ttl_secs() -> u64 {
        300
    }
}

fn default_enabled() -> bool {
    true
}
