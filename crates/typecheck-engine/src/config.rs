//! # Configuration / Policy Store
//!
//! Process-wide settings consulted by the matcher and the call wrapper:
//! element sampling, strictness, lazy producer validation, and the policies
//! for unresolved forward references and unsupported constructs.
//!
//! Every setting is independently mutable at any time and takes effect on
//! the next call. A call takes one [`ConfigStore::snapshot`] at entry and
//! uses it throughout, so a mutation never changes policy halfway through a
//! single validation.
//!
//! ## Concurrency
//!
//! The `parking_lot::RwLock` gives memory safety only. There is no
//! cross-field transaction: two threads flipping settings while calls are in
//! flight may see any interleaving of the two updates. Mutate configuration
//! during quiescent periods (startup, test setup).

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Default number of leading elements checked when neither `sample` nor
/// `deep` is in effect.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// Default nesting limit; containers nested deeper are left unchecked.
pub const DEFAULT_MAX_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What to do with a forward reference that cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardRefPolicy {
    /// Treat it as `Any`.
    #[default]
    Permissive,
    /// Fail the call.
    Strict,
}

impl ForwardRefPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for ForwardRefPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForwardRefPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            _ => Err(ConfigError::UnknownPolicy {
                setting: "forward_ref_policy",
                value: s.to_string(),
            }),
        }
    }
}

/// What to do with a type construct the matcher does not understand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Accept the value.
    #[default]
    Silent,
    /// Accept the value and emit a `tracing` warning.
    Warn,
    /// Fail the call.
    Error,
}

impl FallbackPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FallbackPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::UnknownPolicy {
                setting: "fallback_policy",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// The validation settings in effect for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reject undeclared keys in typed mappings.
    pub strict_mode: bool,
    /// A callable without a declared return type fails.
    pub strict_return_mode: bool,
    /// Leading elements checked per container when not deep.
    pub sample_size: usize,
    /// Global deep override. `Some(true)` checks every element.
    pub deep: Option<bool>,
    /// Check producer elements as the callee consumes them.
    pub lazy_iterable_validation: bool,
    pub forward_ref_policy: ForwardRefPolicy,
    pub fallback_policy: FallbackPolicy,
    /// Nesting limit for recursive checks.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_mode: false,
            strict_return_mode: false,
            sample_size: DEFAULT_SAMPLE_SIZE,
            deep: None,
            lazy_iterable_validation: false,
            forward_ref_policy: ForwardRefPolicy::Permissive,
            fallback_policy: FallbackPolicy::Silent,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Variables (all optional, unset means default):
    /// - `TYPECHECK_SAMPLE_SIZE` (default: 5)
    /// - `TYPECHECK_STRICT` (default: false)
    /// - `TYPECHECK_STRICT_RETURN` (default: false)
    /// - `TYPECHECK_DEEP` (default: unset)
    /// - `TYPECHECK_LAZY_ITERABLES` (default: false)
    /// - `TYPECHECK_FORWARD_REF_POLICY` (`permissive` | `strict`)
    /// - `TYPECHECK_FALLBACK_POLICY` (`silent` | `warn` | `error`)
    /// - `TYPECHECK_MAX_DEPTH` (default: 32)
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::from_lookup(|var| std::env::var(var).ok())?;
        tracing::info!(
            sample_size = config.sample_size,
            strict_mode = config.strict_mode,
            forward_ref_policy = %config.forward_ref_policy,
            fallback_policy = %config.fallback_policy,
            "typecheck configuration loaded from environment"
        );
        Ok(config)
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup("TYPECHECK_SAMPLE_SIZE") {
            config.sample_size = parse_number("TYPECHECK_SAMPLE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("TYPECHECK_STRICT") {
            config.strict_mode = parse_flag("TYPECHECK_STRICT", &raw)?;
        }
        if let Some(raw) = lookup("TYPECHECK_STRICT_RETURN") {
            config.strict_return_mode = parse_flag("TYPECHECK_STRICT_RETURN", &raw)?;
        }
        if let Some(raw) = lookup("TYPECHECK_DEEP") {
            config.deep = Some(parse_flag("TYPECHECK_DEEP", &raw)?);
        }
        if let Some(raw) = lookup("TYPECHECK_LAZY_ITERABLES") {
            config.lazy_iterable_validation = parse_flag("TYPECHECK_LAZY_ITERABLES", &raw)?;
        }
        if let Some(raw) = lookup("TYPECHECK_FORWARD_REF_POLICY") {
            config.forward_ref_policy = raw.parse()?;
        }
        if let Some(raw) = lookup("TYPECHECK_FALLBACK_POLICY") {
            config.fallback_policy = raw.parse()?;
        }
        if let Some(raw) = lookup("TYPECHECK_MAX_DEPTH") {
            config.max_depth = parse_number("TYPECHECK_MAX_DEPTH", &raw)?;
        }
        Ok(config)
    }

    /// Parse a YAML document; absent keys keep their defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))
    }
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
        }),
    }
}

fn parse_number(var: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown {setting} '{value}'")]
    UnknownPolicy { setting: &'static str, value: String },
    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
    #[error("invalid configuration document: {0}")]
    Yaml(String),
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Shared, mutable handle to a [`Config`].
///
/// Clones share the same settings. [`ConfigStore::global`] is the
/// process-wide instance used by wrappers that are not given their own.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    inner: Arc<RwLock<Config>>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// The process-wide store, created with defaults on first use.
    pub fn global() -> ConfigStore {
        static GLOBAL: OnceLock<ConfigStore> = OnceLock::new();
        GLOBAL.get_or_init(ConfigStore::default).clone()
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> Config {
        self.inner.read().clone()
    }

    /// Apply an arbitrary edit under the write lock.
    pub fn update(&self, f: impl FnOnce(&mut Config)) {
        f(&mut self.inner.write());
    }

    /// Restore every setting to its default.
    pub fn reset(&self) {
        *self.inner.write() = Config::default();
    }

    pub fn replace(&self, config: Config) {
        *self.inner.write() = config;
    }

    pub fn set_sample_size(&self, sample_size: usize) {
        self.inner.write().sample_size = sample_size;
    }

    pub fn set_strict_mode(&self, on: bool) {
        self.inner.write().strict_mode = on;
    }

    pub fn set_strict_return_mode(&self, on: bool) {
        self.inner.write().strict_return_mode = on;
    }

    pub fn set_deep(&self, deep: Option<bool>) {
        self.inner.write().deep = deep;
    }

    pub fn set_lazy_iterable_validation(&self, on: bool) {
        self.inner.write().lazy_iterable_validation = on;
    }

    pub fn set_max_depth(&self, max_depth: usize) {
        self.inner.write().max_depth = max_depth;
    }

    /// Set the forward reference policy by name (`permissive` | `strict`).
    pub fn set_forward_ref_policy(&self, policy: &str) -> Result<(), ConfigError> {
        let policy: ForwardRefPolicy = policy.parse()?;
        self.inner.write().forward_ref_policy = policy;
        Ok(())
    }

    /// Set the fallback policy by name (`silent` | `warn` | `error`).
    pub fn set_fallback_policy(&self, policy: &str) -> Result<(), ConfigError> {
        let policy: FallbackPolicy = policy.parse()?;
        self.inner.write().fallback_policy = policy;
        Ok(())
    }
}
