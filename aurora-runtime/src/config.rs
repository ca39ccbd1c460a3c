//! Service configuration
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. Every field has a default, so an empty file (or no file)
//! yields a working local setup.

use aurora_core::{
    CacheTtls, FranchiseTable, DEFAULT_DESCRIPTOR_TTL_SECS, DEFAULT_MAX_ENTRIES,
    DEFAULT_RATING_TTL_SECS, DEFAULT_RECORD_TTL_SECS, DEFAULT_SEARCH_TTL_SECS,
};
use aurora_net::{
    HttpConfig, DEFAULT_DOUBAN_BASE_URL, DEFAULT_SEARCH_LIMIT, DEFAULT_TIMEOUT_SECS,
    DEFAULT_TMDB_BASE_URL,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Placeholder written instead of secrets when dumping the config
const REDACTED: &str = "<redacted>";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AuroraConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub tmdb: TmdbConfig,

    #[serde(default)]
    pub douban: DoubanConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub http: HttpSettings,

    /// Extra franchise entries appended to the built-in tables
    #[serde(default)]
    pub franchises: FranchiseTable,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// bitmagnet base URL (GraphQL endpoint is `{url}/graphql`)
    #[serde(default = "default_upstream_url")]
    pub url: String,

    /// Results requested per search term
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_upstream_url() -> String {
    "http://localhost:3333".to_string()
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            search_limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// Descriptor lookups are disabled while empty
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_tmdb_base_url")]
    pub base_url: String,

    /// Localized language, tried first
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,

    #[serde(default = "default_true")]
    pub support_tv: bool,
}

fn default_tmdb_base_url() -> String {
    DEFAULT_TMDB_BASE_URL.to_string()
}

fn default_language() -> String {
    "zh-CN".to_string()
}

fn default_fallback_language() -> String {
    "en-US".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_tmdb_base_url(),
            language: default_language(),
            fallback_language: default_fallback_language(),
            support_tv: true,
        }
    }
}

impl TmdbConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Lookup languages in priority order, without duplicates
    pub fn languages(&self) -> Vec<String> {
        let mut languages = vec![self.language.clone()];
        if self.fallback_language != self.language {
            languages.push(self.fallback_language.clone());
        }
        languages.retain(|l| !l.trim().is_empty());
        languages
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DoubanConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_douban_base_url")]
    pub base_url: String,
}

fn default_douban_base_url() -> String {
    DEFAULT_DOUBAN_BASE_URL.to_string()
}

impl Default for DoubanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_douban_base_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_descriptor_ttl")]
    pub descriptor_ttl_secs: u64,

    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,

    #[serde(default = "default_record_ttl")]
    pub record_ttl_secs: u64,

    #[serde(default = "default_rating_ttl")]
    pub rating_ttl_secs: u64,

    /// Bound per cache domain
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_descriptor_ttl() -> u64 {
    DEFAULT_DESCRIPTOR_TTL_SECS
}

fn default_search_ttl() -> u64 {
    DEFAULT_SEARCH_TTL_SECS
}

fn default_record_ttl() -> u64 {
    DEFAULT_RECORD_TTL_SECS
}

fn default_rating_ttl() -> u64 {
    DEFAULT_RATING_TTL_SECS
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            descriptor_ttl_secs: default_descriptor_ttl(),
            search_ttl_secs: default_search_ttl(),
            record_ttl_secs: default_record_ttl(),
            rating_ttl_secs: default_rating_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            descriptors: Duration::from_secs(self.descriptor_ttl_secs),
            searches: Duration::from_secs(self.search_ttl_secs),
            records: Duration::from_secs(self.record_ttl_secs),
            ratings: Duration::from_secs(self.rating_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HttpSettings {
    /// Timeout for every external call
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout for the rating details follow-up
    #[serde(default = "default_augment_timeout")]
    pub augment_timeout_secs: u64,

    /// Fixed user agent instead of a random browser agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_augment_timeout() -> u64 {
    3
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            augment_timeout_secs: default_augment_timeout(),
            user_agent: None,
        }
    }
}

/// Bounds applied to every external call timeout
const MIN_TIMEOUT_SECS: u64 = 3;
const MAX_TIMEOUT_SECS: u64 = 5;

fn bounded(name: &str, value: u64, min: u64, max: u64) -> u64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!("{} = {} out of range, using {}", name, value, clamped);
    }
    clamped
}

impl HttpSettings {
    /// Main timeout, kept within 3..=5 seconds
    pub fn effective_timeout_secs(&self) -> u64 {
        bounded("http.timeout_secs", self.timeout_secs, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
    }

    /// Augmentation timeout, never longer than the main timeout
    pub fn effective_augment_timeout_secs(&self) -> u64 {
        bounded(
            "http.augment_timeout_secs",
            self.augment_timeout_secs,
            MIN_TIMEOUT_SECS,
            self.effective_timeout_secs(),
        )
    }

    pub fn client_config(&self) -> HttpConfig {
        let config = HttpConfig::default().with_timeout(self.effective_timeout_secs());
        match &self.user_agent {
            Some(ua) => config.with_user_agent(ua),
            None => config,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.effective_timeout_secs())
    }

    pub fn augment_timeout(&self) -> Duration {
        Duration::from_secs(self.effective_augment_timeout_secs())
    }
}

impl AuroraConfig {
    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File (when given) or defaults, then process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Unparsable numeric values are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("BITMAGNET_URL") {
            self.upstream.url = url;
        }
        if let Some(key) = var("TMDB_API_KEY") {
            self.tmdb.api_key = key;
        }
        if let Some(language) = var("TMDB_LANGUAGE") {
            self.tmdb.language = language;
        }

        override_parsed(&var, "REQUEST_TIMEOUT_SECS", &mut self.http.timeout_secs);
        override_parsed(&var, "TMDB_CACHE_TTL", &mut self.cache.descriptor_ttl_secs);
        override_parsed(&var, "GRAPHQL_CACHE_TTL", &mut self.cache.search_ttl_secs);
        override_parsed(&var, "DETAILS_CACHE_TTL", &mut self.cache.record_ttl_secs);
        override_parsed(&var, "DOUBAN_CACHE_TTL", &mut self.cache.rating_ttl_secs);
        override_parsed(&var, "CACHE_MAX_ENTRIES", &mut self.cache.max_entries);
    }

    /// Built-in franchise tables plus configured extras
    pub fn franchise_table(&self) -> FranchiseTable {
        let mut table = FranchiseTable::builtin();
        table.extend(self.franchises.clone());
        table
    }

    /// Effective configuration as TOML with secrets redacted
    pub fn to_redacted_toml(&self) -> Result<String, toml::ser::Error> {
        let mut redacted = self.clone();
        if redacted.tmdb.is_configured() {
            redacted.tmdb.api_key = REDACTED.to_string();
        }
        toml::to_string_pretty(&redacted)
    }
}

fn override_parsed<T, V>(var: &V, name: &str, target: &mut T)
where
    T: FromStr,
    V: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => {
            debug!("Config override from {}", name);
            *target = value;
        }
        Err(_) => warn!("Ignoring {}={:?}: not a number", name, raw),
    }
}
