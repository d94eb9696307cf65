//! Run configuration
//!
//! `StageContext` is the immutable per-run option set handed to every pipeline
//! stage. `ExtractorConfig` and `LlmConfig` cover the boundary resolver and the
//! chat oracle, and load from environment variables.

use std::collections::BTreeSet;
use std::env;
use thiserror::Error;
use url::Url;

use crate::trimmer::{TrimStrategy, DEFAULT_MAX_TOKENS};

/// Boilerplate regions removed when only the main content is wanted
pub const BOILERPLATE_SELECTORS: &[&str] = &[
    "header", "footer", "nav", "aside", ".header", ".top", ".navbar", "#header",
    ".footer", ".bottom", "#footer", ".sidebar", ".side", ".aside", "#sidebar",
    ".modal", ".popup", "#modal", ".overlay", ".ad", ".ads", ".advert", "#ad",
    ".lang-selector", ".language", "#language-selector", ".social", ".social-media",
    ".social-links", "#social", ".menu", ".navigation", "#nav", ".breadcrumbs",
    "#breadcrumbs", "#search-form", ".search", "#search", ".share", "#share",
    ".widget", "#widget", ".cookie", "#cookie",
];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("unsupported llm provider: {0}")]
    UnsupportedProvider(String),
}

/// Options every pipeline stage sees for one document
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Tag names (or selectors) always removed by the sanitizer
    pub exclude_tags: Vec<String>,
    /// Also strip the boilerplate catalog
    pub only_main_content: bool,
    /// Selectors removed when `only_main_content` is set
    pub extra_removals: Vec<String>,
    /// Opaque caller flags; `skip:<stage>` disables a stage
    pub feature_flags: BTreeSet<String>,
    /// Page URL used to resolve relative links
    pub base_url: Option<Url>,
}

impl Default for StageContext {
    fn default() -> Self {
        Self {
            exclude_tags: Vec::new(),
            only_main_content: false,
            extra_removals: BOILERPLATE_SELECTORS.iter().map(|s| s.to_string()).collect(),
            feature_flags: BTreeSet::new(),
            base_url: None,
        }
    }
}

impl StageContext {
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.feature_flags.contains(flag)
    }

    pub fn skips_stage(&self, stage: &str) -> bool {
        self.has_flag(&format!("skip:{}", stage))
    }
}

/// Settings for a whole extraction run
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_tokens: usize,
    pub trim_strategy: TrimStrategy,
    pub only_main_content: bool,
    pub exclude_tags: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            trim_strategy: TrimStrategy::Tail,
            only_main_content: false,
            exclude_tags: Vec::new(),
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_tokens = match lookup("MC_MAX_TOKENS") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "MC_MAX_TOKENS",
                value: v.clone(),
            })?,
            None => defaults.max_tokens,
        };

        let trim_strategy = match lookup("MC_TRIM_STRATEGY") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                key: "MC_TRIM_STRATEGY",
                value: v.clone(),
            })?,
            None => defaults.trim_strategy,
        };

        let only_main_content = lookup("MC_ONLY_MAIN_CONTENT")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.only_main_content);

        let exclude_tags = lookup("MC_EXCLUDE_TAGS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            max_tokens,
            trim_strategy,
            only_main_content,
            exclude_tags,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "MC_MAX_TOKENS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Stage options for one page
    pub fn stage_context(&self, base_url: Option<Url>) -> StageContext {
        StageContext {
            exclude_tags: self.exclude_tags.clone(),
            only_main_content: self.only_main_content,
            base_url,
            ..StageContext::default()
        }
    }
}

pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Chat model settings for the selector oracle
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub model: String,
    pub provider: String,
    pub api_key: String,
    pub temperature: f32,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let temperature = match lookup("LLM_TEMPERATURE") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "LLM_TEMPERATURE",
                value: v.clone(),
            })?,
            None => 0.0,
        };

        let timeout_secs = match lookup("LLM_TIMEOUT_SECS") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "LLM_TIMEOUT_SECS",
                value: v.clone(),
            })?,
            None => 120,
        };

        let config = Self {
            model: lookup("LLM_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            provider: lookup("LLM_PROVIDER").unwrap_or_else(|| "openai".to_string()),
            api_key: lookup("OPENAI_API_KEY").unwrap_or_default(),
            temperature,
            endpoint: lookup("LLM_ENDPOINT").unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string()),
            timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }
        if self.provider != "openai" {
            return Err(ConfigError::UnsupportedProvider(self.provider.clone()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                key: "LLM_TEMPERATURE",
                value: self.temperature.to_string(),
            });
        }
        Ok(())
    }
}
