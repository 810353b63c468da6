//! Configuration loading and the provider factory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use skillcheck_core::settings::{EngineSettings, Parallelism, RetryPolicy, Thresholds, Timeouts};
use skillcheck_core::traits::TextGenerator;

use crate::anthropic::AnthropicProvider;
use crate::mock::{DisabledProvider, MockProvider};
use crate::openai::{OpenAiProvider, GROQ_BASE_URL};

/// Configuration for a single text-generation provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Any OpenAI-compatible chat completions endpoint, Groq included.
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    /// Text generation switched off; every call degrades.
    Disabled,
    /// Canned responses keyed by prompt substring.
    Mock {
        #[serde(default)]
        responses: BTreeMap<String, String>,
        #[serde(default)]
        default_response: String,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
                timeout_secs,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .field("timeout_secs", timeout_secs)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
                timeout_secs,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("timeout_secs", timeout_secs)
                .finish(),
            ProviderConfig::Disabled => f.write_str("Disabled"),
            ProviderConfig::Mock { responses, .. } => f
                .debug_struct("Mock")
                .field("responses", &responses.len())
                .finish(),
        }
    }
}

/// Per-call gateway timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub grading_secs: u64,
    pub summary_secs: u64,
    pub quiz_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        let t = Timeouts::default();
        Self {
            grading_secs: t.grading.as_secs(),
            summary_secs: t.summary.as_secs(),
            quiz_secs: t.quiz.as_secs(),
        }
    }
}

/// Top-level skillcheck configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillcheckConfig {
    /// Default provider to use.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Default model to use.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Gateway attempts per generation, including the first.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds; doubles per retry.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Max concurrent submissions or quiz questions.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "groq".to_string()
}
fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}
fn default_retries() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    500
}
fn default_parallelism() -> usize {
    4
}

impl Default for SkillcheckConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_model(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            parallelism: default_parallelism(),
            timeouts: TimeoutConfig::default(),
            thresholds: Thresholds::default(),
            providers: BTreeMap::new(),
        }
    }
}

impl SkillcheckConfig {
    /// Engine settings derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        let initial_backoff = Duration::from_millis(self.retry_delay_ms);
        EngineSettings {
            thresholds: self.thresholds,
            timeouts: Timeouts {
                grading: Duration::from_secs(self.timeouts.grading_secs),
                summary: Duration::from_secs(self.timeouts.summary_secs),
                quiz: Duration::from_secs(self.timeouts.quiz_secs),
            },
            retry: RetryPolicy {
                max_attempts: self.max_retries.max(1),
                initial_backoff,
                max_backoff: RetryPolicy::default().max_backoff.max(initial_backoff),
            },
            parallelism: Parallelism::new(self.parallelism),
        }
    }

    /// Reject threshold sets that would make the bands overlap or invert.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("mastered_from", t.mastered_from),
            ("developing_from", t.developing_from),
            ("skill_building_from", t.skill_building_from),
            ("advancement_from", t.advancement_from),
            ("trend_delta", t.trend_delta),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("thresholds.{name} must be within [0, 1], got {value}");
            }
        }
        if t.developing_from > t.mastered_from {
            anyhow::bail!("thresholds.developing_from must not exceed thresholds.mastered_from");
        }
        if t.skill_building_from > t.advancement_from {
            anyhow::bail!(
                "thresholds.skill_building_from must not exceed thresholds.advancement_from"
            );
        }
        if t.trend_delta <= 0.0 {
            anyhow::bail!("thresholds.trend_delta must be positive");
        }
        if self.timeouts.grading_secs == 0
            || self.timeouts.summary_secs == 0
            || self.timeouts.quiz_secs == 0
        {
            anyhow::bail!("timeouts must be at least one second");
        }
        Ok(())
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Unset variables resolve to the empty string; substituted values are not
/// scanned again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

/// Resolve env vars in a provider config.
fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    let resolve_opt = |o: &Option<String>| o.as_deref().map(resolve_env_vars);
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
            timeout_secs,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
            org_id: resolve_opt(org_id),
            timeout_secs: *timeout_secs,
        },
        ProviderConfig::Anthropic {
            api_key,
            base_url,
            timeout_secs,
        } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
            timeout_secs: *timeout_secs,
        },
        other => other.clone(),
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `skillcheck.toml` in the current directory
/// 2. `~/.config/skillcheck/config.toml`
///
/// Environment variable overrides: `SKILLCHECK_GROQ_KEY`,
/// `SKILLCHECK_OPENAI_KEY`, `SKILLCHECK_ANTHROPIC_KEY`.
pub fn load_config() -> Result<SkillcheckConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SkillcheckConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("skillcheck.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<SkillcheckConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => SkillcheckConfig::default(),
    };
    tracing::debug!(path = ?config_path, "configuration loaded");

    apply_key_override(&mut config, "groq", "SKILLCHECK_GROQ_KEY");
    apply_key_override(&mut config, "openai", "SKILLCHECK_OPENAI_KEY");
    apply_key_override(&mut config, "anthropic", "SKILLCHECK_ANTHROPIC_KEY");

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();
    config.validate()?;

    Ok(config)
}

/// Set the API key of provider `name` from `var`, creating the provider
/// entry with its stock endpoint when it is not configured.
fn apply_key_override(config: &mut SkillcheckConfig, name: &str, var: &str) {
    let Ok(key) = std::env::var(var) else {
        return;
    };
    let entry = config.providers.entry(name.to_string()).or_insert_with(|| match name {
        "anthropic" => ProviderConfig::Anthropic {
            api_key: String::new(),
            base_url: None,
            timeout_secs: None,
        },
        _ => ProviderConfig::OpenAI {
            api_key: String::new(),
            base_url: (name == "groq").then(|| GROQ_BASE_URL.to_string()),
            org_id: None,
            timeout_secs: None,
        },
    });
    match entry {
        ProviderConfig::OpenAI { api_key, .. } | ProviderConfig::Anthropic { api_key, .. } => {
            *api_key = key;
        }
        _ => tracing::warn!(provider = name, "{var} set but provider takes no API key"),
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("skillcheck"))
}

/// Create a provider instance from its configuration.
pub fn create_provider(name: &str, config: &ProviderConfig) -> Result<Arc<dyn TextGenerator>> {
    let require_key = |api_key: &str| -> Result<()> {
        if api_key.trim().is_empty() {
            anyhow::bail!("provider '{name}' has no API key configured");
        }
        Ok(())
    };
    match config {
        ProviderConfig::Anthropic {
            api_key,
            base_url,
            timeout_secs,
        } => {
            require_key(api_key)?;
            Ok(Arc::new(AnthropicProvider::new(
                api_key,
                base_url.clone(),
                *timeout_secs,
            )?))
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
            timeout_secs,
        } => {
            require_key(api_key)?;
            Ok(Arc::new(
                OpenAiProvider::new(api_key, base_url.clone(), org_id.clone(), *timeout_secs)?
                    .with_name(name),
            ))
        }
        ProviderConfig::Disabled => Ok(Arc::new(DisabledProvider)),
        ProviderConfig::Mock {
            responses,
            default_response,
        } => Ok(Arc::new(MockProvider::new(
            responses.clone(),
            default_response,
        ))),
    }
}

/// Starter configuration written by `skillcheck init`.
pub const SAMPLE_CONFIG: &str = r#"# skillcheck configuration

default_provider = "groq"
default_model = "llama-3.1-8b-instant"
max_retries = 2
retry_delay_ms = 500
parallelism = 4

[timeouts]
grading_secs = 45
summary_secs = 30
quiz_secs = 60

[thresholds]
mastered_from = 0.8
developing_from = 0.5
skill_building_from = 0.5
advancement_from = 0.75
trend_delta = 0.05

[providers.groq]
type = "openai"
base_url = "https://api.groq.com/openai"
api_key = "${GROQ_API_KEY}"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

# Grade with keyword fallback only, without calling any model.
[providers.offline]
type = "disabled"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_SKILLCHECK_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_SKILLCHECK_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_SKILLCHECK_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${_SKILLCHECK_UNSET_VAR}"), "");
        assert_eq!(resolve_env_vars("no ${closing"), "no ${closing");
        std::env::remove_var("_SKILLCHECK_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = SkillcheckConfig::default();
        assert_eq!(config.default_provider, "groq");
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.max_retries, 2);
        let settings = config.engine_settings();
        assert_eq!(settings.timeouts.grading, Duration::from_secs(45));
        assert_eq!(settings.retry.max_attempts, 2);
    }

    #[test]
    fn sample_config_parses_and_validates() {
        let config: SkillcheckConfig = toml::from_str(SAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.providers.len(), 3);
        assert!(matches!(
            config.providers.get("offline"),
            Some(ProviderConfig::Disabled)
        ));
        assert_eq!(config.thresholds, Thresholds::default());
    }

    #[test]
    fn parse_provider_config() {
        let toml_str = r#"
default_provider = "local"
parallelism = 0

[thresholds]
advancement_from = 0.7

[providers.local]
type = "mock"
default_response = "Nice."

[providers.local.responses]
"Grade this" = '{"score_percentage": 50}'

[providers.openai]
type = "openai"
api_key = "sk-openai"
"#;
        let config: SkillcheckConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_provider, "local");
        assert_eq!(config.thresholds.advancement_from, 0.7);
        assert_eq!(config.thresholds.skill_building_from, 0.5);
        assert_eq!(config.engine_settings().parallelism.get(), 1);
        match config.providers.get("local") {
            Some(ProviderConfig::Mock { responses, .. }) => assert_eq!(responses.len(), 1),
            other => panic!("expected mock provider, got {other:?}"),
        }
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut config = SkillcheckConfig::default();
        config.thresholds.skill_building_from = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn api_keys_are_masked_in_debug() {
        let config = ProviderConfig::OpenAI {
            api_key: "sk-secret".into(),
            base_url: None,
            org_id: None,
            timeout_secs: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn missing_key_is_an_error() {
        let config = ProviderConfig::Anthropic {
            api_key: String::new(),
            base_url: None,
            timeout_secs: None,
        };
        let err = create_provider("anthropic", &config).err().unwrap();
        assert!(err.to_string().contains("no API key"));
        assert_eq!(
            create_provider("off", &ProviderConfig::Disabled).unwrap().name(),
            "disabled"
        );
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skillcheck.toml");
        std::fs::write(&path, "default_provider = \"off\"\n[providers.off]\ntype = \"disabled\"\n")
            .unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.default_provider, "off");
        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
