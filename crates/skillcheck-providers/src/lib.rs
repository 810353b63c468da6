//! skillcheck-providers: text-generation backends and configuration.
//!
//! Implements the `TextGenerator` trait for OpenAI-compatible endpoints
//! (OpenAI, Groq) and Anthropic, plus offline providers for tests and
//! disabled deployments.

pub mod anthropic;
pub mod config;
pub mod error;
pub mod mock;
pub mod openai;

pub use config::{
    create_provider, load_config, load_config_from, ProviderConfig, SkillcheckConfig,
};
pub use error::ProviderError;
