//! Subcommand implementations and the plumbing they share.

pub mod batch;
pub mod grade;
pub mod init;
pub mod list_models;
pub mod quiz;
pub mod recommend;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;

use skillcheck_core::Gateway;
use skillcheck_providers::config::load_config_from;
use skillcheck_providers::{create_provider, SkillcheckConfig};

/// Options accepted by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub output: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn load_config(&self) -> Result<SkillcheckConfig> {
        load_config_from(self.config.as_deref())
    }

    /// Build the gateway for the selected provider and model.
    pub fn gateway(&self, config: &SkillcheckConfig) -> Result<Arc<Gateway>> {
        let provider_name = self
            .provider
            .as_deref()
            .unwrap_or(&config.default_provider);
        let model = self.model.as_deref().unwrap_or(&config.default_model);

        let Some(provider_config) = config.providers.get(provider_name) else {
            anyhow::bail!(
                "provider '{}' not found in config. Available: {:?}",
                provider_name,
                config.providers.keys().collect::<Vec<_>>()
            );
        };
        let provider = create_provider(provider_name, provider_config)?;
        tracing::info!(provider = provider_name, model, "using text generator");
        Ok(Arc::new(Gateway::new(provider, model)))
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Write `value` as pretty JSON to `output`, or to stdout when unset.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Results saved to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// A cancellation signal that fires on Ctrl-C.
pub fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, keeping finished work...");
            let _ = tx.send(true);
        }
    });
    rx
}

pub fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}
