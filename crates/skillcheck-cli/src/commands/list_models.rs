//! The `skillcheck list-models` command.

use anyhow::Result;

use skillcheck_providers::create_provider;

use super::GlobalOptions;

pub fn execute(options: &GlobalOptions) -> Result<()> {
    let config = options.load_config()?;

    let mut found_any = false;

    for (name, provider_config) in &config.providers {
        if let Some(filter) = &options.provider {
            if name != filter {
                continue;
            }
        }

        let provider = match create_provider(name, provider_config) {
            Ok(provider) => provider,
            Err(e) => {
                eprintln!("Skipping {name}: {e:#}");
                continue;
            }
        };
        let models = provider.available_models();

        if !models.is_empty() {
            found_any = true;
            let marker = if *name == config.default_provider { " (default)" } else { "" };
            println!("Provider: {name}{marker}");
            for model in &models {
                println!(
                    "  {}  {} ({}K context)",
                    model.id,
                    model.name,
                    model.max_context / 1000,
                );
            }
            println!();
        }
    }

    if !found_any {
        println!("No models available. Run `skillcheck init` to create a config file.");
    }

    Ok(())
}
