use std::path::Path;

use template_core::SqliteTemplateStore;

use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{default_data_dir, write_config, ClientSection, TmplctlConfig};
use crate::errors::CliError;

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = resolve_config_path()?;
    if config_path.exists() && !args.force {
        return Err(CliError::invalid_input(format!(
            "Config already exists at {}\nHint: Use --force to overwrite it.",
            config_path.display()
        ))
        .into());
    }

    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    let mut config = TmplctlConfig::new(&data_dir);

    match ctx.cli().client.as_deref() {
        Some(client) => {
            config.clients.insert(
                client.to_string(),
                ClientSection {
                    campaign_ids: args.campaigns.clone(),
                    proofing: args.proofing,
                },
            );
        }
        None if !args.campaigns.is_empty() || args.proofing => {
            return Err(CliError::invalid_input("--campaign and --proofing require --client").into());
        }
        None => {}
    }

    let mut dirs = vec![
        config.files.uploads.clone(),
        config.files.proof_archive.clone(),
        config.files.proof_requests.clone(),
    ];
    for supplier in &config.proofing.suppliers {
        dirs.push(
            Path::new(&config.proofing.inbox)
                .join(supplier)
                .join("proofs")
                .to_string_lossy()
                .to_string(),
        );
    }
    for dir in &dirs {
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow::anyhow!("Failed to create directory {}: {}", dir, e))?;
    }

    SqliteTemplateStore::open(Path::new(&config.store.path))?;
    write_config(&config_path, &config)?;

    if !ctx.quiet() {
        println!("Initialized template store at {}", config.store.path);
        println!("Config written to {}", config_path.display());
    }
    Ok(())
}
