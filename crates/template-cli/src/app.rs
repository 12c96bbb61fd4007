//! Application context for the tmplctl CLI.
//!
//! Bundles the parsed CLI arguments with the lazily-loaded config file and
//! wires core components from it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use once_cell::unsync::OnceCell;
use tracing::info_span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use template_core::ingest::{ProofIngester, ScanIngester, ValidationPipeline};
use template_core::proofing::{ProofPoller, ProofRequestQueue};
use template_core::{
    LocalLetterFiles, SqliteTemplateStore, TemplateRepository, TemplateService, User,
};

use crate::cli::Cli;
use crate::config::{default_config_path, read_config, TmplctlConfig};
use crate::constants::DEFAULT_LOG_FILTER;
use crate::errors::CliError;

/// Application context that bundles CLI args with configuration.
pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<TmplctlConfig>,
    repository: OnceCell<Arc<TemplateRepository>>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
            repository: OnceCell::new(),
        }
    }

    pub fn cli(&self) -> &Cli {
        self.cli
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    pub fn json(&self) -> bool {
        self.cli.json
    }

    /// Get the config, loading it on first use.
    pub fn config(&self) -> anyhow::Result<&TmplctlConfig> {
        self.config.get_or_try_init(|| {
            let path = resolve_config_path()?;
            if !path.exists() {
                return Err(CliError::NotFound {
                    message: missing_config_message(&path),
                    hint: "Hint: Run `tmplctl init` to create one.".to_string(),
                }
                .into());
            }
            read_config(&path)
        })
    }

    /// Log filter from the config file, if one can be read.
    pub fn log_filter(&self) -> Option<String> {
        self.config()
            .ok()
            .and_then(|config| config.logging.filter.clone())
    }

    /// The acting user from `--client` and `--user`.
    pub fn user(&self) -> anyhow::Result<User> {
        let client = self.cli.client.as_deref().filter(|v| !v.trim().is_empty());
        let user = self.cli.user.as_deref().filter(|v| !v.trim().is_empty());
        match (client, user) {
            (Some(client), Some(user)) => Ok(User::new(client, user)),
            (None, _) => Err(CliError::invalid_input(
                "No client given. Use --client or set TMPLCTL_CLIENT_ID.",
            )
            .into()),
            (_, None) => Err(CliError::invalid_input(
                "No user given. Use --user or set TMPLCTL_USER_ID.",
            )
            .into()),
        }
    }

    pub fn repository(&self) -> anyhow::Result<Arc<TemplateRepository>> {
        self.repository
            .get_or_try_init(|| {
                let config = self.config()?;
                let store = SqliteTemplateStore::open(Path::new(&config.store.path))?;
                let repository =
                    TemplateRepository::new(Arc::new(store), info_span!("template_repository"))
                        .with_deleted_ttl(Duration::days(config.lifecycle.deleted_ttl_days));
                Ok(Arc::new(repository))
            })
            .cloned()
    }

    fn letter_files(&self) -> anyhow::Result<Arc<LocalLetterFiles>> {
        let config = self.config()?;
        Ok(Arc::new(LocalLetterFiles::new(
            &config.files.uploads,
            info_span!("letter_files"),
        )))
    }

    pub fn proof_requests(&self) -> anyhow::Result<ProofRequestQueue> {
        let config = self.config()?;
        Ok(ProofRequestQueue::new(
            &config.files.proof_requests,
            info_span!("proof_requests"),
        ))
    }

    pub fn service(&self) -> anyhow::Result<TemplateService> {
        let config = self.config()?;
        Ok(TemplateService::new(
            self.repository()?,
            self.letter_files()?,
            Arc::new(config.client_config()),
            Arc::new(self.proof_requests()?),
            config.proofing.default_supplier.clone(),
            info_span!("template_service"),
        ))
    }

    pub fn scan_ingester(&self) -> anyhow::Result<ScanIngester> {
        let repository = self.repository()?;
        let pipeline = ValidationPipeline::new(
            repository.clone(),
            self.letter_files()?,
            info_span!("validation_pipeline"),
        );
        Ok(ScanIngester::new(
            repository,
            Arc::new(pipeline),
            info_span!("scan_ingester"),
        ))
    }

    pub fn proof_ingester(&self) -> anyhow::Result<ProofIngester> {
        Ok(ProofIngester::new(
            self.repository()?,
            info_span!("proof_ingester"),
        ))
    }

    pub fn proof_poller(&self) -> anyhow::Result<ProofPoller> {
        let config = self.config()?;
        Ok(ProofPoller::new(
            &config.proofing.inbox,
            &config.files.proof_archive,
            config.proofing.suppliers.clone(),
            info_span!("proof_poller"),
        ))
    }
}

/// Resolve the config file path, checking TMPLCTL_CONFIG env var first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("TMPLCTL_CONFIG") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Error message when the config file is missing.
pub fn missing_config_message(config_path: &Path) -> String {
    format!(
        "No config found at {}\n\nRun:\n  tmplctl init\n\nOr point at an existing config:\n  TMPLCTL_CONFIG=/path/to/config.toml tmplctl list",
        config_path.display()
    )
}

/// Install the stderr log subscriber. `RUST_LOG` wins over the config filter.
pub fn init_logging(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(config_filter.unwrap_or(DEFAULT_LOG_FILTER))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    });
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
