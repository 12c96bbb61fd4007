use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use template_core::repository::DEFAULT_DELETED_TTL_DAYS;
use template_core::{ClientConfiguration, ClientFeatures, StaticClientConfig};

use crate::constants::{APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_LOG_FILTER, DEFAULT_SUPPLIER};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmplctlConfig {
    pub store: StoreSection,
    pub files: FilesSection,
    pub proofing: ProofingSection,
    #[serde(default)]
    pub lifecycle: LifecycleSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub clients: BTreeMap<String, ClientSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesSection {
    pub uploads: String,
    pub proof_archive: String,
    pub proof_requests: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofingSection {
    pub inbox: String,
    #[serde(default)]
    pub suppliers: Vec<String>,
    #[serde(default = "default_supplier")]
    pub default_supplier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSection {
    #[serde(default = "default_deleted_ttl_days")]
    pub deleted_ttl_days: i64,
}

impl Default for LifecycleSection {
    fn default() -> Self {
        Self {
            deleted_ttl_days: DEFAULT_DELETED_TTL_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingSection {
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientSection {
    #[serde(default)]
    pub campaign_ids: Vec<String>,
    #[serde(default)]
    pub proofing: bool,
}

fn default_supplier() -> String {
    DEFAULT_SUPPLIER.to_string()
}

fn default_deleted_ttl_days() -> i64 {
    DEFAULT_DELETED_TTL_DAYS
}

impl TmplctlConfig {
    /// Default layout with everything under `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        let path = |relative: &str| data_dir.join(relative).to_string_lossy().to_string();
        Self {
            store: StoreSection {
                path: path("templates.db"),
            },
            files: FilesSection {
                uploads: path("uploads"),
                proof_archive: path("proofs/archive"),
                proof_requests: path("proofs/requests"),
            },
            proofing: ProofingSection {
                inbox: path("proofs/inbox"),
                suppliers: vec![DEFAULT_SUPPLIER.to_string()],
                default_supplier: DEFAULT_SUPPLIER.to_string(),
            },
            lifecycle: LifecycleSection::default(),
            logging: LoggingSection {
                filter: Some(DEFAULT_LOG_FILTER.to_string()),
            },
            clients: BTreeMap::new(),
        }
    }

    /// Client configuration in the form the template service consumes.
    pub fn client_config(&self) -> StaticClientConfig {
        let clients: HashMap<String, ClientConfiguration> = self
            .clients
            .iter()
            .map(|(id, section)| {
                (
                    id.clone(),
                    ClientConfiguration {
                        campaign_ids: section.campaign_ids.clone(),
                        features: ClientFeatures {
                            proofing: section.proofing,
                        },
                    },
                )
            })
            .collect();
        StaticClientConfig::new(clients)
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join(CONFIG_FILE_NAME))
}

pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    xdg_data_dir()
}

pub fn read_config(path: &Path) -> anyhow::Result<TmplctlConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &TmplctlConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join(APP_DIR_NAME));
        }
    }
    Ok(home_dir()?.join(".config").join(APP_DIR_NAME))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join(APP_DIR_NAME));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join(APP_DIR_NAME))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = TmplctlConfig::new(Path::new("/data"));
        config.clients.insert(
            "client-a".to_string(),
            ClientSection {
                campaign_ids: vec!["campaign-1".to_string()],
                proofing: true,
            },
        );

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: TmplctlConfig = toml::from_str(&text).unwrap();

        assert_eq!(parsed.store.path, "/data/templates.db");
        assert_eq!(parsed.proofing.default_supplier, DEFAULT_SUPPLIER);
        assert!(parsed.clients["client-a"].proofing);
    }

    #[test]
    fn test_optional_sections_default() {
        let text = r#"
[store]
path = "/tmp/t.db"

[files]
uploads = "/tmp/u"
proof_archive = "/tmp/a"
proof_requests = "/tmp/r"

[proofing]
inbox = "/tmp/i"
"#;
        let parsed: TmplctlConfig = toml::from_str(text).unwrap();
        assert_eq!(parsed.lifecycle.deleted_ttl_days, DEFAULT_DELETED_TTL_DAYS);
        assert_eq!(parsed.proofing.default_supplier, DEFAULT_SUPPLIER);
        assert!(parsed.proofing.suppliers.is_empty());
        assert!(parsed.logging.filter.is_none());
        assert!(parsed.clients.is_empty());
    }
}
