use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Project-relative location of the config file.
pub const PROJECT_CONFIG_PATH: &str = ".docket/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocketConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub types: TypesConfig,
    #[serde(default)]
    pub save: SaveConfig,
    /// Preferred CLI output mode: `pretty`, `text` or `json`.
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
            token: None,
        }
    }
}

/// Document `type` tags used in the shared collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypesConfig {
    #[serde(default = "default_report_type")]
    pub report: String,
    #[serde(default = "default_audit_type")]
    pub audit: String,
}

impl Default for TypesConfig {
    fn default() -> Self {
        Self {
            report: default_report_type(),
            audit: default_audit_type(),
        }
    }
}

/// Whether the save pipeline may try an in-place update first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Try `PUT`, fall back to create + delete-old.
    #[default]
    Auto,
    /// Always create + delete-old (backend has no update support).
    Never,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveConfig {
    #[serde(default)]
    pub update_mode: UpdateMode,
    /// Also delete older duplicates of the key after a successful save.
    #[serde(default)]
    pub prune_superseded: bool,
}

/// Settings taken from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub store_url: Option<String>,
    pub token: Option<String>,
    pub format: Option<String>,
}

impl EnvOverrides {
    /// Read `DOCKET_STORE_URL`, `DOCKET_TOKEN` and `FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            store_url: non_empty("DOCKET_STORE_URL"),
            token: non_empty("DOCKET_TOKEN"),
            format: non_empty("FORMAT"),
        }
    }
}

/// Load a config file. A missing file yields `None`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<Option<DocketConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<DocketConfig>(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// `.docket/config.toml` under `project_root`.
#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_PATH)
}

/// `docket/config.toml` under the platform config directory.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("docket/config.toml"))
}

/// Resolve the effective configuration.
///
/// The first file found wins: an explicit path, then the project file, then
/// the user file, then built-in defaults. Environment overrides apply last.
///
/// # Errors
///
/// Returns an error if an explicit path does not exist, or if a config file
/// exists but cannot be read or parsed.
pub fn resolve_config(
    project_root: &Path,
    explicit: Option<&Path>,
    overrides: &EnvOverrides,
) -> Result<DocketConfig> {
    // Only the project and user files are optional.
    if let Some(path) = explicit
        && !path.exists()
    {
        anyhow::bail!("config file {} not found", path.display());
    }

    let candidates = explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(std::iter::once(project_config_path(project_root)))
        .chain(user_config_path());

    let mut config = None;
    for path in candidates {
        if let Some(found) = load_config_file(&path)? {
            tracing::debug!(path = %path.display(), "loaded config");
            config = Some(found);
            break;
        }
    }

    let mut config = config.unwrap_or_default();
    apply_overrides(&mut config, overrides);
    Ok(config)
}

fn apply_overrides(config: &mut DocketConfig, overrides: &EnvOverrides) {
    if let Some(url) = &overrides.store_url {
        config.store.base_url.clone_from(url);
    }
    if let Some(token) = &overrides.token {
        config.store.token = Some(token.clone());
    }
    if let Some(format) = &overrides.format {
        config.output = Some(format.clone());
    }
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_collection() -> String {
    "reports".to_string()
}

const fn default_timeout_secs() -> u64 {
    15
}

fn default_report_type() -> String {
    "daily-report".to_string()
}

fn default_audit_type() -> String {
    "daily-report-changes".to_string()
}
