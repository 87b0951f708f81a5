//! Configuration for docket.
//!
//! Settings live in a TOML file at `~/.config/docket/config.toml` and are
//! resolved with the chain: env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::metadata::DEFAULT_NAMESPACE;
use crate::plan::store::{DEFAULT_OBJECTIVE_LABEL, DEFAULT_PLAN_LABEL};
use crate::tracker::RepoLocation;

pub const NAMESPACE_ENV: &str = "DOCKET_NAMESPACE";
pub const PLAN_LABEL_ENV: &str = "DOCKET_PLAN_LABEL";
pub const OBJECTIVE_LABEL_ENV: &str = "DOCKET_OBJECTIVE_LABEL";
pub const REPO_ENV: &str = "DOCKET_REPO";
pub const EVENTS_DIR_ENV: &str = "DOCKET_EVENTS_DIR";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub events: EventsSection,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSection {
    /// `owner/name` of the repository holding plan issues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Marker namespace, e.g. `docket` in `<!-- docket:metadata-block:... -->`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_label: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the docket config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/docket` or `~/.config/docket`,
/// never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("docket");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("docket")
}

/// Return the path to the docket config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default JSONL event log directory: `$XDG_DATA_HOME/docket/events` or
/// `~/.local/share/docket/events`.
fn default_events_dir(env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    let base = match env("XDG_DATA_HOME") {
        Some(xdg) => PathBuf::from(xdg),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share"),
    };
    base.join("docket").join("events")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse a config file.
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write a config file, creating parent dirs as needed.
pub fn save_config_file(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocketConfig {
    pub namespace: String,
    pub plan_label: String,
    pub objective_label: String,
    pub repo: Option<RepoLocation>,
    pub events_dir: PathBuf,
}

impl Default for DocketConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            plan_label: DEFAULT_PLAN_LABEL.to_owned(),
            objective_label: DEFAULT_OBJECTIVE_LABEL.to_owned(),
            repo: None,
            events_dir: default_events_dir(&|key: &str| std::env::var(key).ok()),
        }
    }
}

impl DocketConfig {
    /// Resolve from the process environment and the config file at
    /// [`config_path`]. A missing file is not an error; an unreadable or
    /// malformed one is.
    pub fn resolve() -> Result<Self> {
        let path = config_path();
        let file = if path.exists() {
            Some(load_config_file(&path)?)
        } else {
            None
        };
        Self::resolve_with(|key| std::env::var(key).ok(), file.as_ref())
    }

    /// Resolve using the chain: `env` > `file` > default.
    pub fn resolve_with(
        env: impl Fn(&str) -> Option<String>,
        file: Option<&ConfigFile>,
    ) -> Result<Self> {
        let tracker = file.map(|f| &f.tracker);
        let pick = |var: &str, from_file: Option<&String>, default: &str| -> String {
            env(var)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| from_file.cloned())
                .unwrap_or_else(|| default.to_owned())
        };

        let namespace = pick(
            NAMESPACE_ENV,
            tracker.and_then(|t| t.namespace.as_ref()),
            DEFAULT_NAMESPACE,
        );
        if !is_valid_namespace(&namespace) {
            bail!(
                "invalid marker namespace {namespace:?}: use lowercase letters, digits, '-' or '_'"
            );
        }

        let plan_label = pick(
            PLAN_LABEL_ENV,
            tracker.and_then(|t| t.plan_label.as_ref()),
            DEFAULT_PLAN_LABEL,
        );
        let objective_label = pick(
            OBJECTIVE_LABEL_ENV,
            tracker.and_then(|t| t.objective_label.as_ref()),
            DEFAULT_OBJECTIVE_LABEL,
        );

        let repo = if let Some(raw) = env(REPO_ENV) {
            Some(
                raw.parse::<RepoLocation>()
                    .with_context(|| format!("{REPO_ENV} env var is not owner/name"))?,
            )
        } else if let Some(raw) = tracker.and_then(|t| t.repo.as_ref()) {
            Some(
                raw.parse::<RepoLocation>()
                    .context("invalid tracker.repo in config file")?,
            )
        } else {
            None
        };

        let events_dir = if let Some(dir) = env(EVENTS_DIR_ENV) {
            PathBuf::from(dir)
        } else if let Some(dir) = file.and_then(|f| f.events.dir.clone()) {
            dir
        } else {
            default_events_dir(&env)
        };

        Ok(Self {
            namespace,
            plan_label,
            objective_label,
            repo,
            events_dir,
        })
    }
}

fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
