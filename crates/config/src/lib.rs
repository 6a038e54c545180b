//! Layered configuration for golink.
//!
//! Sources are merged lowest to highest priority:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. `golink.toml` / `golink.yaml` in the platform config directory,
//! 3. an explicit file passed on the command line (format from extension),
//! 4. `GOLINK_*` environment variables, with `__` separating nested keys
//!    (`GOLINK_STORAGE__ROOT=/srv/public`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "GOLINK_";
const FALLBACK_DATA_DIR: &str = "/var/lib/golink";

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Dev,
    Prod,
}
impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Absolute directory that pulled and published content is served from.
    pub root: PathBuf,
}

/// A named place content can be fetched from.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OriginConfig {
    pub root: PathBuf,
    /// Whether missing local content may be pulled back from this origin on
    /// request. Non-pullable origins are only used at publish time.
    #[serde(default)]
    pub pullable: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifyConfig {
    /// Notifications are written to the log only.
    #[default]
    Log,
    /// Notifications are piped to a sendmail-compatible binary.
    Sendmail {
        from: String,
        /// Located on `$PATH` when omitted.
        #[serde(default)]
        binary: Option<PathBuf>,
    },
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Seconds a record may sit in an in-progress state before it is failed.
    pub stale_after: u64,
    /// Seconds between reconciliation passes while serving.
    pub interval: u64,
}
impl ReconcileConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}
impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { stale_after: 6 * 60 * 60, interval: 5 * 60 }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    pub listen: SocketAddr,
    #[serde(default)]
    pub mode: RunMode,
    pub database: PathBuf,
    pub storage: StorageConfig,
    #[serde(default)]
    pub origins: BTreeMap<String, OriginConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}
impl Default for Config {
    fn default() -> Self {
        let data_dir = Self::project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR));
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
            mode: RunMode::default(),
            database: data_dir.join("golink.sqlite"),
            storage: StorageConfig { root: data_dir.join("public") },
            origins: BTreeMap::new(),
            notify: NotifyConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl Config {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "golink")
    }

    /// Load configuration from every source, highest priority last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Self::base();
        if let Some(dirs) = Self::project_dirs() {
            let dir = dirs.config_dir();
            tracing::debug!(dir = %dir.display(), "Looking for configuration files");
            figment = figment.merge(Toml::file(dir.join("golink.toml"))).merge(Yaml::file(dir.join("golink.yaml")));
        }
        if let Some(path) = explicit {
            figment = Self::merge_file(figment, path)?;
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Defaults plus a single file; no platform directories or environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::extract(Self::merge_file(Self::base(), path)?)
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
        if !path.is_file() {
            exn::bail!(ErrorKind::Invalid(format!("configuration file {} does not exist", path.display())));
        }
        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::Invalid(format!("unsupported configuration format: {}", path.display()))),
        };
        Ok(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the things serde can't.
    pub fn validate(&self) -> Result<()> {
        if !self.storage.root.is_absolute() {
            exn::bail!(ErrorKind::Invalid("storage.root must be an absolute path".to_string()));
        }
        if self.origins.is_empty() {
            exn::bail!(ErrorKind::Invalid("at least one origin must be configured".to_string()));
        }
        for (name, origin) in &self.origins {
            if name.is_empty() {
                exn::bail!(ErrorKind::Invalid("origin names must not be empty".to_string()));
            }
            if !origin.root.is_absolute() {
                exn::bail!(ErrorKind::Invalid(format!("origins.{name}.root must be an absolute path")));
            }
        }
        if self.reconcile.stale_after == 0 || self.reconcile.interval == 0 {
            exn::bail!(ErrorKind::Invalid("reconcile intervals must be greater than zero".to_string()));
        }
        if let NotifyConfig::Sendmail { from, .. } = &self.notify
            && from.trim().is_empty()
        {
            exn::bail!(ErrorKind::Invalid("notify.from must not be empty".to_string()));
        }
        Ok(())
    }
}
