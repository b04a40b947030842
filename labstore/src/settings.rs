use std::path::PathBuf;

use chrono::Duration;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{RecordKind, RouterOptions, SessionPolicy};

/// Name of the optional configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = "labstore.toml";
/// Prefix of the environment variables overriding the file, e.g.
/// `LABSTORE_ROUTER__RETRY_REMOTE_AFTER_SECS=30`.
pub const ENV_PREFIX: &str = "LABSTORE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Retry the remote store this long after a failed call, while the
    /// platform still reports connectivity. Unset means wait for the next
    /// online transition.
    pub retry_remote_after_secs: Option<u64>,
    pub session_policy: SessionPolicy,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            retry_remote_after_secs: None,
            session_policy: SessionPolicy::PreserveDuplicates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReplicationSettings {
    pub enabled: bool,
    pub kinds: Vec<RecordKind>,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kinds: RouterOptions::default().replicate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    pub data_dir: PathBuf,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("labstore-data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// An `EnvFilter` directive.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub router: RouterSettings,
    pub replication: ReplicationSettings,
    pub local: LocalSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads `labstore.toml` if present, then applies `LABSTORE_*` overrides.
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(
            File::with_name(CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
            environment(),
        )
    }

    /// Parses settings from TOML text, without environment overrides.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn load<F>(file: F, environment: Environment) -> Result<Self, ConfigError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    /// Router behaviour described by these settings.
    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            retry_remote_after: self
                .router
                .retry_remote_after_secs
                .and_then(|secs| i64::try_from(secs).ok())
                .map(Duration::seconds),
            session_policy: self.router.session_policy,
            replicate: if self.replication.enabled {
                self.replication.kinds.clone()
            } else {
                Vec::new()
            },
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("replication.kinds")
}
