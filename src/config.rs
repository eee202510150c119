//! Layered application configuration: built-in defaults, an optional YAML
//! file, then CLI flags/environment variables, in that order.
//!
//! Grounded on `src/app_config.rs`'s `ConfigBuilder` layering (defaults,
//! then an explicit `--config-file`) and `bins/server/src/main.rs`'s use of
//! `directories::ProjectDirs` to locate the default config directory.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::ArgMatches;
use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Idle-timeout-before-abort default (§4.1/§4.3: "10 seconds").
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 10;

/// `Content-Length` upper bound default (§6: "200·2^20").
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

/// Port the HTTP surface is served on by default (§6).
const DEFAULT_HTTP_PORT: u16 = 27080;

#[derive(Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address(es) to bind the HTTP surface on.
    #[serde(default = "default_bind")]
    pub bind_http: Vec<SocketAddr>,

    /// Directory the blob store writes finished and in-flight blobs to.
    /// Must already exist (§6: "no auto-creation").
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Seconds of no byte progress before an in-flight upload is aborted.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Maximum accepted `Content-Length`, exclusive (§6).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// TLS port — a stated TODO in the specification (§6), not implemented.
    #[serde(default)]
    pub bind_https: Option<SocketAddr>,
}

fn default_bind() -> Vec<SocketAddr> {
    vec![SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT))]
}

fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./files")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_http: default_bind(),
            storage_dir: PathBuf::from("./files"),
            idle_timeout_secs: default_idle_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
            bind_https: None,
        }
    }
}

impl AppConfig {
    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_timeout_secs)
    }

    /// Loads configuration by layering, in increasing priority:
    /// 1. `<config_dir>/default.yml` / `default.yaml`, if present.
    /// 2. an explicit `--config-file`, if given.
    /// 3. CLI flags (`--bind`, `--storage-dir`, ...).
    pub fn load(config_dir: &Path, matches: &ArgMatches) -> Result<AppConfig, anyhow::Error> {
        let mut builder = ConfigBuilder::<DefaultState>::default();

        builder = builder
            .add_source(
                File::from(config_dir.join("default.yml"))
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                File::from(config_dir.join("default.yaml"))
                    .format(FileFormat::Yaml)
                    .required(false),
            );

        if let Some(path) = matches.get_one::<PathBuf>("config_file").cloned() {
            info!(config_path = ?path, "loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }

        let built = builder.build().map_err(|e| {
            error!(error = %e, "unable to load configuration");
            e
        })?;

        let mut config: AppConfig = built.try_deserialize().map_err(|e| {
            error!(error = %e, "unable to deserialize configuration");
            e
        })?;

        apply_cli_overrides(&mut config, matches);
        Ok(config)
    }
}

fn apply_cli_overrides(config: &mut AppConfig, matches: &ArgMatches) {
    if let Some(addrs) = matches.get_many::<SocketAddr>("bind_http") {
        let addrs: Vec<_> = addrs.cloned().collect();
        if !addrs.is_empty() {
            config.bind_http = addrs;
        }
    }

    if let Some(dir) = matches.get_one::<PathBuf>("storage_dir") {
        config.storage_dir = dir.clone();
    }

    if let Some(secs) = matches.get_one::<u64>("idle_timeout_secs") {
        config.idle_timeout_secs = *secs;
    }

    if let Some(bytes) = matches.get_one::<u64>("max_upload_bytes") {
        config.max_upload_bytes = *bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specification() {
        let config = AppConfig::default();
        assert_eq!(config.idle_timeout_secs, 10);
        assert_eq!(config.max_upload_bytes, 200 * 1024 * 1024);
        assert_eq!(config.bind_http[0].port(), 27080);
    }

    #[test]
    fn deserialize_from_yaml_works() {
        let yaml = r#"
            storage_dir: /var/lib/instant-share
            idle_timeout_secs: 15
        "#;
        let config: AppConfig = serde_yaml::from_str(yaml).expect("valid yaml");
        assert_eq!(config.storage_dir, PathBuf::from("/var/lib/instant-share"));
        assert_eq!(config.idle_timeout_secs, 15);
        assert_eq!(config.max_upload_bytes, 200 * 1024 * 1024);
    }
}
