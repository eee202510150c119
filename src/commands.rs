//! The CLI flag surface.
//!
//! Grounded on this same file's prior shape (the `--log` flag), extended
//! with the bind-address, storage-directory, and tuning flags this service
//! needs.

use crate::logging::LoggingStyle;
use clap::{Arg, ArgAction, Command};
use std::net::SocketAddr;
use std::path::PathBuf;

pub fn build_command() -> Command {
    Command::new("Instant Share")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Markus Mayer")
        .about("A self-hosted service for sharing clipboard artifacts by URL")
        .arg(
            Arg::new("bind_http")
                .long("bind")
                .env("APP_BIND_HTTP")
                .value_name("ADDR")
                .help("HTTP socket address to bind to (may be given multiple times)")
                .num_args(1)
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(SocketAddr))
                .help_heading("Networking"),
        )
        .arg(
            Arg::new("storage_dir")
                .long("storage-dir")
                .env("APP_STORAGE_DIR")
                .value_name("PATH")
                .help("Directory blobs are read from and written to; must already exist")
                .num_args(1)
                .value_parser(clap::value_parser!(PathBuf))
                .help_heading("Storage"),
        )
        .arg(
            Arg::new("idle_timeout_secs")
                .long("idle-timeout")
                .env("APP_IDLE_TIMEOUT_SECS")
                .value_name("SECONDS")
                .help("Seconds of no byte progress before an in-flight upload is aborted")
                .num_args(1)
                .value_parser(clap::value_parser!(u64))
                .help_heading("Storage"),
        )
        .arg(
            Arg::new("max_upload_bytes")
                .long("max-upload-bytes")
                .env("APP_MAX_UPLOAD_BYTES")
                .value_name("BYTES")
                .help("Maximum accepted Content-Length, exclusive")
                .num_args(1)
                .value_parser(clap::value_parser!(u64))
                .help_heading("Storage"),
        )
        .arg(
            Arg::new("config_file")
                .long("config-file")
                .env("APP_CONFIG_FILE")
                .value_name("PATH")
                .help("An additional YAML configuration file to load")
                .num_args(1)
                .value_parser(clap::value_parser!(PathBuf))
                .help_heading("Configuration"),
        )
        .arg(
            Arg::new("logging_style")
                .long("log")
                .env("APP_LOG_STYLE")
                .value_name("STYLE")
                .default_value("compact")
                .help("The logging style to use (compact, json)")
                .num_args(1)
                .value_parser(logging_style)
                .help_heading("Logging"),
        )
}

fn logging_style(s: &str) -> Result<LoggingStyle, String> {
    match s {
        "simple" | "compact" => Ok(LoggingStyle::Compact),
        "json" => Ok(LoggingStyle::Json),
        _ => Err(String::from("either compact or json must be specified")),
    }
}
