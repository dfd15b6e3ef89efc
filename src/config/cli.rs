use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the geeoh binary.
#[derive(Debug, Parser)]
#[command(name = "geeoh", version, about = "geeoh blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "GEEOH_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the blog HTTP server.
    Serve(Box<ServeArgs>),
    /// Print the stored digest for an operator password.
    #[command(name = "hash-password")]
    HashPassword(HashPasswordArgs),
    /// Copy every article of a flat-file store into Postgres, keeping ids.
    #[command(name = "import-flatfile")]
    ImportFlatfile(ImportFlatfileArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the storage backend (postgres|flatfile).
    #[arg(long = "storage-backend", value_name = "BACKEND")]
    pub storage_backend: Option<String>,

    /// Override the flat-file store directory.
    #[arg(long = "storage-flatfile-directory", value_name = "PATH")]
    pub storage_flatfile_directory: Option<PathBuf>,

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the media directory.
    #[arg(long = "media-directory", value_name = "PATH")]
    pub media_directory: Option<PathBuf>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "media-max-request-bytes", value_name = "BYTES")]
    pub media_max_request_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct HashPasswordArgs {
    /// Plain-text password to digest with `auth.secret_key`.
    #[arg(value_name = "PASSWORD", env = "GEEOH_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Args, Clone)]
pub struct ImportFlatfileArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Flat-file store to read; defaults to `storage.flatfile_directory`.
    #[arg(value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub source: Option<PathBuf>,
}
