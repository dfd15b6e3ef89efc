//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    collections::HashSet,
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::accounts::OperatorAccount;

pub use cli::{
    CliArgs, Command, DatabaseOverride, HashPasswordArgs, ImportFlatfileArgs, ServeArgs,
    ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "geeoh";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_FLATFILE_DIR: &str = "data";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_MEDIA_DIR: &str = "media";
const DEFAULT_MEDIA_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: u64 = 14 * 24 * 60 * 60;
const DEFAULT_SITE_TITLE: &str = "geeoh";
const MIN_SECRET_KEY_BYTES: usize = 32;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub auth: AuthSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    FlatFile,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "flatfile" | "flat-file" | "file" => Ok(Self::FlatFile),
            other => Err(format!(
                "unknown backend `{other}`; expected `postgres` or `flatfile`"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub flatfile_directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub directory: PathBuf,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Clone)]
pub struct AuthSettings {
    pub secret_key: String,
    pub session_ttl: Duration,
    pub accounts: Vec<OperatorAccount>,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret_key", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("accounts", &self.accounts.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub mottos: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("GEEOH").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::ImportFlatfile(args)) => {
            raw.apply_database_override(&args.database);
            if let Some(source) = args.source.as_ref() {
                raw.storage.flatfile_directory = Some(source.clone());
            }
        }
        Some(Command::HashPassword(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    database: RawDatabaseSettings,
    media: RawMediaSettings,
    auth: RawAuthSettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(backend) = overrides.storage_backend.as_ref() {
            self.storage.backend = Some(backend.clone());
        }
        if let Some(directory) = overrides.storage_flatfile_directory.as_ref() {
            self.storage.flatfile_directory = Some(directory.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(directory) = overrides.media_directory.as_ref() {
            self.media.directory = Some(directory.clone());
        }
        if let Some(limit) = overrides.media_max_request_bytes {
            self.media.max_request_bytes = Some(limit);
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            database,
            media,
            auth,
            site,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            storage: build_storage_settings(storage)?,
            database: build_database_settings(database)?,
            media: build_media_settings(media)?,
            auth: build_auth_settings(auth)?,
            site: build_site_settings(site),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let backend = match storage.backend {
        Some(value) => StorageBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("storage.backend", reason))?,
        None => StorageBackend::Postgres,
    };

    let flatfile_directory = storage
        .flatfile_directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FLATFILE_DIR));
    if flatfile_directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.flatfile_directory",
            "path must not be empty",
        ));
    }

    Ok(StorageSettings {
        backend,
        flatfile_directory,
    })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_media_settings(media: RawMediaSettings) -> Result<MediaSettings, LoadError> {
    let directory = media
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "media.directory",
            "path must not be empty",
        ));
    }

    let max_request_bytes_value = media
        .max_request_bytes
        .unwrap_or(DEFAULT_MEDIA_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("media.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "media.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(MediaSettings {
        directory,
        max_request_bytes,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let secret_key = auth.secret_key.unwrap_or_default();
    if secret_key.len() < MIN_SECRET_KEY_BYTES {
        return Err(LoadError::invalid(
            "auth.secret_key",
            format!("must be at least {MIN_SECRET_KEY_BYTES} bytes"),
        ));
    }

    let ttl_secs = auth.session_ttl_seconds.unwrap_or(DEFAULT_SESSION_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "auth.session_ttl_seconds",
            "must be greater than zero",
        ));
    }
    // kept representable as signed cookie expiry seconds
    if i64::try_from(ttl_secs).is_err() {
        return Err(LoadError::invalid(
            "auth.session_ttl_seconds",
            "value exceeds supported range",
        ));
    }

    let mut ids = HashSet::new();
    let mut usernames = HashSet::new();
    for account in &auth.accounts {
        if account.username.trim().is_empty() {
            return Err(LoadError::invalid(
                "auth.accounts",
                "username must not be empty",
            ));
        }
        if !ids.insert(account.id) {
            return Err(LoadError::invalid(
                "auth.accounts",
                format!("duplicate account id {}", account.id),
            ));
        }
        if !usernames.insert(account.username.as_str()) {
            return Err(LoadError::invalid(
                "auth.accounts",
                format!("duplicate username `{}`", account.username),
            ));
        }
        let hash = account.password_hash.trim();
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LoadError::invalid(
                "auth.accounts",
                format!(
                    "password_hash for `{}` must be 64 hex characters",
                    account.username
                ),
            ));
        }
    }

    Ok(AuthSettings {
        secret_key,
        session_ttl: Duration::from_secs(ttl_secs),
        accounts: auth.accounts,
    })
}

fn build_site_settings(site: RawSiteSettings) -> SiteSettings {
    let title = site
        .title
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());

    let mottos = site
        .mottos
        .into_iter()
        .map(|motto| motto.trim().to_string())
        .filter(|motto| !motto.is_empty())
        .collect();

    SiteSettings { title, mottos }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    backend: Option<String>,
    flatfile_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMediaSettings {
    directory: Option<PathBuf>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    secret_key: Option<String>,
    session_ttl_seconds: Option<u64>,
    accounts: Vec<OperatorAccount>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    mottos: Vec<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
