//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheBackend;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bookshelf";
const ENV_PREFIX: &str = "BOOKSHELF";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_CACHE_MEMORY_CAPACITY: u64 = 1000;
const DEFAULT_EVENTS_TOPIC: &str = "book-created";
const DEFAULT_EVENTS_QUEUE_CAPACITY: u64 = 1024;
const DEFAULT_EVENTS_WRITE_TIMEOUT_SECS: u64 = 10;

/// Deployment environment; selects the logging preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployEnvironment {
    Local,
    Dev,
    Prod,
}

impl DeployEnvironment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    fn default_log_level(self) -> LevelFilter {
        match self {
            Self::Local | Self::Dev => LevelFilter::DEBUG,
            Self::Prod => LevelFilter::INFO,
        }
    }

    fn default_log_format(self) -> LogFormat {
        match self {
            Self::Local => LogFormat::Compact,
            Self::Dev | Self::Prod => LogFormat::Json,
        }
    }
}

impl FromStr for DeployEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(format!("unknown environment `{other}` (expected local|dev|prod)")),
        }
    }
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: DeployEnvironment,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub events: EventsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub apply_schema: bool,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub ttl: Duration,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct EventsSettings {
    pub enabled: bool,
    /// Events go to the log when publishing is enabled without a proxy.
    pub rest_proxy_url: Option<String>,
    pub topic: String,
    pub queue_capacity: NonZeroUsize,
    pub write_timeout: Duration,
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::CheckConfig(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    environment: Option<String>,
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    events: RawEventsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(environment) = overrides.environment.as_ref() {
            self.environment = Some(environment.clone());
        }
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.server_request_timeout_seconds {
            self.server.request_timeout_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(apply) = overrides.database_apply_schema {
            self.database.apply_schema = Some(apply);
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.cache_redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(enabled) = overrides.events_enabled {
            self.events.enabled = Some(enabled);
        }
        if let Some(url) = overrides.events_rest_proxy_url.as_ref() {
            self.events.rest_proxy_url = Some(url.clone());
        }
        if let Some(topic) = overrides.events_topic.as_ref() {
            self.events.topic = Some(topic.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            environment,
            server,
            logging,
            database,
            cache,
            events,
        } = raw;

        let environment = match environment {
            Some(value) => DeployEnvironment::from_str(&value)
                .map_err(|reason| LoadError::invalid("environment", reason))?,
            None => DeployEnvironment::Local,
        };
        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging, environment)?;
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache)?;
        let events = build_events_settings(events)?;

        Ok(Self {
            environment,
            server,
            logging,
            database,
            cache,
            events,
        })
    }

    /// Human-readable resolved settings with credentials masked.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("environment", self.environment.as_str().to_string()),
            ("server.addr", self.server.addr.to_string()),
            (
                "server.graceful_shutdown_seconds",
                self.server.graceful_shutdown.as_secs().to_string(),
            ),
            (
                "server.request_timeout_seconds",
                self.server.request_timeout.as_secs().to_string(),
            ),
            ("logging.level", self.logging.level.to_string()),
            (
                "logging.json",
                (self.logging.format == LogFormat::Json).to_string(),
            ),
            (
                "database.url",
                self.database
                    .url
                    .as_deref()
                    .map_or_else(|| "<unset>".to_string(), redact_url),
            ),
            (
                "database.max_connections",
                self.database.max_connections.to_string(),
            ),
            ("database.apply_schema", self.database.apply_schema.to_string()),
            ("cache.backend", self.cache.backend.as_str().to_string()),
            (
                "cache.redis_url",
                self.cache
                    .redis_url
                    .as_deref()
                    .map_or_else(|| "<unset>".to_string(), redact_url),
            ),
            ("cache.ttl_seconds", self.cache.ttl.as_secs().to_string()),
            (
                "cache.memory_capacity",
                self.cache.memory_capacity.to_string(),
            ),
            ("events.enabled", self.events.enabled.to_string()),
            (
                "events.rest_proxy_url",
                self.events
                    .rest_proxy_url
                    .clone()
                    .unwrap_or_else(|| "<unset>".to_string()),
            ),
            ("events.topic", self.events.topic.clone()),
            (
                "events.queue_capacity",
                self.events.queue_capacity.to_string(),
            ),
            (
                "events.write_timeout_seconds",
                self.events.write_timeout.as_secs().to_string(),
            ),
        ]
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

    let graceful_shutdown = positive_seconds(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;
    let request_timeout = positive_seconds(
        server
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        "server.request_timeout_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
        request_timeout,
    })
}

fn build_logging_settings(
    logging: RawLoggingSettings,
    environment: DeployEnvironment,
) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => environment.default_log_level(),
    };

    let format = match logging.json {
        Some(true) => LogFormat::Json,
        Some(false) => LogFormat::Compact,
        None => environment.default_log_format(),
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
        apply_schema: database.apply_schema.unwrap_or(false),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let redis_url = non_blank(cache.redis_url);

    let backend = match cache.backend {
        Some(value) => CacheBackend::parse(&value).ok_or_else(|| {
            LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{value}` (expected redis|memory|disabled)"),
            )
        })?,
        None if redis_url.is_some() => CacheBackend::Redis,
        None => CacheBackend::Memory,
    };
    if backend == CacheBackend::Redis && redis_url.is_none() {
        return Err(LoadError::invalid(
            "cache.redis_url",
            "required when cache.backend is redis",
        ));
    }

    let ttl_seconds = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds > MAX_CACHE_TTL_SECS {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            format!("must not exceed {MAX_CACHE_TTL_SECS} (30 days)"),
        ));
    }
    let ttl = positive_seconds(ttl_seconds, "cache.ttl_seconds")?;
    let memory_capacity = non_zero_usize(
        cache
            .memory_capacity
            .unwrap_or(DEFAULT_CACHE_MEMORY_CAPACITY),
        "cache.memory_capacity",
    )?;

    Ok(CacheSettings {
        backend,
        redis_url,
        ttl,
        memory_capacity,
    })
}

fn build_events_settings(events: RawEventsSettings) -> Result<EventsSettings, LoadError> {
    let topic = events
        .topic
        .unwrap_or_else(|| DEFAULT_EVENTS_TOPIC.to_string());
    if topic.trim().is_empty() {
        return Err(LoadError::invalid("events.topic", "must not be empty"));
    }

    let queue_capacity = non_zero_usize(
        events
            .queue_capacity
            .unwrap_or(DEFAULT_EVENTS_QUEUE_CAPACITY),
        "events.queue_capacity",
    )?;
    let write_timeout = positive_seconds(
        events
            .write_timeout_seconds
            .unwrap_or(DEFAULT_EVENTS_WRITE_TIMEOUT_SECS),
        "events.write_timeout_seconds",
    )?;

    Ok(EventsSettings {
        enabled: events.enabled.unwrap_or(false),
        rest_proxy_url: non_blank(events.rest_proxy_url),
        topic,
        queue_capacity,
        write_timeout,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    apply_schema: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    redis_url: Option<String>,
    ttl_seconds: Option<u64>,
    memory_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEventsSettings {
    enabled: Option<bool>,
    rest_proxy_url: Option<String>,
    topic: Option<String>,
    queue_capacity: Option<u64>,
    write_timeout_seconds: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
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

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value_usize: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize)
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Masks the userinfo part of a connection URL.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
