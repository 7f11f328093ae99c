//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

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
use url::Url;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

use crate::application::retry::RetryPolicy;
use crate::cache::CacheBackend;
use crate::domain::types::{OccupancyMode, ServiceKind};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "registrar";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_COURSES_PORT: u16 = 8001;
const DEFAULT_STUDENTS_PORT: u16 = 8002;
const DEFAULT_ENROLLMENT_PORT: u16 = 8003;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_COURSES_URL: &str = "http://127.0.0.1:8001";
const DEFAULT_STUDENTS_URL: &str = "http://127.0.0.1:8002";
const DEFAULT_PEER_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_QUEUE_NAME: &str = "enrollments";
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_INITIAL_BACKOFF_MS: u64 = 200;
const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 10_000;
const DEFAULT_RESTART_DELAY_SECS: u64 = 5;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceKind,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub peers: PeerSettings,
    pub saga: SagaSettings,
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

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub ttl: Duration,
    pub memory_capacity: NonZeroUsize,
}

/// Where the enrollment service finds the two record stores.
#[derive(Debug, Clone)]
pub struct PeerSettings {
    pub courses_url: Url,
    pub students_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SagaSettings {
    pub queue_name: String,
    pub occupancy_mode: OccupancyMode,
    pub retry: RetryPolicy,
    pub restart_delay: Duration,
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

    builder = builder.add_source(Environment::with_prefix("REGISTRAR").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_serve_overrides(cli.command.overrides());

    Settings::from_raw(raw, cli.command.service())
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    peers: RawPeerSettings,
    saga: RawSagaSettings,
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
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
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
        if let Some(url) = overrides.peers_courses_url.as_ref() {
            self.peers.courses_url = Some(url.clone());
        }
        if let Some(url) = overrides.peers_students_url.as_ref() {
            self.peers.students_url = Some(url.clone());
        }
        if let Some(timeout) = overrides.peers_timeout_ms {
            self.peers.timeout_ms = Some(timeout);
        }
        if let Some(mode) = overrides.saga_occupancy_mode.as_ref() {
            self.saga.occupancy_mode = Some(mode.clone());
        }
        if let Some(attempts) = overrides.saga_max_attempts {
            self.saga.max_attempts = Some(attempts);
        }
        if let Some(delay) = overrides.saga_restart_delay_seconds {
            self.saga.restart_delay_seconds = Some(delay);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings, service: ServiceKind) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            peers,
            saga,
        } = raw;

        Ok(Self {
            service,
            server: build_server_settings(server, service)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            peers: build_peer_settings(peers)?,
            saga: build_saga_settings(saga)?,
        })
    }
}

fn default_port(service: ServiceKind) -> u16 {
    match service {
        ServiceKind::Courses => DEFAULT_COURSES_PORT,
        ServiceKind::Students => DEFAULT_STUDENTS_PORT,
        ServiceKind::Enrollment => DEFAULT_ENROLLMENT_PORT,
    }
}

fn build_server_settings(
    server: RawServerSettings,
    service: ServiceKind,
) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or_else(|| default_port(service));
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

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = match cache.backend.as_deref().map(str::trim) {
        None | Some("memory") => CacheBackend::Memory,
        Some("redis") => CacheBackend::Redis,
        Some(other) => {
            return Err(LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{other}` (expected memory or redis)"),
            ));
        }
    };

    let redis_url = non_blank(cache.redis_url);
    if backend == CacheBackend::Redis && redis_url.is_none() {
        return Err(LoadError::invalid(
            "cache.redis_url",
            "required when cache.backend is redis",
        ));
    }

    let ttl_seconds = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    let memory_capacity = NonZeroUsize::new(
        cache
            .memory_capacity
            .unwrap_or(DEFAULT_CACHE_MEMORY_CAPACITY),
    )
    .ok_or_else(|| LoadError::invalid("cache.memory_capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        backend,
        redis_url,
        ttl: Duration::from_secs(ttl_seconds),
        memory_capacity,
    })
}

fn build_peer_settings(peers: RawPeerSettings) -> Result<PeerSettings, LoadError> {
    let courses_url = parse_base_url(
        peers.courses_url.as_deref().unwrap_or(DEFAULT_COURSES_URL),
        "peers.courses_url",
    )?;
    let students_url = parse_base_url(
        peers.students_url.as_deref().unwrap_or(DEFAULT_STUDENTS_URL),
        "peers.students_url",
    )?;

    let timeout_ms = peers.timeout_ms.unwrap_or(DEFAULT_PEER_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "peers.timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(PeerSettings {
        courses_url,
        students_url,
        timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_saga_settings(saga: RawSagaSettings) -> Result<SagaSettings, LoadError> {
    let queue_name =
        non_blank(saga.queue_name).unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string());

    let occupancy_mode = match saga.occupancy_mode.as_deref() {
        None => OccupancyMode::default(),
        Some(value) => OccupancyMode::try_from(value.trim()).map_err(|()| {
            LoadError::invalid(
                "saga.occupancy_mode",
                format!("unknown mode `{value}` (expected fetch_then_write or conditional)"),
            )
        })?,
    };

    let max_attempts = non_zero_u32(
        saga.max_attempts
            .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS)
            .into(),
        "saga.max_attempts",
    )?;
    let initial_backoff = Duration::from_millis(
        saga.initial_backoff_ms
            .unwrap_or(DEFAULT_RETRY_INITIAL_BACKOFF_MS),
    );
    let max_backoff =
        Duration::from_millis(saga.max_backoff_ms.unwrap_or(DEFAULT_RETRY_MAX_BACKOFF_MS));
    if max_backoff < initial_backoff {
        return Err(LoadError::invalid(
            "saga.max_backoff_ms",
            "must not be smaller than saga.initial_backoff_ms",
        ));
    }

    let restart_secs = saga
        .restart_delay_seconds
        .unwrap_or(DEFAULT_RESTART_DELAY_SECS);
    if restart_secs == 0 {
        return Err(LoadError::invalid(
            "saga.restart_delay_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SagaSettings {
        queue_name,
        occupancy_mode,
        retry: RetryPolicy {
            max_attempts: max_attempts.get(),
            initial_backoff,
            max_backoff,
        },
        restart_delay: Duration::from_secs(restart_secs),
    })
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
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    redis_url: Option<String>,
    ttl_seconds: Option<u64>,
    memory_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPeerSettings {
    courses_url: Option<String>,
    students_url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSagaSettings {
    queue_name: Option<String>,
    occupancy_mode: Option<String>,
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    restart_delay_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_base_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid url `{value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "scheme must be http or https"));
    }
    Ok(url)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
