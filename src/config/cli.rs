use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::domain::types::ServiceKind;

/// Command-line arguments for the registrar binary.
#[derive(Debug, Parser)]
#[command(
    name = "registrar",
    version,
    about = "Course registration services with an asynchronous enrollment saga"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "REGISTRAR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the course store.
    Courses(Box<ServeArgs>),
    /// Run the student store.
    Students(Box<ServeArgs>),
    /// Run the enrollment service and its queue worker.
    Enrollment(Box<ServeArgs>),
}

impl Command {
    pub fn service(&self) -> ServiceKind {
        match self {
            Command::Courses(_) => ServiceKind::Courses,
            Command::Students(_) => ServiceKind::Students,
            Command::Enrollment(_) => ServiceKind::Enrollment,
        }
    }

    pub fn overrides(&self) -> &ServeOverrides {
        match self {
            Command::Courses(args) | Command::Students(args) | Command::Enrollment(args) => {
                &args.overrides
            }
        }
    }
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

    /// Override the database connection URL.
    #[arg(long = "database-url", env = "DATABASE_URL", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the cache backend (memory|redis).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the Redis URL used by the redis cache backend.
    #[arg(long = "cache-redis-url", env = "REDIS_URL", value_name = "URL")]
    pub cache_redis_url: Option<String>,

    /// Override the cache entry lifetime.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the course store base URL.
    #[arg(long = "peers-courses-url", env = "COURSES_SERVICE_URL", value_name = "URL")]
    pub peers_courses_url: Option<String>,

    /// Override the student store base URL.
    #[arg(long = "peers-students-url", env = "STUDENTS_SERVICE_URL", value_name = "URL")]
    pub peers_students_url: Option<String>,

    /// Override the peer request timeout.
    #[arg(long = "peers-timeout-ms", value_name = "MILLIS")]
    pub peers_timeout_ms: Option<u64>,

    /// Override how the worker adjusts course occupancy (fetch_then_write|conditional).
    #[arg(long = "saga-occupancy-mode", value_name = "MODE")]
    pub saga_occupancy_mode: Option<String>,

    /// Override the number of apply attempts before dead-lettering.
    #[arg(long = "saga-max-attempts", value_name = "COUNT")]
    pub saga_max_attempts: Option<u32>,

    /// Override the delay before the worker is restarted after an unexpected exit.
    #[arg(long = "saga-restart-delay-seconds", value_name = "SECONDS")]
    pub saga_restart_delay_seconds: Option<u64>,
}
