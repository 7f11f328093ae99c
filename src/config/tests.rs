use super::*;

fn resolve(raw: RawSettings, service: ServiceKind) -> Settings {
    Settings::from_raw(raw, service).expect("valid settings")
}

#[test]
fn each_service_gets_its_default_port() {
    assert_eq!(
        resolve(RawSettings::default(), ServiceKind::Courses)
            .server
            .addr
            .port(),
        8001
    );
    assert_eq!(
        resolve(RawSettings::default(), ServiceKind::Students)
            .server
            .addr
            .port(),
        8002
    );
    assert_eq!(
        resolve(RawSettings::default(), ServiceKind::Enrollment)
            .server
            .addr
            .port(),
        8003
    );
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = resolve(raw, ServiceKind::Courses);

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cache_defaults_to_memory_with_five_minute_ttl() {
    let settings = resolve(RawSettings::default(), ServiceKind::Students);
    assert_eq!(settings.cache.backend, CacheBackend::Memory);
    assert_eq!(settings.cache.ttl, Duration::from_secs(300));
    assert_eq!(settings.cache.memory_capacity.get(), 10_000);
}

#[test]
fn redis_backend_requires_a_url() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("redis".to_string());

    let err = Settings::from_raw(raw.clone(), ServiceKind::Courses).expect_err("missing url");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.redis_url",
            ..
        }
    ));

    raw.apply_serve_overrides(&ServeOverrides {
        cache_redis_url: Some("redis://127.0.0.1:6379".to_string()),
        ..Default::default()
    });
    let settings = resolve(raw, ServiceKind::Courses);
    assert_eq!(settings.cache.backend, CacheBackend::Redis);
}

#[test]
fn unknown_cache_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some("memcached".to_string());
    let err = Settings::from_raw(raw, ServiceKind::Courses).expect_err("invalid backend");
    assert!(err.to_string().contains("cache.backend"));
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(0);
    assert!(Settings::from_raw(raw, ServiceKind::Courses).is_err());
}

#[test]
fn saga_defaults() {
    let settings = resolve(RawSettings::default(), ServiceKind::Enrollment);
    assert_eq!(settings.saga.queue_name, "enrollments");
    assert_eq!(settings.saga.occupancy_mode, OccupancyMode::FetchThenWrite);
    assert_eq!(settings.saga.retry, RetryPolicy::default());
    assert_eq!(settings.saga.restart_delay, Duration::from_secs(5));
}

#[test]
fn occupancy_mode_is_parsed_and_validated() {
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        saga_occupancy_mode: Some("conditional".to_string()),
        saga_max_attempts: Some(2),
        ..Default::default()
    });
    let settings = resolve(raw, ServiceKind::Enrollment);
    assert_eq!(settings.saga.occupancy_mode, OccupancyMode::Conditional);
    assert_eq!(settings.saga.retry.max_attempts, 2);

    let mut raw = RawSettings::default();
    raw.saga.occupancy_mode = Some("optimistic".to_string());
    let err = Settings::from_raw(raw, ServiceKind::Enrollment).expect_err("invalid mode");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "saga.occupancy_mode",
            ..
        }
    ));
}

#[test]
fn backoff_bounds_must_be_ordered() {
    let mut raw = RawSettings::default();
    raw.saga.initial_backoff_ms = Some(5_000);
    raw.saga.max_backoff_ms = Some(1_000);
    assert!(Settings::from_raw(raw, ServiceKind::Enrollment).is_err());
}

#[test]
fn peer_urls_must_be_http() {
    let mut raw = RawSettings::default();
    raw.peers.courses_url = Some("ftp://courses".to_string());
    let err = Settings::from_raw(raw, ServiceKind::Enrollment).expect_err("bad scheme");
    assert!(err.to_string().contains("peers.courses_url"));
}

#[test]
fn blank_database_url_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = resolve(raw, ServiceKind::Courses);
    assert!(settings.database.url.is_none());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    });
    let settings = resolve(raw, ServiceKind::Courses);
    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn parse_enrollment_overrides() {
    let args = CliArgs::parse_from([
        "registrar",
        "enrollment",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://enrollment",
        "--peers-courses-url",
        "http://courses:8001",
        "--saga-occupancy-mode",
        "conditional",
    ]);

    assert_eq!(args.command.service(), ServiceKind::Enrollment);
    let overrides = args.command.overrides();
    assert_eq!(overrides.server_host.as_deref(), Some("0.0.0.0"));
    assert_eq!(
        overrides.database_url.as_deref(),
        Some("postgres://enrollment")
    );
    assert_eq!(
        overrides.peers_courses_url.as_deref(),
        Some("http://courses:8001")
    );
    assert_eq!(overrides.saga_occupancy_mode.as_deref(), Some("conditional"));
}

#[test]
fn parse_record_store_commands() {
    let args = CliArgs::parse_from(["registrar", "courses", "--server-port", "9001"]);
    assert_eq!(args.command.service(), ServiceKind::Courses);
    assert_eq!(args.command.overrides().server_port, Some(9001));

    let args = CliArgs::parse_from(["registrar", "students"]);
    assert_eq!(args.command.service(), ServiceKind::Students);
}
