use std::{process, sync::Arc};

use axum::Router;
use registrar::{
    application::{
        courses::CourseService,
        enrollment::{DropPipeline, EnrollmentIntake, EnrollmentWorker},
        error::AppError,
        jobs::JobWorkerContext,
        peers::{CourseDirectory, StudentDirectory},
        repos::{CoursesRepo, EnrollmentQueue, EnrollmentsRepo, RequestsRepo, StudentsRepo},
        students::StudentService,
    },
    cache::CacheConfig,
    config::{self, Settings},
    domain::types::ServiceKind,
    infra::{
        cache::build_cache,
        db::{PostgresEnrollmentQueue, PostgresRepositories},
        error::InfraError,
        http::{
            CoursesState, EnrollmentState, StudentsState, build_courses_router,
            build_enrollment_router, build_students_router,
        },
        peers::{HttpCourseDirectory, HttpStudentDirectory},
        telemetry,
        worker::{WorkerHealth, WorkerSupervisor},
    },
};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let shutdown = shutdown_signal();
    let repositories = init_repositories(&settings).await?;

    match settings.service {
        ServiceKind::Courses => run_courses(&settings, repositories, shutdown).await,
        ServiceKind::Students => run_students(&settings, repositories, shutdown).await,
        ServiceKind::Enrollment => run_enrollment(&settings, repositories, shutdown).await,
    }
}

async fn run_courses(
    settings: &Settings,
    repositories: Arc<PostgresRepositories>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let cache = build_cache(&CacheConfig::from(&settings.cache)).await?;
    let repo: Arc<dyn CoursesRepo> = repositories;
    let router = build_courses_router(CoursesState {
        courses: Arc::new(CourseService::new(repo, cache)),
    });
    serve_http(settings, router, shutdown).await
}

async fn run_students(
    settings: &Settings,
    repositories: Arc<PostgresRepositories>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let cache = build_cache(&CacheConfig::from(&settings.cache)).await?;
    let repo: Arc<dyn StudentsRepo> = repositories;
    let router = build_students_router(StudentsState {
        students: Arc::new(StudentService::new(repo, cache)),
    });
    serve_http(settings, router, shutdown).await
}

/// Entity lookups go through the course and student stores, which own the cache.
async fn run_enrollment(
    settings: &Settings,
    repositories: Arc<PostgresRepositories>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let peers = &settings.peers;
    let courses: Arc<dyn CourseDirectory> =
        Arc::new(HttpCourseDirectory::new(&peers.courses_url, peers.timeout)?);
    let students: Arc<dyn StudentDirectory> =
        Arc::new(HttpStudentDirectory::new(&peers.students_url, peers.timeout)?);

    let enrollments: Arc<dyn EnrollmentsRepo> = repositories.clone();
    let requests: Arc<dyn RequestsRepo> = repositories.clone();
    let queue: Arc<dyn EnrollmentQueue> = Arc::new(PostgresEnrollmentQueue::new(
        repositories.pool().clone(),
        settings.saga.queue_name.clone(),
    ));

    let worker = Arc::new(EnrollmentWorker::new(
        enrollments.clone(),
        requests.clone(),
        courses.clone(),
        students.clone(),
        settings.saga.occupancy_mode,
        settings.saga.retry,
    ));
    let health = WorkerHealth::new();
    let supervisor = WorkerSupervisor::new(
        repositories.pool().clone(),
        settings.saga.queue_name.clone(),
        JobWorkerContext { worker },
        health.clone(),
        settings.saga.restart_delay,
        settings.server.graceful_shutdown,
    );
    let worker_handle = supervisor.spawn(shutdown.clone());

    let state = EnrollmentState {
        intake: Arc::new(EnrollmentIntake::new(
            students,
            courses.clone(),
            requests.clone(),
            queue,
        )),
        drops: Arc::new(DropPipeline::new(
            enrollments.clone(),
            courses,
            settings.saga.occupancy_mode,
        )),
        enrollments,
        requests,
        worker: health,
    };

    let result = serve_http(settings, build_enrollment_router(state), shutdown).await;

    match tokio::time::timeout(settings.server.graceful_shutdown, worker_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(target = "registrar::worker", error = %err, "worker task panicked"),
        Err(_) => warn!(
            target = "registrar::worker",
            "worker did not stop within the graceful shutdown window"
        ),
    }

    result
}

async fn init_repositories(settings: &Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    PostgresRepositories::run_migrations(&pool, settings.service)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

/// Flips to `true` on ctrl-c or SIGTERM.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(err) => {
                    error!(error = %err, "failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }
        info!(target = "registrar::shutdown", "shutdown requested");
        let _ = tx.send(true);
    });
    rx
}

async fn serve_http(
    settings: &Settings,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "registrar::http",
        service = settings.service.as_str(),
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
