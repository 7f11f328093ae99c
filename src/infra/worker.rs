//! Supervised queue consumer for the enrollment service.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use metrics::counter;
use serde::Serialize;
use sqlx::PgPool;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

use crate::application::jobs::{JobWorkerContext, process_enrollment_job};

const SOURCE: &str = "infra::worker";
const WORKER_NAME: &str = "enrollment-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Starting,
    Running,
    Restarting,
    Stopped,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Restarting => "restarting",
            WorkerState::Stopped => "stopped",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Running,
            2 => WorkerState::Restarting,
            3 => WorkerState::Stopped,
            _ => WorkerState::Starting,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            WorkerState::Starting => 0,
            WorkerState::Running => 1,
            WorkerState::Restarting => 2,
            WorkerState::Stopped => 3,
        }
    }
}

/// Liveness of the consumer as reported by `/health`.
#[derive(Debug, Clone, Default)]
pub struct WorkerHealth {
    state: Arc<AtomicU8>,
}

impl WorkerHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: WorkerState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }
}

pub struct WorkerSupervisor {
    pool: PgPool,
    queue_name: String,
    context: JobWorkerContext,
    health: WorkerHealth,
    restart_delay: Duration,
    drain_timeout: Duration,
}

impl WorkerSupervisor {
    pub fn new(
        pool: PgPool,
        queue_name: impl Into<String>,
        context: JobWorkerContext,
        health: WorkerHealth,
        restart_delay: Duration,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            queue_name: queue_name.into(),
            context,
            health,
            restart_delay,
            drain_timeout,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    fn build_monitor(&self) -> Monitor {
        let storage = PostgresStorage::new_with_config(
            self.pool.clone(),
            ApalisSqlConfig::new(&self.queue_name),
        );
        let worker = WorkerBuilder::new(WORKER_NAME)
            .concurrency(1)
            .data(self.context.clone())
            .backend(storage)
            .build_fn(process_enrollment_job);
        Monitor::new()
            .register(worker)
            .shutdown_timeout(self.drain_timeout)
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let monitor = self.build_monitor();
            self.health.set(WorkerState::Running);
            info!(
                target = SOURCE,
                queue = %self.queue_name,
                mode = self.context.worker.mode().as_str(),
                "enrollment worker started"
            );

            // The in-flight item settles before the monitor returns on shutdown.
            let result = monitor
                .run_with_signal(shutdown_requested(shutdown.clone()))
                .await;
            if *shutdown.borrow() {
                break;
            }
            match result {
                Ok(()) => warn!(target = SOURCE, "enrollment worker exited"),
                Err(err) => error!(target = SOURCE, error = %err, "enrollment worker failed"),
            }

            counter!("registrar_worker_restart_total").increment(1);
            self.health.set(WorkerState::Restarting);
            tokio::select! {
                _ = tokio::time::sleep(self.restart_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.health.set(WorkerState::Stopped);
        info!(target = SOURCE, "enrollment worker stopped");
    }
}

/// Resolves once the shutdown flag is raised or its sender is gone.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let _ = shutdown.wait_for(|stop| *stop).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_signal_waits_for_the_flag() {
        let (tx, rx) = watch::channel(false);
        let signal = tokio::spawn(shutdown_requested(rx));
        tokio::task::yield_now().await;
        assert!(!signal.is_finished());

        tx.send(true).expect("receiver alive");
        signal.await.expect("join").expect("signal");
    }

    #[tokio::test]
    async fn shutdown_signal_fires_when_the_sender_is_dropped() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        shutdown_requested(rx).await.expect("signal");
    }

    #[test]
    fn health_starts_in_starting_state() {
        let health = WorkerHealth::new();
        assert_eq!(health.state(), WorkerState::Starting);
    }

    #[test]
    fn health_is_shared_between_clones() {
        let health = WorkerHealth::new();
        let reported = health.clone();
        health.set(WorkerState::Restarting);
        assert_eq!(reported.state(), WorkerState::Restarting);
        health.set(WorkerState::Stopped);
        assert_eq!(reported.state().as_str(), "stopped");
    }
}
