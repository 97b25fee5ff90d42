//! # Sync Scheduler
//!
//! Background driver for the [`SyncCoordinator`].
//!
//! Sync work reaches the scheduler as [`SyncRequest`]s on a bounded
//! [`SyncQueue`]. The scheduler runs three tasks:
//! - a worker draining the queue, spawning each request as its own task
//! - a timer that queues [`SyncRequest::All`] after the initial delay and
//!   then once per interval (only with periodic sync enabled)
//! - a listener turning [`ProviderEvent::Registered`] into
//!   [`SyncCoordinator::on_provider_registered`] calls
//!
//! [`SchedulerHandle::shutdown`] stops all three and waits for syncs already
//! started; an in-flight sync is never cancelled.

use crate::coordinator::SyncCoordinator;
use crate::error::{Result, SyncError};
use core_runtime::events::{CoreEvent, ProviderEvent};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// A unit of sync work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRequest {
    /// Full sync of one provider
    Provider(String),
    /// Full sync of every catalog provider
    All,
}

impl fmt::Display for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncRequest::Provider(id) => write!(f, "provider:{}", id),
            SyncRequest::All => f.write_str("all"),
        }
    }
}

/// Sending half of the sync request queue.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    tx: mpsc::Sender<SyncRequest>,
}

impl SyncQueue {
    /// A queue holding at most `capacity` pending requests.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<SyncRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a request without waiting.
    ///
    /// A full queue drops the request with [`SyncError::QueueFull`]; the
    /// next periodic run covers whatever it would have done.
    pub fn request(&self, request: SyncRequest) -> Result<()> {
        debug!(request = %request, "Queueing sync request");
        self.tx.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(request) => SyncError::QueueFull(request.to_string()),
            mpsc::error::TrySendError::Closed(_) => SyncError::QueueClosed,
        })
    }
}

pub struct SyncScheduler;

impl SyncScheduler {
    /// Spawn the scheduler tasks. Must be called inside a tokio runtime.
    pub fn start(
        coordinator: Arc<SyncCoordinator>,
        requests: mpsc::Receiver<SyncRequest>,
    ) -> SchedulerHandle {
        let token = CancellationToken::new();
        let jobs = TaskTracker::new();
        let config = coordinator.config().clone();

        // subscribe before returning so no registration is missed
        let events = coordinator.context().event_bus.subscribe();

        let mut tasks = vec![
            tokio::spawn(run_worker(
                Arc::clone(&coordinator),
                requests,
                jobs.clone(),
                token.clone(),
            )),
            tokio::spawn(run_registration_listener(
                Arc::clone(&coordinator),
                events,
                token.clone(),
            )),
        ];

        if config.enable_periodic_sync {
            tasks.push(tokio::spawn(run_timer(
                Arc::clone(&coordinator),
                token.clone(),
            )));
        }

        info!(
            periodic = config.enable_periodic_sync,
            interval_secs = config.sync_interval.as_secs(),
            initial_delay_secs = config.initial_sync_delay.as_secs(),
            "Sync scheduler started"
        );

        SchedulerHandle { token, tasks, jobs }
    }
}

/// Owner of the running scheduler tasks.
pub struct SchedulerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    jobs: TaskTracker,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Stop accepting work and wait for started syncs to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
        self.jobs.close();
        self.jobs.wait().await;
        info!("Sync scheduler stopped");
    }
}

async fn run_worker(
    coordinator: Arc<SyncCoordinator>,
    mut requests: mpsc::Receiver<SyncRequest>,
    jobs: TaskTracker,
    token: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = token.cancelled() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let coordinator = Arc::clone(&coordinator);
        jobs.spawn(async move {
            match request {
                SyncRequest::Provider(provider_id) => {
                    if let Err(e) = coordinator.full_sync(&provider_id).await {
                        warn!(provider_id = %provider_id, error = %e, "Queued sync failed");
                    }
                }
                SyncRequest::All => {
                    coordinator.sync_all().await;
                }
            }
        });
    }
    debug!("Sync worker stopped");
}

async fn run_timer(coordinator: Arc<SyncCoordinator>, token: CancellationToken) {
    let config = coordinator.config().clone();

    tokio::select! {
        _ = token.cancelled() => return,
        _ = sleep(config.initial_sync_delay) => {}
    }

    let mut ticker = interval_at(Instant::now(), config.sync_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = coordinator.trigger_full_sync() {
                    warn!(error = %e, "Periodic sync not queued");
                }
            }
        }
    }
    debug!("Sync timer stopped");
}

async fn run_registration_listener(
    coordinator: Arc<SyncCoordinator>,
    mut events: tokio::sync::broadcast::Receiver<CoreEvent>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(CoreEvent::Provider(ProviderEvent::Registered { provider_id })) => {
                match coordinator.on_provider_registered(&provider_id) {
                    Ok(true) => debug!(provider_id = %provider_id, "Queued sync for new provider"),
                    Ok(false) => {}
                    Err(e) => warn!(provider_id = %provider_id, error = %e, "Registration sync not queued"),
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Registration listener lagged behind the event bus");
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("Registration listener stopped");
}
