//! Background schedule for a [`Sweeper`].
//!
//! [`Sweeper::start`] spawns one Tokio task that drives a [`Scheduler`] with
//! the sweeper's clock. Each sweep runs on the blocking pool so filesystem
//! work never stalls the async request path. The loop sleeps in slices of at
//! most the tick interval and re-reads the clock after each slice, so wall
//! clock jumps are picked up promptly.

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::report::SweepResult;
use crate::schedule::SweepSchedule;
use crate::scheduler::{Scheduler, SchedulerState, Tick};
use crate::sweeper::Sweeper;

/// Delay before re-arming after a scheduling failure.
pub const SCHEDULING_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Snapshot of a running (or stopped) schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweeperStatus {
    pub schedule: SweepSchedule,
    #[serde(flatten)]
    pub scheduler: SchedulerState,
    /// Completed scheduled sweeps.
    pub runs: u64,
    pub last_result: Option<SweepResult>,
}

impl SweeperStatus {
    fn new(schedule: SweepSchedule, scheduler: SchedulerState) -> Self {
        Self {
            schedule,
            scheduler,
            runs: 0,
            last_result: None,
        }
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        match self.scheduler {
            SchedulerState::Scheduled { next_run } => Some(next_run),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SweepHandle
// ---------------------------------------------------------------------------

/// Handle to a background sweep schedule.
///
/// Dropping the handle does not stop the schedule; call [`stop`](Self::stop).
#[derive(Debug)]
pub struct SweepHandle {
    cancel: CancellationToken,
    status: watch::Receiver<SweeperStatus>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    fn already_stopped(schedule: SweepSchedule) -> Self {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_tx, status) = watch::channel(SweeperStatus::new(schedule, SchedulerState::Stopped));
        Self {
            cancel,
            status,
            task: None,
        }
    }

    /// Cancel all future runs. A sweep already in progress finishes.
    /// Calling this more than once is harmless.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.status.borrow().scheduler == SchedulerState::Stopped
    }

    pub fn status(&self) -> SweeperStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<SweeperStatus> {
        self.status.clone()
    }

    /// Wait for the schedule task to exit (after [`stop`](Self::stop)).
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Retention sweeper task failed");
            }
        }
    }

    /// Stop and wait up to `timeout` for an in-flight sweep. Returns `false`
    /// if the timeout elapsed first.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.stop();
        tokio::time::timeout(timeout, self.join()).await.is_ok()
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

impl Sweeper {
    /// Start the daily schedule in the process's local time zone.
    ///
    /// Must be called from within a Tokio runtime. A disabled schedule
    /// returns an already-stopped handle and never sweeps.
    pub fn start(&self) -> SweepHandle {
        self.start_in(Local)
    }

    /// Start the daily schedule, interpreting hour:minute in `zone`.
    pub fn start_in<Tz>(&self, zone: Tz) -> SweepHandle
    where
        Tz: TimeZone + Send + 'static,
    {
        let schedule = *self.schedule();
        if !schedule.enabled() {
            tracing::info!("Retention sweeper disabled, not scheduling");
            return SweepHandle::already_stopped(schedule);
        }

        let scheduler = Scheduler::new(schedule, zone);
        let (tx, status) = watch::channel(SweeperStatus::new(schedule, scheduler.state()));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(drive(self.clone(), scheduler, cancel.clone(), tx));

        SweepHandle {
            cancel,
            status,
            task: Some(task),
        }
    }
}

async fn drive<Tz>(
    sweeper: Sweeper,
    mut scheduler: Scheduler<Tz>,
    cancel: CancellationToken,
    status: watch::Sender<SweeperStatus>,
) where
    Tz: TimeZone + Send + 'static,
{
    tracing::info!(
        schedule = %scheduler.schedule(),
        root = %sweeper.policy().storage_root().display(),
        max_age_hours = sweeper.policy().max_age().num_hours(),
        "Retention sweeper started"
    );

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match scheduler.poll(sweeper.clock.now()) {
            Ok(Tick::Wait(wait)) => {
                if publish_state(&status, scheduler.state()) {
                    if let SchedulerState::Scheduled { next_run } = scheduler.state() {
                        tracing::info!(%next_run, "Next retention sweep scheduled");
                    }
                }
                let nap = wait.min(sweeper.tick_interval);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(nap) => {}
                }
            }
            Ok(Tick::Fire) => {
                publish_state(&status, scheduler.state());

                // Not raced against `cancel`: an in-flight sweep always completes.
                let job = sweeper.clone();
                match tokio::task::spawn_blocking(move || job.run_once()).await {
                    Ok(result) => status.send_modify(|s| {
                        s.runs += 1;
                        s.last_result = Some(result);
                    }),
                    Err(e) => tracing::error!(error = %e, "Retention sweep panicked"),
                }

                if cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = scheduler.complete(sweeper.clock.now()) {
                    tracing::warn!(error = %e, "Failed to schedule next retention sweep, will retry");
                }
            }
            Ok(Tick::Stopped) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Retention scheduling failed, will retry");
                publish_state(&status, scheduler.state());
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(SCHEDULING_RETRY_DELAY) => {}
                }
            }
        }
    }

    scheduler.stop();
    publish_state(&status, scheduler.state());
    tracing::info!("Retention sweeper stopped");
}

/// Publish `state` if it changed. Returns whether it did.
fn publish_state(status: &watch::Sender<SweeperStatus>, state: SchedulerState) -> bool {
    status.send_if_modified(|s| {
        if s.scheduler == state {
            false
        } else {
            s.scheduler = state;
            true
        }
    })
}
