//! Sweep scheduling state machine.
//!
//! ```text
//!   Idle ──arm──▶ Scheduled ──poll (now ≥ next)──▶ Running ──complete──▶ Scheduled
//!    │                │                              │
//!    └──────stop──────┴────────────stop──────────────┴──▶ Stopped
//! ```
//!
//! The machine does no I/O and never sleeps. The caller feeds it the current
//! time and acts on the returned [`Tick`], which keeps every transition
//! deterministic under test.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::SweepError;
use crate::schedule::SweepSchedule;

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    /// No run armed yet (fresh, or the last arm attempt failed).
    Idle,
    /// Waiting for `next_run`.
    Scheduled { next_run: DateTime<Utc> },
    /// A sweep fired at `started_at` and has not completed.
    Running { started_at: DateTime<Utc> },
    /// Terminal. No further runs.
    Stopped,
}

/// What the driver should do after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing due yet; the next run is this far away.
    Wait(Duration),
    /// Run a sweep now, then call [`Scheduler::complete`].
    Fire,
    /// The scheduler is stopped.
    Stopped,
}

/// Daily schedule state machine evaluated in the time zone `Tz`.
#[derive(Debug, Clone)]
pub struct Scheduler<Tz: TimeZone> {
    schedule: SweepSchedule,
    zone: Tz,
    state: SchedulerState,
}

impl<Tz: TimeZone> Scheduler<Tz> {
    /// A disabled schedule starts (and stays) in `Stopped`.
    pub fn new(schedule: SweepSchedule, zone: Tz) -> Self {
        let state = if schedule.enabled() {
            SchedulerState::Idle
        } else {
            SchedulerState::Stopped
        };
        Self {
            schedule,
            zone,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn schedule(&self) -> &SweepSchedule {
        &self.schedule
    }

    /// Compute the next run strictly after `now` and move to `Scheduled`.
    ///
    /// On failure the machine falls back to `Idle` so the next poll retries.
    pub fn arm(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>, SweepError> {
        if self.state == SchedulerState::Stopped {
            return Err(SweepError::Scheduling("scheduler is stopped".into()));
        }

        let local_now = now.with_timezone(&self.zone);
        match self.schedule.next_run_after(&local_now) {
            Some(next) => {
                let next_run = next.with_timezone(&Utc);
                self.state = SchedulerState::Scheduled { next_run };
                Ok(next_run)
            }
            None => {
                self.state = SchedulerState::Idle;
                Err(SweepError::Scheduling(format!(
                    "no occurrence of {} after {now}",
                    self.schedule
                )))
            }
        }
    }

    /// Advance the machine to `now`.
    ///
    /// `Idle` arms first. `Scheduled` fires once `now` reaches the next run.
    /// Polling while `Running` is a driver bug and reported as an error.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Result<Tick, SweepError> {
        match self.state {
            SchedulerState::Stopped => Ok(Tick::Stopped),
            SchedulerState::Running { started_at } => Err(SweepError::Scheduling(format!(
                "sweep started at {started_at} has not completed"
            ))),
            SchedulerState::Idle => {
                let next_run = self.arm(now)?;
                Ok(wait_or_fire(&mut self.state, next_run, now))
            }
            SchedulerState::Scheduled { next_run } => {
                Ok(wait_or_fire(&mut self.state, next_run, now))
            }
        }
    }

    /// Record that the running sweep finished and re-arm relative to `now`.
    ///
    /// Returns `Ok(None)` if the scheduler was stopped in the meantime.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, SweepError> {
        match self.state {
            SchedulerState::Stopped => Ok(None),
            _ => self.arm(now).map(Some),
        }
    }

    pub fn stop(&mut self) {
        self.state = SchedulerState::Stopped;
    }
}

fn wait_or_fire(state: &mut SchedulerState, next_run: DateTime<Utc>, now: DateTime<Utc>) -> Tick {
    if now >= next_run {
        *state = SchedulerState::Running { started_at: now };
        Tick::Fire
    } else {
        // Positive by construction.
        let wait = (next_run - now).to_std().unwrap_or(Duration::ZERO);
        Tick::Wait(wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeDelta, Utc};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, h, m, s).unwrap()
    }

    fn scheduler() -> Scheduler<Utc> {
        Scheduler::new(SweepSchedule::daily_at(3, 0).unwrap(), Utc)
    }

    #[test]
    fn starts_idle_when_enabled() {
        assert_eq!(scheduler().state(), SchedulerState::Idle);
    }

    #[test]
    fn starts_stopped_when_disabled() {
        let mut s = Scheduler::new(SweepSchedule::disabled(), Utc);
        assert_eq!(s.state(), SchedulerState::Stopped);
        assert_eq!(s.poll(at(3, 0, 0)).unwrap(), Tick::Stopped);
    }

    #[test]
    fn idle_poll_arms_and_waits() {
        let mut s = scheduler();
        let tick = s.poll(at(2, 0, 0)).unwrap();

        assert_eq!(tick, Tick::Wait(Duration::from_secs(3600)));
        assert_eq!(
            s.state(),
            SchedulerState::Scheduled {
                next_run: at(3, 0, 0)
            }
        );
    }

    #[test]
    fn fires_when_due_then_rearms_for_tomorrow() {
        let mut s = scheduler();
        s.poll(at(2, 59, 0)).unwrap();

        assert_eq!(s.poll(at(3, 0, 0)).unwrap(), Tick::Fire);
        assert_eq!(
            s.state(),
            SchedulerState::Running {
                started_at: at(3, 0, 0)
            }
        );

        let next = s.complete(at(3, 0, 12)).unwrap().unwrap();
        assert_eq!(next, at(3, 0, 0) + TimeDelta::days(1));
    }

    #[test]
    fn late_wakeup_fires_once() {
        let mut s = scheduler();
        s.poll(at(2, 0, 0)).unwrap();

        // Host was suspended well past the run time.
        assert_eq!(s.poll(at(9, 30, 0)).unwrap(), Tick::Fire);
        let next = s.complete(at(9, 31, 0)).unwrap().unwrap();
        assert_eq!(next, at(3, 0, 0) + TimeDelta::days(1));
    }

    #[test]
    fn clock_moved_backwards_keeps_waiting() {
        let mut s = scheduler();
        s.poll(at(2, 0, 0)).unwrap();

        assert_eq!(
            s.poll(at(1, 0, 0)).unwrap(),
            Tick::Wait(Duration::from_secs(2 * 3600))
        );
    }

    #[test]
    fn poll_while_running_is_an_error() {
        let mut s = scheduler();
        s.poll(at(2, 59, 0)).unwrap();
        assert_eq!(s.poll(at(3, 0, 0)).unwrap(), Tick::Fire);
        assert_matches!(s.poll(at(3, 0, 1)), Err(SweepError::Scheduling(_)));
    }

    #[test]
    fn stop_during_run_prevents_rearm() {
        let mut s = scheduler();
        s.poll(at(2, 59, 0)).unwrap();
        assert_eq!(s.poll(at(3, 0, 0)).unwrap(), Tick::Fire);
        s.stop();

        assert_eq!(s.complete(at(3, 1, 0)).unwrap(), None);
        assert_eq!(s.state(), SchedulerState::Stopped);
        assert_eq!(s.poll(at(3, 0, 0) + TimeDelta::days(1)).unwrap(), Tick::Stopped);
    }

    #[test]
    fn arm_after_stop_is_rejected() {
        let mut s = scheduler();
        s.stop();
        assert_matches!(s.arm(at(1, 0, 0)), Err(SweepError::Scheduling(_)));
    }
}
