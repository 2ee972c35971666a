use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use jiff::{Span, Timestamp, civil::Time, tz::TimeZone};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{error::SyncResult, jobs::PassReport};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cadence {
    pub days: i64,
}

impl Cadence {
    pub const DAILY: Cadence = Cadence { days: 1 };
    pub const MONTHLY: Cadence = Cadence { days: 30 };
}

/// Daily time of day (UTC) plus how far to push the first fire when that
/// time has already passed today.
#[derive(Clone, Copy, Debug)]
pub struct Schedule {
    pub at: Time,
    pub cadence: Cadence,
}

/// Today at `at` if that is still ahead of (or equal to) `now`, otherwise
/// today at `at` plus the cadence.
pub fn next_fire(now: Timestamp, schedule: Schedule) -> SyncResult<Timestamp> {
    let today =
        now.to_zoned(TimeZone::UTC).date().to_datetime(schedule.at).to_zoned(TimeZone::UTC)?;
    if now > today.timestamp() {
        Ok(today.checked_add(Span::new().days(schedule.cadence.days))?.timestamp())
    } else {
        Ok(today.timestamp())
    }
}

#[async_trait]
pub trait SyncJob: Send + Sync {
    fn name(&self) -> &'static str;
    fn schedule(&self) -> Schedule;
    async fn run_pass(&self) -> SyncResult<PassReport>;
}

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
    async fn sleep_until(&self, at: Timestamp);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    async fn sleep_until(&self, at: Timestamp) {
        let wait = Duration::try_from(at.duration_since(Timestamp::now())).unwrap_or_default();
        tokio::time::sleep(wait).await;
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct JobStatus {
    pub name: &'static str,
    pub next_fire: Option<Timestamp>,
    pub last_started: Option<Timestamp>,
    pub last_finished: Option<Timestamp>,
    pub last_report: Option<PassReport>,
    pub last_error: Option<String>,
    pub passes: u64,
}

/// Latest state of every job loop, read by the ops endpoint.
#[derive(Clone, Default)]
pub struct StatusBoard {
    jobs: Arc<RwLock<BTreeMap<&'static str, JobStatus>>>,
}

impl StatusBoard {
    pub async fn snapshot(&self) -> Vec<JobStatus> {
        self.jobs.read().await.values().cloned().collect()
    }

    async fn update(&self, name: &'static str, f: impl FnOnce(&mut JobStatus)) {
        let mut jobs = self.jobs.write().await;
        let status = jobs.entry(name).or_insert_with(|| JobStatus { name, ..Default::default() });
        f(status);
    }
}

/// Runs one job forever: wait for the next fire, run a pass, repeat.
///
/// A failed pass is logged and recorded; the loop keeps going. Cancellation
/// interrupts the wait but never a pass that has started.
pub async fn run_job(
    job: Arc<dyn SyncJob>,
    clock: Arc<dyn Clock>,
    board: StatusBoard,
    cancel: CancellationToken,
) {
    let name = job.name();
    let schedule = job.schedule();
    info!(job = name, at = %schedule.at, cadence_days = schedule.cadence.days, "job loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let next = match next_fire(clock.now(), schedule) {
            Ok(next) => next,
            Err(err) => {
                error!(job = name, error = %err, "cannot compute next fire time");
                break;
            },
        };
        board.update(name, |s| s.next_fire = Some(next)).await;
        debug!(job = name, next_fire = %next, "waiting for next fire");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = clock.sleep_until(next) => {},
        }
        if cancel.is_cancelled() {
            break;
        }

        let started = clock.now();
        board.update(name, |s| s.last_started = Some(started)).await;
        info!(job = name, "sync pass started");

        let outcome = job.run_pass().await;
        let finished = clock.now();

        match &outcome {
            Ok(report) => info!(
                job = name,
                processed = report.processed,
                skipped = report.skipped,
                errored = report.errored,
                deleted = report.deleted,
                "sync pass finished"
            ),
            Err(err) => error!(job = name, error = %err, "sync pass failed"),
        }

        board
            .update(name, |s| {
                s.last_finished = Some(finished);
                s.passes += 1;
                match outcome {
                    Ok(report) => {
                        s.last_report = Some(report);
                        s.last_error = None;
                    },
                    Err(err) => s.last_error = Some(err.to_string()),
                }
            })
            .await;
    }

    info!(job = name, "job loop stopped");
}
