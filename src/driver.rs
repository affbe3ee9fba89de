//! Live countdown driver
//!
//! One task owns both timers: a one-second tick that refreshes the countdown
//! and a sleep that fires at local midnight to rebuild the date-scoped
//! schedule. Snapshots are published on a `watch` channel. Shutting down (or
//! dropping the handle) stops the task, which releases both timers at once.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::constants::timing::TICK_MILLIS;
use crate::convention::ParameterBundle;
use crate::ephemeris::Ephemeris;
use crate::error::{CoreError, CoreResult};
use crate::schedule::{DaySchedule, ScheduleCache};
use crate::tracker::{self, PrayerStatus, Tracker};
use crate::types::Coordinates;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Everything the schedule depends on besides the date
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverInputs {
    pub coordinates: Coordinates,
    pub bundle: ParameterBundle,
}

/// Latest snapshot published by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum LiveStatus {
    /// Nothing computed yet
    Starting,
    Ready {
        schedule: DaySchedule,
        status: PrayerStatus,
    },
    Unavailable(CoreError),
}

struct Driver<Tz: TimeZone> {
    ephemeris: Arc<dyn Ephemeris + Send + Sync>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    inputs: DriverInputs,
    cache: ScheduleCache,
    schedule: Option<DaySchedule>,
    tracker: Tracker,
}

impl<Tz: TimeZone> Driver<Tz> {
    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    fn invalidate(&mut self) {
        self.schedule = None;
        self.tracker.reset();
    }

    fn rebuild(&mut self, now: DateTime<Utc>) -> CoreResult<DaySchedule> {
        let date = self.local_date(now);
        let schedule = self.cache.get_or_build(
            &*self.ephemeris,
            &self.inputs.coordinates,
            date,
            &self.inputs.bundle,
        )?;
        info!(%date, coordinates = %self.inputs.coordinates, "Rebuilt schedule");
        self.schedule = Some(schedule.clone());
        Ok(schedule)
    }

    fn current_schedule(&mut self, now: DateTime<Utc>) -> CoreResult<DaySchedule> {
        match &self.schedule {
            Some(schedule) if schedule.date() == self.local_date(now) => Ok(schedule.clone()),
            _ => self.rebuild(now),
        }
    }

    fn try_refresh(&mut self) -> CoreResult<LiveStatus> {
        let now = self.clock.now();
        let mut schedule = self.current_schedule(now)?;
        let mut status =
            tracker::status_at(&*self.ephemeris, &schedule, &self.inputs.bundle, now, &self.tz)?;

        if status.rebuild_due {
            debug!(state = ?status.state, "Tracker requested a rebuild");
            schedule = self.rebuild(now)?;
            status =
                tracker::status_at(&*self.ephemeris, &schedule, &self.inputs.bundle, now, &self.tz)?;
        }

        self.tracker.observe(&status);
        Ok(LiveStatus::Ready { schedule, status })
    }

    fn refresh(&mut self) -> LiveStatus {
        self.try_refresh().unwrap_or_else(|e| {
            warn!(error = %e, "Prayer schedule unavailable");
            self.invalidate();
            LiveStatus::Unavailable(e)
        })
    }

    fn until_midnight(&self) -> Duration {
        let now = self.clock.now();
        let midnight = tracker::local_midnight_after(self.local_date(now), &self.tz);
        (midnight - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .max(Duration::from_secs(1))
    }
}

async fn run<Tz>(
    mut driver: Driver<Tz>,
    status_tx: watch::Sender<LiveStatus>,
    mut inputs_rx: watch::Receiver<DriverInputs>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    Tz: TimeZone + Send,
{
    let mut tick = time::interval(Duration::from_millis(TICK_MILLIS));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let midnight = time::sleep(driver.until_midnight());
    tokio::pin!(midnight);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                status_tx.send_replace(driver.refresh());
            }
            () = &mut midnight => {
                info!("Local midnight reached, rebuilding schedule");
                driver.invalidate();
                status_tx.send_replace(driver.refresh());
                midnight.as_mut().reset(Instant::now() + driver.until_midnight());
            }
            changed = inputs_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                driver.inputs = *inputs_rx.borrow_and_update();
                info!(coordinates = %driver.inputs.coordinates, "Schedule inputs changed");
                driver.invalidate();
                status_tx.send_replace(driver.refresh());
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    info!("Live tracker stopped, timers released");
}

/// Handle to the running driver task
pub struct LiveTracker {
    status: watch::Receiver<LiveStatus>,
    inputs: watch::Sender<DriverInputs>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl LiveTracker {
    /// Start the driver on the current tokio runtime
    pub fn spawn<Tz>(
        ephemeris: Arc<dyn Ephemeris + Send + Sync>,
        clock: Arc<dyn Clock>,
        tz: Tz,
        inputs: DriverInputs,
    ) -> Self
    where
        Tz: TimeZone + Send + 'static,
    {
        let (status_tx, status_rx) = watch::channel(LiveStatus::Starting);
        let (inputs_tx, inputs_rx) = watch::channel(inputs);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let driver = Driver {
            ephemeris,
            clock,
            tz,
            inputs,
            cache: ScheduleCache::new(),
            schedule: None,
            tracker: Tracker::new(),
        };
        let task = tokio::spawn(run(driver, status_tx, inputs_rx, shutdown_rx));
        info!(coordinates = %inputs.coordinates, "Live tracker started");

        Self {
            status: status_rx,
            inputs: inputs_tx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveStatus> {
        self.status.clone()
    }

    pub fn current(&self) -> LiveStatus {
        self.status.borrow().clone()
    }

    /// New location or convention; the schedule is rebuilt immediately
    pub fn set_inputs(&self, inputs: DriverInputs) {
        self.inputs.send_replace(inputs);
    }

    /// Stop both timers and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "Live tracker task failed");
        }
    }
}

impl Drop for LiveTracker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Live tracker dropped, aborting timers");
            task.abort();
        }
    }
}
