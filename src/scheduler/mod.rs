//! Calendar triggers.
//!
//! # Responsibilities
//! - Evaluate daily, weekly, monthly and yearly triggers in the configured
//!   timezone once a minute
//! - Fire each trigger at most once per period
//! - Stop on the shutdown signal
//!
//! # Design Decisions
//! - A trigger is due for the whole `run_at_hour` hour, so a late or
//!   drifting tick still fires it; the period key prevents a second firing
//! - Each trigger fires on exactly one calendar day per period, so that
//!   local date is the period key
//! - Trigger actions are log lines; real work would be dispatched to a pool

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

use crate::config::schema::SchedulerConfig;
use crate::lifecycle::shutdown::ShutdownSignal;

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown timezone {0:?}")]
    Timezone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    /// Sundays.
    Weekly,
    /// The 1st of each month.
    Monthly,
    /// 1 January.
    Yearly,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Daily, Period::Weekly, Period::Monthly, Period::Yearly];

    fn is_due_on(&self, date: NaiveDate) -> bool {
        match self {
            Period::Daily => true,
            Period::Weekly => date.weekday() == Weekday::Sun,
            Period::Monthly => date.day() == 1,
            Period::Yearly => date.month() == 1 && date.day() == 1,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Yearly => "yearly",
        })
    }
}

/// One calendar trigger and its last firing.
#[derive(Debug, Clone)]
pub struct PeriodicTrigger {
    period: Period,
    hour: u32,
    last_fired: Option<NaiveDate>,
}

impl PeriodicTrigger {
    pub fn new(period: Period, hour: u32) -> Self {
        Self {
            period,
            hour,
            last_fired: None,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    /// Returns `true` when the trigger should fire at local time `now`.
    pub fn poll(&mut self, now: &DateTime<Tz>) -> bool {
        let date = now.date_naive();
        if now.hour() != self.hour || !self.period.is_due_on(date) {
            return false;
        }
        if self.last_fired == Some(date) {
            return false;
        }
        self.last_fired = Some(date);
        true
    }
}

pub struct Scheduler {
    tz: Tz,
    triggers: Vec<PeriodicTrigger>,
}

impl Scheduler {
    pub fn new(tz: Tz, hour: u32) -> Self {
        Self {
            tz,
            triggers: Period::ALL.iter().map(|p| PeriodicTrigger::new(*p, hour)).collect(),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_| SchedulerError::Timezone(config.timezone.clone()))?;
        Ok(Self::new(tz, config.run_at_hour))
    }

    /// Evaluate every trigger at `now` and return the ones that fired.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Period> {
        let local = now.with_timezone(&self.tz);
        self.triggers
            .iter_mut()
            .filter_map(|t| t.poll(&local).then_some(t.period()))
            .collect()
    }

    pub async fn run(mut self, mut signal: ShutdownSignal) {
        tracing::info!(timezone = %self.tz, "Scheduler started");
        let mut ticker = tokio::time::interval(CHECK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = signal.recv() => break,
                _ = ticker.tick() => {
                    let now = Utc::now();
                    for period in self.tick(now) {
                        tracing::info!(
                            period = %period,
                            local_time = %now.with_timezone(&self.tz),
                            "Scheduled job executed"
                        );
                    }
                }
            }
        }
        tracing::info!("Scheduler stopping");
    }
}
