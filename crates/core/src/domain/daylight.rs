//! Simulated time of day and the calling multiplier it implies

use crate::domain::config::{ConfigError, SimulationTimeConfig, TimeOfDayConfig};
use std::fmt;
use thiserror::Error;

pub const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day {0:?}, expected HH:MM")]
pub struct InvalidTimeOfDay(pub String);

/// Seconds since midnight, always in `[0, 86400)`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct TimeOfDay(f64);

impl TimeOfDay {
    /// Wrap any number of seconds onto the 24 h clock
    pub fn from_seconds(seconds: f64) -> Self {
        let wrapped = seconds.rem_euclid(SECONDS_PER_DAY);
        Self(if wrapped >= SECONDS_PER_DAY { 0.0 } else { wrapped })
    }

    pub fn from_hm(hours: u32, minutes: u32) -> Self {
        Self::from_seconds(f64::from(hours * 3600 + minutes * 60))
    }

    /// Parse "HH:MM" (or a bare "HH")
    pub fn parse(text: &str) -> Result<Self, InvalidTimeOfDay> {
        let err = || InvalidTimeOfDay(text.to_string());
        let mut parts = text.trim().splitn(2, ':');
        let hours: u32 = parts
            .next()
            .and_then(|h| h.trim().parse().ok())
            .ok_or_else(err)?;
        let minutes: u32 = match parts.next() {
            Some(m) => m.trim().parse().map_err(|_| err())?,
            None => 0,
        };
        if hours >= 24 || minutes >= 60 {
            return Err(err());
        }
        Ok(Self::from_hm(hours, minutes))
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }

    pub fn hours(&self) -> f64 {
        self.0 / 3600.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0 as u64;
        write!(
            f,
            "{:02}:{:02}:{:02}",
            (total / 3600) % 24,
            (total % 3600) / 60,
            total % 60
        )
    }
}

/// Maps real elapsed seconds onto the simulated day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    start: TimeOfDay,
    time_scale: f64,
}

impl SimClock {
    pub fn new(start: TimeOfDay, time_scale: f64) -> Self {
        Self { start, time_scale }
    }

    pub fn from_config(config: &SimulationTimeConfig) -> Result<Self, ConfigError> {
        let start = TimeOfDay::parse(&config.start_time)
            .map_err(|e| ConfigError::Invalid(format!("simulation_time.start_time: {e}")))?;
        Ok(Self::new(start, config.time_scale))
    }

    pub fn start(&self) -> TimeOfDay {
        self.start
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn at(&self, elapsed_real: f64) -> TimeOfDay {
        TimeOfDay::from_seconds(self.start.seconds() + elapsed_real * self.time_scale)
    }
}

/// Period of the simulated day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPeriod {
    Dawn,
    Daylight,
    Night,
}

/// Calling multipliers over the day, parsed from [`TimeOfDayConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct DaylightSchedule {
    enabled: bool,
    dawn_start: f64,
    dawn_end: f64,
    dawn_multiplier: f64,
    daylight_start: f64,
    daylight_end: f64,
    daylight_multiplier: f64,
    nighttime_multiplier: f64,
}

impl DaylightSchedule {
    pub fn from_config(config: &TimeOfDayConfig) -> Result<Self, ConfigError> {
        let parse = |name: &str, value: &str| {
            TimeOfDay::parse(value)
                .map(|t| t.seconds())
                .map_err(|e| ConfigError::Invalid(format!("calling.time_of_day.{name}: {e}")))
        };
        let dawn = parse("dawn_time", &config.dawn_time)?;
        let half_window = config.dawn_duration_hours * 3600.0 / 2.0;

        Ok(Self {
            enabled: config.enabled,
            dawn_start: TimeOfDay::from_seconds(dawn - half_window).seconds(),
            dawn_end: TimeOfDay::from_seconds(dawn + half_window).seconds(),
            dawn_multiplier: config.dawn_multiplier,
            daylight_start: parse("daylight_start", &config.daylight_start)?,
            daylight_end: parse("daylight_end", &config.daylight_end)?,
            daylight_multiplier: config.daylight_multiplier,
            nighttime_multiplier: config.nighttime_multiplier,
        })
    }

    pub fn period(&self, now: TimeOfDay) -> DayPeriod {
        let t = now.seconds();
        let in_dawn = if self.dawn_start <= self.dawn_end {
            self.dawn_start <= t && t <= self.dawn_end
        } else {
            t >= self.dawn_start || t <= self.dawn_end
        };
        if in_dawn {
            DayPeriod::Dawn
        } else if self.daylight_start <= t && t <= self.daylight_end {
            DayPeriod::Daylight
        } else {
            DayPeriod::Night
        }
    }

    /// Calling frequency multiplier, 1.0 when disabled
    pub fn multiplier(&self, now: TimeOfDay) -> f64 {
        if !self.enabled {
            return 1.0;
        }
        match self.period(now) {
            DayPeriod::Dawn => self.dawn_multiplier,
            DayPeriod::Daylight => self.daylight_multiplier,
            DayPeriod::Night => self.nighttime_multiplier,
        }
    }
}
