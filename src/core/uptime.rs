//! Window arithmetic for time-restricted gatherables.
//!
//! Everything here is a pure function of `(rule, reference time)`. Results
//! are monotonic: a later reference never yields an earlier window start.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{ServerTime, TimeWindow};

/// Real seconds per Eorzea hour.
pub const EORZEA_HOUR_SECS: i64 = 175;
/// Real seconds per Eorzea day.
pub const EORZEA_DAY_SECS: i64 = 24 * EORZEA_HOUR_SECS;
/// Weather rolls over every eight Eorzea hours.
pub const WEATHER_PERIOD_SECS: i64 = 8 * EORZEA_HOUR_SECS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("uptime rule describes a zero-length window")]
    ZeroLength,
    #[error("uptime period must be positive, got {0}")]
    InvalidPeriod(i64),
    #[error("eorzea hour {0} is out of range")]
    InvalidHour(u8),
    #[error("no scheduled window remains after {0}")]
    Exhausted(ServerTime),
    #[error("uptime rule overflows the time range")]
    Overflow,
}

/// A single precomputed availability span in a [`UptimeRule::Schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: ServerTime,
    pub end: ServerTime,
}

/// Periodic availability descriptor as published by the catalog.
///
/// A gatherable without a rule is unrestricted; see [`next_window`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UptimeRule {
    /// Up for `duration` seconds every `period` seconds, first window starting
    /// at `phase` seconds after the epoch.
    Periodic { period: i64, phase: i64, duration: i64 },
    /// Up between two Eorzea hours each Eorzea day. `end_hour` may be lower
    /// than `start_hour` for windows spanning midnight; 24 means midnight.
    EorzeaHours { start_hour: u8, end_hour: u8 },
    /// Explicit windows, e.g. weather-conditioned uptimes computed ahead of
    /// time by the catalog. Order does not matter.
    Schedule { windows: Vec<Span> },
}

impl UptimeRule {
    pub fn next_window(&self, reference: ServerTime) -> Result<TimeWindow, WindowError> {
        match self {
            Self::Periodic { period, phase, duration } => {
                periodic_window(*period, *phase, *duration, reference)
            }
            Self::EorzeaHours { start_hour, end_hour } => {
                let (phase, duration) = eorzea_span(*start_hour, *end_hour)?;
                periodic_window(EORZEA_DAY_SECS, phase, duration, reference)
            }
            Self::Schedule { windows } => scheduled_window(windows, reference),
        }
    }

    /// End of the window directly preceding `window`, if the rule has one.
    pub fn previous_end(&self, window: &TimeWindow) -> Option<ServerTime> {
        if window.is_unbounded() {
            return None;
        }
        match self {
            Self::Periodic { period, duration, .. } => {
                Some(window.start.saturating_add_secs(duration - period))
            }
            Self::EorzeaHours { start_hour, end_hour } => {
                let (_, duration) = eorzea_span(*start_hour, *end_hour).ok()?;
                Some(window.start.saturating_add_secs(duration - EORZEA_DAY_SECS))
            }
            Self::Schedule { windows } => windows
                .iter()
                .filter(|span| span.end <= window.start)
                .map(|span| span.end)
                .max(),
        }
    }
}

/// Window containing `reference`, or the next one to open.
///
/// `None` means the resource is unrestricted and yields the unbounded window.
pub fn next_window(rule: Option<&UptimeRule>, reference: ServerTime) -> Result<TimeWindow, WindowError> {
    match rule {
        Some(rule) => rule.next_window(reference),
        None => Ok(TimeWindow::always()),
    }
}

pub fn previous_end(rule: Option<&UptimeRule>, window: &TimeWindow) -> Option<ServerTime> {
    rule.and_then(|rule| rule.previous_end(window))
}

/// Absolute Eorzea hour counter; changes every [`EORZEA_HOUR_SECS`].
pub const fn eorzea_hour_index(t: ServerTime) -> i64 {
    t.secs().div_euclid(EORZEA_HOUR_SECS)
}

/// Hour of the Eorzea day, `0..24`.
pub const fn eorzea_hour(t: ServerTime) -> u8 {
    eorzea_hour_index(t).rem_euclid(24) as u8
}

/// Absolute weather period counter; changes every [`WEATHER_PERIOD_SECS`].
pub const fn weather_index(t: ServerTime) -> i64 {
    t.secs().div_euclid(WEATHER_PERIOD_SECS)
}

fn periodic_window(period: i64, phase: i64, duration: i64, reference: ServerTime) -> Result<TimeWindow, WindowError> {
    if period <= 0 {
        return Err(WindowError::InvalidPeriod(period));
    }
    if duration <= 0 {
        return Err(WindowError::ZeroLength);
    }
    if duration >= period {
        // Windows touch or overlap: the resource never goes down.
        return Ok(TimeWindow::always());
    }

    // Smallest k with phase + k * period + duration > reference.
    let start = reference
        .secs()
        .checked_sub(phase)
        .and_then(|t| t.checked_sub(duration))
        .map(|t| t.div_euclid(period))
        .and_then(|k| k.checked_add(1))
        .and_then(|k| k.checked_mul(period))
        .and_then(|offset| offset.checked_add(phase))
        .ok_or(WindowError::Overflow)?;
    let end = start.checked_add(duration).ok_or(WindowError::Overflow)?;
    Ok(TimeWindow::bounded(ServerTime(start), ServerTime(end)))
}

fn eorzea_span(start_hour: u8, end_hour: u8) -> Result<(i64, i64), WindowError> {
    if start_hour >= 24 {
        return Err(WindowError::InvalidHour(start_hour));
    }
    if end_hour > 24 {
        return Err(WindowError::InvalidHour(end_hour));
    }
    if start_hour == end_hour {
        return Err(WindowError::ZeroLength);
    }
    let (start, end) = (i64::from(start_hour), i64::from(end_hour));
    let hours = if end > start { end - start } else { end + 24 - start };
    Ok((start * EORZEA_HOUR_SECS, hours * EORZEA_HOUR_SECS))
}

fn scheduled_window(windows: &[Span], reference: ServerTime) -> Result<TimeWindow, WindowError> {
    if windows.iter().any(|span| span.start >= span.end) {
        return Err(WindowError::ZeroLength);
    }
    windows
        .iter()
        .filter(|span| span.end > reference)
        .min_by_key(|span| span.start)
        .map(|span| TimeWindow::bounded(span.start, span.end))
        .ok_or(WindowError::Exhausted(reference))
}
