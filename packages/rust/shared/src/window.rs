//! Reporting date windows and per-source lag adjustment.
//!
//! The effective window comes from explicit override dates when both are
//! configured, otherwise a trailing window of `window_days` ending today.
//! Sources whose backend data lags real time get a derived copy shifted
//! backward by the lag, never a mutation of the canonical window.

use chrono::NaiveDate;

use crate::error::{ReportcastError, Result};

/// Default trailing window length in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// An inclusive `[start, end]` reporting interval. Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingWindow {
    /// Create a window, rejecting inverted ranges.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ReportcastError::validation(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Trailing window of `days` ending at `end` (inclusive).
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        Self {
            start: end - chrono::Duration::days(i64::from(days)),
            end,
        }
    }

    /// Window length in days (end - start).
    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Derived window for a source whose data lags `lag_days` behind real
    /// time. Length is preserved where possible; when the lag eats the
    /// whole window the result collapses to the single day `end - lag`.
    pub fn for_lag(&self, lag_days: u32) -> Self {
        if lag_days == 0 {
            return *self;
        }
        let lag = chrono::Duration::days(i64::from(lag_days));
        let end = self.end - lag;
        let mut start = end - chrono::Duration::days(self.length_days());
        if start > end {
            start = end;
        }
        Self { start, end }
    }
}

impl std::fmt::Display for ReportingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Resolve the canonical run window from config and CLI overrides.
///
/// Both override dates must be present to take effect; a half-specified
/// override is a config error rather than a silent fallback.
pub fn resolve_window(
    window_days: u32,
    override_start: Option<NaiveDate>,
    override_end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<ReportingWindow> {
    match (override_start, override_end) {
        (Some(start), Some(end)) => ReportingWindow::new(start, end),
        (None, None) => Ok(ReportingWindow::trailing(today, window_days)),
        _ => Err(ReportcastError::config(
            "both start and end dates must be given to override the window",
        )),
    }
}
