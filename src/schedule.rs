//! Cooperative periodic timers
//!
//! The engine never reads the wall clock. Callers drive it by passing `now`
//! into `tick`, and each periodic job owns an [`IntervalTimer`] that decides
//! whether it is due.

use chrono::{DateTime, Duration, Utc};

use crate::config::MAX_DURATION_MS;

/// Convert a millisecond setting to a `Duration`, clamped to [`MAX_DURATION_MS`]
pub fn span(ms: u64) -> Duration {
    Duration::milliseconds(ms.min(MAX_DURATION_MS) as i64)
}

/// `now - ms`, saturating at the earliest representable instant
pub fn cutoff(now: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    now.checked_sub_signed(span(ms))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `now + ms`, saturating at the latest representable instant
pub fn deadline(now: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    now.checked_add_signed(span(ms))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// True when `later - earlier` exceeds `ms`
pub fn exceeds(earlier: DateTime<Utc>, later: DateTime<Utc>, ms: u64) -> bool {
    u64::try_from((later - earlier).num_milliseconds()).is_ok_and(|elapsed| elapsed > ms)
}

/// A fixed-interval timer that fires at most once per poll.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period_ms: u64,
    next_due: Option<DateTime<Utc>>,
}

impl IntervalTimer {
    /// Create a disarmed timer with the given period (clamped to at least 1ms)
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            next_due: None,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Change the period; an armed timer is rescheduled from `now`
    pub fn set_period(&mut self, period_ms: u64, now: DateTime<Utc>) {
        self.period_ms = period_ms.max(1);
        if self.is_armed() {
            self.arm(now);
        }
    }

    /// Change the period without a reference time. An armed timer keeps its
    /// last anchor (arm or firing) and becomes due one new period after it.
    pub fn rebase_period(&mut self, period_ms: u64) {
        let previous = self.period_ms;
        self.period_ms = period_ms.max(1);
        if let Some(due) = self.next_due {
            let anchor = cutoff(due, previous);
            self.next_due = Some(deadline(anchor, self.period_ms));
        }
    }

    /// Schedule the first firing one period after `now`
    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.next_due = Some(deadline(now, self.period_ms));
    }

    pub fn disarm(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.next_due
    }

    /// Returns true if the timer is due at `now`.
    ///
    /// Missed periods are skipped rather than replayed: the next due time is
    /// the first period boundary strictly after `now`.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }

        let period = self.period_ms.min(MAX_DURATION_MS) as i64;
        let behind_ms = (now - due).num_milliseconds();
        let skipped = behind_ms / period + 1;
        let next = due.checked_add_signed(Duration::milliseconds(skipped.saturating_mul(period)));
        self.next_due = Some(next.unwrap_or(DateTime::<Utc>::MAX_UTC));
        true
    }
}
