//! Behavioral feature derivation
//!
//! Computes rolling features from the trailing window of the event histories.

use chrono::{DateTime, Utc};

use crate::behavior::history::BehaviorHistories;
use crate::behavior::types::{BehaviorFeatures, PointerSample, ScrollSample};
use crate::schedule;

/// Feature deriver for the behavior histories
pub struct BehaviorFeatureDeriver;

impl BehaviorFeatureDeriver {
    /// Derive features at `now` from events newer than `now - window_ms`
    pub fn derive(
        histories: &BehaviorHistories,
        now: DateTime<Utc>,
        window_ms: u64,
    ) -> BehaviorFeatures {
        let since = schedule::cutoff(now, window_ms);

        let pointer: Vec<&PointerSample> = histories.pointer.newer_than(since).collect();
        let scroll: Vec<&ScrollSample> = histories.scroll.newer_than(since).collect();
        let recent_clicks = histories.clicks.newer_than(since).count();

        BehaviorFeatures {
            pointer_speed: compute_pointer_speed(&pointer),
            scroll_speed: compute_scroll_speed(&scroll),
            click_frequency: compute_click_frequency(recent_clicks, window_ms),
            dwell_time_ms: elapsed_ms(histories.earliest(), now),
            hesitation_time_ms: elapsed_ms(histories.clicks.latest(), now),
        }
    }
}

/// Compute pointer speed in px/s
///
/// Formula: `sum(euclidean step distance) / (last.t - first.t)`
/// Fewer than two samples, or a zero time span, yields 0.
fn compute_pointer_speed(samples: &[&PointerSample]) -> f64 {
    let distance: f64 = samples
        .windows(2)
        .map(|pair| (pair[1].x - pair[0].x).hypot(pair[1].y - pair[0].y))
        .sum();
    speed_over_span(
        distance,
        samples.first().map(|s| s.timestamp),
        samples.last().map(|s| s.timestamp),
        samples.len(),
    )
}

/// Compute scroll speed in px/s
///
/// Formula: `sum(|Δy|) / (last.t - first.t)`
fn compute_scroll_speed(samples: &[&ScrollSample]) -> f64 {
    let distance: f64 = samples
        .windows(2)
        .map(|pair| (pair[1].y - pair[0].y).abs())
        .sum();
    speed_over_span(
        distance,
        samples.first().map(|s| s.timestamp),
        samples.last().map(|s| s.timestamp),
        samples.len(),
    )
}

fn speed_over_span(
    distance: f64,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    count: usize,
) -> f64 {
    if count < 2 {
        return 0.0;
    }
    let (Some(first), Some(last)) = (first, last) else {
        return 0.0;
    };
    let span_sec = (last - first).num_milliseconds() as f64 / 1000.0;
    if span_sec > 0.0 {
        distance / span_sec
    } else {
        0.0
    }
}

/// Compute click frequency in clicks/min
///
/// Formula: `clicks_in_window / (window_ms / 60_000)`
fn compute_click_frequency(recent_clicks: usize, window_ms: u64) -> f64 {
    if window_ms == 0 {
        return 0.0;
    }
    let minutes = window_ms as f64 / 60_000.0;
    recent_clicks as f64 / minutes
}

/// Milliseconds from `since` to `now`, or 0 when there is no reference event
fn elapsed_ms(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    since
        .map(|t| (now - t).num_milliseconds().max(0) as f64)
        .unwrap_or(0.0)
}
