//! Deviation Evaluator (C4): reduces a window into `(first, last)`,
//! computes the percent deviation, and builds the `SignalReading`.

use sv_common::{DeviationCondition, SignalReading, SignalStrategy, Window};

/// Applies `strategy` to `window`, producing the `(first, last)` pair fed
/// to the percentage calculation. Returns `None` for an empty window.
fn reduce(window: &Window, strategy: SignalStrategy) -> Option<(f64, f64)> {
    match strategy {
        SignalStrategy::OldestNewest => {
            let first = window.earliest()?.value;
            let last = window.latest()?.value;
            Some((first, last))
        }
        SignalStrategy::MinMax => {
            let first = window.min_value()?;
            let last = window.max_value()?;
            Some((first, last))
        }
    }
}

/// `round(|1 - first/last| * 100)`. Skipped (returns `None`) when `last`
/// is zero — an explicit edge case, not a panic.
fn percent_deviation(first: f64, last: f64) -> Option<u32> {
    if last == 0.0 {
        return None;
    }
    Some((1.0 - first / last).abs() * 100.0)
        .map(|percent| percent.round() as u32)
}

/// Reduces `window` per `condition`'s strategy and builds the evaluated
/// `SignalReading`. Returns `None` when the window is empty or `last == 0`;
/// callers should treat `None` as "skip this iteration", not an error.
///
/// A single-point `OldestNewest` window (`first == last`) yields `diff =
/// 0`, which is inert until enough samples accumulate — no special case is
/// needed for it.
pub fn evaluate(
    condition: &DeviationCondition,
    strategy: SignalStrategy,
    window: &Window,
) -> Option<SignalReading> {
    let (first, last) = reduce(window, strategy)?;
    let diff = percent_deviation(first, last)?;
    Some(SignalReading {
        first,
        last,
        increased: last > first,
        diff,
    })
}

/// Percent comparisons are inclusive: a reading exactly at threshold fires.
pub fn exceeds_threshold(reading: &SignalReading, condition: &DeviationCondition) -> bool {
    reading.diff >= condition.difference
}
