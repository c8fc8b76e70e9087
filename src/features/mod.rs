//! Per-feature prompt builders and heuristic fallbacks.
//!
//! Each feature pairs a pure prompt builder with a deterministic fallback that
//! produces the same output shape without a model.

pub mod cost;
pub mod forecast;
pub mod metrics;
pub mod schedule;
pub mod schema_gap;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::HeuristicConfig;

pub use cost::CostOptimization;
pub use forecast::DemandForecast;
pub use metrics::MetricsCorrelation;
pub use schedule::ScheduleOptimization;
pub use schema_gap::SchemaGap;

/// Rendered instruction handed to the model invoker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub prompt: String,
    pub system_instruction: String,
}

pub trait Feature {
    /// Stable name used in logs and on the CLI.
    const NAME: &'static str;

    type Input: Sync;
    type Output: DeserializeOwned + Serialize + Send;

    /// `rules` supplies the defaults shown for unset input values.
    fn build_prompt(input: &Self::Input, rules: &HeuristicConfig) -> PromptPair;

    fn fallback(input: &Self::Input, rules: &HeuristicConfig) -> Self::Output;

    /// Post-process a decoded model answer, e.g. fill derived fields.
    fn finalize(_input: &Self::Input, output: Self::Output) -> Self::Output {
        output
    }
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Every date from start to end. Empty when the range is inverted.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn day_count(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }
}

/// Render at most `limit` items one per line, with a suffix line when truncated.
pub(crate) fn bounded_lines<T>(
    items: &[T],
    limit: usize,
    render: impl Fn(&T) -> String,
    more: impl Fn(usize) -> String,
) -> String {
    let mut lines: Vec<String> = items.iter().take(limit).map(render).collect();
    if items.len() > limit {
        lines.push(more(items.len() - limit));
    }
    lines.join("\n")
}

/// The trailing `n` items.
pub(crate) fn last_n<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of `part` in `whole` as a percentage, 0 when `whole` is not positive.
pub(crate) fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

pub(crate) fn day_name(weekday_from_sunday: u32) -> &'static str {
    match weekday_from_sunday {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_days_inclusive() {
        let period = Period::new(date(2025, 1, 30), date(2025, 2, 2));
        let days: Vec<_> = period.days().collect();
        assert_eq!(days.len(), 4);
        assert_eq!(period.day_count(), 4);
        assert_eq!(days[3], date(2025, 2, 2));
    }

    #[test]
    fn test_inverted_period_is_empty() {
        let period = Period::new(date(2025, 2, 2), date(2025, 1, 30));
        assert_eq!(period.days().count(), 0);
        assert_eq!(period.day_count(), 0);
    }

    #[test]
    fn test_bounded_lines_suffix() {
        let items: Vec<u32> = (1..=12).collect();
        let out = bounded_lines(&items, 10, |i| i.to_string(), |k| format!("+{k} more"));
        assert_eq!(out.lines().count(), 11);
        assert!(out.ends_with("+2 more"));

        let out = bounded_lines(&items[..3], 10, |i| i.to_string(), |k| format!("+{k} more"));
        assert_eq!(out, "1\n2\n3");
    }

    #[test]
    fn test_numeric_helpers_on_empty_input() {
        assert_eq!(mean(std::iter::empty()), 0.0);
        assert_eq!(percentage(10.0, 0.0), 0.0);
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(last_n(&[1, 2, 3], 10), &[1, 2, 3]);
        assert_eq!(last_n(&[1, 2, 3], 2), &[2, 3]);
    }
}
