//! Rolling statistic: turns a cumulative counter series into a per-second rate.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    timestamp_ms: u64,
    value: f64,
}

/// Accumulator for one monotonically nondecreasing kernel counter.
///
/// `update` always takes the cumulative value, never a delta. A counter that
/// goes backwards (device reset, wrap, remount) restarts accumulation from
/// the new value instead of producing a negative rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollingStatistic {
    last: Option<Sample>,
    rate_per_sec: Option<f64>,
}

/// Serializable view of a statistic for reports.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct StatisticView {
    pub raw: Option<f64>,
    pub per_second: Option<f64>,
}

impl RollingStatistic {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, timestamp_ms: u64, value: f64) {
        let Some(previous) = self.last else {
            self.last = Some(Sample {
                timestamp_ms,
                value,
            });
            return;
        };

        if timestamp_ms == previous.timestamp_ms {
            // Same instant: nothing to derive, keep the earlier sample.
            return;
        }

        if timestamp_ms < previous.timestamp_ms || value < previous.value {
            self.last = Some(Sample {
                timestamp_ms,
                value,
            });
            self.rate_per_sec = None;
            return;
        }

        let elapsed_ms = (timestamp_ms - previous.timestamp_ms) as f64;
        self.rate_per_sec = Some((value - previous.value) * 1000.0 / elapsed_ms);
        self.last = Some(Sample {
            timestamp_ms,
            value,
        });
    }

    /// Forget everything; the next value becomes a fresh baseline.
    pub fn reset(&mut self) {
        self.last = None;
        self.rate_per_sec = None;
    }

    /// Units per second between the two most recent samples.
    #[must_use]
    pub const fn rate(&self) -> Option<f64> {
        self.rate_per_sec
    }

    /// Last cumulative value seen.
    #[must_use]
    pub fn raw(&self) -> Option<f64> {
        self.last.map(|sample| sample.value)
    }

    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.last.is_some()
    }

    #[must_use]
    pub fn view(&self) -> StatisticView {
        StatisticView {
            raw: self.raw(),
            per_second: self.rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_sample_has_no_rate() {
        let mut stat = RollingStatistic::new();
        stat.update(1_000, 50.0);
        assert!(stat.has_data());
        assert_eq!(stat.raw(), Some(50.0));
        assert_eq!(stat.rate(), None);
    }

    #[test]
    fn rate_is_per_second() {
        let mut stat = RollingStatistic::new();
        stat.update(1_000, 0.0);
        stat.update(1_500, 512.0);
        assert_eq!(stat.rate(), Some(1024.0));
    }

    #[test]
    fn counter_reset_restarts_baseline() {
        let mut stat = RollingStatistic::new();
        stat.update(1_000, 900.0);
        stat.update(2_000, 1_000.0);
        stat.update(3_000, 10.0);
        assert_eq!(stat.rate(), None);
        stat.update(4_000, 30.0);
        assert_eq!(stat.rate(), Some(20.0));
    }

    #[test]
    fn timestamp_regression_restarts_baseline() {
        let mut stat = RollingStatistic::new();
        stat.update(5_000, 10.0);
        stat.update(6_000, 20.0);
        stat.update(2_000, 25.0);
        assert_eq!(stat.rate(), None);
        assert_eq!(stat.raw(), Some(25.0));
    }

    #[test]
    fn duplicate_timestamp_is_ignored() {
        let mut stat = RollingStatistic::new();
        stat.update(1_000, 10.0);
        stat.update(2_000, 20.0);
        stat.update(2_000, 90.0);
        assert_eq!(stat.rate(), Some(10.0));
        assert_eq!(stat.raw(), Some(20.0));
    }

    #[test]
    fn reset_means_no_data() {
        let mut stat = RollingStatistic::new();
        stat.update(1_000, 1.0);
        stat.update(2_000, 2.0);
        stat.reset();
        assert!(!stat.has_data());
        assert_eq!(stat.view(), StatisticView { raw: None, per_second: None });
    }

    proptest! {
        #[test]
        fn rate_matches_delta_over_elapsed(
            t1 in 0_u64..1_000_000,
            dt in 1_u64..100_000,
            v1 in 0_u64..1_000_000_000,
            dv in 0_u64..1_000_000_000,
        ) {
            let mut stat = RollingStatistic::new();
            stat.update(t1, v1 as f64);
            stat.update(t1 + dt, (v1 + dv) as f64);
            let expected = dv as f64 / dt as f64 * 1000.0;
            let rate = stat.rate().expect("rate after two samples");
            prop_assert!((rate - expected).abs() <= expected.abs() * 1e-9 + 1e-9);
        }

        #[test]
        fn decreasing_counter_never_yields_negative_rate(
            t1 in 0_u64..1_000_000,
            dt1 in 1_u64..10_000,
            dt2 in 1_u64..10_000,
            v1 in 1_u64..1_000_000,
            drop in 1_u64..1_000_000,
            after in 0_u64..1_000_000,
        ) {
            let high = v1 + drop;
            let mut stat = RollingStatistic::new();
            stat.update(t1, high as f64);
            stat.update(t1 + dt1, v1 as f64);
            prop_assert!(stat.rate().is_none());
            stat.update(t1 + dt1 + dt2, (v1 + after) as f64);
            let rate = stat.rate().expect("rate after restart");
            prop_assert!(rate >= 0.0);
            let expected = after as f64 / dt2 as f64 * 1000.0;
            prop_assert!((rate - expected).abs() <= expected * 1e-9 + 1e-9);
        }
    }
}
