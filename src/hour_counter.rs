//! Time-weighted statistic accumulation against a sandbox's clock.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ordered_float::OrderedFloat;

use crate::error::SimError;
use crate::event::Timestamp;
use crate::sandbox::Sandbox;

/// One bin of a [`HourCounter::histogram`] result: `lower_bound` is inclusive,
/// the implied upper bound (`lower_bound + bin_width`) is exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub lower_bound: f64,
    pub hours: f64,
    pub probability: f64,
    pub cumulative_probability: f64,
}

struct HourCounterInner {
    sandbox: Sandbox,
    initial_time: Timestamp,
    last_time: Timestamp,
    last_count: f64,
    total_increment: f64,
    total_decrement: f64,
    total_hours: f64,
    cum_value: f64,
    paused: bool,
    keep_history: bool,
    history: Option<BTreeMap<OrderedFloat<f64>, f64>>,
    hours_for_count: BTreeMap<OrderedFloat<f64>, f64>,
}

/// A piecewise-constant integrator of a scalar count over simulated time,
/// tied to the clock of the [`Sandbox`] it was created from. Cheap to clone
/// (an `Rc` handle); every clone observes and reports the same accumulator.
#[derive(Clone)]
pub struct HourCounter(Rc<RefCell<HourCounterInner>>);

impl HourCounter {
    pub(crate) fn new(sandbox: Sandbox, keep_history: bool) -> Self {
        let t = sandbox.clock_time();
        let inner = HourCounterInner {
            sandbox,
            initial_time: t,
            last_time: t,
            last_count: 0.0,
            total_increment: 0.0,
            total_decrement: 0.0,
            total_hours: 0.0,
            cum_value: 0.0,
            paused: false,
            keep_history,
            history: keep_history.then(BTreeMap::new),
            hours_for_count: BTreeMap::new(),
        };
        HourCounter(Rc::new(RefCell::new(inner)))
    }

    /// Records a new observed level at the sandbox's current clock time.
    pub fn observe_count(&self, count: f64) -> Result<(), SimError> {
        let mut inner = self.0.borrow_mut();
        let t = inner.sandbox.clock_time();
        if t < inner.last_time {
            return Err(SimError::ClockRewind {
                sandbox: inner.sandbox.id(),
                observed: t,
                last: inner.last_time,
            });
        }
        if !inner.paused {
            let dh = t - inner.last_time;
            inner.total_hours += dh;
            let last_count = inner.last_count;
            inner.cum_value += dh * last_count;
            if count > last_count {
                inner.total_increment += count - last_count;
            } else {
                inner.total_decrement += last_count - count;
            }
            *inner
                .hours_for_count
                .entry(OrderedFloat(last_count))
                .or_insert(0.0) += dh;
        }
        inner.last_time = t;
        inner.last_count = count;
        if inner.keep_history {
            if let Some(history) = inner.history.as_mut() {
                history.insert(OrderedFloat(t), count);
            }
        }
        Ok(())
    }

    /// `observe_count(last_count() + delta)`.
    pub fn observe_change(&self, delta: f64) -> Result<(), SimError> {
        let target = self.last_count() + delta;
        self.observe_count(target)
    }

    /// Backward-compatible overload for callers that track the clock
    /// themselves: validates `supplied` against the sandbox's actual clock
    /// before delegating to [`Self::observe_count`].
    pub fn observe_count_at(&self, supplied: Timestamp, count: f64) -> Result<(), SimError> {
        let actual = self.0.borrow().sandbox.clock_time();
        if OrderedFloat(supplied) != OrderedFloat(actual) {
            return Err(SimError::ClockMismatch {
                sandbox: self.0.borrow().sandbox.id(),
                supplied,
                actual,
            });
        }
        self.observe_count(count)
    }

    /// Closes the current interval and stops accumulating until `resume`.
    /// A no-op if already paused.
    pub fn pause(&self) -> Result<(), SimError> {
        let already_paused = self.0.borrow().paused;
        if !already_paused {
            let last = self.last_count();
            self.observe_count(last)?;
            self.0.borrow_mut().paused = true;
        }
        Ok(())
    }

    /// Resumes accumulation, discarding the paused interval. A no-op if not
    /// paused.
    pub fn resume(&self) {
        let mut inner = self.0.borrow_mut();
        if inner.paused {
            inner.last_time = inner.sandbox.clock_time();
            inner.paused = false;
        }
    }

    fn sync(&self) {
        let last = self.last_count();
        self.observe_count(last)
            .expect("hour-counter sync can only move the clock forward");
    }

    pub fn last_time(&self) -> Timestamp {
        self.0.borrow().last_time
    }

    pub fn last_count(&self) -> f64 {
        self.0.borrow().last_count
    }

    pub fn paused(&self) -> bool {
        self.0.borrow().paused
    }

    pub fn keep_history(&self) -> bool {
        self.0.borrow().keep_history
    }

    pub fn history(&self) -> Option<Vec<(Timestamp, f64)>> {
        self.0
            .borrow()
            .history
            .as_ref()
            .map(|h| h.iter().map(|(t, v)| (t.0, *v)).collect())
    }

    pub fn hours_for_count(&self) -> Vec<(f64, f64)> {
        self.sync();
        self.0
            .borrow()
            .hours_for_count
            .iter()
            .map(|(k, v)| (k.0, *v))
            .collect()
    }

    pub fn total_increment(&self) -> f64 {
        self.sync();
        self.0.borrow().total_increment
    }

    pub fn total_decrement(&self) -> f64 {
        self.sync();
        self.0.borrow().total_decrement
    }

    pub fn total_hours(&self) -> f64 {
        self.sync();
        self.0.borrow().total_hours
    }

    pub fn cum_value(&self) -> f64 {
        self.sync();
        self.0.borrow().cum_value
    }

    pub fn increment_rate(&self) -> f64 {
        self.total_increment() / self.total_hours()
    }

    pub fn decrement_rate(&self) -> f64 {
        self.total_decrement() / self.total_hours()
    }

    pub fn average_count(&self) -> f64 {
        self.sync();
        let inner = self.0.borrow();
        if inner.total_hours == 0.0 {
            inner.last_count
        } else {
            inner.cum_value / inner.total_hours
        }
    }

    /// Fraction of elapsed wall-clock (in the simulated-time sense) this
    /// counter has spent unpaused, clamped to `[0, 1]`: a counter created
    /// after the root has already advanced should not be able to report a
    /// ratio above 1.
    pub fn working_time_ratio(&self) -> f64 {
        self.sync();
        let inner = self.0.borrow();
        let denom = inner.last_time - inner.initial_time;
        if denom <= 0.0 {
            0.0
        } else {
            (inner.total_hours / denom).clamp(0.0, 1.0)
        }
    }

    /// Little's law estimate of mean sojourn time, in hours. Zero when the
    /// underlying rates make the quotient non-finite.
    pub fn average_duration(&self) -> f64 {
        let result = self.average_count() / self.decrement_rate();
        if result.is_finite() {
            result
        } else {
            0.0
        }
    }

    /// The smallest observed count whose cumulative held-time reaches `p`
    /// percent of the total held-time.
    pub fn percentile(&self, p: f64) -> f64 {
        self.sync();
        let inner = self.0.borrow();
        let total: f64 = inner.hours_for_count.values().sum();
        if total <= 0.0 {
            return inner.last_count;
        }
        let threshold = p / 100.0 * total;
        let mut cum = 0.0;
        for (k, v) in inner.hours_for_count.iter() {
            cum += v;
            if cum >= threshold {
                return k.0;
            }
        }
        inner
            .hours_for_count
            .keys()
            .next_back()
            .map(|k| k.0)
            .unwrap_or(inner.last_count)
    }

    /// Bins held-time by count into intervals of `bin_width`, starting at
    /// zero. Bin `k` covers `[k * bin_width, (k + 1) * bin_width)`; the final
    /// occupied bin is always emitted, even if only partially filled.
    pub fn histogram(&self, bin_width: f64) -> Vec<HistogramBin> {
        self.sync();
        let inner = self.0.borrow();
        if inner.hours_for_count.is_empty() || bin_width <= 0.0 {
            return Vec::new();
        }
        let max_count = inner.hours_for_count.keys().next_back().unwrap().0;
        let n_bins = (max_count / bin_width).floor() as usize + 1;
        let mut bins = vec![0.0f64; n_bins];
        for (k, v) in inner.hours_for_count.iter() {
            let idx = ((k.0 / bin_width).floor() as usize).min(n_bins - 1);
            bins[idx] += v;
        }
        let total: f64 = bins.iter().sum();
        let mut cumulative = 0.0;
        bins.into_iter()
            .enumerate()
            .map(|(i, hours)| {
                let probability = if total > 0.0 { hours / total } else { 0.0 };
                cumulative += probability;
                HistogramBin {
                    lower_bound: i as f64 * bin_width,
                    hours,
                    probability,
                    cumulative_probability: cumulative,
                }
            })
            .collect()
    }

    /// Resets all accumulators to zero at the current clock, preserving
    /// `last_count`. Called by the sandbox's warm-up propagation.
    pub fn warmed_up(&self) {
        let mut inner = self.0.borrow_mut();
        let t = inner.sandbox.clock_time();
        inner.initial_time = t;
        inner.last_time = t;
        inner.total_hours = 0.0;
        inner.total_increment = 0.0;
        inner.total_decrement = 0.0;
        inner.cum_value = 0.0;
        inner.hours_for_count.clear();
        if inner.keep_history {
            inner.history = Some(BTreeMap::new());
        }
    }

    pub fn as_read_only(&self) -> ReadOnlyHourCounter {
        ReadOnlyHourCounter(self.clone())
    }
}

/// A non-mutating façade over a [`HourCounter`]: every query method, none of
/// the observation/pause/resume methods.
#[derive(Clone)]
pub struct ReadOnlyHourCounter(HourCounter);

impl ReadOnlyHourCounter {
    pub fn last_time(&self) -> Timestamp {
        self.0.last_time()
    }
    pub fn last_count(&self) -> f64 {
        self.0.last_count()
    }
    pub fn paused(&self) -> bool {
        self.0.paused()
    }
    pub fn keep_history(&self) -> bool {
        self.0.keep_history()
    }
    pub fn history(&self) -> Option<Vec<(Timestamp, f64)>> {
        self.0.history()
    }
    pub fn hours_for_count(&self) -> Vec<(f64, f64)> {
        self.0.hours_for_count()
    }
    pub fn total_increment(&self) -> f64 {
        self.0.total_increment()
    }
    pub fn total_decrement(&self) -> f64 {
        self.0.total_decrement()
    }
    pub fn total_hours(&self) -> f64 {
        self.0.total_hours()
    }
    pub fn cum_value(&self) -> f64 {
        self.0.cum_value()
    }
    pub fn increment_rate(&self) -> f64 {
        self.0.increment_rate()
    }
    pub fn decrement_rate(&self) -> f64 {
        self.0.decrement_rate()
    }
    pub fn average_count(&self) -> f64 {
        self.0.average_count()
    }
    pub fn working_time_ratio(&self) -> f64 {
        self.0.working_time_ratio()
    }
    pub fn average_duration(&self) -> f64 {
        self.0.average_duration()
    }
    pub fn percentile(&self, p: f64) -> f64 {
        self.0.percentile(p)
    }
    pub fn histogram(&self, bin_width: f64) -> Vec<HistogramBin> {
        self.0.histogram(bin_width)
    }
}
