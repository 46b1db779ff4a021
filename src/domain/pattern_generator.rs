//! Non-homogeneous Poisson arrivals via thinning, with seasonal factors at
//! several calendar granularities plus arbitrary custom cycles.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Timelike};
use rand_pcg::Pcg64;

use crate::error::SimError;
use crate::event::Timestamp;
use crate::samplers;
use crate::sandbox::Sandbox;

/// One custom seasonal cycle: `interval` hours per bucket, `factors.len()`
/// buckets per full cycle.
#[derive(Clone)]
pub struct CustomCycle {
    pub interval: Timestamp,
    pub factors: Vec<f64>,
}

/// Seasonal factor configuration. Every field is optional; an absent or
/// all-zero list normalizes to a flat list of 1s (no seasonality on that
/// dimension). Lists shorter than their fixed granularity are padded with
/// 1.0 (neutral) before normalization; longer lists are truncated.
#[derive(Clone, Default)]
pub struct SeasonalFactors {
    pub hour_of_day: Option<Vec<f64>>,
    pub day_of_week: Option<Vec<f64>>,
    pub day_of_month: Option<Vec<f64>>,
    pub month_of_year: Option<Vec<f64>>,
    pub year: Option<Vec<f64>>,
    pub custom: Vec<CustomCycle>,
}

pub struct PatternGeneratorConfig {
    pub mean_hourly_rate: f64,
    pub factors: SeasonalFactors,
    /// Anchors timestamp 0.0 to a real calendar instant, used solely to
    /// extract hour/weekday/day/month/year components for the seasonal
    /// factor lookups.
    pub epoch: NaiveDateTime,
}

fn normalize(list: Option<Vec<f64>>, len: usize) -> Vec<f64> {
    let mut v: Vec<f64> = list.unwrap_or_default();
    for x in v.iter_mut() {
        if !x.is_finite() || *x < 0.0 {
            *x = 0.0;
        }
    }
    v.resize(len, 1.0);
    v.truncate(len);
    let mean = v.iter().sum::<f64>() / len as f64;
    if mean <= 0.0 {
        vec![1.0; len]
    } else {
        v.iter().map(|x| x / mean).collect()
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let this_month = NaiveDate::from_ymd_opt(year, month, 1).expect("valid calendar month");
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid calendar month");
    (next_month - this_month).num_days() as u32
}

struct NormalizedCustom {
    interval: Timestamp,
    factors: Vec<f64>,
    max: f64,
}

struct PatternGeneratorInner {
    mean_hourly_rate: f64,
    hour_of_day: Vec<f64>,
    hod_max: f64,
    day_of_week: Vec<f64>,
    dow_max: f64,
    day_of_month: Vec<f64>,
    dom_max: f64,
    month_of_year: Vec<f64>,
    moy_max: f64,
    year: Vec<f64>,
    year_max: f64,
    base_year: i32,
    custom: Vec<NormalizedCustom>,
    epoch: NaiveDateTime,
    peak_rate: f64,
    is_on: bool,
    count: u64,
    on_arrive: Vec<Rc<dyn Fn()>>,
}

fn max_of(v: &[f64]) -> f64 {
    v.iter().cloned().fold(f64::MIN, f64::max)
}

impl PatternGeneratorInner {
    fn candidate_acceptance_factor(&self, t: Timestamp) -> (f64, f64) {
        let instant = self.epoch + ChronoDuration::seconds((t * 3600.0).round() as i64);
        let hour = instant.hour() as usize;
        let dow = instant.weekday().num_days_from_monday() as usize;
        let dom = (instant.day() - 1) as usize;
        let moy = (instant.month() - 1) as usize;
        let year = instant.year();

        let mut factor = self.hour_of_day[hour] / self.hod_max;
        factor *= self.day_of_week[dow] / self.dow_max;

        let dom_scale = 31.0 / days_in_month(year, instant.month()) as f64;
        factor *= (self.day_of_month[dom] * dom_scale) / self.dom_max;
        factor *= self.month_of_year[moy] / self.moy_max;

        if !self.year.is_empty() {
            let idx = (year - self.base_year).rem_euclid(self.year.len() as i32) as usize;
            factor *= self.year[idx] / self.year_max;
        }

        for cycle in &self.custom {
            let len = cycle.factors.len().max(1);
            let period = cycle.interval * len as f64;
            let phase = if period > 0.0 { t.rem_euclid(period) } else { 0.0 };
            let idx = ((phase / cycle.interval).floor() as usize).min(len - 1);
            factor *= cycle.factors[idx] / cycle.max;
        }
        (factor, 1.0)
    }
}

/// Emits `on_arrive` notifications following a non-homogeneous Poisson
/// process produced by thinning a homogeneous process at the peak combined
/// rate.
#[derive(Clone)]
pub struct PatternGenerator {
    sandbox: Sandbox,
    inner: Rc<RefCell<PatternGeneratorInner>>,
}

impl PatternGenerator {
    pub fn new(sandbox: Sandbox, config: PatternGeneratorConfig) -> Result<Self, SimError> {
        if config.mean_hourly_rate <= 0.0 {
            return Err(SimError::MissingSampler {
                what: "PatternGenerator mean_hourly_rate must be positive".into(),
            });
        }
        let hour_of_day = normalize(config.factors.hour_of_day, 24);
        let day_of_week = normalize(config.factors.day_of_week, 7);
        let day_of_month = normalize(config.factors.day_of_month, 31);
        let month_of_year = normalize(config.factors.month_of_year, 12);
        let year = config.factors.year.unwrap_or_default();
        let year = if year.iter().any(|v| *v != 0.0) {
            let len = year.len();
            normalize(Some(year), len)
        } else {
            Vec::new()
        };

        let hod_max = max_of(&hour_of_day);
        let dow_max = max_of(&day_of_week);
        let dom_max = max_of(&day_of_month);
        let moy_max = max_of(&month_of_year);
        let year_max = if year.is_empty() { 1.0 } else { max_of(&year) };

        let custom: Vec<NormalizedCustom> = config
            .factors
            .custom
            .into_iter()
            .map(|c| {
                let len = c.factors.len();
                let factors = normalize(Some(c.factors), len.max(1));
                let max = max_of(&factors);
                NormalizedCustom {
                    interval: c.interval,
                    factors,
                    max,
                }
            })
            .collect();

        let mut peak_rate = config.mean_hourly_rate
            * hod_max
            * dow_max
            * dom_max
            * moy_max
            * year_max;
        for c in &custom {
            peak_rate *= c.max;
        }

        let inner = Rc::new(RefCell::new(PatternGeneratorInner {
            mean_hourly_rate: config.mean_hourly_rate,
            hour_of_day,
            hod_max,
            day_of_week,
            dow_max,
            day_of_month,
            dom_max,
            month_of_year,
            moy_max,
            year,
            year_max,
            base_year: config.epoch.year(),
            custom,
            epoch: config.epoch,
            peak_rate,
            is_on: false,
            count: 0,
            on_arrive: Vec::new(),
        }));

        let warm_up_state = inner.clone();
        sandbox.set_warmed_up_handler(move || {
            warm_up_state.borrow_mut().count = 0;
        });

        Ok(PatternGenerator { sandbox, inner })
    }

    pub fn on_arrive(&self, handler: Rc<dyn Fn()>) {
        self.inner.borrow_mut().on_arrive.push(handler);
    }

    pub fn is_on(&self) -> bool {
        self.inner.borrow().is_on
    }

    pub fn count(&self) -> u64 {
        self.inner.borrow().count
    }

    pub fn mean_hourly_rate(&self) -> f64 {
        self.inner.borrow().mean_hourly_rate
    }

    pub fn peak_rate(&self) -> f64 {
        self.inner.borrow().peak_rate
    }

    pub fn start(&self) -> Result<(), SimError> {
        {
            let mut state = self.inner.borrow_mut();
            if state.is_on {
                return Ok(());
            }
            state.is_on = true;
            state.count = 0;
        }
        self.schedule_next_arrival()
    }

    pub fn end(&self) {
        self.inner.borrow_mut().is_on = false;
    }

    fn next_candidate(&self, rng: &mut Pcg64, from: Timestamp) -> Timestamp {
        loop {
            let peak_rate = self.inner.borrow().peak_rate;
            let gap = samplers::exponential(rng, 1.0 / peak_rate);
            let t = from + gap;
            let (factor, _) = self.inner.borrow().candidate_acceptance_factor(t);
            let u = samplers::uniform01(rng);
            if u <= factor {
                return t;
            }
        }
    }

    fn schedule_next_arrival(&self) -> Result<(), SimError> {
        let from = self.sandbox.clock_time();
        let next = {
            let mut rng = self.sandbox.default_rng();
            self.next_candidate(&mut rng, from)
        };
        let delay = next - from;
        let fire = self.clone();
        self.sandbox
            .schedule(move || fire.on_arrival_fire(), delay, Some("pattern-arrival".into()))
            .map(|_| ())
    }

    fn on_arrival_fire(&self) {
        if !self.inner.borrow().is_on {
            return;
        }
        self.inner.borrow_mut().count += 1;
        let _ = self.schedule_next_arrival();
        let handlers = self.inner.borrow().on_arrive.clone();
        for handler in handlers {
            handler();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn flat_pattern_normalizes_all_factors_to_one() {
        let root = Sandbox::new_root("root", 1);
        let pg = PatternGenerator::new(
            root,
            PatternGeneratorConfig {
                mean_hourly_rate: 2.0,
                factors: SeasonalFactors::default(),
                epoch: epoch(),
            },
        )
        .unwrap();
        assert!((pg.peak_rate() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_e_rate_recovery_with_no_seasonality() {
        let root = Sandbox::new_root("root", 7);
        let pg = PatternGenerator::new(
            root.clone(),
            PatternGeneratorConfig {
                mean_hourly_rate: 1.0,
                factors: SeasonalFactors::default(),
                epoch: epoch(),
            },
        )
        .unwrap();
        pg.start().unwrap();
        root.run_count(1000).unwrap();
        let duration = root.clock_time();
        assert!(((duration - 1000.0).abs() / 1000.0) <= 0.05);
    }

    #[test]
    fn all_zero_seasonal_list_becomes_flat() {
        let root = Sandbox::new_root("root", 1);
        let pg = PatternGenerator::new(
            root,
            PatternGeneratorConfig {
                mean_hourly_rate: 1.0,
                factors: SeasonalFactors {
                    hour_of_day: Some(vec![0.0; 24]),
                    ..Default::default()
                },
                epoch: epoch(),
            },
        )
        .unwrap();
        assert!((pg.peak_rate() - 1.0).abs() < 1e-9);
    }
}
