//! Minimal seeded-RNG plumbing for the reference domain modules.
//!
//! This is deliberately not a general-purpose random-variable library (that
//! is out of scope, see the crate docs): it is exactly enough sampling to
//! drive [`crate::domain::Generator`], [`crate::domain::Server`], and
//! [`crate::domain::PatternGenerator`].

use rand::Rng;
use rand_distr::{Distribution, Exp};
use rand_pcg::Pcg64;

use crate::event::Timestamp;

/// Samples an exponential inter-event gap with the given mean. Returns 0 for
/// a non-positive mean rather than panicking, since a mean of zero is a
/// degenerate-but-meaningful "fire immediately" configuration in several
/// reference modules.
pub fn exponential(rng: &mut Pcg64, mean: f64) -> Timestamp {
    if mean <= 0.0 {
        return 0.0;
    }
    let dist = Exp::new(1.0 / mean).expect("exponential rate must be finite and positive");
    dist.sample(rng)
}

/// Samples a uniform `[0, 1)` draw, used by the acceptance tests in the
/// thinning loop and anywhere else a bare uniform is needed.
pub fn uniform01(rng: &mut Pcg64) -> f64 {
    rng.gen::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn exponential_of_nonpositive_mean_is_zero() {
        let mut rng = Pcg64::seed_from_u64(1);
        assert_eq!(exponential(&mut rng, 0.0), 0.0);
        assert_eq!(exponential(&mut rng, -1.0), 0.0);
    }

    #[test]
    fn uniform01_is_in_unit_interval() {
        let mut rng = Pcg64::seed_from_u64(1);
        for _ in 0..1000 {
            let u = uniform01(&mut rng);
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn same_seed_replays_identically() {
        let mut a = Pcg64::seed_from_u64(42);
        let mut b = Pcg64::seed_from_u64(42);
        let sa: Vec<f64> = (0..10).map(|_| exponential(&mut a, 2.0)).collect();
        let sb: Vec<f64> = (0..10).map(|_| exponential(&mut b, 2.0)).collect();
        assert_eq!(sa, sb);
    }
}
