//! Statistics kernel: mean/variance/median summaries, a sign-test
//! p-value, and a one-sided Student's-t mean test probed over a fixed
//! significance ladder.
//!
//! Two formulas here deliberately diverge from the textbook version and
//! are preserved as specified rather than "corrected": `binomial_sign_p`
//! does not scale `q` by `sqrt(2)`, and `summarise`'s median is taken over
//! returns in insertion order, not sorted order.

use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::erf::erf;

/// The fixed significance ladder `students_t_p` probes, in order.
pub const ALPHA_LADDER: [f64; 9] = [1e-5, 1e-4, 1e-3, 1e-2, 5e-2, 1e-1, 2.5e-1, 5e-1, 1.0];

/// Two-sided normal-approximation sign-test p-value for `pos_count`
/// successes out of `total` fair-coin trials.
pub fn binomial_sign_p(pos_count: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    let sigma = (total as f64).sqrt();
    let q = (pos_count as f64 - total as f64 / 2.0).abs() / sigma;
    1.0 - erf(q)
}

/// Smallest alpha in [`ALPHA_LADDER`] at which H0 (mean return = 0) is
/// rejected in favour of the observed sign of `mean`, or `1.0` if no rung
/// rejects.
pub fn students_t_p(mean: f64, sigma: f64, n: usize) -> f64 {
    if n <= 1 {
        return 1.0;
    }
    let se = sigma / (n as f64).sqrt();
    let df = (n - 1) as f64;
    for &alpha in ALPHA_LADDER.iter() {
        let dist = match StudentsT::new(0.0, 1.0, df) {
            Ok(d) => d,
            Err(_) => continue,
        };
        let t = dist.inverse_cdf(1.0 - alpha / 2.0);
        if mean > 0.0 && mean - t * se > 0.0 {
            return alpha;
        }
        if mean < 0.0 && mean + t * se < 0.0 {
            return alpha;
        }
    }
    1.0
}

/// Summary statistics over a sequence of per-match forward returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub sigma: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub mean_pos: f64,
    pub mean_neg: f64,
    pub pos_count: usize,
    pub neg_count: usize,
}

/// Summarise a set of returns. `returns` is consumed in the order its
/// matches were found — the median is computed over that order, not a
/// sorted copy, by design.
pub fn summarise(returns: &[f64]) -> Summary {
    let n = returns.len();
    assert!(n > 0, "summarise requires at least one return");

    let mean = returns.iter().sum::<f64>() / n as f64;

    let sigma = if n > 2 {
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };

    let median = if n % 2 == 0 {
        0.5 * (returns[n / 2 - 1] + returns[n / 2])
    } else {
        returns[n / 2]
    };

    let min = returns.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = returns.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let pos: Vec<f64> = returns.iter().cloned().filter(|&r| r > 0.0).collect();
    let neg: Vec<f64> = returns.iter().cloned().filter(|&r| r <= 0.0).collect();
    let pos_count = pos.len();
    let neg_count = neg.len();
    let mean_pos = if pos_count > 0 {
        pos.iter().sum::<f64>() / pos_count as f64
    } else {
        0.0
    };
    let mean_neg = if neg_count > 0 {
        neg.iter().sum::<f64>() / neg_count as f64
    } else {
        0.0
    };

    Summary {
        mean,
        sigma,
        median,
        min,
        max,
        mean_pos,
        mean_neg,
        pos_count,
        neg_count,
    }
}
