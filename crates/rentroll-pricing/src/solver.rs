// SPDX-License-Identifier: Apache-2.0

//! Bounded scalar minimization by golden-section search. Sufficient for the
//! demand objectives here, which are unimodal on the pricing interval.

const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_894_9;
const DEFAULT_TOLERANCE: f64 = 1e-5;
const MAX_ITERATIONS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverError {
    /// Lower bound is not strictly below the upper bound.
    EmptyInterval,
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInterval => write!(f, "minimization interval is empty"),
        }
    }
}

impl std::error::Error for SolverError {}

/// Returns the argmin of `f` on `[lo, hi]` to within `DEFAULT_TOLERANCE`.
pub fn minimize_scalar<F>(f: F, lo: f64, hi: f64) -> Result<f64, SolverError>
where
    F: Fn(f64) -> f64,
{
    if !(lo < hi) || !lo.is_finite() || !hi.is_finite() {
        return Err(SolverError::EmptyInterval);
    }

    let mut a = lo;
    let mut b = hi;
    let mut c = b - GOLDEN_RATIO_CONJUGATE * (b - a);
    let mut d = a + GOLDEN_RATIO_CONJUGATE * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    for _ in 0..MAX_ITERATIONS {
        if (b - a).abs() < DEFAULT_TOLERANCE {
            break;
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - GOLDEN_RATIO_CONJUGATE * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + GOLDEN_RATIO_CONJUGATE * (b - a);
            fd = f(d);
        }
    }

    Ok((a + b) / 2.0)
}
