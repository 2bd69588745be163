//! Shape-preserving piecewise cubic Hermite interpolation.
//!
//! Slopes follow Fritsch & Carlson (1980) with the weighted harmonic mean of
//! Fritsch & Butland at interior knots and a non-centred three-point formula
//! at the ends, so the interpolant never overshoots monotone data.

use crate::error::SnicarError;

/// Piecewise cubic Hermite interpolant through a set of knots.
#[derive(Debug, Clone)]
pub(crate) struct MonotoneCubic {
    /// Strictly increasing knots.
    xs: Vec<f64>,
    /// Values at the knots.
    ys: Vec<f64>,
    /// Derivatives at the knots.
    slopes: Vec<f64>,
}

impl MonotoneCubic {
    /// Build the interpolant. Needs at least two strictly increasing knots.
    pub(crate) fn new(xs: &[f64], ys: &[f64]) -> Result<Self, SnicarError> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return Err(SnicarError::InconsistentInputs(
                "interpolation needs at least two knots with one value each".into(),
            ));
        }
        if xs.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(SnicarError::InconsistentInputs(
                "interpolation knots must be strictly increasing".into(),
            ));
        }

        let n = xs.len();
        let h: Vec<f64> = xs.windows(2).map(|pair| pair[1] - pair[0]).collect();
        let delta: Vec<f64> = (0..n - 1).map(|k| (ys[k + 1] - ys[k]) / h[k]).collect();

        let mut slopes = vec![0.0; n];
        if n == 2 {
            slopes[0] = delta[0];
            slopes[1] = delta[0];
        } else {
            for k in 1..n - 1 {
                if delta[k - 1] * delta[k] > 0.0 {
                    let w1 = 2.0 * h[k] + h[k - 1];
                    let w2 = h[k] + 2.0 * h[k - 1];
                    slopes[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
                }
            }
            slopes[0] = end_slope(h[0], h[1], delta[0], delta[1]);
            slopes[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
        }

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            slopes,
        })
    }

    /// Evaluate at `x`. Outside the knots the end polynomial is extended.
    pub(crate) fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();

        // Binary search for the enclosing interval
        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let h = self.xs[hi] - self.xs[lo];
        let s = (x - self.xs[lo]) / h;
        let s2 = s * s;
        let s3 = s2 * s;

        (2.0 * s3 - 3.0 * s2 + 1.0) * self.ys[lo]
            + (s3 - 2.0 * s2 + s) * h * self.slopes[lo]
            + (-2.0 * s3 + 3.0 * s2) * self.ys[hi]
            + (s3 - s2) * h * self.slopes[hi]
    }
}

/// Three-point slope at an end knot, limited to keep the shape.
///
/// `h0`/`delta0` belong to the interval touching the end knot, `h1`/`delta1`
/// to its neighbour.
fn end_slope(h0: f64, h1: f64, delta0: f64, delta1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * delta0 - h0 * delta1) / (h0 + h1);
    if d.signum() != delta0.signum() || delta0 == 0.0 {
        0.0
    } else if delta0.signum() != delta1.signum() && d.abs() > 3.0 * delta0.abs() {
        3.0 * delta0
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn passes_through_knots() {
        let xs = [0.475, 1.055, 1.655, 2.2, 3.0, 3.75, 4.5];
        let ys = [0.87, 0.88, 0.90, 0.93, 0.97, 0.95, 0.96];
        let interp = MonotoneCubic::new(&xs, &ys).unwrap();

        for (x, y) in xs.iter().zip(&ys) {
            assert_abs_diff_eq!(interp.evaluate(*x), *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn monotone_data_stays_monotone() {
        let xs = [0.0, 1.0, 1.1, 3.0, 4.0];
        let ys = [0.0, 0.1, 0.9, 0.95, 1.0];
        let interp = MonotoneCubic::new(&xs, &ys).unwrap();

        let mut previous = interp.evaluate(0.0);
        for i in 1..=400 {
            let value = interp.evaluate(i as f64 * 0.01);
            assert!(value >= previous - 1e-12, "not monotone at {}", i as f64 * 0.01);
            assert!(value <= 1.0 + 1e-12);
            previous = value;
        }
    }

    #[test]
    fn flat_segments_stay_flat() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 2.0, 2.0, 1.0];
        let interp = MonotoneCubic::new(&xs, &ys).unwrap();
        for i in 0..=10 {
            assert_abs_diff_eq!(interp.evaluate(1.0 + i as f64 * 0.1), 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn two_knots_is_linear() {
        let interp = MonotoneCubic::new(&[1.0, 3.0], &[2.0, 6.0]).unwrap();
        assert_abs_diff_eq!(interp.evaluate(2.0), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(interp.evaluate(4.0), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_bad_knots() {
        assert!(MonotoneCubic::new(&[1.0], &[2.0]).is_err());
        assert!(MonotoneCubic::new(&[1.0, 1.0], &[2.0, 3.0]).is_err());
        assert!(MonotoneCubic::new(&[1.0, 2.0], &[2.0]).is_err());
    }
}
