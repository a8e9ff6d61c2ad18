//! Time normalization: map a variable-length trial onto a fixed number of
//! equally spaced points in normalized time `[0, 1]`.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};

/// Rows needed before any interpolation is defined.
pub const MIN_SAMPLES: usize = 2;

/// Interpolation strategy. No default; callers pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Piecewise linear between neighbouring samples.
    Linear,
    /// Natural cubic spline (zero second derivative at both ends).
    CubicSpline,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Linear => f.write_str("linear"),
            Interpolation::CubicSpline => f.write_str("cubic_spline"),
        }
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Interpolation::Linear),
            "cubic" | "spline" | "cubic_spline" | "cubic-spline" => Ok(Interpolation::CubicSpline),
            other => Err(format!("unknown interpolation method: {other}")),
        }
    }
}

/// Resample every column of `slice` to `target_len` rows.
///
/// Output row `i` sits at normalized time `i / (target_len - 1)`, so the
/// first and last input samples are reproduced exactly. A `target_len` of 1
/// yields the first sample only.
pub fn resample(
    slice: ArrayView2<'_, f64>,
    target_len: usize,
    method: Interpolation,
) -> StoreResult<Array2<f64>> {
    let n = slice.nrows();
    if n < MIN_SAMPLES {
        return Err(StoreError::InsufficientSamples { got: n, need: MIN_SAMPLES });
    }

    let positions = sample_positions(n, target_len);
    let mut out = Array2::zeros((target_len, slice.ncols()));

    for (j, column) in slice.columns().into_iter().enumerate() {
        let values = match method {
            Interpolation::Linear => interpolate_linear(column, &positions),
            Interpolation::CubicSpline => interpolate_natural_cubic(column, &positions),
        };
        out.column_mut(j).assign(&values);
    }
    Ok(out)
}

/// Fractional source-row positions of each output row.
fn sample_positions(n: usize, target_len: usize) -> Vec<f64> {
    let span = (n - 1) as f64;
    match target_len {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let step = span / (target_len - 1) as f64;
            (0..target_len)
                .map(|i| (i as f64 * step).min(span))
                .collect()
        }
    }
}

/// Segment index `k` and offset `t` in `[0, 1]` with `x = k + t`.
fn locate(x: f64, n: usize) -> (usize, f64) {
    let k = (x.floor() as usize).min(n - 2);
    (k, x - k as f64)
}

fn interpolate_linear(y: ArrayView1<'_, f64>, positions: &[f64]) -> Array1<f64> {
    let n = y.len();
    positions
        .iter()
        .map(|&x| {
            let (k, t) = locate(x, n);
            y[k] * (1.0 - t) + y[k + 1] * t
        })
        .collect()
}

fn interpolate_natural_cubic(y: ArrayView1<'_, f64>, positions: &[f64]) -> Array1<f64> {
    let n = y.len();
    let m = natural_spline_second_derivatives(y);
    positions
        .iter()
        .map(|&x| {
            let (k, t) = locate(x, n);
            let s = 1.0 - t;
            s * y[k]
                + t * y[k + 1]
                + ((s * s * s - s) * m[k] + (t * t * t - t) * m[k + 1]) / 6.0
        })
        .collect()
}

/// Second derivatives at the knots of a natural spline on unit spacing.
///
/// Solves `M[i-1] + 4 M[i] + M[i+1] = 6 (y[i+1] - 2 y[i] + y[i-1])` for the
/// interior knots with the Thomas algorithm; `M[0] = M[n-1] = 0`.
fn natural_spline_second_derivatives(y: ArrayView1<'_, f64>) -> Vec<f64> {
    let n = y.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    let interior = n - 2;
    let mut c_prime = vec![0.0; interior];
    let mut d_prime = vec![0.0; interior];
    for i in 0..interior {
        let rhs = 6.0 * (y[i + 2] - 2.0 * y[i + 1] + y[i]);
        if i == 0 {
            c_prime[0] = 1.0 / 4.0;
            d_prime[0] = rhs / 4.0;
        } else {
            let denom = 4.0 - c_prime[i - 1];
            c_prime[i] = 1.0 / denom;
            d_prime[i] = (rhs - d_prime[i - 1]) / denom;
        }
    }

    m[interior] = d_prime[interior - 1];
    for i in (0..interior - 1).rev() {
        m[i + 1] = d_prime[i] - c_prime[i] * m[i + 2];
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn output_has_requested_rows_for_any_input_length() {
        for n in [2, 3, 17, 250] {
            let input = Array2::from_shape_fn((n, 3), |(i, j)| (i * (j + 1)) as f64);
            for target in [1, 2, 50, 101, 400] {
                for method in [Interpolation::Linear, Interpolation::CubicSpline] {
                    let out = resample(input.view(), target, method).unwrap();
                    assert_eq!(out.dim(), (target, 3));
                }
            }
        }
    }

    #[test]
    fn single_sample_is_rejected() {
        let input = array![[1.0, 2.0]];
        let err = resample(input.view(), 10, Interpolation::Linear).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientSamples { got: 1, need: 2 }));

        let empty = Array2::<f64>::zeros((0, 2));
        assert!(resample(empty.view(), 10, Interpolation::CubicSpline).is_err());
    }

    #[test]
    fn linear_hits_endpoints_and_midpoints() {
        let input = array![[0.0], [10.0], [20.0]];
        let out = resample(input.view(), 5, Interpolation::Linear).unwrap();
        let col: Vec<f64> = out.column(0).to_vec();
        assert_eq!(col, vec![0.0, 5.0, 10.0, 15.0, 20.0]);
    }

    #[test]
    fn downsampling_to_one_row_keeps_first_sample() {
        let input = array![[3.0, 4.0], [5.0, 6.0]];
        let out = resample(input.view(), 1, Interpolation::Linear).unwrap();
        assert_eq!(out, array![[3.0, 4.0]]);
    }

    #[test]
    fn cubic_spline_reproduces_linear_data_and_knots() {
        let input = Array2::from_shape_fn((6, 1), |(i, _)| 2.0 * i as f64 + 1.0);
        let out = resample(input.view(), 11, Interpolation::CubicSpline).unwrap();
        for (i, v) in out.column(0).iter().enumerate() {
            let expected = 2.0 * (i as f64 * 0.5) + 1.0;
            assert!((v - expected).abs() < 1e-9, "row {i}: {v} vs {expected}");
        }

        let curved = array![[0.0], [1.0], [4.0], [9.0], [16.0]];
        let same = resample(curved.view(), 5, Interpolation::CubicSpline).unwrap();
        for (a, b) in same.iter().zip(curved.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn methods_parse_from_cli_spellings() {
        assert_eq!("Linear".parse::<Interpolation>().unwrap(), Interpolation::Linear);
        assert_eq!("spline".parse::<Interpolation>().unwrap(), Interpolation::CubicSpline);
        assert!("nearest".parse::<Interpolation>().is_err());
    }
}
