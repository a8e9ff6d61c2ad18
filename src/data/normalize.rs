//! Seam for the pre-fit normalization object written next to each
//! participant's matrices. The store never reads that file; analysis code
//! plugs an implementation in here.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::ColumnRange;

#[derive(Error, Debug, PartialEq)]
pub enum ScalerError {
    #[error("Scaler fitted on {fitted} columns, slice has {found}")]
    WidthMismatch { fitted: usize, found: usize },

    #[error("Column range [{start}, {end}) exceeds the {fitted} fitted columns")]
    RangeOutOfBounds { start: usize, end: usize, fitted: usize },
}

/// Maps a raw slice to its scaled counterpart. Implementations must not
/// change the shape.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, raw: ArrayView2<'_, f64>) -> Result<Array2<f64>, ScalerError>;
}

/// Pass-through used when no scaler is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl Normalizer for IdentityNormalizer {
    fn normalize(&self, raw: ArrayView2<'_, f64>) -> Result<Array2<f64>, ScalerError> {
        Ok(raw.to_owned())
    }
}

/// Per-column z-scoring with externally supplied parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on the rows of `data`. Constant columns get a scale of 1.
    pub fn fit(data: ArrayView2<'_, f64>) -> Self {
        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(data.ncols()));
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });
        Self {
            mean: mean.to_vec(),
            scale: scale.to_vec(),
        }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Restrict to one modality's columns of the combined matrix.
    pub fn for_columns(&self, range: ColumnRange) -> Result<Self, ScalerError> {
        if range.end > self.width() || range.start > range.end {
            return Err(ScalerError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                fitted: self.width(),
            });
        }
        Ok(Self {
            mean: self.mean[range.as_range()].to_vec(),
            scale: self.scale[range.as_range()].to_vec(),
        })
    }
}

impl Normalizer for StandardScaler {
    fn normalize(&self, raw: ArrayView2<'_, f64>) -> Result<Array2<f64>, ScalerError> {
        if raw.ncols() != self.width() {
            return Err(ScalerError::WidthMismatch {
                fitted: self.width(),
                found: raw.ncols(),
            });
        }
        let mut out = raw.to_owned();
        for (j, mut column) in out.columns_mut().into_iter().enumerate() {
            let (mean, scale) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - mean) / scale);
        }
        Ok(out)
    }
}
