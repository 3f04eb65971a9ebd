//! Error types returned by model construction and estimation.

use ndarray_linalg::error::LinalgError;
use std::fmt;
use thiserror::Error;

/// Shape a matrix argument was required to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeExpectation {
    /// Exactly `rows x cols`
    Exactly(usize, usize),
    /// Given number of rows, any number of columns
    Rows(usize),
    /// Given number of columns, any number of rows
    Columns(usize),
    /// A single column
    ColumnVector,
    /// A single column or a square matrix
    ColumnVectorOrSquare,
    /// Any square matrix
    Square,
    /// One-dimensional array of given length
    Length(usize),
}

impl fmt::Display for ShapeExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeExpectation::Exactly(rows, cols) => write!(f, "({}, {})", rows, cols),
            ShapeExpectation::Rows(rows) => write!(f, "({}, _)", rows),
            ShapeExpectation::Columns(cols) => write!(f, "(_, {})", cols),
            ShapeExpectation::ColumnVector => write!(f, "(_, 1)"),
            ShapeExpectation::ColumnVectorOrSquare => write!(f, "(k, 1) or (k, k)"),
            ShapeExpectation::Square => write!(f, "(k, k)"),
            ShapeExpectation::Length(len) => write!(f, "({},)", len),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid shape for `{matrix}`: expected {expected}, got {actual:?}")]
    InvalidShape {
        matrix: &'static str,
        expected: ShapeExpectation,
        actual: Vec<usize>,
    },

    /// The innovation covariance could not be factorised, or is too badly conditioned
    /// for the Kalman gain solve. `rcond` is `None` when the factorisation itself failed.
    #[error("innovation covariance is singular (reciprocal condition number: {rcond:?})")]
    SingularInnovationCovariance { rcond: Option<f64> },

    #[error("{noise} noise covariance is not positive semidefinite (eigenvalue {eigenvalue})")]
    NotPositiveSemidefinite {
        noise: &'static str,
        eigenvalue: f64,
    },

    /// A full covariance differs from its (conjugate) transpose by more than round-off.
    /// `deviation` is the largest absolute difference between mirrored entries.
    #[error("{noise} noise covariance is not symmetric (largest mismatch {deviation})")]
    AsymmetricCovariance {
        noise: &'static str,
        deviation: f64,
    },

    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

impl ModelError {
    pub(crate) fn invalid_shape(
        matrix: &'static str,
        expected: ShapeExpectation,
        actual: &[usize],
    ) -> Self {
        ModelError::InvalidShape {
            matrix,
            expected,
            actual: actual.to_vec(),
        }
    }

    /// True for any shape mismatch, regardless of which argument caused it.
    pub fn is_invalid_shape(&self) -> bool {
        matches!(self, ModelError::InvalidShape { .. })
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
