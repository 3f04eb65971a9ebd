//! Validated, immutable configuration of a linear-Gaussian state-space model.
//!
//! The model is
//!
//! ```text
//! x[k+1] = A * x[k] + B * e[k],   e[k] ~ process noise
//! y[k]   = C * x[k] + D * n[k],   n[k] ~ measurement noise
//! ```
//!
//! and every dimension is checked once, when the configuration is built.

use crate::error::{ModelError, Result, ShapeExpectation};
use crate::filter::KalmanFilter;
use crate::noise::{FullMatrixNoise, NoiseLoading, NoiseSpec};
use cauchy::Scalar;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_linalg::Lapack;

#[derive(Debug, Clone, PartialEq)]
pub struct StateSpaceConfig<T: Scalar> {
    initial_state: Array1<T>,
    process_noise: NoiseSpec<T>,
    measurement_noise: NoiseSpec<T>,
    transition_matrix: Array2<T>,
    process_noise_matrix: Array2<T>,
    observation_matrix: Array2<T>,
    measurement_noise_matrix: Array2<T>,
    full_matrix_noise: FullMatrixNoise,
    noise_loading: NoiseLoading,
}

impl<T: Scalar + Lapack> StateSpaceConfig<T> {
    /// Creates a configuration from plain two-dimensional arrays.
    ///
    /// * `initial_state` - single column of length `M_x`
    /// * `process_noise` - column of `M_e` standard deviations, or an `M_e x M_e` covariance
    /// * `measurement_noise` - column of `M_n` standard deviations, or an `M_n x M_n` covariance
    /// * `a` - `M_x x M_x` state transition matrix
    /// * `b` - `M_x x M_e` process noise loading matrix
    /// * `c` - `M_y x M_x` observation matrix
    /// * `d` - `M_y x M_n` measurement noise loading matrix
    ///
    /// Shapes are checked in the order of the arguments, and the first mismatch is
    /// returned as `ModelError::InvalidShape`.
    pub fn new<S1, S2, S3, S4, S5, S6, S7>(
        initial_state: &ArrayBase<S1, Ix2>,
        process_noise: &ArrayBase<S2, Ix2>,
        measurement_noise: &ArrayBase<S3, Ix2>,
        a: &ArrayBase<S4, Ix2>,
        b: &ArrayBase<S5, Ix2>,
        c: &ArrayBase<S6, Ix2>,
        d: &ArrayBase<S7, Ix2>,
    ) -> Result<StateSpaceConfig<T>>
    where
        S1: Data<Elem = T>,
        S2: Data<Elem = T>,
        S3: Data<Elem = T>,
        S4: Data<Elem = T>,
        S5: Data<Elem = T>,
        S6: Data<Elem = T>,
        S7: Data<Elem = T>,
    {
        if initial_state.ncols() != 1 {
            return Err(ModelError::invalid_shape(
                "initial_state",
                ShapeExpectation::ColumnVector,
                initial_state.shape(),
            ));
        }
        let process_noise = NoiseSpec::from_array("process_noise", process_noise)?;
        let measurement_noise = NoiseSpec::from_array("measurement_noise", measurement_noise)?;

        StateSpaceConfig::from_specs(
            initial_state.column(0).to_owned(),
            process_noise,
            measurement_noise,
            a.to_owned(),
            b.to_owned(),
            c.to_owned(),
            d.to_owned(),
        )
    }

    /// Creates a configuration from an explicit state vector and noise specifications.
    pub fn from_specs(
        initial_state: Array1<T>,
        process_noise: NoiseSpec<T>,
        measurement_noise: NoiseSpec<T>,
        a: Array2<T>,
        b: Array2<T>,
        c: Array2<T>,
        d: Array2<T>,
    ) -> Result<StateSpaceConfig<T>> {
        let config = StateSpaceConfig {
            initial_state,
            process_noise,
            measurement_noise,
            transition_matrix: a,
            process_noise_matrix: b,
            observation_matrix: c,
            measurement_noise_matrix: d,
            full_matrix_noise: FullMatrixNoise::default(),
            noise_loading: NoiseLoading::default(),
        };
        config.check_dimension_compatibilities()?;
        Ok(config)
    }

    /// Selects how square noise matrices are interpreted. See [`FullMatrixNoise`].
    pub fn with_full_matrix_noise(mut self, interpretation: FullMatrixNoise) -> Self {
        self.full_matrix_noise = interpretation;
        self
    }

    /// Selects which noise covariances the Kalman filter uses. See [`NoiseLoading`].
    pub fn with_noise_loading(mut self, loading: NoiseLoading) -> Self {
        self.noise_loading = loading;
        self
    }

    fn check_dimension_compatibilities(&self) -> Result<()> {
        let state_dim = self.state_dim();
        let process_noise_dim = self.process_noise_dim();
        let measurement_noise_dim = self.measurement_noise_dim();

        if let NoiseSpec::FullCovariance(matrix) = &self.process_noise {
            check_square("process_noise", matrix)?;
        }
        if let NoiseSpec::FullCovariance(matrix) = &self.measurement_noise {
            check_square("measurement_noise", matrix)?;
        }

        let (a_rows, a_cols) = self.transition_matrix.dim();
        if a_rows != a_cols {
            return Err(ModelError::invalid_shape(
                "A",
                ShapeExpectation::Square,
                self.transition_matrix.shape(),
            ));
        }
        check_exact("A", &self.transition_matrix, (state_dim, state_dim))?;
        check_exact(
            "B",
            &self.process_noise_matrix,
            (state_dim, process_noise_dim),
        )?;

        if self.observation_matrix.ncols() != state_dim {
            return Err(ModelError::invalid_shape(
                "C",
                ShapeExpectation::Columns(state_dim),
                self.observation_matrix.shape(),
            ));
        }
        check_exact(
            "D",
            &self.measurement_noise_matrix,
            (self.measurement_dim(), measurement_noise_dim),
        )?;

        Ok(())
    }

    pub fn state_dim(&self) -> usize {
        self.initial_state.len()
    }

    pub fn measurement_dim(&self) -> usize {
        self.observation_matrix.nrows()
    }

    pub fn process_noise_dim(&self) -> usize {
        self.process_noise.dim()
    }

    pub fn measurement_noise_dim(&self) -> usize {
        self.measurement_noise.dim()
    }

    pub fn initial_state(&self) -> &Array1<T> {
        &self.initial_state
    }

    pub fn process_noise(&self) -> &NoiseSpec<T> {
        &self.process_noise
    }

    pub fn measurement_noise(&self) -> &NoiseSpec<T> {
        &self.measurement_noise
    }

    /// State transition matrix `A`
    pub fn a(&self) -> &Array2<T> {
        &self.transition_matrix
    }

    /// Process noise loading matrix `B`
    pub fn b(&self) -> &Array2<T> {
        &self.process_noise_matrix
    }

    /// Observation matrix `C`
    pub fn c(&self) -> &Array2<T> {
        &self.observation_matrix
    }

    /// Measurement noise loading matrix `D`
    pub fn d(&self) -> &Array2<T> {
        &self.measurement_noise_matrix
    }

    pub fn full_matrix_noise(&self) -> FullMatrixNoise {
        self.full_matrix_noise
    }

    pub fn noise_loading(&self) -> NoiseLoading {
        self.noise_loading
    }

    /// Process noise covariance `Q`
    pub fn process_noise_covariance(&self) -> Array2<T> {
        self.process_noise.covariance(self.full_matrix_noise)
    }

    /// Measurement noise covariance `R`
    pub fn measurement_noise_covariance(&self) -> Array2<T> {
        self.measurement_noise.covariance(self.full_matrix_noise)
    }

    /// Covariance of the process noise term `B * e` as it enters the state.
    pub fn state_noise_covariance(&self) -> Array2<T> {
        let q = self.process_noise_covariance();
        self.process_noise_matrix
            .dot(&q)
            .dot(&self.process_noise_matrix.t())
    }

    /// Covariance of the measurement noise term `D * n` as it enters the measurement.
    pub fn observation_noise_covariance(&self) -> Array2<T> {
        let r = self.measurement_noise_covariance();
        self.measurement_noise_matrix
            .dot(&r)
            .dot(&self.measurement_noise_matrix.t())
    }

    /// Covariance added to the predicted state covariance by the Kalman filter.
    ///
    /// This is `Q` itself unless [`NoiseLoading::ThroughLoadingMatrices`] is selected.
    /// Using `Q` directly needs one process noise per state, otherwise the shape of the
    /// process noise specification is reported as `ModelError::InvalidShape`.
    pub fn filter_process_covariance(&self) -> Result<Array2<T>> {
        match self.noise_loading {
            NoiseLoading::Direct => {
                check_noise_dim("process_noise", &self.process_noise, self.state_dim())?;
                Ok(self.process_noise_covariance())
            }
            NoiseLoading::ThroughLoadingMatrices => Ok(self.state_noise_covariance()),
        }
    }

    /// Covariance added to the innovation covariance by the Kalman filter.
    ///
    /// This is `R` itself unless [`NoiseLoading::ThroughLoadingMatrices`] is selected,
    /// in which case one measurement noise per measurement is not required.
    pub fn filter_measurement_covariance(&self) -> Result<Array2<T>> {
        match self.noise_loading {
            NoiseLoading::Direct => {
                check_noise_dim(
                    "measurement_noise",
                    &self.measurement_noise,
                    self.measurement_dim(),
                )?;
                Ok(self.measurement_noise_covariance())
            }
            NoiseLoading::ThroughLoadingMatrices => Ok(self.observation_noise_covariance()),
        }
    }

    /// Builds the Kalman filter for this configuration from `A`, `C` and the filter
    /// noise covariances.
    pub fn kalman_filter(&self) -> Result<KalmanFilter<T>> {
        KalmanFilter::new(
            self.a(),
            self.c(),
            &self.filter_process_covariance()?,
            &self.filter_measurement_covariance()?,
        )
    }
}

fn check_noise_dim<T: Scalar + Lapack>(
    name: &'static str,
    noise: &NoiseSpec<T>,
    dim: usize,
) -> Result<()> {
    if noise.dim() == dim {
        return Ok(());
    }
    let (expected, actual) = if noise.is_diagonal() {
        (ShapeExpectation::Exactly(dim, 1), [noise.dim(), 1])
    } else {
        (ShapeExpectation::Exactly(dim, dim), [noise.dim(), noise.dim()])
    };
    Err(ModelError::invalid_shape(name, expected, &actual))
}

fn check_square<T>(name: &'static str, matrix: &Array2<T>) -> Result<()> {
    if matrix.nrows() != matrix.ncols() {
        return Err(ModelError::invalid_shape(
            name,
            ShapeExpectation::ColumnVectorOrSquare,
            matrix.shape(),
        ));
    }
    Ok(())
}

fn check_exact<T>(name: &'static str, matrix: &Array2<T>, expected: (usize, usize)) -> Result<()> {
    if matrix.dim() != expected {
        let expectation = if matrix.nrows() != expected.0 {
            ShapeExpectation::Rows(expected.0)
        } else {
            ShapeExpectation::Exactly(expected.0, expected.1)
        };
        return Err(ModelError::invalid_shape(name, expectation, matrix.shape()));
    }
    Ok(())
}
