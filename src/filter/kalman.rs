//! This module contains the implementation of the linear Kalman filtering algorithm.
use super::kalman_common::*;
use super::traits::Filter;
use crate::error::{ModelError, Result, ShapeExpectation};
use cauchy::Scalar;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};
use ndarray_linalg::Lapack;

/// Gaussian state estimate, given by its mean and covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate<T: Scalar> {
    pub mean: Array1<T>,
    pub covariance: Array2<T>,
}

impl<T: Scalar> Estimate<T> {
    pub fn into_tuple(self) -> (Array1<T>, Array2<T>) {
        (self.mean, self.covariance)
    }
}

impl<T: Scalar> From<Estimate<T>> for (Array1<T>, Array2<T>) {
    fn from(estimate: Estimate<T>) -> Self {
        estimate.into_tuple()
    }
}

/// Basic linear Kalman filtering algorithm
///
/// This type encapsulates basic linear Kalman filtering algorithm. This implementation depends
/// on four arrays, which represent the operational parameters necessary for this algorithm.
/// As some assumption have to hold with respect to dimensions of arrays, please use the associated
/// function `KalmanFilter::new` to initialize an instance of Kalman filter.
///
/// Type parameter `T: Scalar + Lapack` is used to indicate that Kalman filter can contain any
/// matrices, which are considered to contain numbers ( i.e real or complex numbers ).
#[derive(Debug, Clone)]
pub struct KalmanFilter<T: Scalar + Lapack> {
    transition_matrix: Array2<T>,
    observation_matrix: Array2<T>,
    transition_covariance: Array2<T>,
    observation_covariance: Array2<T>,
}

/// Implementation of filtering methods for Kalman filter
impl<T: Scalar + Lapack> Filter<T> for KalmanFilter<T> {
    /// Predicted mean `A * m` and covariance `A * P * Aᵗ + Q`.
    type Prediction = Result<Estimate<T>>;

    /// Posterior mean and covariance after correcting with one measurement. Fails if the
    /// innovation covariance is singular.
    type Update = Result<Estimate<T>>;

    fn predict<A: Data<Elem = T>, B: Data<Elem = T>>(
        &self,
        mean: &ArrayBase<A, Ix1>,
        covariance: &ArrayBase<B, Ix2>,
    ) -> Self::Prediction {
        let state_dim = self.state_dim();
        check_len("prior_mean", mean, state_dim)?;
        check_shape("prior_covariance", covariance, (state_dim, state_dim))?;

        let predicted_mean = self.transition_matrix.dot(mean);
        let predicted_covariance = quadratic_form_add(
            &self.transition_matrix,
            covariance,
            &self.transition_covariance,
        );
        Ok(Estimate {
            mean: predicted_mean,
            covariance: predicted_covariance,
        })
    }

    fn update<A: Data<Elem = T>, B: Data<Elem = T>, C: Data<Elem = T>>(
        &self,
        mean: &ArrayBase<A, Ix1>,
        covariance: &ArrayBase<B, Ix2>,
        measurement: &ArrayBase<C, Ix1>,
    ) -> Self::Update {
        let state_dim = self.state_dim();
        check_len("predicted_mean", mean, state_dim)?;
        check_shape("predicted_covariance", covariance, (state_dim, state_dim))?;
        check_len("measurement", measurement, self.measurement_dim())?;

        let expected_measurement = self.observation_matrix.dot(mean);
        let innovation = measurement - &expected_measurement;
        let l_matrix = covariance.dot(&self.observation_matrix.t());
        let innovation_covariance =
            self.observation_matrix.dot(&l_matrix) + &self.observation_covariance;
        let kalman_gain = right_divide(&l_matrix, &innovation_covariance)?;

        let updated_mean = mean + &kalman_gain.dot(&innovation);
        let updated_covariance = covariance.to_owned()
            - &kalman_gain
                .dot(&innovation_covariance)
                .dot(&kalman_gain.t());
        Ok(Estimate {
            mean: updated_mean,
            covariance: updated_covariance,
        })
    }
}

impl<T: Scalar + Lapack> KalmanFilter<T> {
    /// Creates new Kalman filter with given matrices
    ///
    /// This constructor expects following conditions to hold:
    /// * transition matrix and both covariance matrices should be square
    /// * transition covariance has the dimension of the state
    /// * outer dimensions of observation and transition matrix are equal. This ensures that
    /// given observation matrix can be used as left factor in multiplication with states.
    /// * inner dimensions of observation matrix and observation covariance are equal
    ///
    /// If any of the conditions is not upheld, then the return value is the error variant,
    /// otherwise a well-formed Kalman filter is returned.
    pub fn new<A: Data<Elem = T>>(
        transition_matrix: &ArrayBase<A, Ix2>,
        observation_matrix: &ArrayBase<A, Ix2>,
        transition_covariance: &ArrayBase<A, Ix2>,
        observation_covariance: &ArrayBase<A, Ix2>,
    ) -> Result<KalmanFilter<T>> {
        KalmanFilter::check_dimension_compatibilities(
            transition_matrix,
            observation_matrix,
            transition_covariance,
            observation_covariance,
        )?;

        let kalman_filter = KalmanFilter {
            transition_matrix: transition_matrix.to_owned(),
            observation_matrix: observation_matrix.to_owned(),
            transition_covariance: transition_covariance.to_owned(),
            observation_covariance: observation_covariance.to_owned(),
        };

        Result::Ok(kalman_filter)
    }

    fn check_dimension_compatibilities<A: Data<Elem = T>>(
        transition_matrix: &ArrayBase<A, Ix2>,
        observation_matrix: &ArrayBase<A, Ix2>,
        transition_covariance: &ArrayBase<A, Ix2>,
        observation_covariance: &ArrayBase<A, Ix2>,
    ) -> Result<()> {
        check_square("transition_matrix", transition_matrix)?;
        let state_dim = transition_matrix.nrows();
        let measurement_dim = observation_matrix.nrows();

        if observation_matrix.ncols() != state_dim {
            return Err(ModelError::invalid_shape(
                "observation_matrix",
                ShapeExpectation::Columns(state_dim),
                observation_matrix.shape(),
            ));
        }

        check_shape(
            "transition_covariance",
            transition_covariance,
            (state_dim, state_dim),
        )?;
        check_shape(
            "observation_covariance",
            observation_covariance,
            (measurement_dim, measurement_dim),
        )?;

        Result::Ok(())
    }

    /// One full predict-update step: from the estimate at the current step and the
    /// measurement of the next step, returns the estimate at the next step.
    pub fn estimate<A: Data<Elem = T>, B: Data<Elem = T>, C: Data<Elem = T>>(
        &self,
        prior_mean: &ArrayBase<A, Ix1>,
        prior_covariance: &ArrayBase<B, Ix2>,
        next_measurement: &ArrayBase<C, Ix1>,
    ) -> Result<Estimate<T>> {
        let predicted = self.predict(prior_mean, prior_covariance)?;
        self.update(&predicted.mean, &predicted.covariance, next_measurement)
    }

    /// Runs the recursion over a stream of measurements, one measurement per row.
    ///
    /// Row `k` of `measurements` is taken to be the measurement of step `k + 1`, and the
    /// `k`-th returned estimate belongs to that step. The recursion stops at the first
    /// failing step.
    pub fn filter<A: Data<Elem = T>, B: Data<Elem = T>, C: Data<Elem = T>>(
        &self,
        prior_mean: &ArrayBase<A, Ix1>,
        prior_covariance: &ArrayBase<B, Ix2>,
        measurements: &ArrayBase<C, Ix2>,
    ) -> Result<Vec<Estimate<T>>> {
        if measurements.ncols() != self.measurement_dim() {
            return Err(ModelError::invalid_shape(
                "measurements",
                ShapeExpectation::Columns(self.measurement_dim()),
                measurements.shape(),
            ));
        }

        let mut current = Estimate {
            mean: prior_mean.to_owned(),
            covariance: prior_covariance.to_owned(),
        };
        let mut estimates = Vec::with_capacity(measurements.nrows());
        for measurement in measurements.outer_iter() {
            current = self.estimate(&current.mean, &current.covariance, &measurement)?;
            estimates.push(current.clone());
        }
        Ok(estimates)
    }

    pub fn state_dim(&self) -> usize {
        self.transition_matrix.nrows()
    }

    pub fn measurement_dim(&self) -> usize {
        self.observation_matrix.nrows()
    }

    pub fn transition_matrix(&self) -> &Array2<T> {
        &self.transition_matrix
    }

    pub fn observation_matrix(&self) -> &Array2<T> {
        &self.observation_matrix
    }

    pub fn transition_covariance(&self) -> &Array2<T> {
        &self.transition_covariance
    }

    pub fn observation_covariance(&self) -> &Array2<T> {
        &self.observation_covariance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn assert_close(actual: &Array2<f64>, expected: &Array2<f64>, tolerance: f64) {
        assert_eq!(actual.dim(), expected.dim());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < tolerance, "{} != {}", actual, expected);
        }
    }

    #[test]
    fn transition_covariance_matrix_has_to_be_square() -> std::result::Result<(), String> {
        let kf = KalmanFilter::<f64>::new(
            &Array2::eye(8),
            &Array2::eye(8),
            &Array2::ones([8, 7]),
            &Array2::eye(8),
        );
        match kf {
            Err(_) => return Ok(()),
            _ => return Err(
                "Kalman filter can not accept non-square matrix as transition covariance matrix"
                    .to_string(),
            ),
        };
    }

    #[test]
    fn observation_covariance_matrix_has_to_be_square() -> std::result::Result<(), String> {
        let kf = KalmanFilter::<f64>::new(
            &Array2::eye(8),
            &Array2::eye(8),
            &Array2::eye(8),
            &Array2::ones([8, 7]),
        );
        match kf {
            Err(_) => return Ok(()),
            _ => return Err(
                "Kalman filter can not accept non-square matrix as observation covariance matrix"
                    .to_string(),
            ),
        };
    }

    #[test]
    fn transition_matrix_has_to_be_square() -> std::result::Result<(), String> {
        let kf = KalmanFilter::<f64>::new(
            &Array2::ones([7, 8]),
            &Array2::eye(8),
            &Array2::eye(8),
            &Array2::eye(8),
        );
        match kf {
            Err(_) => return Ok(()),
            _ => {
                return Err(
                    "Kalman filter can not accept non-square matrix as transition matrix"
                        .to_string(),
                )
            }
        };
    }

    #[test]
    fn observation_matrix_has_to_act_on_states() -> std::result::Result<(), String> {
        let eye8 = &Array2::eye(8);
        let kf = KalmanFilter::<f64>::new(eye8, &Array2::eye(7), eye8, eye8);
        match kf {
            Err(_) => return Ok(()),
            _ => {
                return Err(
                    "Observation matrix should have as many columns as there are state entries"
                        .to_string(),
                )
            }
        }
    }

    #[test]
    fn inner_dimensions_of_observation_matrix_and_observation_covariance_have_to_match(
    ) -> std::result::Result<(), String> {
        let eye8 = &Array2::eye(8);
        let eye7 = &Array2::eye(7);
        let kf = KalmanFilter::<f64>::new(eye8, eye8, eye8, eye7);
        match kf {
            Err(_) => return Ok(()),
            _ => return Err("Inner dimensions of observation covariance matrix and observation matrix should have to be equal".to_string())
        }
    }

    #[test]
    fn dimension_of_returned_prediction_matches_dimensions_of_input() {
        let eye8 = &Array2::eye(8);
        let kf = KalmanFilter::<f64>::new(eye8, eye8, eye8, eye8).unwrap();
        let mean = Array1::ones(8);
        let covariance = Array2::ones([8, 8]);
        let predicted = kf.predict(&mean, &covariance).unwrap();
        assert_eq!(predicted.mean.dim(), mean.dim());
        assert_eq!(predicted.covariance.dim(), covariance.dim());
    }

    #[test]
    fn mis_shaped_prior_is_rejected() {
        let eye2 = &Array2::<f64>::eye(2);
        let kf = KalmanFilter::new(eye2, eye2, eye2, eye2).unwrap();
        let err = kf
            .estimate(&Array1::zeros(3), &Array2::eye(2), &Array1::zeros(2))
            .unwrap_err();
        assert!(err.is_invalid_shape());
        let err = kf
            .estimate(&Array1::zeros(2), &Array2::eye(2), &Array1::zeros(1))
            .unwrap_err();
        assert!(err.is_invalid_shape());
    }

    #[test]
    fn update_matches_textbook_scalar_formulas() {
        let a = 0.9;
        let q = 0.04;
        let r = 0.25;
        let kf = KalmanFilter::new(
            &arr2(&[[a]]),
            &arr2(&[[1.0]]),
            &arr2(&[[q]]),
            &arr2(&[[r]]),
        )
        .unwrap();
        let (prior_mean, prior_var, measurement) = (2.0, 0.5, 1.5);
        let posterior = kf
            .estimate(&arr1(&[prior_mean]), &arr2(&[[prior_var]]), &arr1(&[measurement]))
            .unwrap();

        let predicted_var = a * prior_var * a + q;
        let gain = predicted_var / (predicted_var + r);
        let expected_mean = a * prior_mean + gain * (measurement - a * prior_mean);
        let expected_var = predicted_var - gain * (predicted_var + r) * gain;
        assert!((posterior.mean[0] - expected_mean).abs() < 1e-12);
        assert!((posterior.covariance[[0, 0]] - expected_var).abs() < 1e-12);
    }

    #[test]
    fn multivariate_update_uses_standard_innovation_covariance() {
        let transition = arr2(&[[1.0, 1.0], [0.0, 1.0]]);
        let observation = arr2(&[[1.0, 0.0]]);
        let q = arr2(&[[0.1, 0.0], [0.0, 0.2]]);
        let r = arr2(&[[0.5]]);
        let kf = KalmanFilter::new(&transition, &observation, &q, &r).unwrap();
        let prior_mean = arr1(&[0.0, 1.0]);
        let prior_covariance = arr2(&[[1.0, 0.2], [0.2, 2.0]]);
        let measurement = arr1(&[1.4]);
        let posterior = kf
            .estimate(&prior_mean, &prior_covariance, &measurement)
            .unwrap();

        let p = transition.dot(&prior_covariance).dot(&transition.t()) + &q;
        let s = observation.dot(&p).dot(&observation.t()) + &r;
        let gain = p.dot(&observation.t()) / s[[0, 0]];
        let predicted_mean = transition.dot(&prior_mean);
        let innovation = &measurement - &observation.dot(&predicted_mean);
        let expected_mean = &predicted_mean + &gain.dot(&innovation);
        let expected_covariance = &p - &gain.dot(&s).dot(&gain.t());

        for (m, e) in posterior.mean.iter().zip(expected_mean.iter()) {
            assert!((m - e).abs() < 1e-12);
        }
        assert_close(&posterior.covariance, &expected_covariance, 1e-12);
    }

    #[test]
    fn filtering_a_stream_returns_an_estimate_per_measurement() {
        let eye2 = &Array2::<f64>::eye(2);
        let kf = KalmanFilter::new(eye2, eye2, eye2, eye2).unwrap();
        let measurements = arr2(&[[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
        let estimates = kf
            .filter(&Array1::zeros(2), &Array2::eye(2), &measurements)
            .unwrap();
        assert_eq!(estimates.len(), 3);

        let first = kf
            .estimate(&Array1::zeros(2), &Array2::eye(2), &measurements.row(0))
            .unwrap();
        assert_eq!(estimates[0], first);
        let second = kf
            .estimate(&first.mean, &first.covariance, &measurements.row(1))
            .unwrap();
        assert_eq!(estimates[1], second);
    }

    #[test]
    fn filtering_rejects_measurements_of_wrong_width() {
        let eye2 = &Array2::<f64>::eye(2);
        let kf = KalmanFilter::new(eye2, eye2, eye2, eye2).unwrap();
        let err = kf
            .filter(&Array1::zeros(2), &Array2::eye(2), &Array2::zeros([4, 3]))
            .unwrap_err();
        assert!(err.is_invalid_shape());
    }

    #[test]
    fn estimate_pair_converts_into_tuple() {
        let estimate = Estimate {
            mean: arr1(&[1.0]),
            covariance: arr2(&[[2.0]]),
        };
        let (mean, covariance): (Array1<f64>, Array2<f64>) = estimate.into();
        assert_eq!(mean, arr1(&[1.0]));
        assert_eq!(covariance, arr2(&[[2.0]]));
    }
}
