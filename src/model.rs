//! Simulation and estimation for a linear-Gaussian state-space model.

use crate::config::StateSpaceConfig;
use crate::error::Result;
use crate::filter::KalmanFilter;
use crate::noise::NoiseSampler;
use cauchy::Scalar;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};
use ndarray_linalg::Lapack;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, StandardNormal};
use std::sync::Arc;

/// Everything derived from a configuration, shared by all copies of a model.
#[derive(Debug)]
struct Prepared<T: Scalar + Lapack> {
    config: StateSpaceConfig<T>,
    process_sampler: NoiseSampler<T>,
    measurement_sampler: NoiseSampler<T>,
    /// `None` when the filter noise covariances do not fit the state and measurement
    /// dimensions. Such a model can still simulate.
    kalman_filter: Option<KalmanFilter<T>>,
}

impl<T> Prepared<T>
where
    T: Scalar + Lapack,
    StandardNormal: Distribution<T>,
{
    fn new(config: StateSpaceConfig<T>) -> Result<Prepared<T>> {
        let interpretation = config.full_matrix_noise();
        let process_sampler = config
            .process_noise()
            .sampler("process", interpretation)?;
        let measurement_sampler = config
            .measurement_noise()
            .sampler("measurement", interpretation)?;
        let kalman_filter = match config.kalman_filter() {
            Ok(kalman_filter) => Some(kalman_filter),
            Err(err) => {
                log::debug!("model supports simulation only: {}", err);
                None
            }
        };
        Ok(Prepared {
            config,
            process_sampler,
            measurement_sampler,
            kalman_filter,
        })
    }

    /// `A * state + B * e`
    fn step<S: Data<Elem = T>, R: Rng + ?Sized>(
        &self,
        state: &ArrayBase<S, Ix1>,
        rng: &mut R,
    ) -> Array1<T> {
        let noise = self.process_sampler.sample(rng);
        self.config.a().dot(state) + &self.config.b().dot(&noise)
    }

    /// `C * state + D * n`
    fn measure<S: Data<Elem = T>, R: Rng + ?Sized>(
        &self,
        state: &ArrayBase<S, Ix1>,
        rng: &mut R,
    ) -> Array1<T> {
        let noise = self.measurement_sampler.sample(rng);
        self.config.c().dot(state) + &self.config.d().dot(&noise)
    }
}

/// States and measurements produced by [`LinearGaussianStateSpaceModel::simulate`].
///
/// Row `k` of both arrays belongs to the same time step.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<T: Scalar> {
    pub states: Array2<T>,
    pub measurements: Array2<T>,
}

/// Discrete-time linear-Gaussian state-space model.
///
/// The configuration is validated once and shared between copies of the model, while
/// each instance owns the current state of its simulated trajectory and its own random
/// source. Simulation (`forward`, `observe`) advances that random source and therefore
/// needs `&mut self`. Estimation (`estimate`) only reads the configuration, so it can
/// run concurrently on a shared model.
#[derive(Debug)]
pub struct LinearGaussianStateSpaceModel<T: Scalar + Lapack> {
    shared: Arc<Prepared<T>>,
    current_state: Array1<T>,
    rng: ChaCha20Rng,
}

impl<T> LinearGaussianStateSpaceModel<T>
where
    T: Scalar + Lapack,
    StandardNormal: Distribution<T>,
{
    /// Creates a model from plain two-dimensional arrays.
    ///
    /// Each noise argument is read as standard deviations if it is a single column and
    /// as a covariance matrix if it is square. See [`StateSpaceConfig::new`] for the
    /// required shapes. The random source is seeded from system entropy, use
    /// [`with_seed`](Self::with_seed) for reproducible runs.
    pub fn new<S1, S2, S3, S4, S5, S6, S7>(
        initial_state: &ArrayBase<S1, Ix2>,
        process_noise: &ArrayBase<S2, Ix2>,
        measurement_noise: &ArrayBase<S3, Ix2>,
        a: &ArrayBase<S4, Ix2>,
        b: &ArrayBase<S5, Ix2>,
        c: &ArrayBase<S6, Ix2>,
        d: &ArrayBase<S7, Ix2>,
    ) -> Result<LinearGaussianStateSpaceModel<T>>
    where
        S1: Data<Elem = T>,
        S2: Data<Elem = T>,
        S3: Data<Elem = T>,
        S4: Data<Elem = T>,
        S5: Data<Elem = T>,
        S6: Data<Elem = T>,
        S7: Data<Elem = T>,
    {
        let config = StateSpaceConfig::new(
            initial_state,
            process_noise,
            measurement_noise,
            a,
            b,
            c,
            d,
        )?;
        LinearGaussianStateSpaceModel::from_config(config)
    }

    pub fn from_config(config: StateSpaceConfig<T>) -> Result<LinearGaussianStateSpaceModel<T>> {
        log::debug!(
            "building state-space model: state_dim={}, measurement_dim={}, process noise {}, measurement noise {}",
            config.state_dim(),
            config.measurement_dim(),
            noise_form(config.process_noise().is_diagonal()),
            noise_form(config.measurement_noise().is_diagonal()),
        );
        let shared = Arc::new(Prepared::new(config)?);
        Ok(LinearGaussianStateSpaceModel::from_shared(
            shared,
            ChaCha20Rng::from_entropy(),
        ))
    }

    fn from_shared(shared: Arc<Prepared<T>>, rng: ChaCha20Rng) -> Self {
        let current_state = shared.config.initial_state().to_owned();
        LinearGaussianStateSpaceModel {
            shared,
            current_state,
            rng,
        }
    }

    /// Replaces the random source with one seeded from `seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
    }

    /// Draws a noisy measurement of the current state, `C * x + D * n`.
    ///
    /// The current state is left unchanged.
    pub fn observe(&mut self) -> Array1<T> {
        let measurement = self.shared.measure(&self.current_state, &mut self.rng);
        log::trace!("observed {}", measurement);
        measurement
    }

    /// Same as [`observe`](Self::observe), drawing the noise from `rng`.
    pub fn observe_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<T> {
        let measurement = self.shared.measure(&self.current_state, rng);
        log::trace!("observed {}", measurement);
        measurement
    }

    /// Advances the simulated trajectory by one step, `x := A * x + B * e`, and returns
    /// the new state.
    pub fn forward(&mut self) -> Array1<T> {
        let next_state = self.shared.step(&self.current_state, &mut self.rng);
        log::trace!("advanced state to {}", next_state);
        self.current_state = next_state.clone();
        next_state
    }

    /// Same as [`forward`](Self::forward), drawing the noise from `rng`.
    pub fn forward_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Array1<T> {
        let next_state = self.shared.step(&self.current_state, rng);
        log::trace!("advanced state to {}", next_state);
        self.current_state = next_state.clone();
        next_state
    }

    /// Simulates `steps` time steps. Each step advances the state with
    /// [`forward`](Self::forward) and then measures the new state with
    /// [`observe`](Self::observe).
    pub fn simulate(&mut self, steps: usize) -> Trajectory<T> {
        let mut states = Array2::zeros([steps, self.shared.config.state_dim()]);
        let mut measurements = Array2::zeros([steps, self.shared.config.measurement_dim()]);
        for (mut state_row, mut measurement_row) in states
            .outer_iter_mut()
            .zip(measurements.outer_iter_mut())
        {
            state_row.assign(&self.forward());
            measurement_row.assign(&self.observe());
        }
        Trajectory {
            states,
            measurements,
        }
    }

    /// One Kalman predict-update step.
    ///
    /// Given the estimate `(prior_mean, prior_covariance)` of the current step and the
    /// measurement of the next step, returns `(posterior_mean, posterior_covariance)` of
    /// the next step. Noise covariances are reconstructed from the noise specifications:
    /// standard deviations are squared and square matrices are used according to the
    /// configured [`FullMatrixNoise`](crate::noise::FullMatrixNoise) interpretation. The
    /// prediction is `A * P * Aᵗ + Q` and the innovation covariance `C * P * Cᵗ + R`, with
    /// `Q` and `R` taken as they are. [`NoiseLoading`](crate::noise::NoiseLoading) selects
    /// `B * Q * Bᵗ` and `D * R * Dᵗ` instead. The gain is obtained by a linear solve
    /// against the innovation covariance, and a singular innovation covariance is reported
    /// as `ModelError::SingularInnovationCovariance`.
    ///
    /// With plain `Q` and `R`, a model with `M_e != M_x` or `M_n != M_y` can simulate but
    /// not estimate, and every call returns `ModelError::InvalidShape` naming the noise.
    ///
    /// Neither the current state nor the random source is touched.
    pub fn estimate<S1, S2, S3>(
        &self,
        prior_mean: &ArrayBase<S1, Ix1>,
        prior_covariance: &ArrayBase<S2, Ix2>,
        next_measurement: &ArrayBase<S3, Ix1>,
    ) -> Result<(Array1<T>, Array2<T>)>
    where
        S1: Data<Elem = T>,
        S2: Data<Elem = T>,
        S3: Data<Elem = T>,
    {
        let posterior = match &self.shared.kalman_filter {
            Some(kalman_filter) => {
                kalman_filter.estimate(prior_mean, prior_covariance, next_measurement)?
            }
            None => self.shared.config.kalman_filter()?.estimate(
                prior_mean,
                prior_covariance,
                next_measurement,
            )?,
        };
        log::trace!("posterior mean {}", posterior.mean);
        Ok(posterior.into_tuple())
    }

    /// Creates an independent model with the same configuration.
    ///
    /// The copy starts again from the initial state rather than from this model's
    /// current state, and gets a fresh random source.
    pub fn copy(&self) -> Self {
        log::debug!("copying state-space model, trajectory reset to initial state");
        LinearGaussianStateSpaceModel::from_shared(
            Arc::clone(&self.shared),
            ChaCha20Rng::from_entropy(),
        )
    }

    pub fn current_state(&self) -> &Array1<T> {
        &self.current_state
    }

    pub fn config(&self) -> &StateSpaceConfig<T> {
        &self.shared.config
    }

    /// Kalman filter built from this model's matrices and noise covariances, if the
    /// noise covariances fit the filter.
    pub fn kalman_filter(&self) -> Option<&KalmanFilter<T>> {
        self.shared.kalman_filter.as_ref()
    }
}

fn noise_form(is_diagonal: bool) -> &'static str {
    if is_diagonal {
        "diagonal"
    } else {
        "full"
    }
}
