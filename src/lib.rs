#![crate_name = "rusty_lgssm"]
//! The `rusty-lgssm` crate contains a discrete-time linear-Gaussian state-space model, which
//! can both simulate trajectories of its hidden state and estimate that state from noisy
//! measurements with the Kalman filter.
//!
//! The model is
//!
//! ```text
//! x[k+1] = A * x[k] + B * e[k]
//! y[k]   = C * x[k] + D * n[k]
//! ```
//!
//! where `e` and `n` are zero-mean Gaussian noise terms, each given either by independent
//! per-dimension standard deviations or by a full covariance matrix.
//!
//! ## Example
//! ```
//! use ndarray::{arr1, arr2};
//! use rusty_lgssm::LinearGaussianStateSpaceModel;
//!
//! let mut model = LinearGaussianStateSpaceModel::<f64>::new(
//!     &arr2(&[[0.0]]),
//!     &arr2(&[[0.1]]),
//!     &arr2(&[[0.1]]),
//!     &arr2(&[[0.9]]),
//!     &arr2(&[[1.0]]),
//!     &arr2(&[[1.0]]),
//!     &arr2(&[[1.0]]),
//! )
//! .unwrap()
//! .with_seed(7);
//!
//! let mut mean = arr1(&[0.0]);
//! let mut covariance = arr2(&[[1.0]]);
//! for _ in 0..10 {
//!     model.forward();
//!     let measurement = model.observe();
//!     let (next_mean, next_covariance) = model.estimate(&mean, &covariance, &measurement).unwrap();
//!     mean = next_mean;
//!     covariance = next_covariance;
//! }
//! assert!(covariance[[0, 0]] < 1.0);
//! ```
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod noise;

pub use config::StateSpaceConfig;
pub use error::{ModelError, Result, ShapeExpectation};
pub use filter::{Estimate, Filter, KalmanFilter};
pub use model::{LinearGaussianStateSpaceModel, Trajectory};
pub use noise::{FullMatrixNoise, NoiseLoading, NoiseSampler, NoiseSpec};
