pub mod kalman;
mod kalman_common;
pub mod traits;

pub use kalman::{Estimate, KalmanFilter};
pub use traits::*;
