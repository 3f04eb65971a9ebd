//! Traits representing the filtering algorithms

use cauchy::Scalar;
use ndarray::{ArrayBase, Data, Ix1, Ix2};
use ndarray_linalg::Lapack;

/// Filtering algorithm trait
///
/// This trait indicates that implementor is a representation of a filtering algorithm, and
/// that it performs filtering operations on inputs of type `T: Scalar + Lapack`.
/// It represents recursive estimators which are split into prediction and update steps,
/// operating on a single Gaussian estimate given by a mean vector and a covariance matrix.
pub trait Filter<T: Scalar + Lapack> {
    /// Result of prediction operation executed on an estimate
    type Prediction;
    /// Result of update operation executed on a predicted estimate
    type Update;

    /// Prediction operation executed by filtering algorithm.
    ///
    /// Propagates the estimate one step through the state dynamics. The parameters are:
    /// * mean - state estimate for the current step
    /// * covariance - covariance matrix associated with `mean`
    fn predict<A: Data<Elem = T>, B: Data<Elem = T>>(
        &self,
        mean: &ArrayBase<A, Ix1>,
        covariance: &ArrayBase<B, Ix2>,
    ) -> Self::Prediction;

    /// Update operation executed by filtering algorithm.
    ///
    /// Corrects a predicted estimate with a measurement taken at the predicted step.
    /// * mean - predicted state estimate
    /// * covariance - covariance matrix of the predicted estimate
    /// * measurement - measurement of the state at the predicted step
    fn update<A: Data<Elem = T>, B: Data<Elem = T>, C: Data<Elem = T>>(
        &self,
        mean: &ArrayBase<A, Ix1>,
        covariance: &ArrayBase<B, Ix2>,
        measurement: &ArrayBase<C, Ix1>,
    ) -> Self::Update;
}
