//! Noise specifications and the samplers derived from them.
//!
//! A noise term can be given in one of two forms. A column of standard deviations
//! describes independent noise per dimension, while a square matrix describes fully
//! correlated noise. The form is fixed once the specification is built, so every draw
//! and every covariance reconstruction for a model takes the same branch.

use crate::error::{ModelError, Result, ShapeExpectation};
use cauchy::Scalar;
use num_traits::ToPrimitive;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use ndarray_linalg::{Eigh, Lapack, UPLO};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Relative size below which negative eigenvalues of a covariance are treated as
/// round-off and clamped to zero.
const EIGENVALUE_TOLERANCE: f64 = 1e-10;

/// Largest mismatch between `Σ[i, j]` and `conj(Σ[j, i])` accepted in a full covariance,
/// relative to its largest entry.
const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// How a square noise matrix is interpreted.
///
/// The vector form always holds standard deviations, which are squared to obtain
/// variances. A square matrix is by default taken to already be the covariance and is
/// used as-is. Callers who supply a matrix "of standard deviations" by analogy with the
/// vector form can select `SquareRoot`, in which case the matrix `M` is a square-root
/// factor: the covariance is `M * Mᵗ` and samples are `M * z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullMatrixNoise {
    Covariance,
    SquareRoot,
}

impl Default for FullMatrixNoise {
    fn default() -> Self {
        FullMatrixNoise::Covariance
    }
}

/// Which noise covariances the Kalman filter of a model is built from.
///
/// `Direct` uses the covariances of the noise specifications themselves, `Q` for the
/// prediction and `R` for the innovation. This requires `M_e = M_x` and `M_n = M_y`.
/// `ThroughLoadingMatrices` uses the covariances of the terms that actually enter the
/// model, `B * Q * Bᵗ` and `D * R * Dᵗ`, which are defined for any noise dimensions.
/// Both agree whenever `B` and `D` are identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseLoading {
    Direct,
    ThroughLoadingMatrices,
}

impl Default for NoiseLoading {
    fn default() -> Self {
        NoiseLoading::Direct
    }
}

/// Noise specification in one of its two representations.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseSpec<T: Scalar> {
    /// Independent noise, one standard deviation per dimension
    Diagonal(Array1<T>),
    /// Correlated noise given by a square matrix
    FullCovariance(Array2<T>),
}

impl<T: Scalar + Lapack> NoiseSpec<T> {
    /// Reads a noise specification from a two-dimensional array.
    ///
    /// A single column is read as standard deviations, a square matrix as a full
    /// covariance. A `1x1` array is a single column and therefore a standard deviation.
    pub fn from_array<S: Data<Elem = T>>(
        name: &'static str,
        spec: &ArrayBase<S, Ix2>,
    ) -> Result<NoiseSpec<T>> {
        let (rows, cols) = spec.dim();
        if cols == 1 {
            Ok(NoiseSpec::Diagonal(spec.column(0).to_owned()))
        } else if rows == cols {
            Ok(NoiseSpec::FullCovariance(spec.to_owned()))
        } else {
            Err(ModelError::invalid_shape(
                name,
                ShapeExpectation::ColumnVectorOrSquare,
                spec.shape(),
            ))
        }
    }

    /// Number of noise dimensions
    pub fn dim(&self) -> usize {
        match self {
            NoiseSpec::Diagonal(std_devs) => std_devs.len(),
            NoiseSpec::FullCovariance(matrix) => matrix.nrows(),
        }
    }

    pub fn is_diagonal(&self) -> bool {
        matches!(self, NoiseSpec::Diagonal(_))
    }

    /// Covariance matrix described by this specification.
    pub fn covariance(&self, interpretation: FullMatrixNoise) -> Array2<T> {
        match self {
            NoiseSpec::Diagonal(std_devs) => Array2::from_diag(&std_devs.mapv(|s| s * s)),
            NoiseSpec::FullCovariance(matrix) => match interpretation {
                FullMatrixNoise::Covariance => matrix.to_owned(),
                FullMatrixNoise::SquareRoot => matrix.dot(&matrix.t()),
            },
        }
    }

    /// Builds the sampler used to draw from this noise.
    ///
    /// For a full covariance this computes a factor `L` with `L * Lᵗ = Σ` from the
    /// symmetric eigendecomposition, which also handles singular covariances such as
    /// an all-zero matrix. The covariance has to be symmetric (Hermitian for complex
    /// elements), otherwise `ModelError::AsymmetricCovariance` is returned. A square-root
    /// factor is used as given and may be any square matrix.
    pub fn sampler(
        &self,
        name: &'static str,
        interpretation: FullMatrixNoise,
    ) -> Result<NoiseSampler<T>> {
        let sampler = match self {
            NoiseSpec::Diagonal(std_devs) => NoiseSampler::Scaled(std_devs.to_owned()),
            NoiseSpec::FullCovariance(matrix) => match interpretation {
                FullMatrixNoise::Covariance => {
                    check_hermitian(name, matrix)?;
                    NoiseSampler::Correlated(covariance_factor(name, matrix)?)
                }
                FullMatrixNoise::SquareRoot => NoiseSampler::Correlated(matrix.to_owned()),
            },
        };
        Ok(sampler)
    }
}

fn check_hermitian<T: Scalar>(name: &'static str, covariance: &Array2<T>) -> Result<()> {
    let magnitude = |value: T| Scalar::abs(value).to_f64().unwrap_or(f64::NAN);
    let largest = covariance
        .iter()
        .fold(0.0_f64, |acc, &value| acc.max(magnitude(value)));
    let deviation = covariance
        .indexed_iter()
        .filter(|((row, col), _)| col <= row)
        .fold(0.0_f64, |acc, ((row, col), &value)| {
            acc.max(magnitude(value - covariance[[col, row]].conj()))
        });
    if deviation > largest * SYMMETRY_TOLERANCE {
        return Err(ModelError::AsymmetricCovariance {
            noise: name,
            deviation,
        });
    }
    Ok(())
}

fn covariance_factor<T: Scalar + Lapack>(
    name: &'static str,
    covariance: &Array2<T>,
) -> Result<Array2<T>> {
    let (eigenvalues, mut eigenvectors) = covariance.eigh(UPLO::Lower)?;
    let eigenvalues: Vec<f64> = eigenvalues
        .iter()
        .map(|value| value.to_f64().unwrap_or(f64::NAN))
        .collect();
    let largest = eigenvalues.iter().fold(0.0_f64, |acc, value| acc.max(value.abs()));
    let threshold = largest * EIGENVALUE_TOLERANCE;

    for (mut column, &value) in eigenvectors.axis_iter_mut(Axis(1)).zip(eigenvalues.iter()) {
        let value = if value < 0.0 {
            if -value > threshold {
                return Err(ModelError::NotPositiveSemidefinite {
                    noise: name,
                    eigenvalue: value,
                });
            }
            log::warn!(
                "clamping eigenvalue {} of {} noise covariance to zero",
                value,
                name
            );
            0.0
        } else {
            value
        };
        let scale = T::from_real(T::real(value.sqrt()));
        column.mapv_inplace(|entry| entry * scale);
    }
    Ok(eigenvectors)
}

/// Draws zero-mean Gaussian noise vectors.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseSampler<T: Scalar> {
    /// Independent components scaled by their standard deviations
    Scaled(Array1<T>),
    /// Standard normal vector multiplied by a square-root factor of the covariance
    Correlated(Array2<T>),
}

impl<T> NoiseSampler<T>
where
    T: Scalar + Lapack,
    StandardNormal: Distribution<T>,
{
    pub fn dim(&self) -> usize {
        match self {
            NoiseSampler::Scaled(std_devs) => std_devs.len(),
            NoiseSampler::Correlated(factor) => factor.ncols(),
        }
    }

    /// Draws one noise vector, consuming exactly `dim()` standard normals from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<T> {
        let standard: Array1<T> = (0..self.dim())
            .map(|_| rng.sample(StandardNormal))
            .collect();
        match self {
            NoiseSampler::Scaled(std_devs) => std_devs * &standard,
            NoiseSampler::Correlated(factor) => factor.dot(&standard),
        }
    }
}
