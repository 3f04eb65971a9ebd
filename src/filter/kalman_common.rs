use crate::error::{ModelError, Result, ShapeExpectation};
use cauchy::Scalar;
use num_traits::ToPrimitive;
use ndarray::linalg::general_mat_mul;
use ndarray::{Array2, ArrayBase, Data, Ix1, Ix2};
use ndarray_linalg::{Factorize, Lapack, ReciprocalConditionNum, Solve};

/// Smallest reciprocal condition number accepted for the innovation covariance.
pub(in crate) const RCOND_TOLERANCE: f64 = f64::EPSILON;

/// Computes `lhs * mid * lhsᵗ + add`.
pub(in crate) fn quadratic_form_add<A, S1, S2, S3>(
    lhs: &ArrayBase<S1, Ix2>,
    mid: &ArrayBase<S2, Ix2>,
    add: &ArrayBase<S3, Ix2>,
) -> Array2<A>
where
    A: Scalar + Lapack,
    S1: Data<Elem = A>,
    S2: Data<Elem = A>,
    S3: Data<Elem = A>,
{
    let left_intermediate = lhs.dot(mid);
    let mut output = add.to_owned();
    general_mat_mul(A::one(), &left_intermediate, &lhs.t(), A::one(), &mut output);
    output
}

/// Computes `lhs * divisor⁻¹` without forming the inverse.
///
/// Each row `x` of the quotient solves `divisorᵗ * xᵗ = lhs_rowᵗ` against a single LU
/// factorisation of `divisorᵗ`. A divisor that cannot be factorised, or whose reciprocal
/// condition number falls below `RCOND_TOLERANCE`, is reported as a singular innovation
/// covariance.
pub(in crate) fn right_divide<A, S1, S2>(
    lhs: &ArrayBase<S1, Ix2>,
    divisor: &ArrayBase<S2, Ix2>,
) -> Result<Array2<A>>
where
    A: Scalar + Lapack,
    S1: Data<Elem = A>,
    S2: Data<Elem = A>,
{
    let factorized = divisor
        .t()
        .factorize()
        .map_err(|_| ModelError::SingularInnovationCovariance { rcond: None })?;
    let rcond = factorized
        .rcond()
        .map_err(|_| ModelError::SingularInnovationCovariance { rcond: None })?;
    // Also rejects a NaN condition number.
    if !(rcond >= A::real(RCOND_TOLERANCE)) {
        return Err(ModelError::SingularInnovationCovariance {
            rcond: rcond.to_f64(),
        });
    }

    let mut quotient = Array2::zeros(lhs.raw_dim());
    for (mut destination, source) in quotient.outer_iter_mut().zip(lhs.outer_iter()) {
        destination.assign(&factorized.solve(&source)?);
    }
    Ok(quotient)
}

pub(in crate) fn check_len<A, S>(
    name: &'static str,
    vector: &ArrayBase<S, Ix1>,
    expected: usize,
) -> Result<()>
where
    S: Data<Elem = A>,
{
    if vector.len() != expected {
        return Err(ModelError::invalid_shape(
            name,
            ShapeExpectation::Length(expected),
            vector.shape(),
        ));
    }
    Ok(())
}

pub(in crate) fn check_shape<A, S>(
    name: &'static str,
    matrix: &ArrayBase<S, Ix2>,
    expected: (usize, usize),
) -> Result<()>
where
    S: Data<Elem = A>,
{
    if matrix.dim() != expected {
        return Err(ModelError::invalid_shape(
            name,
            ShapeExpectation::Exactly(expected.0, expected.1),
            matrix.shape(),
        ));
    }
    Ok(())
}

pub(in crate) fn check_square<A, S>(name: &'static str, matrix: &ArrayBase<S, Ix2>) -> Result<()>
where
    S: Data<Elem = A>,
{
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(ModelError::invalid_shape(
            name,
            ShapeExpectation::Square,
            matrix.shape(),
        ));
    }
    Ok(())
}
