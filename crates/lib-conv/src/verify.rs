//! Result verification against a reference sequence.

use crate::error::{ConvError, ConvResult};
use num_complex::Complex64;

/// Magnitude of a sample, used for error measurement.
pub trait Magnitude: Copy {
    /// Absolute value (modulus for complex samples).
    fn magnitude(self) -> f64;

    /// Magnitude of the difference `self - other`.
    fn distance(self, other: Self) -> f64;
}

impl Magnitude for f64 {
    fn magnitude(self) -> f64 {
        self.abs()
    }

    fn distance(self, other: Self) -> f64 {
        (self - other).abs()
    }
}

impl Magnitude for Complex64 {
    fn magnitude(self) -> f64 {
        self.norm()
    }

    fn distance(self, other: Self) -> f64 {
        (self - other).norm()
    }
}

/// Maximum relative error of `actual` against `reference`.
///
/// Each term is `|reference[k] - actual[k]| / |reference[k]|`; where the
/// reference sample is exactly zero the absolute difference is used. A NaN
/// term makes the result `f64::INFINITY`.
pub fn max_relative_error<T: Magnitude>(reference: &[T], actual: &[T]) -> ConvResult<f64> {
    if reference.is_empty() {
        return Err(ConvError::InvalidSize { arg: "reference" });
    }
    if actual.len() != reference.len() {
        return Err(ConvError::OutputLength {
            expected: reference.len(),
            actual: actual.len(),
        });
    }

    Ok(reference
        .iter()
        .zip(actual.iter())
        .map(|(&r, &a)| {
            let diff = r.distance(a);
            let scale = r.magnitude();
            let err = if scale > 0.0 { diff / scale } else { diff };
            if err.is_nan() {
                f64::INFINITY
            } else {
                err
            }
        })
        .fold(0.0, f64::max))
}

/// Check that `actual` matches `reference` within relative error `eps`.
///
/// # Errors
///
/// [`ConvError::InvalidTolerance`] unless `eps > 0`, plus the shape errors
/// of [`max_relative_error`].
pub fn verify<T: Magnitude>(reference: &[T], actual: &[T], eps: f64) -> ConvResult<bool> {
    if eps.is_nan() || eps <= 0.0 {
        return Err(ConvError::InvalidTolerance);
    }
    Ok(max_relative_error(reference, actual)? <= eps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_error_real() {
        let reference = [2.0, -4.0, 0.0];
        let actual = [2.2, -4.0, 0.05];
        let err = max_relative_error(&reference, &actual).unwrap();
        assert!((err - 0.1).abs() < 1e-12);
        assert!(verify(&reference, &actual, 0.11).unwrap());
        assert!(!verify(&reference, &actual, 0.09).unwrap());
    }

    #[test]
    fn test_relative_error_complex() {
        let reference = [Complex64::new(3.0, 4.0)];
        let actual = [Complex64::new(3.0, 4.5)];
        let err = max_relative_error(&reference, &actual).unwrap();
        assert!((err - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_nan_output_never_matches() {
        let reference = [3.0, 5.0, 9.0];
        let actual = [3.0, f64::NAN, 9.0];
        assert_eq!(
            max_relative_error(&reference, &actual).unwrap(),
            f64::INFINITY
        );
        assert!(!verify(&reference, &actual, 1e-9).unwrap());

        let reference = [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)];
        let actual = [Complex64::new(1.0, 0.0), Complex64::new(0.0, f64::NAN)];
        assert!(!verify(&reference, &actual, 1.0).unwrap());
    }

    #[test]
    fn test_non_positive_tolerance_rejected() {
        let x = [1.0, 2.0];
        for eps in [0.0, -1e-9, f64::NAN] {
            assert_eq!(verify(&x, &x, eps), Err(ConvError::InvalidTolerance));
        }
        assert!(verify(&x, &x, f64::MIN_POSITIVE).unwrap());
    }

    #[test]
    fn test_relative_error_shape_checks() {
        assert_eq!(
            max_relative_error::<f64>(&[], &[]),
            Err(ConvError::InvalidSize { arg: "reference" })
        );
        assert_eq!(
            max_relative_error(&[1.0, 2.0], &[1.0]),
            Err(ConvError::OutputLength {
                expected: 2,
                actual: 1
            })
        );
    }
}
