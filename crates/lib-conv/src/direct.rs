//! Direct-form linear convolution.
//!
//! This is the O(na·nb) double sum. It is the baseline the block engine is
//! checked against and the faster choice for very short inputs.

use crate::error::{check_lengths, check_sizes, output_len, ConvResult};
use num_traits::Zero;
use std::ops::{AddAssign, Mul};

/// Sample types accepted by the convolution routines (`f64`, `Complex64`, ...).
pub trait Sample: Copy + Zero + Mul<Output = Self> + AddAssign + Send + Sync {}

impl<T> Sample for T where T: Copy + Zero + Mul<Output = T> + AddAssign + Send + Sync {}

fn accumulate<T: Sample>(a: &[T], b: &[T], c: &mut [T]) {
    c.iter_mut().for_each(|x| *x = T::zero());
    for (k, &ak) in a.iter().enumerate() {
        for (n, &bn) in b.iter().enumerate() {
            c[k + n] += ak * bn;
        }
    }
}

/// Convolve `a` with `b` into `c`, which must hold exactly `a.len() + b.len() - 1` samples.
///
/// # Errors
///
/// - [`ConvError::InvalidSize`] if either input is empty
/// - [`ConvError::OutputLength`] if `c` has the wrong length
///
/// # Example
///
/// ```
/// use lib_conv::direct::convolve_direct;
///
/// let a = [1.0, 2.0, 3.0];
/// let b = [3.0, -1.0, 2.0, 4.0];
/// let mut c = [0.0; 6];
/// convolve_direct(&a, &b, &mut c).unwrap();
/// assert_eq!(c, [3.0, 5.0, 9.0, 5.0, 14.0, 12.0]);
/// ```
pub fn convolve_direct<T: Sample>(a: &[T], b: &[T], c: &mut [T]) -> ConvResult<()> {
    check_lengths(a.len(), b.len(), c.len())?;
    accumulate(a, b, c);
    Ok(())
}

/// Convolve `a` with `b`, returning a new buffer of length `a.len() + b.len() - 1`.
pub fn convolve_direct_alloc<T: Sample>(a: &[T], b: &[T]) -> ConvResult<Vec<T>> {
    check_sizes(a.len(), b.len())?;
    let mut c = vec![T::zero(); output_len(a.len(), b.len())];
    accumulate(a, b, &mut c);
    Ok(c)
}

/// In-place convolution: `buf[..na]` holds the first sequence on entry and
/// the whole of `buf` (length `na + b.len() - 1`) holds the result on return.
///
/// The product is built in a private scratch buffer and copied over `buf`,
/// so overwriting the input while it is still being read cannot happen.
pub fn convolve_direct_in_place<T: Sample>(buf: &mut [T], na: usize, b: &[T]) -> ConvResult<()> {
    check_lengths(na, b.len(), buf.len())?;
    let mut scratch = vec![T::zero(); buf.len()];
    accumulate(&buf[..na], b, &mut scratch);
    buf.copy_from_slice(&scratch);
    Ok(())
}
