//! # lib-conv-ffi - C bindings for lib-conv
//!
//! Exposes direct and block (overlap-add) convolution to C callers with
//! status codes returned by value.
//!
//! ## Usage from C
//!
//! ```c
//! conv_complex_t a[3] = {{1, 0}, {2, 0}, {3, 0}};
//! conv_complex_t b[4] = {{3, 0}, {-1, 0}, {2, 0}, {4, 0}};
//! conv_complex_t c[6];
//!
//! conv_fft_t* fft = conv_fft_new();
//! int status = conv_block_fft_cmplx(a, 3, b, 4, 8, fft, c);
//! conv_fft_free(fft);
//! ```
//!
//! Output buffers must hold `na + nb - 1` samples. Every function checks
//! for null pointers, then sizes, then the block size, before any buffer is
//! read. On a non-`Ok` status the output content is unspecified.

use std::ffi::c_int;
use std::ptr;
use std::slice;

use lib_conv::{
    convolve_block_fft, convolve_direct, convolve_direct_alloc, Complex64, ConvError, FftEngine,
};

// =============================================================================
// Types
// =============================================================================

/// Complex sample (matches C's `struct { double re, im; }`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConvComplex {
    /// Real component
    pub re: f64,
    /// Imaginary component
    pub im: f64,
}

impl From<Complex64> for ConvComplex {
    fn from(c: Complex64) -> Self {
        ConvComplex { re: c.re, im: c.im }
    }
}

impl From<ConvComplex> for Complex64 {
    fn from(c: ConvComplex) -> Self {
        Complex64::new(c.re, c.im)
    }
}

/// Status codes returned by every convolution function
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvStatus {
    /// Success
    Ok = 0,
    /// A required pointer was null
    NullPointer = 1,
    /// A sequence length was less than 1
    InvalidSize = 2,
    /// Block size did not exceed the shorter sequence length
    InvalidBlockSize = 3,
    /// The transform failed for a block
    TransformFailure = 4,
}

impl From<&ConvError> for ConvStatus {
    fn from(err: &ConvError) -> Self {
        match err {
            ConvError::NullPointer => ConvStatus::NullPointer,
            // Output length is implied by na + nb - 1 on this side of the ABI,
            // and no entry point here takes a tolerance
            ConvError::InvalidSize { .. }
            | ConvError::OutputLength { .. }
            | ConvError::InvalidTolerance => ConvStatus::InvalidSize,
            ConvError::InvalidBlockSize { .. } => ConvStatus::InvalidBlockSize,
            ConvError::TransformFailure(_) => ConvStatus::TransformFailure,
        }
    }
}

impl<T> From<Result<T, ConvError>> for ConvStatus {
    fn from(result: Result<T, ConvError>) -> Self {
        match result {
            Ok(_) => ConvStatus::Ok,
            Err(err) => {
                tracing::debug!("convolution failed: {}", err);
                ConvStatus::from(&err)
            }
        }
    }
}

/// Opaque transform handle
pub struct ConvFft {
    inner: FftEngine,
}

// =============================================================================
// Transform handle
// =============================================================================

/// Create a transform handle. Free it with `conv_fft_free`.
///
/// Plans are cached inside the handle, so reusing one handle across calls
/// with the same block size avoids re-planning.
#[no_mangle]
pub extern "C" fn conv_fft_new() -> *mut ConvFft {
    Box::into_raw(Box::new(ConvFft {
        inner: FftEngine::new(),
    }))
}

/// Free a transform handle
///
/// # Safety
/// `fft` must be null or a pointer returned by `conv_fft_new` that has not
/// been freed yet
#[no_mangle]
pub unsafe extern "C" fn conv_fft_free(fft: *mut ConvFft) {
    if !fft.is_null() {
        drop(Box::from_raw(fft));
    }
}

// =============================================================================
// Argument checks
// =============================================================================

/// Reject the call if any required pointer is null.
fn check_non_null(ptrs: &[*const ()]) -> Result<(), ConvError> {
    if ptrs.iter().any(|p| p.is_null()) {
        return Err(ConvError::NullPointer);
    }
    Ok(())
}

/// Validate lengths, returning them as `usize`.
fn check_sizes(na: c_int, nb: c_int) -> Result<(usize, usize), ConvStatus> {
    if na < 1 || nb < 1 {
        return Err(ConvStatus::InvalidSize);
    }
    Ok((na as usize, nb as usize))
}

/// Whether `[p, p + n)` and `[q, q + m)` share any element.
fn overlaps<T>(p: *const T, n: usize, q: *const T, m: usize) -> bool {
    let size = std::mem::size_of::<T>();
    let (p0, q0) = (p as usize, q as usize);
    let (p1, q1) = (p0 + n * size, q0 + m * size);
    p0 < q1 && q0 < p1
}

/// Copy a C complex array into owned samples.
///
/// # Safety
/// `x` must point to `n` readable elements
unsafe fn to_samples(x: *const ConvComplex, n: usize) -> Vec<Complex64> {
    slice::from_raw_parts(x, n)
        .iter()
        .map(|&v| Complex64::from(v))
        .collect()
}

/// Write owned samples to a C complex array.
///
/// # Safety
/// `c` must point to `values.len()` writable elements
unsafe fn write_samples(values: &[Complex64], c: *mut ConvComplex) {
    let out = slice::from_raw_parts_mut(c, values.len());
    for (dst, &src) in out.iter_mut().zip(values.iter()) {
        *dst = ConvComplex::from(src);
    }
}

// =============================================================================
// Direct convolution
// =============================================================================

/// Real linear convolution `c = a * b`
///
/// `c` may alias `a` or `b`; the product is then built in a scratch buffer
/// and copied over `c`.
///
/// # Safety
/// - `a` must point to `na` readable elements, `b` to `nb`
/// - `c` must point to `na + nb - 1` writable elements
#[no_mangle]
pub unsafe extern "C" fn conv_direct(
    a: *const f64,
    na: c_int,
    b: *const f64,
    nb: c_int,
    c: *mut f64,
) -> ConvStatus {
    if let Err(err) = check_non_null(&[a as *const (), b as *const (), c as *const ()]) {
        return ConvStatus::from(&err);
    }
    let (na, nb) = match check_sizes(na, nb) {
        Ok(sizes) => sizes,
        Err(status) => return status,
    };
    let nc = na + nb - 1;

    if overlaps(a, na, c, nc) || overlaps(b, nb, c, nc) {
        tracing::debug!("conv_direct: output aliases an input, using scratch buffer");
        let result = convolve_direct_alloc(slice::from_raw_parts(a, na), slice::from_raw_parts(b, nb));
        return match result {
            Ok(scratch) => {
                ptr::copy(scratch.as_ptr(), c, nc);
                ConvStatus::Ok
            }
            Err(err) => ConvStatus::from(&err),
        };
    }

    convolve_direct(
        slice::from_raw_parts(a, na),
        slice::from_raw_parts(b, nb),
        slice::from_raw_parts_mut(c, nc),
    )
    .into()
}

/// Complex linear convolution `c = a * b`
///
/// Inputs are read completely before `c` is written, so `c` may alias `a`
/// or `b`.
///
/// # Safety
/// - `a` must point to `na` readable elements, `b` to `nb`
/// - `c` must point to `na + nb - 1` writable elements
#[no_mangle]
pub unsafe extern "C" fn conv_direct_cmplx(
    a: *const ConvComplex,
    na: c_int,
    b: *const ConvComplex,
    nb: c_int,
    c: *mut ConvComplex,
) -> ConvStatus {
    if let Err(err) = check_non_null(&[a as *const (), b as *const (), c as *const ()]) {
        return ConvStatus::from(&err);
    }
    let (na, nb) = match check_sizes(na, nb) {
        Ok(sizes) => sizes,
        Err(status) => return status,
    };

    let a = to_samples(a, na);
    let b = to_samples(b, nb);
    match convolve_direct_alloc(&a, &b) {
        Ok(result) => {
            write_samples(&result, c);
            ConvStatus::Ok
        }
        Err(err) => ConvStatus::from(&err),
    }
}

// =============================================================================
// Block (overlap-add) convolution
// =============================================================================

/// Complex linear convolution by overlap-add over `block_size`-point transforms
///
/// `block_size` must be greater than `min(na, nb)`; it does not need to be a
/// power of two.
///
/// # Safety
/// - `a` must point to `na` readable elements, `b` to `nb`
/// - `fft` must be a handle returned by `conv_fft_new`
/// - `c` must point to `na + nb - 1` writable elements
#[no_mangle]
pub unsafe extern "C" fn conv_block_fft_cmplx(
    a: *const ConvComplex,
    na: c_int,
    b: *const ConvComplex,
    nb: c_int,
    block_size: c_int,
    fft: *const ConvFft,
    c: *mut ConvComplex,
) -> ConvStatus {
    let ptrs = [
        a as *const (),
        b as *const (),
        fft as *const (),
        c as *const (),
    ];
    if let Err(err) = check_non_null(&ptrs) {
        return ConvStatus::from(&err);
    }
    let (na, nb) = match check_sizes(na, nb) {
        Ok(sizes) => sizes,
        Err(status) => return status,
    };
    if block_size < 1 || block_size as usize <= na.min(nb) {
        return ConvStatus::InvalidBlockSize;
    }

    let a = to_samples(a, na);
    let b = to_samples(b, nb);
    let mut out = vec![Complex64::new(0.0, 0.0); na + nb - 1];

    match convolve_block_fft(&a, &b, block_size as usize, &(*fft).inner, &mut out) {
        Ok(()) => {
            write_samples(&out, c);
            ConvStatus::Ok
        }
        Err(err) => ConvStatus::from(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complex(values: &[f64]) -> Vec<ConvComplex> {
        values.iter().map(|&re| ConvComplex { re, im: 0.0 }).collect()
    }

    #[test]
    fn test_direct_known_product() {
        let a = [1.0, 2.0, 3.0];
        let b = [3.0, -1.0, 2.0, 4.0];
        let mut c = [0.0; 6];

        let status = unsafe { conv_direct(a.as_ptr(), 3, b.as_ptr(), 4, c.as_mut_ptr()) };
        assert_eq!(status, ConvStatus::Ok);
        assert_eq!(c, [3.0, 5.0, 9.0, 5.0, 14.0, 12.0]);
    }

    #[test]
    fn test_direct_in_place_aliasing_a() {
        let mut buf = vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0];
        let b = [3.0, -1.0, 2.0, 4.0];
        let p = buf.as_mut_ptr();

        let status = unsafe { conv_direct(p as *const f64, 3, b.as_ptr(), 4, p) };
        assert_eq!(status, ConvStatus::Ok);
        assert_eq!(buf, vec![3.0, 5.0, 9.0, 5.0, 14.0, 12.0]);
    }

    #[test]
    fn test_direct_in_place_aliasing_b() {
        let a = [1.0, 2.0, 3.0];
        let mut buf = vec![3.0, -1.0, 2.0, 4.0, 0.0, 0.0];
        let p = buf.as_mut_ptr();

        let status = unsafe { conv_direct(a.as_ptr(), 3, p as *const f64, 4, p) };
        assert_eq!(status, ConvStatus::Ok);
        assert_eq!(buf, vec![3.0, 5.0, 9.0, 5.0, 14.0, 12.0]);
    }

    #[test]
    fn test_direct_cmplx_in_place() {
        let mut buf = vec![
            ConvComplex { re: 0.0, im: 1.0 },
            ConvComplex { re: 1.0, im: 1.0 },
            ConvComplex { re: 2.0, im: 2.0 },
            ConvComplex::default(),
            ConvComplex::default(),
            ConvComplex::default(),
        ];
        let b = [
            ConvComplex { re: 3.0, im: 3.0 },
            ConvComplex { re: 4.0, im: 4.0 },
            ConvComplex { re: 5.0, im: 5.0 },
            ConvComplex { re: 6.0, im: 6.0 },
        ];
        let p = buf.as_mut_ptr();

        let status = unsafe { conv_direct_cmplx(p as *const ConvComplex, 3, b.as_ptr(), 4, p) };
        assert_eq!(status, ConvStatus::Ok);
        assert_eq!(buf[0], ConvComplex { re: -3.0, im: 3.0 });
        assert_eq!(buf[3], ConvComplex { re: -6.0, im: 32.0 });
        assert_eq!(buf[5], ConvComplex { re: 0.0, im: 24.0 });
    }

    #[test]
    fn test_null_pointers() {
        let a = [1.0];
        let mut c = [0.0];
        let status = unsafe { conv_direct(ptr::null(), 1, a.as_ptr(), 1, c.as_mut_ptr()) };
        assert_eq!(status, ConvStatus::NullPointer);

        let x = complex(&[1.0]);
        let mut y = complex(&[0.0]);
        let status = unsafe {
            conv_block_fft_cmplx(x.as_ptr(), 1, x.as_ptr(), 1, 4, ptr::null(), y.as_mut_ptr())
        };
        assert_eq!(status, ConvStatus::NullPointer);

        let status =
            unsafe { conv_direct_cmplx(x.as_ptr(), 1, x.as_ptr(), 1, ptr::null_mut()) };
        assert_eq!(status, ConvStatus::NullPointer);
    }

    #[test]
    fn test_null_check_reports_conv_error() {
        let x = [1.0f64];
        assert_eq!(check_non_null(&[x.as_ptr() as *const ()]), Ok(()));
        let err = check_non_null(&[x.as_ptr() as *const (), ptr::null()]).unwrap_err();
        assert_eq!(err, ConvError::NullPointer);
        assert_eq!(ConvStatus::from(&err), ConvStatus::NullPointer);
    }

    #[test]
    fn test_invalid_sizes() {
        let a = [1.0];
        let mut c = [0.0];
        let status = unsafe { conv_direct(a.as_ptr(), 0, a.as_ptr(), 1, c.as_mut_ptr()) };
        assert_eq!(status, ConvStatus::InvalidSize);

        let x = complex(&[1.0]);
        let mut y = complex(&[0.0]);
        let status = unsafe { conv_direct_cmplx(x.as_ptr(), 1, x.as_ptr(), -3, y.as_mut_ptr()) };
        assert_eq!(status, ConvStatus::InvalidSize);
    }

    #[test]
    fn test_block_fft_known_product() {
        let a = complex(&[1.0, 2.0, 3.0]);
        let b = complex(&[3.0, -1.0, 2.0, 4.0]);
        let mut c = vec![ConvComplex::default(); 6];
        let fft = conv_fft_new();

        let status =
            unsafe { conv_block_fft_cmplx(a.as_ptr(), 3, b.as_ptr(), 4, 8, fft, c.as_mut_ptr()) };
        unsafe { conv_fft_free(fft) };

        assert_eq!(status, ConvStatus::Ok);
        let expected = [3.0, 5.0, 9.0, 5.0, 14.0, 12.0];
        for (got, want) in c.iter().zip(expected.iter()) {
            assert!((got.re - want).abs() < 1e-9);
            assert!(got.im.abs() < 1e-9);
        }
    }

    #[test]
    fn test_block_fft_invalid_block_size_leaves_output() {
        let a = complex(&[1.0, 2.0, 3.0]);
        let b = complex(&[3.0, -1.0, 2.0, 4.0]);
        let sentinel = ConvComplex { re: 7.0, im: 7.0 };
        let mut c = vec![sentinel; 6];
        let fft = conv_fft_new();

        let status =
            unsafe { conv_block_fft_cmplx(a.as_ptr(), 3, b.as_ptr(), 4, 3, fft, c.as_mut_ptr()) };
        let negative =
            unsafe { conv_block_fft_cmplx(a.as_ptr(), 3, b.as_ptr(), 4, -8, fft, c.as_mut_ptr()) };
        unsafe { conv_fft_free(fft) };

        assert_eq!(status, ConvStatus::InvalidBlockSize);
        assert_eq!(negative, ConvStatus::InvalidBlockSize);
        assert!(c.iter().all(|&z| z == sentinel));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ConvStatus::from(&ConvError::InvalidBlockSize {
                block_size: 4,
                min_len: 4
            }),
            ConvStatus::InvalidBlockSize
        );
        assert_eq!(
            ConvStatus::from(&ConvError::TransformFailure(
                lib_conv::TransformError::ZeroLength
            )),
            ConvStatus::TransformFailure
        );
        assert_eq!(ConvStatus::from(Ok::<(), ConvError>(())), ConvStatus::Ok);
    }

    #[test]
    fn test_overlap_detection() {
        let buf = [0.0f64; 8];
        let p = buf.as_ptr();
        assert!(overlaps(p, 4, p, 8));
        assert!(overlaps(unsafe { p.add(3) }, 2, p, 4));
        assert!(!overlaps(unsafe { p.add(4) }, 4, p, 4));
    }
}
