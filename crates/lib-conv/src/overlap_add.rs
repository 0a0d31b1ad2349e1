//! Segmented frequency-domain convolution.
//!
//! The longer (primary) sequence is swept in blocks of `block_size`
//! samples. Each block is transformed, multiplied by the spectrum of the
//! shorter (secondary) sequence and transformed back. The secondary is
//! placed at the *end* of its block, so the first `Nz = block_size - Lb`
//! samples of every circular product equal the linear convolution and the
//! wrapped-around tail can simply be dropped.
//!
//! ```text
//! kernel block:  [ 0 ... 0 | pb[0] ... pb[Lb-1] ]
//!                  <- Nz ->  <------ Lb ------>
//!
//! block i:       pa[shift .. shift + block_size], shift = i*Nz - Lb
//! output:        c[i*Nz .. i*Nz + Nz] = ifft(fft(block) * K)[..Nz]
//! ```
//!
//! Samples of `pa` before index 0 or past its end are represented by zero
//! padding inside the block; windows are computed as explicit offset and
//! length pairs, never by shifting a pointer.

use crate::config::{ConvolverConfig, SweepMode};
use crate::error::{check_lengths, check_sizes, output_len, ConfigError, ConvError, ConvResult};
use crate::fft::{FftEngine, Transform};
use num_complex::Complex64;
use rayon::prelude::*;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Validate every precondition before any buffer is touched.
fn check_args(na: usize, nb: usize, block_size: usize, out_len: usize) -> ConvResult<()> {
    check_lengths(na, nb, out_len)?;
    let min_len = na.min(nb);
    if block_size <= min_len {
        return Err(ConvError::InvalidBlockSize {
            block_size,
            min_len,
        });
    }
    Ok(())
}

/// Portion of the primary sequence that lands inside one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BlockWindow {
    /// First primary sample copied.
    src_start: usize,
    /// Block index receiving `primary[src_start]`.
    dst_offset: usize,
    /// Number of samples copied.
    len: usize,
}

impl BlockWindow {
    /// Window for a block starting at signed primary index `shift`.
    ///
    /// The result always satisfies `src_start + len <= primary_len` and
    /// `dst_offset + len <= block_size`.
    fn new(shift: isize, block_size: usize, primary_len: usize) -> Self {
        let start = shift.max(0);
        let end = (shift + block_size as isize).min(primary_len as isize);
        if end <= start {
            return Self {
                src_start: 0,
                dst_offset: 0,
                len: 0,
            };
        }
        Self {
            src_start: start as usize,
            dst_offset: (start - shift) as usize,
            len: (end - start) as usize,
        }
    }

    /// Whether the block is a plain slice of the primary (no padding).
    fn is_full(&self, block_size: usize) -> bool {
        self.dst_offset == 0 && self.len == block_size
    }
}

/// Per-call sweep geometry. Primary and secondary are already oriented.
#[derive(Clone, Copy, Debug)]
struct SweepPlan<'a> {
    primary: &'a [Complex64],
    secondary: &'a [Complex64],
    block_size: usize,
    /// Non-aliased output samples per block.
    nz: usize,
}

impl<'a> SweepPlan<'a> {
    /// Orient the inputs. Arguments must already be validated.
    fn new(a: &'a [Complex64], b: &'a [Complex64], block_size: usize) -> Self {
        let (primary, secondary) = if a.len() >= b.len() { (a, b) } else { (b, a) };
        Self {
            primary,
            secondary,
            block_size,
            nz: block_size - secondary.len(),
        }
    }

    fn output_len(&self) -> usize {
        output_len(self.primary.len(), self.secondary.len())
    }

    /// Transform the right-aligned secondary block. `block` is used as scratch.
    fn kernel_spectrum<T: Transform + ?Sized>(
        &self,
        transform: &T,
        block: &mut [Complex64],
    ) -> ConvResult<Vec<Complex64>> {
        block.fill(ZERO);
        block[self.nz..].copy_from_slice(self.secondary);

        let mut kernel = vec![ZERO; self.block_size];
        transform.forward(block, &mut kernel)?;
        Ok(kernel)
    }

    /// Compute the output segment starting at `ind` into `out`.
    ///
    /// `out.len()` is `Nz` except for the final block, where it is the
    /// remaining `Lc - ind` samples.
    fn process_block<T: Transform + ?Sized>(
        &self,
        ind: usize,
        kernel: &[Complex64],
        transform: &T,
        scratch: &mut Scratch,
        out: &mut [Complex64],
    ) -> ConvResult<()> {
        let shift = ind as isize - self.secondary.len() as isize;
        let window = BlockWindow::new(shift, self.block_size, self.primary.len());

        tracing::trace!(
            "block sweep: ind={}, shift={}, window={:?}, tail={}",
            ind,
            shift,
            window,
            shift + self.block_size as isize >= self.primary.len() as isize
        );

        let Scratch {
            block,
            spectrum,
            product,
        } = scratch;

        let input: &[Complex64] = if window.is_full(self.block_size) {
            &self.primary[window.src_start..window.src_start + self.block_size]
        } else {
            block.fill(ZERO);
            block[window.dst_offset..window.dst_offset + window.len]
                .copy_from_slice(&self.primary[window.src_start..window.src_start + window.len]);
            &block[..]
        };

        transform.forward(input, spectrum)?;

        for ((p, &x), &k) in product.iter_mut().zip(spectrum.iter()).zip(kernel.iter()) {
            *p = x * k;
        }

        // Time-domain result reuses the block buffer.
        transform.inverse(product, block)?;
        out.copy_from_slice(&block[..out.len()]);
        Ok(())
    }
}

/// Engine-owned block buffers, dropped on every exit path.
struct Scratch {
    block: Vec<Complex64>,
    spectrum: Vec<Complex64>,
    product: Vec<Complex64>,
}

impl Scratch {
    fn new(block_size: usize) -> Self {
        Self {
            block: vec![ZERO; block_size],
            spectrum: vec![ZERO; block_size],
            product: vec![ZERO; block_size],
        }
    }
}

/// Convolve `a` with `b` by overlap-add using blocks of `block_size` samples.
///
/// `c` must hold exactly `a.len() + b.len() - 1` samples. The longer input is
/// swept; the shorter one becomes the kernel. The result matches
/// [`crate::direct::convolve_direct`] within the transform's rounding error.
///
/// # Errors
///
/// - [`ConvError::InvalidSize`] if either input is empty
/// - [`ConvError::OutputLength`] if `c` has the wrong length
/// - [`ConvError::InvalidBlockSize`] if `block_size <= min(a.len(), b.len())`
/// - [`ConvError::TransformFailure`] if any transform call fails; the sweep
///   stops at that block and `c` must not be read
///
/// All checks except the last run before anything is allocated.
///
/// # Example
///
/// ```
/// use lib_conv::{convolve_block_fft, FftEngine};
/// use num_complex::Complex64;
///
/// let a: Vec<Complex64> = [1.0, 2.0, 3.0].iter().map(|&x| Complex64::new(x, 0.0)).collect();
/// let b: Vec<Complex64> = [3.0, -1.0, 2.0, 4.0].iter().map(|&x| Complex64::new(x, 0.0)).collect();
/// let mut c = vec![Complex64::new(0.0, 0.0); 6];
///
/// convolve_block_fft(&a, &b, 8, &FftEngine::new(), &mut c).unwrap();
/// assert!((c[4].re - 14.0).abs() < 1e-9);
/// ```
pub fn convolve_block_fft<T: Transform + ?Sized>(
    a: &[Complex64],
    b: &[Complex64],
    block_size: usize,
    transform: &T,
    c: &mut [Complex64],
) -> ConvResult<()> {
    check_args(a.len(), b.len(), block_size, c.len())?;
    let plan = SweepPlan::new(a, b, block_size);

    tracing::debug!(
        "overlap-add: primary_len={}, secondary_len={}, block_size={}, nz={}, blocks={}",
        plan.primary.len(),
        plan.secondary.len(),
        block_size,
        plan.nz,
        (plan.output_len() + plan.nz - 1) / plan.nz
    );

    let mut scratch = Scratch::new(block_size);
    let kernel = plan.kernel_spectrum(transform, &mut scratch.block)?;

    for (i, out) in c.chunks_mut(plan.nz).enumerate() {
        plan.process_block(i * plan.nz, &kernel, transform, &mut scratch, out)?;
    }
    Ok(())
}

/// Parallel variant of [`convolve_block_fft`].
///
/// Once the kernel spectrum exists every block depends only on the primary
/// and the kernel and writes a disjoint `Nz`-sample range of `c`, so blocks
/// are distributed over the rayon pool with per-worker scratch. Output is
/// identical to the sequential sweep.
pub fn convolve_block_fft_parallel<T: Transform + ?Sized>(
    a: &[Complex64],
    b: &[Complex64],
    block_size: usize,
    transform: &T,
    c: &mut [Complex64],
) -> ConvResult<()> {
    check_args(a.len(), b.len(), block_size, c.len())?;
    let plan = SweepPlan::new(a, b, block_size);

    tracing::debug!(
        "overlap-add (parallel): primary_len={}, secondary_len={}, block_size={}, nz={}",
        plan.primary.len(),
        plan.secondary.len(),
        block_size,
        plan.nz
    );

    let kernel = {
        let mut block = vec![ZERO; block_size];
        plan.kernel_spectrum(transform, &mut block)?
    };

    c.par_chunks_mut(plan.nz).enumerate().try_for_each_init(
        || Scratch::new(block_size),
        |scratch, (i, out)| plan.process_block(i * plan.nz, &kernel, transform, scratch, out),
    )
}

/// Real-valued [`convolve_block_fft`]: inputs are promoted to complex and the
/// real part of the result is kept.
pub fn convolve_block_fft_real<T: Transform + ?Sized>(
    a: &[f64],
    b: &[f64],
    block_size: usize,
    transform: &T,
    c: &mut [f64],
) -> ConvResult<()> {
    check_args(a.len(), b.len(), block_size, c.len())?;

    let a: Vec<Complex64> = a.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let b: Vec<Complex64> = b.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let mut out = vec![ZERO; c.len()];

    convolve_block_fft(&a, &b, block_size, transform, &mut out)?;

    for (dst, src) in c.iter_mut().zip(out.iter()) {
        *dst = src.re;
    }
    Ok(())
}

/// Configured overlap-add convolver.
///
/// Owns the transform so plan caches survive across calls, and applies the
/// block-size policy and sweep mode from a [`ConvolverConfig`].
#[derive(Debug)]
pub struct BlockConvolver<T: Transform = FftEngine> {
    config: ConvolverConfig,
    transform: T,
}

impl BlockConvolver<FftEngine> {
    /// Create a convolver backed by [`FftEngine`].
    pub fn new(config: ConvolverConfig) -> Result<Self, ConfigError> {
        Self::with_transform(config, FftEngine::new())
    }
}

impl<T: Transform> BlockConvolver<T> {
    /// Create a convolver with a custom transform primitive.
    pub fn with_transform(config: ConvolverConfig, transform: T) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, transform })
    }

    /// Active configuration.
    pub fn config(&self) -> &ConvolverConfig {
        &self.config
    }

    /// Transform primitive in use.
    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Block size that would be used for inputs of length `na` and `nb`.
    pub fn block_size_for(&self, na: usize, nb: usize) -> usize {
        self.config.block_size.resolve(na.min(nb))
    }

    /// Convolve into a caller-provided buffer of length `a.len() + b.len() - 1`.
    pub fn convolve_into(
        &self,
        a: &[Complex64],
        b: &[Complex64],
        c: &mut [Complex64],
    ) -> ConvResult<()> {
        let block_size = self.block_size_for(a.len(), b.len());
        match self.config.sweep {
            SweepMode::Sequential => convolve_block_fft(a, b, block_size, &self.transform, c),
            SweepMode::Parallel => {
                convolve_block_fft_parallel(a, b, block_size, &self.transform, c)
            }
        }
    }

    /// Convolve and allocate the output.
    pub fn convolve(&self, a: &[Complex64], b: &[Complex64]) -> ConvResult<Vec<Complex64>> {
        check_sizes(a.len(), b.len())?;
        let mut c = vec![ZERO; output_len(a.len(), b.len())];
        self.convolve_into(a, b, &mut c)?;
        Ok(c)
    }

    /// Convolve real sequences and allocate the output.
    pub fn convolve_real(&self, a: &[f64], b: &[f64]) -> ConvResult<Vec<f64>> {
        let to_complex = |x: &[f64]| -> Vec<Complex64> {
            x.iter().map(|&v| Complex64::new(v, 0.0)).collect()
        };
        let c = self.convolve(&to_complex(a), &to_complex(b))?;
        Ok(c.into_iter().map(|z| z.re).collect())
    }
}
