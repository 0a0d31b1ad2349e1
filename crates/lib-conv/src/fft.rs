//! Transform primitives consumed by the convolution engine.
//!
//! The block engine only needs a fixed-size forward/inverse complex DFT.
//! That capability is expressed by the [`Transform`] trait with two
//! implementations:
//! - [`FftEngine`]: rustfft-backed, plans cached per length
//! - [`NaiveDft`]: the O(n²) direct sum, useful as an oracle for tiny sizes
//!
//! Both accept any length `n >= 1`; the inverse is normalized by `1/n`.

use crate::error::TransformError;
use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Fixed-size forward/inverse complex discrete transform.
pub trait Transform: Send + Sync {
    /// Compute `X(k) = Σ x(m)·exp(−j·2π·m·k/n)` into `output`.
    fn forward(&self, input: &[Complex64], output: &mut [Complex64])
        -> Result<(), TransformError>;

    /// Compute the inverse transform into `output`, normalized by `1/n`.
    fn inverse(&self, input: &[Complex64], output: &mut [Complex64])
        -> Result<(), TransformError>;
}

impl<T: Transform + ?Sized> Transform for &T {
    fn forward(
        &self,
        input: &[Complex64],
        output: &mut [Complex64],
    ) -> Result<(), TransformError> {
        (**self).forward(input, output)
    }

    fn inverse(
        &self,
        input: &[Complex64],
        output: &mut [Complex64],
    ) -> Result<(), TransformError> {
        (**self).inverse(input, output)
    }
}

fn check_buffers(input: &[Complex64], output: &[Complex64]) -> Result<(), TransformError> {
    if input.is_empty() {
        return Err(TransformError::ZeroLength);
    }
    if output.len() != input.len() {
        return Err(TransformError::LengthMismatch {
            expected: input.len(),
            actual: output.len(),
        });
    }
    Ok(())
}

/// FFT engine with cached plans.
///
/// Plans are created on first use of a given length and shared afterwards,
/// so one engine can serve every block of a sweep (and every rayon worker).
/// The planner and the cache belong to the engine instance; nothing is
/// process-wide.
pub struct FftEngine {
    /// Complex FFT planner, shared so sub-plans are reused across lengths.
    planner: Mutex<FftPlanner<f64>>,

    /// Plans already handed out, keyed by `(len, is_forward)`.
    plans: RwLock<HashMap<(usize, bool), Arc<dyn Fft<f64>>>>,
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FftEngine {
    /// Create a new FFT engine.
    pub fn new() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// Get a cached plan for `len` in the given direction.
    pub fn plan(&self, len: usize, direction: FftDirection) -> Arc<dyn Fft<f64>> {
        let key = (len, direction == FftDirection::Forward);
        if let Some(plan) = self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(plan);
        }

        let plan = self
            .planner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .plan_fft(len, direction);
        self.plans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(plan)
            .clone()
    }

    /// Number of cached plans.
    pub fn cached_plans(&self) -> usize {
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Perform forward FFT on complex data in-place.
    pub fn fft_inplace(&self, data: &mut [Complex64]) -> Result<(), TransformError> {
        if data.is_empty() {
            return Err(TransformError::ZeroLength);
        }
        self.plan(data.len(), FftDirection::Forward).process(data);
        Ok(())
    }

    /// Perform inverse FFT on complex data in-place.
    pub fn ifft_inplace(&self, data: &mut [Complex64]) -> Result<(), TransformError> {
        let len = data.len();
        if len == 0 {
            return Err(TransformError::ZeroLength);
        }
        self.plan(len, FftDirection::Inverse).process(data);

        // Normalize
        let scale = 1.0 / len as f64;
        for x in data.iter_mut() {
            *x *= scale;
        }

        Ok(())
    }

    /// Perform forward FFT on complex data, returning new buffer.
    pub fn fft(&self, data: &[Complex64]) -> Result<Vec<Complex64>, TransformError> {
        let mut result = data.to_vec();
        self.fft_inplace(&mut result)?;
        Ok(result)
    }

    /// Perform inverse FFT on complex data, returning new buffer.
    pub fn ifft(&self, data: &[Complex64]) -> Result<Vec<Complex64>, TransformError> {
        let mut result = data.to_vec();
        self.ifft_inplace(&mut result)?;
        Ok(result)
    }
}

impl std::fmt::Debug for FftEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftEngine")
            .field("cached_plans", &self.cached_plans())
            .finish()
    }
}

impl Transform for FftEngine {
    fn forward(
        &self,
        input: &[Complex64],
        output: &mut [Complex64],
    ) -> Result<(), TransformError> {
        check_buffers(input, output)?;
        output.copy_from_slice(input);
        self.fft_inplace(output)
    }

    fn inverse(
        &self,
        input: &[Complex64],
        output: &mut [Complex64],
    ) -> Result<(), TransformError> {
        check_buffers(input, output)?;
        output.copy_from_slice(input);
        self.ifft_inplace(output)
    }
}

/// Direct O(n²) discrete Fourier transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaiveDft;

impl NaiveDft {
    fn run(input: &[Complex64], output: &mut [Complex64], sign: f64) {
        let n = input.len();
        let step = sign * 2.0 * PI / n as f64;
        for (k, y) in output.iter_mut().enumerate() {
            *y = input
                .iter()
                .enumerate()
                .map(|(m, &x)| {
                    // k·m reduced mod n keeps the phase argument small
                    let phi = step * ((k * m) % n) as f64;
                    x * Complex64::from_polar(1.0, phi)
                })
                .sum();
        }
    }
}

impl Transform for NaiveDft {
    fn forward(
        &self,
        input: &[Complex64],
        output: &mut [Complex64],
    ) -> Result<(), TransformError> {
        check_buffers(input, output)?;
        Self::run(input, output, -1.0);
        Ok(())
    }

    fn inverse(
        &self,
        input: &[Complex64],
        output: &mut [Complex64],
    ) -> Result<(), TransformError> {
        check_buffers(input, output)?;
        Self::run(input, output, 1.0);
        let scale = 1.0 / input.len() as f64;
        for y in output.iter_mut() {
            *y *= scale;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<Complex64> {
        (0..n)
            .map(|i| Complex64::new(i as f64, 0.5 * i as f64 - 1.0))
            .collect()
    }

    #[test]
    fn test_fft_ifft_roundtrip() {
        let engine = FftEngine::new();

        let n = 64;
        let signal: Vec<Complex64> = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                Complex64::new((2.0 * PI * 4.0 * t).sin(), 0.0)
            })
            .collect();

        let spectrum = engine.fft(&signal).unwrap();
        let recovered = engine.ifft(&spectrum).unwrap();

        for (orig, rec) in signal.iter().zip(recovered.iter()) {
            assert!((orig.re - rec.re).abs() < 1e-10);
            assert!((orig.im - rec.im).abs() < 1e-10);
        }
    }

    #[test]
    fn test_fft_accepts_non_power_of_two() {
        let engine = FftEngine::new();
        let x = ramp(12);
        let mut fast = vec![Complex64::default(); 12];
        let mut slow = vec![Complex64::default(); 12];

        engine.forward(&x, &mut fast).unwrap();
        NaiveDft.forward(&x, &mut slow).unwrap();

        for (f, s) in fast.iter().zip(slow.iter()) {
            assert!((f - s).norm() < 1e-9, "{} vs {}", f, s);
        }
    }

    #[test]
    fn test_naive_dft_roundtrip() {
        let x = ramp(16);
        let mut spectrum = vec![Complex64::default(); 16];
        let mut back = vec![Complex64::default(); 16];

        NaiveDft.forward(&x, &mut spectrum).unwrap();
        NaiveDft.inverse(&spectrum, &mut back).unwrap();

        for (orig, rec) in x.iter().zip(back.iter()) {
            assert!((orig - rec).norm() < 1e-10);
        }
    }

    #[test]
    fn test_plan_cache_reused() {
        let engine = FftEngine::new();
        let x = ramp(8);
        let mut y = vec![Complex64::default(); 8];

        engine.forward(&x, &mut y).unwrap();
        engine.forward(&x, &mut y).unwrap();
        engine.inverse(&x, &mut y).unwrap();

        assert_eq!(engine.cached_plans(), 2);
    }

    #[test]
    fn test_plans_shared_across_threads() {
        let engine = FftEngine::new();
        let x = ramp(24);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut y = vec![Complex64::default(); 24];
                    engine.forward(&x, &mut y).unwrap();
                    engine.inverse(&y.clone(), &mut y).unwrap();
                    for (orig, rec) in x.iter().zip(y.iter()) {
                        assert!((orig - rec).norm() < 1e-10);
                    }
                });
            }
        });

        assert_eq!(engine.cached_plans(), 2);
        assert!(Arc::ptr_eq(
            &engine.plan(24, FftDirection::Forward),
            &engine.plan(24, FftDirection::Forward)
        ));
    }

    #[test]
    fn test_degenerate_buffers_rejected() {
        let engine = FftEngine::new();
        let mut empty: Vec<Complex64> = Vec::new();
        assert_eq!(
            engine.forward(&[], &mut empty),
            Err(TransformError::ZeroLength)
        );

        let mut short = vec![Complex64::default(); 3];
        assert_eq!(
            NaiveDft.inverse(&ramp(4), &mut short),
            Err(TransformError::LengthMismatch {
                expected: 4,
                actual: 3
            })
        );
    }
}
