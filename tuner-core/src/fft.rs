//! # Fast Fourier Transform (FFT) Module
//!
//! This module turns a preprocessed sample window into a spectrum and its
//! matching frequency axis.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once per window size
//! - Power spectral density, amplitude and decibel scales
//! - DFT bin frequency axis and a shift into ascending display order

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default lower clamp for decibel spectra.
pub const DEFAULT_DB_FLOOR: f32 = -60.0;

/// How spectrum magnitudes are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumScale {
    /// `|X[k]|^2 / N`
    Power,
    /// `|X[k]|`
    Amplitude,
    /// `10 * log10(|X[k]|^2 / N)`, clamped to a floor
    Decibels,
}

/// Output of one transform. Both vectors are `N` long and index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub values: Vec<f32>,
    pub frequencies: Vec<f32>,
}

/// Returns the DFT bin frequencies for a window of `n` samples.
///
/// Bins `0..=n/2` are non-negative (`k * fs / n`), the remaining bins carry
/// the mirrored negative frequencies (`(k - n) * fs / n`).
pub fn frequency_axis(n: usize, sample_rate: u32) -> Vec<f32> {
    let bin_width = sample_rate as f32 / n as f32;
    (0..n)
        .map(|k| {
            if k <= n / 2 {
                k as f32 * bin_width
            } else {
                -((n - k) as f32) * bin_width
            }
        })
        .collect()
}

/// Reorders a spectrum or frequency axis into ascending frequency order.
///
/// The most negative bin comes first and zero sits just past the middle,
/// consistent with [`frequency_axis`].
pub fn shift<T: Copy>(values: &[T]) -> Vec<T> {
    let mut shifted = values.to_vec();
    if !shifted.is_empty() {
        let split = (shifted.len() / 2 + 1) % shifted.len();
        shifted.rotate_left(split);
    }
    shifted
}

/// Converts a power value to decibels, clamping degenerate input to `floor`.
pub fn power_to_db(power: f32, floor: f32) -> f32 {
    if !(power.is_finite() && power > 0.0) {
        return floor;
    }
    let db = 10.0 * power.log10();
    if db.is_finite() { db.max(floor) } else { floor }
}

/// Forward DFT with spectrum scaling and frequency bookkeeping.
///
/// Holds only the planned FFT, so identical input always yields identical
/// output.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    sample_rate: u32,
    scale: SpectrumScale,
    db_floor: f32,
    axis: Vec<f32>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("size", &self.size)
            .field("sample_rate", &self.sample_rate)
            .field("scale", &self.scale)
            .field("db_floor", &self.db_floor)
            .finish()
    }
}

impl SpectralAnalyzer {
    /// Plans a forward FFT of `size` points.
    ///
    /// # Arguments
    /// * `size` - Window length N
    /// * `sample_rate` - Sample rate in Hz
    /// * `scale` - Output magnitude scale
    /// * `db_floor` - Lower clamp used by [`SpectrumScale::Decibels`]
    pub fn new(size: usize, sample_rate: u32, scale: SpectrumScale, db_floor: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self {
            fft,
            size,
            sample_rate,
            scale,
            db_floor,
            axis: frequency_axis(size, sample_rate),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn scale(&self) -> SpectrumScale {
        self.scale
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Spacing between adjacent bins in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.size as f32
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.axis
    }

    /// Performs the forward FFT and returns the raw complex spectrum.
    ///
    /// # Panics
    /// * If signal length is not equal to the planned size
    pub fn perform_fft(&self, signal: &[f32]) -> Vec<Complex<f32>> {
        assert_eq!(
            signal.len(),
            self.size,
            "input frame size must equal the planned FFT size"
        );

        let mut buffer: Vec<Complex<f32>> = signal
            .iter()
            .map(|&sample| Complex { re: sample, im: 0.0 })
            .collect();

        self.fft.process(&mut buffer);
        buffer
    }

    /// Transforms a real signal into a scaled spectrum and its frequency axis.
    pub fn transform(&self, signal: &[f32]) -> Spectrum {
        let n = self.size as f32;
        let values = self
            .perform_fft(signal)
            .iter()
            .map(|c| match self.scale {
                SpectrumScale::Power => c.norm_sqr() / n,
                SpectrumScale::Amplitude => c.norm(),
                SpectrumScale::Decibels => power_to_db(c.norm_sqr() / n, self.db_floor),
            })
            .collect();

        Spectrum {
            values,
            frequencies: self.axis.clone(),
        }
    }
}
