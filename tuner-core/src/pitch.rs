//! # Pitch Detection Module
//!
//! Locates the fundamental frequency in a spectrum produced by
//! [`crate::fft::SpectralAnalyzer`].
//!
//! ## Strategy
//! - The lowest local maximum above the threshold is the fundamental, since
//!   guitar harmonics often carry more energy than the fundamental itself
//! - When nothing clears the threshold, the strongest bin is reported so a
//!   reading is always produced; the tuning state later flags it as silent
//! - Optional parabolic interpolation for sub-bin accuracy

use crate::fft::SpectrumScale;

/// The fundamental chosen for one analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakResult {
    /// Frequency of the peak in Hz
    pub frequency: f32,
    /// Spectrum value at the peak, in the spectrum's scale
    pub magnitude: f32,
    /// Index of the peak bin in the spectrum
    pub bin: usize,
    /// Whether the peak cleared the detection threshold
    pub above_threshold: bool,
}

/// Configurable fundamental finder.
#[derive(Debug, Clone)]
pub struct PeakDetector {
    /// Bins at or below this frequency are never candidates. Zero disables it.
    pub min_frequency: f32,
    /// Refine the chosen bin with parabolic interpolation.
    pub interpolate: bool,
    /// Scale of the spectra this detector will receive.
    pub scale: SpectrumScale,
}

impl PeakDetector {
    pub fn new(scale: SpectrumScale) -> Self {
        Self {
            min_frequency: 0.0,
            interpolate: false,
            scale,
        }
    }

    /// Finds the fundamental in `spectrum`.
    ///
    /// Only the positive half (`1..=N/2`) is searched; the DC bin is always
    /// skipped. Scanning is in ascending frequency so ties resolve to the
    /// lowest frequency.
    ///
    /// # Arguments
    /// * `spectrum` - Spectrum values, N long
    /// * `frequencies` - Frequency axis aligned with `spectrum`
    /// * `threshold` - Level a local maximum must exceed, in the spectrum's scale
    ///
    /// # Returns
    /// * `Some(peak)` - The fundamental, or the strongest bin as a fallback
    /// * `None` - The spectrum has no positive-frequency bins to search
    pub fn find_fundamental(
        &self,
        spectrum: &[f32],
        frequencies: &[f32],
        threshold: f32,
    ) -> Option<PeakResult> {
        let n = spectrum.len().min(frequencies.len());
        let last = n / 2;
        if n < 2 || last < 1 {
            return None;
        }

        let min_frequency = self.min_frequency;
        let candidates = || {
            (1..=last).filter(move |&k| {
                let f = frequencies[k];
                f.is_finite() && (min_frequency <= 0.0 || f > min_frequency)
            })
        };

        let qualifying = candidates().find(|&k| {
            let value = spectrum[k];
            // Bin 1 is not compared against DC.
            let rises = k == 1 || value > spectrum[k - 1];
            let holds = k + 1 >= n || value >= spectrum[k + 1];
            rises && holds && value > threshold
        });

        let (bin, above_threshold) = match qualifying {
            Some(k) => (k, true),
            None => {
                // Strict comparison keeps the lowest-frequency bin on ties.
                let strongest = candidates().fold(None, |best: Option<usize>, k| match best {
                    Some(b) if spectrum[k] <= spectrum[b] => Some(b),
                    _ => Some(k),
                })?;
                (strongest, spectrum[strongest] > threshold)
            }
        };

        let frequency = if self.interpolate {
            self.refine(spectrum, frequencies, bin)
        } else {
            frequencies[bin]
        };

        Some(PeakResult {
            frequency,
            magnitude: spectrum[bin],
            bin,
            above_threshold,
        })
    }

    /// Refines a peak bin to sub-bin accuracy with parabolic interpolation.
    ///
    /// Linear spectra are fitted on their logarithm; decibel spectra are
    /// already logarithmic and are fitted directly. Falls back to the bin
    /// frequency whenever the fit is degenerate.
    fn refine(&self, spectrum: &[f32], frequencies: &[f32], bin: usize) -> f32 {
        let rough_freq = frequencies[bin];
        if bin <= 1 || bin + 1 >= spectrum.len() || bin + 1 >= frequencies.len() {
            return rough_freq;
        }

        let level = |v: f32| match self.scale {
            SpectrumScale::Decibels => v,
            SpectrumScale::Power | SpectrumScale::Amplitude => v.ln(),
        };
        let y1 = level(spectrum[bin - 1]);
        let y2 = level(spectrum[bin]);
        let y3 = level(spectrum[bin + 1]);

        if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() { return rough_freq; }

        let denominator = 2.0 * y2 - y1 - y3;
        if denominator.abs() < 1e-6 { return rough_freq; }

        let peak_shift = (y3 - y1) / (2.0 * denominator);
        let bin_width = frequencies[bin] - frequencies[bin - 1];
        let final_freq = rough_freq + peak_shift * bin_width;

        if final_freq.is_finite() && final_freq > 0.0 {
            final_freq
        } else {
            rough_freq
        }
    }
}
