//! # Preprocessing Module
//!
//! Turns a raw `u8` sample window into a real-valued signal ready for the
//! spectral transform: DC offset removal, optional scaling into the [-1, 1]
//! range and an optional Hann window.

/// Half of the unsigned 8-bit range, used to scale samples into [-1, 1].
const NORMALISATION_DIVISOR: f32 = 128.0;

/// Removes the DC offset from a signal by making its average value zero.
///
/// The ADC delivers samples biased around mid-scale, which would otherwise
/// dominate the 0 Hz bin.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    for sample in signal.iter_mut() {
        *sample -= avg;
    }
}

/// Computes Hann window coefficients `0.5 * (1 - cos(2*pi*i / (n - 1)))`.
///
/// A single-sample window is left unattenuated.
pub fn hann_coefficients(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Stateless signal conditioner applied to every buffer snapshot.
///
/// The Hann coefficients are computed once for the configured window size
/// and reused every cycle.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    normalize: bool,
    window: Option<Vec<f32>>,
}

impl Preprocessor {
    /// # Arguments
    /// * `window_size` - Length of the windows that will be processed
    /// * `apply_window` - Whether to taper the signal with a Hann window
    /// * `normalize` - Whether to divide the DC-free signal by 128
    pub fn new(window_size: usize, apply_window: bool, normalize: bool) -> Self {
        Self {
            normalize,
            window: apply_window.then(|| hann_coefficients(window_size)),
        }
    }

    pub fn is_windowed(&self) -> bool {
        self.window.is_some()
    }

    /// DC removal (and optional normalisation) without the Hann taper.
    ///
    /// This is the waveform handed to the display.
    pub fn remove_dc(&self, samples: &[u8]) -> Vec<f32> {
        let mut signal: Vec<f32> = samples.iter().map(|&s| s as f32).collect();
        remove_dc_offset(&mut signal);
        if self.normalize {
            for sample in signal.iter_mut() {
                *sample /= NORMALISATION_DIVISOR;
            }
        }
        signal
    }

    /// Applies the Hann taper in place if windowing is enabled.
    ///
    /// Signals whose length differs from the configured window size get
    /// coefficients computed on the fly.
    pub fn apply_window(&self, signal: &mut [f32]) {
        let Some(coefficients) = &self.window else { return };
        if coefficients.len() == signal.len() {
            signal.iter_mut().zip(coefficients).for_each(|(s, w)| *s *= w);
        } else {
            let coefficients = hann_coefficients(signal.len());
            signal.iter_mut().zip(&coefficients).for_each(|(s, w)| *s *= w);
        }
    }

    /// Full preprocessing: DC removal, normalisation, then windowing.
    pub fn process(&self, samples: &[u8]) -> Vec<f32> {
        let mut signal = self.remove_dc(samples);
        self.apply_window(&mut signal);
        signal
    }
}
