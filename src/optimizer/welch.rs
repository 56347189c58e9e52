use rustfft::{num_complex::Complex32, FftPlanner};

/// Result of one bandpower computation over a buffer snapshot.
#[derive(Clone, Copy, Debug)]
pub struct BandpowerEstimate {
    /// Integrated power over the band (signal units squared).
    pub power: f32,
    /// Band bounds the estimate was computed for, Hz.
    pub band: (f32, f32),
    /// Number of samples the estimate was computed from.
    pub samples_used: usize,
}

/// Welch bandpower estimator for a fixed sample rate and target band.
///
/// Segment length is `min(256, len)` with 50% overlap and a periodic Hann
/// window; each segment is mean-removed before the FFT. The one-sided PSD is
/// normalized to power/Hz (`|X[k]|^2 / (fs * S2)`, interior bins doubled) and
/// the band is integrated with the trapezoid rule over bins `lo <= f <= hi`.
/// Segments are averaged in index order, so the result is reproducible for a
/// fixed input.
pub struct BandpowerEstimator {
    fs: f32,
    band: (f32, f32),
}

impl BandpowerEstimator {
    pub fn new(fs: f32, band: (f32, f32)) -> Self {
        Self { fs, band }
    }

    pub fn band(&self) -> (f32, f32) {
        self.band
    }

    /// Integrated power in the target band. Defined as 0.0 for fewer than
    /// two samples or a band that covers no frequency bins.
    pub fn estimate(&self, samples: &[f32]) -> BandpowerEstimate {
        BandpowerEstimate {
            power: self.band_power(samples),
            band: self.band,
            samples_used: samples.len(),
        }
    }

    fn band_power(&self, samples: &[f32]) -> f32 {
        let n = samples.len();
        if n < 2 {
            return 0.0;
        }
        let nperseg = n.min(256);
        let (freqs, psd) = welch_psd(samples, self.fs, nperseg);

        let (lo, hi) = self.band;
        let selected: Vec<usize> = (0..freqs.len())
            .filter(|&k| freqs[k] >= lo && freqs[k] <= hi)
            .collect();
        // Trapezoid rule over the in-band bins; a single bin has zero area.
        let mut power = 0.0f32;
        for pair in selected.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            power += 0.5 * (psd[a] + psd[b]) * (freqs[b] - freqs[a]);
        }
        power.max(0.0)
    }
}

/// Averaged, overlapped periodogram (Welch's method), one-sided.
///
/// Returns `(frequencies_hz, psd)` with `nperseg / 2 + 1` bins.
fn welch_psd(samples: &[f32], fs: f32, nperseg: usize) -> (Vec<f32>, Vec<f32>) {
    let step = nperseg - nperseg / 2; // 50% overlap
    let window = hann_periodic(nperseg);
    let s2: f32 = window.iter().map(|w| w * w).sum();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(nperseg);

    let bins = nperseg / 2 + 1;
    let mut psd = vec![0.0f32; bins];
    let mut segments = 0usize;
    let mut buffer = vec![Complex32::ZERO; nperseg];

    let mut start = 0;
    while start + nperseg <= samples.len() {
        let segment = &samples[start..start + nperseg];
        // Constant detrend: remove the segment mean so DC leakage does not
        // swamp low-frequency bands.
        let mean = segment.iter().sum::<f32>() / nperseg as f32;
        for (slot, (&v, &w)) in buffer.iter_mut().zip(segment.iter().zip(&window)) {
            *slot = Complex32::new((v - mean) * w, 0.0);
        }
        fft.process(&mut buffer);
        for (k, slot) in buffer.iter().take(bins).enumerate() {
            let mut p = slot.norm_sqr() / (fs * s2);
            // One-sided spectrum: interior bins carry both halves.
            if k > 0 && (nperseg % 2 == 1 || k < nperseg / 2) {
                p *= 2.0;
            }
            psd[k] += p;
        }
        segments += 1;
        start += step;
    }

    if segments > 1 {
        for p in &mut psd {
            *p /= segments as f32;
        }
    }
    let freqs = (0..bins).map(|k| k as f32 * fs / nperseg as f32).collect();
    (freqs, psd)
}

fn hann_periodic(n: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
        .collect()
}
