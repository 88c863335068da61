//! Log-mel spectrogram extraction.
//!
//! Matches the reference front end exactly:
//! - periodic Hann window, 400-sample frames, hop 160
//! - forward FFT, squared magnitudes, mirror-bin fold
//! - mel projection with a 1e-10 floor before log10
//! - global clamp to `[max-8, max]`, then `(v+4)/4`

use tracing::warn;

use crate::constants::{HOP_LENGTH, N_FFT, N_FREQ};
use crate::fft::FftPlan;
use crate::vocab::FilterBank;

/// `n_mel x n_frames` matrix of normalized log-mel energies, row-major by
/// mel band. Created fresh per utterance.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    n_mel: usize,
    n_frames: usize,
    data: Vec<f32>,
}

impl Spectrogram {
    #[must_use]
    pub fn from_parts(n_mel: usize, n_frames: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), n_mel * n_frames, "spectrogram shape mismatch");
        Self {
            n_mel,
            n_frames,
            data,
        }
    }

    #[must_use]
    pub fn n_mel(&self) -> usize {
        self.n_mel
    }

    #[must_use]
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// One mel band across all frames.
    #[must_use]
    pub fn band(&self, mel: usize) -> &[f32] {
        &self.data[mel * self.n_frames..(mel + 1) * self.n_frames]
    }

    #[must_use]
    pub fn at(&self, mel: usize, frame: usize) -> f32 {
        self.data[mel * self.n_frames + frame]
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

fn hann_window() -> [f32; N_FFT] {
    let mut w = [0.0f32; N_FFT];
    for (i, wi) in w.iter_mut().enumerate() {
        // Periodic Hann: 0.5*(1 - cos(2*pi*i/N))
        let angle = 2.0 * std::f32::consts::PI * (i as f32) / (N_FFT as f32);
        *wi = 0.5 * (1.0 - angle.cos());
    }
    w
}

/// Compute the normalized log-mel spectrogram of `samples` (f32 in [-1, 1]).
///
/// Frame count is `samples.len() / HOP_LENGTH`; frames read past the end of
/// the buffer are zero-padded. Frames are independent, so worker `w` takes
/// frames `w, w + n_workers, ...`; each worker owns its FFT scratch and
/// returns its mel columns, and the caller scatters them after the join.
/// The scoped-thread join is the barrier before the single-threaded
/// normalization pass.
#[must_use]
pub fn compute(samples: &[f32], filters: &FilterBank, n_workers: usize) -> Spectrogram {
    debug_assert_eq!(filters.n_fft_bins(), N_FREQ, "filter bank geometry");

    let n_mel = filters.n_mel();
    let n_frames = samples.len() / HOP_LENGTH;
    let mut data = vec![0.0f32; n_mel * n_frames];
    if n_frames == 0 {
        return Spectrogram {
            n_mel,
            n_frames,
            data,
        };
    }

    let n_workers = n_workers.clamp(1, n_frames);
    let window = hann_window();

    let results: Vec<Option<Vec<Vec<f32>>>> = std::thread::scope(|scope| {
        let window = &window;
        let mut handles = Vec::with_capacity(n_workers);
        for w in 0..n_workers {
            handles.push(scope.spawn(move || {
                let mut plan = FftPlan::new(N_FFT);
                let mut cols = Vec::with_capacity(n_frames / n_workers + 1);
                let mut frame = w;
                while frame < n_frames {
                    cols.push(compute_frame(samples, frame, window, filters, &mut plan));
                    frame += n_workers;
                }
                cols
            }));
        }
        handles.into_iter().map(|h| h.join().ok()).collect()
    });

    for (w, cols) in results.into_iter().enumerate() {
        let Some(cols) = cols else {
            // Soft failure: that worker's frames keep their zero fill.
            warn!(worker = w, "spectrogram worker panicked");
            continue;
        };
        for (i, col) in cols.into_iter().enumerate() {
            let frame = w + i * n_workers;
            for (mel, v) in col.into_iter().enumerate() {
                data[mel * n_frames + frame] = v;
            }
        }
    }

    // Global normalization, single-threaded over the complete matrix.
    let mut max_v = f32::NEG_INFINITY;
    for &v in &data {
        if v > max_v {
            max_v = v;
        }
    }
    let floor = max_v - 8.0;
    for v in &mut data {
        if *v < floor {
            *v = floor;
        }
        *v = (*v + 4.0) / 4.0;
    }

    Spectrogram {
        n_mel,
        n_frames,
        data,
    }
}

fn compute_frame(
    samples: &[f32],
    frame: usize,
    window: &[f32; N_FFT],
    filters: &FilterBank,
    plan: &mut FftPlan,
) -> Vec<f32> {
    let start = frame * HOP_LENGTH;

    let mut windowed = [0.0f32; N_FFT];
    for (i, out) in windowed.iter_mut().enumerate() {
        let s = samples.get(start + i).copied().unwrap_or(0.0);
        *out = s * window[i];
    }

    let mut fft_out = [0.0f32; 2 * N_FFT];
    plan.forward(&windowed, &mut fft_out);

    let mut power = [0.0f32; N_FFT];
    for (k, p) in power.iter_mut().enumerate() {
        let re = fft_out[2 * k];
        let im = fft_out[2 * k + 1];
        *p = re * re + im * im;
    }
    // Real input symmetry: fold each mirror bin onto k in [1, N/2).
    for k in 1..N_FFT / 2 {
        power[k] += power[N_FFT - k];
    }
    let energies = &power[..N_FREQ];

    let mut col = vec![0.0f32; filters.n_mel()];
    for (mel, out_m) in col.iter_mut().enumerate() {
        let row = filters.row(mel);
        let mut sum = 0.0f32;
        for (f, &e) in row.iter().zip(energies) {
            sum += f * e;
        }
        if sum < 1e-10 {
            sum = 1e-10;
        }
        *out_m = sum.log10();
    }
    col
}
