//! Forward FFT used by the spectrogram front end.
//!
//! Recursive Cooley-Tukey on even lengths with a direct DFT fallback for
//! odd sub-lengths. The fallback is reachable in the normal path: 400 =
//! 2^4 * 25, so the split chain bottoms out in the DFT at length 25.
//! Output is interleaved re/im pairs of length `2 * N`.

use std::f32::consts::PI;

struct Level {
    even: Vec<f32>,
    odd: Vec<f32>,
    even_out: Vec<f32>,
    odd_out: Vec<f32>,
}

/// Pre-sized scratch for transforms of one fixed length.
///
/// One buffer set per recursion depth, so repeated [`FftPlan::forward`]
/// calls allocate nothing.
pub struct FftPlan {
    len: usize,
    levels: Vec<Level>,
}

impl FftPlan {
    #[must_use]
    pub fn new(len: usize) -> Self {
        let mut levels = Vec::new();
        let mut n = len;
        while n > 1 && n % 2 == 0 {
            let half = n / 2;
            levels.push(Level {
                even: vec![0.0; half],
                odd: vec![0.0; half],
                even_out: vec![0.0; n],
                odd_out: vec![0.0; n],
            });
            n = half;
        }
        Self { len, levels }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Transform `input` (real, `len` samples) into `output` (interleaved
    /// complex, `2 * len` floats).
    pub fn forward(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(input.len(), self.len);
        debug_assert_eq!(output.len(), 2 * self.len);
        fft_rec(&mut self.levels, input, output);
    }
}

fn fft_rec(levels: &mut [Level], input: &[f32], output: &mut [f32]) {
    let n = input.len();
    if n == 1 {
        output[0] = input[0];
        output[1] = 0.0;
        return;
    }
    if n % 2 == 1 {
        dft(input, output);
        return;
    }

    let (head, rest) = levels.split_at_mut(1);
    let level = &mut head[0];
    let half = n / 2;

    for i in 0..half {
        level.even[i] = input[2 * i];
        level.odd[i] = input[2 * i + 1];
    }
    fft_rec(rest, &level.even[..half], &mut level.even_out[..n]);
    fft_rec(rest, &level.odd[..half], &mut level.odd_out[..n]);

    for k in 0..half {
        let theta = 2.0 * PI * (k as f32) / (n as f32);
        let (sin_t, cos_t) = theta.sin_cos();
        let tw_re = cos_t;
        let tw_im = -sin_t;

        let even_re = level.even_out[2 * k];
        let even_im = level.even_out[2 * k + 1];
        let odd_re = level.odd_out[2 * k];
        let odd_im = level.odd_out[2 * k + 1];

        let rot_re = tw_re * odd_re - tw_im * odd_im;
        let rot_im = tw_re * odd_im + tw_im * odd_re;

        output[2 * k] = even_re + rot_re;
        output[2 * k + 1] = even_im + rot_im;
        output[2 * (k + half)] = even_re - rot_re;
        output[2 * (k + half) + 1] = even_im - rot_im;
    }
}

/// Direct O(N^2) DFT, same interleaved output convention as [`FftPlan`].
pub fn dft(input: &[f32], output: &mut [f32]) {
    let n = input.len();
    debug_assert_eq!(output.len(), 2 * n);

    for k in 0..n {
        let mut re = 0.0f32;
        let mut im = 0.0f32;
        for (j, &x) in input.iter().enumerate() {
            let angle = 2.0 * PI * (k as f32) * (j as f32) / (n as f32);
            re += x * angle.cos();
            im -= x * angle.sin();
        }
        output[2 * k] = re;
        output[2 * k + 1] = im;
    }
}
