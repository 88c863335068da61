//! Audio utilities for the capture boundary.
//!
//! The core consumes 16-bit mono PCM at 16kHz plus a precomputed peak and
//! RMS for the same buffer. This module carries the helpers the CLI needs
//! to meet that contract: a minimal 16-bit PCM WAV parser, linear
//! resampling, level metering, and a drop-oldest capture ring.

use std::collections::VecDeque;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("not a valid WAV file")]
    InvalidHeader,
    #[error("unsupported WAV format (need 16-bit PCM)")]
    UnsupportedFormat,
    #[error("malformed WAV chunks")]
    MalformedChunks,
}

#[derive(Debug, Clone)]
pub struct WavAudio {
    pub sample_rate_hz: u32,
    pub channels: u16,
    /// Channel-averaged mono samples.
    pub samples: Vec<i16>,
}

fn u16_le(p: &[u8]) -> u16 {
    u16::from_le_bytes([p[0], p[1]])
}

fn u32_le(p: &[u8]) -> u32 {
    u32::from_le_bytes([p[0], p[1], p[2], p[3]])
}

/// Parse WAV bytes into mono i16 samples at the file's sample rate.
///
/// Supports PCM (`audio_format=1`), 16-bit, one or more channels.
pub fn parse_wav_bytes(data: &[u8]) -> Result<WavAudio, WavError> {
    if data.len() < 44 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(WavError::InvalidHeader);
    }

    let mut audio_format = 0u16;
    let mut channels = 0u16;
    let mut sample_rate_hz = 0u32;
    let mut bits_per_sample = 0u16;
    let mut pcm: Option<&[u8]> = None;

    let mut p = 12usize;
    while p + 8 <= data.len() {
        let chunk_id = &data[p..p + 4];
        let chunk_len = u32_le(&data[p + 4..p + 8]) as usize;
        let body = p + 8;
        let end = body.saturating_add(chunk_len);
        if end > data.len() {
            break;
        }

        if chunk_id == b"fmt " && chunk_len >= 16 {
            audio_format = u16_le(&data[body..body + 2]);
            channels = u16_le(&data[body + 2..body + 4]);
            sample_rate_hz = u32_le(&data[body + 4..body + 8]);
            bits_per_sample = u16_le(&data[body + 14..body + 16]);
        } else if chunk_id == b"data" {
            pcm = Some(&data[body..end]);
        }

        // Chunks are word-aligned.
        p = end + (chunk_len & 1);
    }

    let Some(pcm) = pcm else {
        return Err(WavError::MalformedChunks);
    };
    if audio_format != 1 || bits_per_sample != 16 || channels < 1 {
        return Err(WavError::UnsupportedFormat);
    }

    let frame_bytes = usize::from(channels) * 2;
    let mut samples = Vec::with_capacity(pcm.len() / frame_bytes);
    for frame in pcm.chunks_exact(frame_bytes) {
        let mut sum = 0i32;
        for ch in frame.chunks_exact(2) {
            sum += i32::from(i16::from_le_bytes([ch[0], ch[1]]));
        }
        samples.push((sum / i32::from(channels)) as i16);
    }

    Ok(WavAudio {
        sample_rate_hz,
        channels,
        samples,
    })
}

/// Peak absolute amplitude and RMS of a 16-bit buffer, on the 16-bit scale.
#[must_use]
pub fn measure_levels(pcm: &[i16]) -> (f32, f32) {
    if pcm.is_empty() {
        return (0.0, 0.0);
    }
    let mut peak = 0.0f32;
    let mut sq_sum = 0.0f64;
    for &s in pcm {
        let v = f32::from(s).abs();
        if v > peak {
            peak = v;
        }
        sq_sum += f64::from(s) * f64::from(s);
    }
    let rms = (sq_sum / pcm.len() as f64).sqrt() as f32;
    (peak, rms)
}

/// Linearly resample mono f32 samples from `src_hz` to `dst_hz`.
#[must_use]
pub fn resample_linear_mono_f32(input: &[f32], src_hz: u32, dst_hz: u32) -> Vec<f32> {
    if src_hz == dst_hz || input.is_empty() {
        return input.to_vec();
    }

    let out_len = ((input.len() as u64) * u64::from(dst_hz) / u64::from(src_hz)) as usize;
    let mut out = vec![0.0f32; out_len];
    for (i, y) in out.iter_mut().enumerate() {
        let src_pos = (i as f64) * f64::from(src_hz) / f64::from(dst_hz);
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;

        let a = input.get(idx).copied().unwrap_or(0.0);
        let b = input.get(idx + 1).copied().unwrap_or(a);
        *y = a * (1.0 - frac) + b * frac;
    }
    out
}

/// Convert f32 samples in [-1, 1] to 16-bit PCM with clamping.
#[must_use]
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32_768.0).clamp(-32_768.0, 32_767.0) as i16)
        .collect()
}

/// Convert 16-bit PCM to f32 in [-1, 1].
#[must_use]
pub fn i16_to_f32(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| f32::from(s) / 32_768.0).collect()
}

/// Fixed-capacity capture ring. When a push would exceed the capacity the
/// oldest queued samples are evicted first, so the consumer always sees the
/// most recent audio and latency stays bounded.
#[derive(Debug)]
pub struct DropOldestRing {
    cap: usize,
    buf: VecDeque<f32>,
    dropped_total: u64,
}

impl DropOldestRing {
    #[must_use]
    pub fn new(cap_samples: usize) -> Self {
        Self {
            cap: cap_samples,
            buf: VecDeque::with_capacity(cap_samples.min(16_384)),
            dropped_total: 0,
        }
    }

    /// Samples evicted since creation.
    #[must_use]
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_total
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append a chunk, evicting the oldest samples on overflow. Returns how
    /// many samples this push evicted so the caller can report backpressure.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        let evict = (self.buf.len() + samples.len()).saturating_sub(self.cap);
        let from_queue = evict.min(self.buf.len());
        self.buf.drain(..from_queue);
        // A chunk larger than the whole ring sheds its own head as well.
        self.buf
            .extend(samples[evict - from_queue..].iter().copied());
        self.dropped_total += evict as u64;
        evict
    }

    /// Drain up to `max` samples into `out` (cleared first).
    pub fn drain_into(&mut self, out: &mut Vec<f32>, max: usize) {
        let n = self.buf.len().min(max);
        out.clear();
        out.extend(self.buf.drain(..n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_wav(rate: u32, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&rate.to_le_bytes());
        wav.extend_from_slice(&(rate * 2).to_le_bytes()); // byte rate
        wav.extend_from_slice(&2u16.to_le_bytes()); // block align
        wav.extend_from_slice(&16u16.to_le_bytes()); // bits

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            wav.extend_from_slice(&s.to_le_bytes());
        }
        wav
    }

    #[test]
    fn wav_parse_round_trips_samples() {
        let wav = minimal_wav(16_000, &[0, 1000, -1000, i16::MAX]);
        let parsed = parse_wav_bytes(&wav).expect("parse wav");
        assert_eq!(parsed.sample_rate_hz, 16_000);
        assert_eq!(parsed.channels, 1);
        assert_eq!(parsed.samples, vec![0, 1000, -1000, i16::MAX]);
    }

    #[test]
    fn wav_parse_rejects_garbage() {
        assert!(matches!(
            parse_wav_bytes(&[0u8; 64]),
            Err(WavError::InvalidHeader)
        ));
    }

    #[test]
    fn levels_of_silence_are_zero() {
        assert_eq!(measure_levels(&[]), (0.0, 0.0));
        assert_eq!(measure_levels(&[0i16; 160]), (0.0, 0.0));
    }

    #[test]
    fn levels_of_constant_signal() {
        let (peak, rms) = measure_levels(&[2000i16; 400]);
        assert_eq!(peak, 2000.0);
        assert!((rms - 2000.0).abs() < 1e-3);
    }

    #[test]
    fn resample_identity_and_ratio() {
        let x = vec![0.0f32, 1.0, 2.0, 3.0];
        assert_eq!(resample_linear_mono_f32(&x, 16_000, 16_000), x);

        let y = resample_linear_mono_f32(&vec![0.0f32; 48_000], 48_000, 16_000);
        assert_eq!(y.len(), 16_000);
    }

    #[test]
    fn pcm_conversions_clamp() {
        let pcm = f32_to_i16(&[0.0, 0.5, -0.5, 2.0, -2.0]);
        assert_eq!(pcm, vec![0, 16_384, -16_384, 32_767, -32_768]);

        let back = i16_to_f32(&[0, 16_384, -32_768]);
        assert!((back[0]).abs() < 1e-6);
        assert!((back[1] - 0.5).abs() < 1e-6);
        assert!((back[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn ring_evicts_oldest_and_reports_per_push() {
        let mut r = DropOldestRing::new(3);
        assert_eq!(r.push(&[1.0, 2.0, 3.0]), 0);
        assert_eq!(r.push(&[4.0, 5.0]), 2);
        assert_eq!(r.dropped_samples(), 2);
        assert_eq!(r.len(), 3);

        let mut out = Vec::new();
        r.drain_into(&mut out, 10);
        assert_eq!(out, vec![3.0, 4.0, 5.0]);
        assert!(r.is_empty());
    }

    #[test]
    fn ring_keeps_newest_of_an_oversized_chunk() {
        let mut r = DropOldestRing::new(2);
        assert_eq!(r.push(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3);

        let mut out = Vec::new();
        r.drain_into(&mut out, 10);
        assert_eq!(out, vec![4.0, 5.0]);
    }

    #[test]
    fn ring_drain_is_bounded_by_max() {
        let mut r = DropOldestRing::new(8);
        r.push(&[1.0, 2.0, 3.0, 4.0]);

        let mut out = Vec::new();
        r.drain_into(&mut out, 3);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
        assert_eq!(r.len(), 1);
    }
}
