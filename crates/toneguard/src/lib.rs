//! On-device conversation tone analysis.
//!
//! Pipeline, left to right, once per captured utterance:
//! PCM samples -> log-mel spectrogram -> fixed-shape acoustic model ->
//! token sequence -> transcript -> toxicity scores -> tri-state signal.
//!
//! The acoustic model itself is an external collaborator behind the
//! [`infer::AcousticModel`] seam; everything else here is deterministic
//! and reproducible given fixed inputs.

pub mod audio;
pub mod constants;
pub mod decode;
pub mod engine;
pub mod fft;
pub mod infer;
pub mod mel;
pub mod score;
pub mod signal;
pub mod vocab;
