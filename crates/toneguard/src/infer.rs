//! Acoustic model boundary.
//!
//! The model is an external collaborator with a fixed tensor contract:
//! input `[1, n_mel, TARGET_FRAMES]` f32, output `[1, N]` token ids for a
//! model-defined N. This module packs spectrograms into that shape and
//! recovers from model failures so they never cross the core boundary.

use thiserror::Error;
use tracing::warn;

use crate::constants::{N_MEL, TARGET_FRAMES};
use crate::mel::Spectrogram;

/// External fixed-shape speech model.
pub trait AcousticModel: Send {
    /// Mel band count the model was built for.
    fn n_mel(&self) -> usize {
        N_MEL
    }

    /// Run inference over one flat `[1, n_mel, TARGET_FRAMES]` input tensor
    /// and return the flat output token-id tensor.
    fn infer(&mut self, input: &[f32]) -> anyhow::Result<Vec<u32>>;
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model invocation failed: {0}")]
    Model(anyhow::Error),
    #[error("mel band mismatch: spectrogram has {got}, model expects {expected}")]
    Shape { got: usize, expected: usize },
}

/// Pack a spectrogram into the model's fixed input shape: frames beyond
/// `TARGET_FRAMES` are truncated, missing frames stay zero.
#[must_use]
pub fn pack_input(spec: &Spectrogram) -> Vec<f32> {
    let n_mel = spec.n_mel();
    let mut input = vec![0.0f32; n_mel * TARGET_FRAMES];
    let frames = spec.n_frames().min(TARGET_FRAMES);
    for mel in 0..n_mel {
        input[mel * TARGET_FRAMES..mel * TARGET_FRAMES + frames]
            .copy_from_slice(&spec.band(mel)[..frames]);
    }
    input
}

/// Run the model over one spectrogram.
///
/// Failures are recovered here: the error is logged and an empty token
/// sequence comes back, so the rest of the pipeline degrades to a neutral
/// result instead of unwinding.
pub fn run_model(model: &mut dyn AcousticModel, spec: &Spectrogram) -> Vec<u32> {
    match try_run(model, spec) {
        Ok(tokens) => tokens,
        Err(err) => {
            warn!(error = %err, "inference failed; returning empty token sequence");
            Vec::new()
        }
    }
}

fn try_run(model: &mut dyn AcousticModel, spec: &Spectrogram) -> Result<Vec<u32>, InferenceError> {
    if spec.n_mel() != model.n_mel() {
        return Err(InferenceError::Shape {
            got: spec.n_mel(),
            expected: model.n_mel(),
        });
    }
    let input = pack_input(spec);
    model.infer(&input).map_err(InferenceError::Model)
}

/// Placeholder model that recognizes nothing. Lets callers wire the
/// pipeline before a real inference engine is plugged in.
#[derive(Debug, Default)]
pub struct NullModel;

impl AcousticModel for NullModel {
    fn infer(&mut self, _input: &[f32]) -> anyhow::Result<Vec<u32>> {
        Ok(Vec::new())
    }
}
