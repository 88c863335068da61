//! Pipeline lifecycle: init / process / release.
//!
//! The engine is an explicit owned context, not a module global. One mutex
//! guards init, process, and release, so a single model invocation (or
//! lifecycle transition) is in flight at a time. There are no internal
//! timeouts; a blocked inference call blocks its caller.

use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

use crate::constants::N_FREQ;
use crate::decode::decode;
use crate::infer::{AcousticModel, run_model};
use crate::mel;
use crate::score::{Lexicon, prosody_score};
use crate::signal::{SignalState, classify};
use crate::vocab::{FilterBank, VocabError, VocabularyTable, load_vocab};

/// Per-utterance result for the external reporting sink.
#[derive(Debug, Clone, Serialize)]
pub struct UtteranceReport {
    pub transcript: String,
    pub lexical: f32,
    pub prosodic: f32,
    pub combined: f32,
    pub signal: SignalState,
}

impl UtteranceReport {
    fn neutral() -> Self {
        Self {
            transcript: String::new(),
            lexical: 0.0,
            prosodic: 0.0,
            combined: 0.0,
            signal: SignalState::Calm,
        }
    }
}

struct Loaded {
    filters: FilterBank,
    vocab: VocabularyTable,
    model: Box<dyn AcousticModel>,
}

/// Owned analysis context.
pub struct ToneGuard {
    state: Mutex<Option<Loaded>>,
    lexicon: Lexicon,
    n_workers: usize,
}

impl ToneGuard {
    #[must_use]
    pub fn new(lexicon: Lexicon, n_workers: usize) -> Self {
        Self {
            state: Mutex::new(None),
            lexicon,
            n_workers: n_workers.max(1),
        }
    }

    /// Load the vocabulary resource and install the model.
    ///
    /// A previously initialized context is released first. On error the
    /// engine stays uninitialized and `process` keeps rejecting.
    pub fn init(
        &self,
        model: Box<dyn AcousticModel>,
        vocab_path: impl AsRef<Path>,
    ) -> Result<(), VocabError> {
        let mut state = self.state.lock().expect("engine lock");
        if state.take().is_some() {
            info!("releasing previous analysis context before init");
        }

        let (filters, vocab) = load_vocab(vocab_path)?;
        if filters.n_fft_bins() != N_FREQ {
            return Err(VocabError::InvalidField {
                field: "n_fft",
                value: filters.n_fft_bins() as i64,
            });
        }

        info!(
            n_mel = filters.n_mel(),
            n_base = vocab.n_base(),
            n_vocab = vocab.len(),
            multilingual = vocab.is_multilingual(),
            "analysis context initialized"
        );
        *state = Some(Loaded {
            filters,
            vocab,
            model,
        });
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().expect("engine lock").is_some()
    }

    /// Transcribe one utterance of 16kHz mono PCM.
    ///
    /// Returns an empty string when the engine is not initialized or on any
    /// recoverable failure; per-utterance errors never escape.
    pub fn process(&self, pcm: &[i16]) -> String {
        let mut state = self.state.lock().expect("engine lock");
        let Some(loaded) = state.as_mut() else {
            warn!("process called before init");
            return String::new();
        };
        if pcm.is_empty() {
            warn!("process called with an empty sample buffer");
            return String::new();
        }
        transcribe(loaded, self.n_workers, pcm)
    }

    /// Full analysis of one utterance: transcript, sub-scores, and signal.
    ///
    /// `peak16` and `rms` come precomputed from the capture side, on the
    /// 16-bit sample scale. Before init this returns the neutral report.
    pub fn analyze(&self, pcm: &[i16], peak16: f32, rms: f32) -> UtteranceReport {
        let transcript = {
            let mut state = self.state.lock().expect("engine lock");
            match state.as_mut() {
                Some(loaded) if !pcm.is_empty() => transcribe(loaded, self.n_workers, pcm),
                Some(_) => String::new(),
                None => {
                    warn!("analyze called before init");
                    return UtteranceReport::neutral();
                }
            }
        };

        let lexical = self.lexicon.lexical_score(&transcript);
        let prosodic = prosody_score(peak16, rms);
        let combined = (0.7 * lexical + 0.3 * prosodic).clamp(0.0, 1.0);
        UtteranceReport {
            transcript,
            lexical,
            prosodic,
            combined,
            signal: classify(combined),
        }
    }

    /// Drop the loaded context. Idempotent; safe without a prior init.
    pub fn release(&self) {
        let mut state = self.state.lock().expect("engine lock");
        if state.take().is_some() {
            info!("analysis context released");
        }
    }
}

fn transcribe(loaded: &mut Loaded, n_workers: usize, pcm: &[i16]) -> String {
    let samples: Vec<f32> = pcm.iter().map(|&s| f32::from(s) / 32_768.0).collect();
    let spec = mel::compute(&samples, &loaded.filters, n_workers);
    let tokens = run_model(loaded.model.as_mut(), &spec);
    decode(&tokens, &loaded.vocab)
}
