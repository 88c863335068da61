//! Vocabulary resource loader.
//!
//! Parses the binary vocabulary resource (mel filter bank + token table)
//! that the spectrogram front end and the token decoder share for the
//! process lifetime. Layout, native byte order, as a flat stream:
//!
//! magic u32 (`0x5553454E`) . n_mel i32 . n_fft i32 .
//! n_mel*n_fft f32 filter weights (row-major) .
//! n_vocab i32 . n_vocab x (len i32, UTF-8 bytes)

use std::path::Path;

use memmap2::MmapOptions;
use thiserror::Error;

use crate::constants::{N_VOCAB_MONO, N_VOCAB_MULTI, VOCAB_MAGIC};

#[derive(Debug, Error)]
pub enum VocabError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad vocabulary magic: {0:#010x}")]
    BadMagic(u32),
    #[error("truncated vocabulary resource at byte {0}")]
    Truncated(usize),
    #[error("invalid {field} in vocabulary header: {value}")]
    InvalidField { field: &'static str, value: i64 },
    #[error("vocabulary entry {0} is not valid UTF-8")]
    InvalidUtf8(usize),
}

/// `n_mel x n_fft_bins` matrix of non-negative mel filter weights.
/// Immutable once loaded.
#[derive(Debug, Clone)]
pub struct FilterBank {
    n_mel: usize,
    n_fft_bins: usize,
    weights: Vec<f32>, // [n_mel * n_fft_bins], row-major
}

impl FilterBank {
    #[must_use]
    pub fn n_mel(&self) -> usize {
        self.n_mel
    }

    #[must_use]
    pub fn n_fft_bins(&self) -> usize {
        self.n_fft_bins
    }

    /// Filter weights for one mel band.
    #[must_use]
    pub fn row(&self, mel: usize) -> &[f32] {
        &self.weights[mel * self.n_fft_bins..(mel + 1) * self.n_fft_bins]
    }
}

/// The eight named control-token ids.
///
/// `translate` and `transcribe` are fixed; the other six shift up by one
/// on multilingual vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTokens {
    pub eot: u32,
    pub sot: u32,
    pub translate: u32,
    pub transcribe: u32,
    pub prev: u32,
    pub solm: u32,
    pub not_timestamps: u32,
    pub timestamp_begin: u32,
}

const MONO_CONTROLS: ControlTokens = ControlTokens {
    eot: 50_256,
    sot: 50_257,
    translate: 50_358,
    transcribe: 50_359,
    prev: 50_360,
    solm: 50_361,
    not_timestamps: 50_362,
    timestamp_begin: 50_363,
};

/// Fixed-size id -> text-fragment table plus the control-token ids.
///
/// Ids strictly below EOT are ordinary text tokens; ids at or above EOT are
/// control/special and must never reach output text.
#[derive(Debug, Clone)]
pub struct VocabularyTable {
    words: Vec<String>,
    n_base: usize,
    multilingual: bool,
    controls: ControlTokens,
}

impl VocabularyTable {
    /// Build the table from the base entries loaded off disk, synthesizing
    /// labels up to the extended size.
    ///
    /// A monolingual vocabulary can never exceed its 51864 extended size,
    /// so any base at or past 51865 entries is multilingual.
    #[must_use]
    pub fn from_words(base: Vec<String>) -> Self {
        let multilingual = base.len() >= N_VOCAB_MULTI;
        let extended = if multilingual {
            N_VOCAB_MULTI
        } else {
            N_VOCAB_MONO
        };

        let mut controls = MONO_CONTROLS;
        if multilingual {
            controls.eot += 1;
            controls.sot += 1;
            controls.prev += 1;
            controls.solm += 1;
            controls.not_timestamps += 1;
            controls.timestamp_begin += 1;
        }

        let n_base = base.len();
        let mut words = base;
        for id in words.len()..extended {
            words.push(synthetic_label(id as u32, controls));
        }

        Self {
            words,
            n_base,
            multilingual,
            controls,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of entries that were actually stored in the resource.
    #[must_use]
    pub fn n_base(&self) -> usize {
        self.n_base
    }

    #[must_use]
    pub fn is_multilingual(&self) -> bool {
        self.multilingual
    }

    #[must_use]
    pub fn controls(&self) -> ControlTokens {
        self.controls
    }

    /// O(1) id lookup; `None` for ids past the extended size.
    #[must_use]
    pub fn word(&self, id: u32) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    /// True for control/special ids that must never reach output text.
    #[must_use]
    pub fn is_control(&self, id: u32) -> bool {
        id >= self.controls.eot
    }
}

// The `> timestamp_begin` arm is deliberately checked before
// `== timestamp_begin`, matching the reference loader's observed order.
// Downstream skipping depends only on numeric id comparisons, so the label
// text is cosmetic.
fn synthetic_label(id: u32, c: ControlTokens) -> String {
    if id > c.timestamp_begin {
        format!("[_TT_{}]", id - c.timestamp_begin)
    } else if id == c.eot {
        "[_EOT_]".to_string()
    } else if id == c.sot {
        "[_SOT_]".to_string()
    } else if id == c.prev {
        "[_PREV_]".to_string()
    } else if id == c.not_timestamps {
        "[_NOT_]".to_string()
    } else if id == c.timestamp_begin {
        "[_BEG_]".to_string()
    } else {
        format!("[_extra_token_{id}]")
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], VocabError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(VocabError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, VocabError> {
        let b = self.take(4)?;
        Ok(u32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, VocabError> {
        let b = self.take(4)?;
        Ok(i32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn read_dim(cur: &mut Cursor<'_>, field: &'static str) -> Result<usize, VocabError> {
    let v = cur.read_i32()?;
    if v <= 0 {
        return Err(VocabError::InvalidField {
            field,
            value: i64::from(v),
        });
    }
    Ok(v as usize)
}

/// Parse a vocabulary resource from raw bytes.
pub fn parse_vocab(data: &[u8]) -> Result<(FilterBank, VocabularyTable), VocabError> {
    let mut cur = Cursor { data, pos: 0 };

    let magic = cur.read_u32()?;
    if magic != VOCAB_MAGIC {
        return Err(VocabError::BadMagic(magic));
    }

    let n_mel = read_dim(&mut cur, "n_mel")?;
    let n_fft_bins = read_dim(&mut cur, "n_fft")?;

    let count = n_mel
        .checked_mul(n_fft_bins)
        .and_then(|c| c.checked_mul(4))
        .ok_or(VocabError::InvalidField {
            field: "n_mel * n_fft",
            value: i64::MAX,
        })?;
    let raw = cur.take(count)?;
    let weights: Vec<f32> = raw
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let n_vocab = cur.read_i32()?;
    if n_vocab < 0 {
        return Err(VocabError::InvalidField {
            field: "n_vocab",
            value: i64::from(n_vocab),
        });
    }

    // The header count is untrusted; every entry costs at least its 4-byte
    // length prefix, so the remaining bytes bound how much to reserve.
    let max_entries = data.len().saturating_sub(cur.pos) / 4;
    let mut words = Vec::with_capacity((n_vocab as usize).min(max_entries));
    for i in 0..n_vocab as usize {
        let len = cur.read_i32()?;
        if len < 0 {
            return Err(VocabError::InvalidField {
                field: "word length",
                value: i64::from(len),
            });
        }
        let bytes = cur.take(len as usize)?;
        let word = std::str::from_utf8(bytes).map_err(|_| VocabError::InvalidUtf8(i))?;
        words.push(word.to_string());
    }

    let filters = FilterBank {
        n_mel,
        n_fft_bins,
        weights,
    };
    Ok((filters, VocabularyTable::from_words(words)))
}

/// Map the resource read-only and parse it.
pub fn load_vocab(path: impl AsRef<Path>) -> Result<(FilterBank, VocabularyTable), VocabError> {
    let file = std::fs::File::open(path)?;
    // SAFETY: read-only mapping of an immutable resource file.
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    parse_vocab(&mmap)
}
