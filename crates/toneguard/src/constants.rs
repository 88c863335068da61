//! Signal-processing and vocabulary-format constants.

// Audio front end (16kHz mono, Whisper-style geometry).
pub const SAMPLE_RATE_HZ: u32 = 16_000;
pub const N_MEL: usize = 80;
pub const HOP_LENGTH: usize = 160; // 10ms @ 16kHz
pub const N_FFT: usize = 400; // 25ms @ 16kHz
pub const N_FREQ: usize = N_FFT / 2 + 1; // 201

// Fixed encoder input width: 30s of audio at 100 frames/s.
pub const TARGET_FRAMES: usize = 3000;

// Vocabulary resource header magic, read as a native-endian u32.
pub const VOCAB_MAGIC: u32 = 0x5553_454E;

// Extended vocabulary sizes (base entries plus synthesized control and
// timestamp ids).
pub const N_VOCAB_MONO: usize = 51_864;
pub const N_VOCAB_MULTI: usize = 51_865;
