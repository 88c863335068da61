//! End-to-end pipeline test: a hand-built vocabulary resource on disk plus
//! a stub acoustic model, driven through the engine's lifecycle entry
//! points.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use toneguard::constants::{N_FREQ, N_MEL, VOCAB_MAGIC};
use toneguard::engine::ToneGuard;
use toneguard::infer::AcousticModel;
use toneguard::score::Lexicon;
use toneguard::signal::SignalState;

struct ScriptedModel(Vec<u32>);

impl AcousticModel for ScriptedModel {
    fn infer(&mut self, input: &[f32]) -> anyhow::Result<Vec<u32>> {
        // The adapter always hands over the full fixed-shape tensor.
        assert_eq!(input.len(), N_MEL * 3000);
        Ok(self.0.clone())
    }
}

fn encode_vocab(words: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&VOCAB_MAGIC.to_ne_bytes());
    out.extend_from_slice(&(N_MEL as i32).to_ne_bytes());
    out.extend_from_slice(&(N_FREQ as i32).to_ne_bytes());
    for i in 0..N_MEL * N_FREQ {
        let w = ((i % 7) as f32) * 0.01;
        out.extend_from_slice(&w.to_ne_bytes());
    }
    out.extend_from_slice(&(words.len() as i32).to_ne_bytes());
    for w in words {
        out.extend_from_slice(&(w.len() as i32).to_ne_bytes());
        out.extend_from_slice(w.as_bytes());
    }
    out
}

fn tmp_vocab(name: &str, bytes: &[u8]) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("toneguard-pipeline-test-{name}-{nanos}.bin"));
    std::fs::write(&p, bytes).expect("write vocab");
    p
}

fn tone(n: usize, amp: i16) -> Vec<i16> {
    (0..n)
        .map(|i| {
            let t = (i as f32) / 16_000.0;
            ((2.0 * std::f32::consts::PI * 330.0 * t).sin() * f32::from(amp)) as i16
        })
        .collect()
}

#[test]
fn calm_utterance_end_to_end() {
    let path = tmp_vocab("calm", &encode_vocab(&["hello", " there"]));
    let eot = 50_256u32;
    let sot = 50_257u32;

    let engine = ToneGuard::new(Lexicon::default(), 2);
    engine
        .init(Box::new(ScriptedModel(vec![sot, 0, 1, eot])), &path)
        .expect("init");

    let pcm = tone(16_000, 500);
    let report = engine.analyze(&pcm, 500.0, 350.0);

    assert_eq!(report.transcript, "hello there");
    assert_eq!(report.lexical, 0.0);
    // Quiet audio sits low on the logistic curve.
    assert!(report.prosodic < 0.2, "prosodic {}", report.prosodic);
    assert!(report.combined < 0.20);
    assert_eq!(report.signal, SignalState::Calm);

    engine.release();
    std::fs::remove_file(path).expect("cleanup");
}

#[test]
fn aggressive_utterance_end_to_end() {
    let path = tmp_vocab("aggr", &encode_vocab(&["i will", " kill you", " damn it"]));
    let eot = 50_256u32;

    let engine = ToneGuard::new(Lexicon::default(), 2);
    engine
        .init(Box::new(ScriptedModel(vec![0, 1, eot])), &path)
        .expect("init");

    let pcm = tone(16_000, 28_000);
    let (peak, rms) = toneguard::audio::measure_levels(&pcm);
    assert!(peak > 20_000.0);

    let report = engine.analyze(&pcm, peak, rms);
    assert_eq!(report.transcript, "i will kill you");
    assert!((report.lexical - 0.20).abs() < 1e-6);
    assert!(report.prosodic > 0.8, "prosodic {}", report.prosodic);
    // 0.7*0.2 + 0.3*(>0.8) lands in the caution band.
    assert_eq!(report.signal, SignalState::Caution);

    std::fs::remove_file(path).expect("cleanup");
}

#[test]
fn corrupted_magic_fails_init() {
    let mut bytes = encode_vocab(&["x"]);
    bytes[0] ^= 0xFF;
    let path = tmp_vocab("corrupt", &bytes);

    let engine = ToneGuard::new(Lexicon::default(), 2);
    assert!(
        engine
            .init(Box::new(ScriptedModel(vec![])), &path)
            .is_err()
    );
    assert!(!engine.is_initialized());
    assert_eq!(engine.process(&tone(1600, 1000)), "");

    std::fs::remove_file(path).expect("cleanup");
}

#[test]
fn reinit_replaces_previous_context() {
    let first = tmp_vocab("first", &encode_vocab(&["one"]));
    let second = tmp_vocab("second", &encode_vocab(&["two"]));
    let eot = 50_256u32;

    let engine = ToneGuard::new(Lexicon::default(), 2);
    engine
        .init(Box::new(ScriptedModel(vec![0, eot])), &first)
        .expect("first init");
    assert_eq!(engine.process(&tone(3200, 1000)), "one");

    engine
        .init(Box::new(ScriptedModel(vec![0, eot])), &second)
        .expect("second init");
    assert_eq!(engine.process(&tone(3200, 1000)), "two");

    std::fs::remove_file(first).expect("cleanup");
    std::fs::remove_file(second).expect("cleanup");
}
