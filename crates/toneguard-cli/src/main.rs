use std::io::Read;
use std::path::PathBuf;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing_subscriber::EnvFilter;

use toneguard::audio::{
    DropOldestRing, f32_to_i16, i16_to_f32, measure_levels, parse_wav_bytes,
    resample_linear_mono_f32,
};
use toneguard::constants::SAMPLE_RATE_HZ;
use toneguard::engine::{ToneGuard, UtteranceReport};
use toneguard::infer::NullModel;
use toneguard::score::Lexicon;

#[derive(Debug, Parser)]
#[command(name = "toneguard")]
#[command(about = "Conversation tone analysis (calm / caution / aggressive)", long_about = None)]
struct Args {
    /// Vocabulary resource (filter bank + token table).
    #[arg(long)]
    vocab: PathBuf,

    /// Path to a WAV file.
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Read audio from stdin (WAV or raw s16le 16kHz mono).
    #[arg(long, default_value_t = false)]
    stdin: bool,

    /// Capture audio from the default microphone.
    #[arg(long, default_value_t = false)]
    from_mic: bool,

    /// Optional JSON file overriding the built-in scoring lexicon.
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Spectrogram worker threads.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Seconds of audio per analyzed utterance in mic mode.
    #[arg(long, default_value_t = 5.0)]
    utterance_secs: f32,

    /// Emit reports as JSON lines instead of plain text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let modes = u32::from(args.audio.is_some()) + u32::from(args.stdin) + u32::from(args.from_mic);
    if modes != 1 {
        anyhow::bail!("choose exactly one input mode: --audio, --stdin, or --from-mic");
    }

    let lexicon = match &args.lexicon {
        Some(path) => Lexicon::from_path(path).context("load lexicon")?,
        None => Lexicon::default(),
    };

    let engine = ToneGuard::new(lexicon, args.workers.max(1));
    // Real inference engines plug in behind the AcousticModel seam; the CLI
    // ships the null model, so only prosodic cues drive the signal.
    engine
        .init(Box::new(NullModel), &args.vocab)
        .context("initialize analysis context")?;

    if let Some(path) = &args.audio {
        return run_file(&engine, path, args.json);
    }
    if args.stdin {
        return run_stdin(&engine, args.json);
    }
    run_mic(&engine, args.utterance_secs.max(0.5), args.json)
}

fn print_report(report: &UtteranceReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report).context("serialize report")?);
    } else {
        println!(
            "signal={} combined={:.3} lexical={:.3} prosodic={:.3} transcript={:?}",
            report.signal, report.combined, report.lexical, report.prosodic, report.transcript
        );
    }
    Ok(())
}

fn analyze_utterance(engine: &ToneGuard, pcm: &[i16], json: bool) -> Result<()> {
    let (peak, rms) = measure_levels(pcm);
    let report = engine.analyze(pcm, peak, rms);
    print_report(&report, json)
}

fn to_16k_mono(samples: Vec<i16>, src_hz: u32) -> Vec<i16> {
    if src_hz == SAMPLE_RATE_HZ {
        return samples;
    }
    f32_to_i16(&resample_linear_mono_f32(
        &i16_to_f32(&samples),
        src_hz,
        SAMPLE_RATE_HZ,
    ))
}

fn run_file(engine: &ToneGuard, path: &PathBuf, json: bool) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("read file {path:?}"))?;
    let wav = parse_wav_bytes(&bytes).context("parse wav")?;
    let pcm = to_16k_mono(wav.samples, wav.sample_rate_hz);
    analyze_utterance(engine, &pcm, json)
}

fn run_stdin(engine: &ToneGuard, json: bool) -> Result<()> {
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("read stdin")?;

    let pcm = if buf.len() >= 12 && &buf[0..4] == b"RIFF" && &buf[8..12] == b"WAVE" {
        let wav = parse_wav_bytes(&buf).context("parse wav")?;
        to_16k_mono(wav.samples, wav.sample_rate_hz)
    } else {
        // raw s16le 16kHz mono
        if buf.len() % 2 != 0 {
            buf.pop();
        }
        buf.chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    };

    analyze_utterance(engine, &pcm, json)
}

fn run_mic(engine: &ToneGuard, utterance_secs: f32, json: bool) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("no default input device")?;

    let cfg = device.default_input_config().context("default config")?;
    let channels = cfg.channels();
    let src_hz = cfg.sample_rate().0;
    let stream_config: cpal::StreamConfig = cfg.clone().into();

    tracing::info!(
        device = ?device.name().ok(),
        sample_rate = src_hz,
        channels,
        format = ?cfg.sample_format(),
        "capturing from microphone"
    );

    // Drop-oldest ring in the source sample-rate domain, ~5s deep.
    let ring = Arc::new(Mutex::new(DropOldestRing::new(
        (src_hz as usize).saturating_mul(5),
    )));

    // Cancellation flag for the capture loop, observed once per drain
    // iteration. The analysis itself is never cancelled mid-flight.
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("install ctrl-c handler")?;
    }

    let err_fn = |e| tracing::error!(error = %e, "mic stream error");

    let stream = match cfg.sample_format() {
        cpal::SampleFormat::F32 => {
            let ring_cb = Arc::clone(&ring);
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _| {
                    let mono = downmix(data, channels, |&s| s);
                    push_capture(&ring_cb, &mono);
                },
                err_fn,
                None,
            )?
        }
        cpal::SampleFormat::I16 => {
            let ring_cb = Arc::clone(&ring);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _| {
                    let mono = downmix(data, channels, |&s| f32::from(s) / 32_768.0);
                    push_capture(&ring_cb, &mono);
                },
                err_fn,
                None,
            )?
        }
        cpal::SampleFormat::U16 => {
            let ring_cb = Arc::clone(&ring);
            device.build_input_stream(
                &stream_config,
                move |data: &[u16], _| {
                    let mono = downmix(data, channels, |&s| {
                        ((i32::from(s) - 32_768) as f32) / 32_768.0
                    });
                    push_capture(&ring_cb, &mono);
                },
                err_fn,
                None,
            )?
        }
        other => anyhow::bail!("unsupported sample format: {other:?}"),
    };

    stream.play().context("start mic stream")?;

    let utterance_len = (src_hz as f32 * utterance_secs) as usize;
    let mut utterance: Vec<f32> = Vec::with_capacity(utterance_len);
    let mut tmp = Vec::new();

    while running.load(Ordering::SeqCst) {
        {
            let mut r = ring.lock().expect("ring lock");
            r.drain_into(&mut tmp, src_hz as usize / 10); // up to 100ms
        }

        if tmp.is_empty() {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        }
        utterance.extend_from_slice(&tmp);

        if utterance.len() >= utterance_len {
            let pcm = to_16k_mono(f32_to_i16(&utterance), src_hz);
            analyze_utterance(engine, &pcm, json)?;
            utterance.clear();
        }
    }

    // Flush whatever is left of the final utterance.
    if !utterance.is_empty() {
        let pcm = to_16k_mono(f32_to_i16(&utterance), src_hz);
        analyze_utterance(engine, &pcm, json)?;
    }

    engine.release();
    Ok(())
}

fn push_capture(ring: &Mutex<DropOldestRing>, mono: &[f32]) {
    let evicted = ring.lock().expect("ring lock").push(mono);
    if evicted > 0 {
        // The analysis loop fell behind; the oldest audio is gone.
        tracing::warn!(evicted, "capture ring overflowed");
    }
}

fn downmix<T>(data: &[T], channels: u16, to_f32: impl Fn(&T) -> f32) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    let mut mono = Vec::with_capacity(data.len() / channels);
    for frame in data.chunks_exact(channels) {
        let sum: f32 = frame.iter().map(&to_f32).sum();
        mono.push(sum / (channels as f32));
    }
    mono
}
