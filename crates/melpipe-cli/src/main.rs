use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use melpipe::audio::{looks_like_wav, parse_wav_pcm};
use melpipe::constants::{BYTES_PER_SAMPLE, MIN_SAMPLES, SAMPLE_RATE_HZ};
use melpipe::golden::{
    DEFAULT_ABS_TOLERANCE, DEFAULT_TOLERANCE, Divergence, GoldenFile, GoldenSignal, Tolerance,
};
use melpipe::params::FrontendParams;
use melpipe::tensors::{ReferenceStore, write_feature_maps};
use melpipe::{FeatureMaps, FeaturePipeline};
use tracing_subscriber::EnvFilter;

mod report;

use report::{
    InputInfo, LatencySummary, MatrixStats, MemoryDelta, ReferenceReport, RssSampler, RunReport,
};

#[derive(Debug, Parser)]
#[command(name = "melpipe")]
#[command(about = "Fixed-shape log-mel + conv frontend: run, time, and compare", long_about = None)]
struct Args {
    /// Path to a WAV file (16 kHz mono 16-bit PCM).
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Read audio from stdin (WAV or raw s16le 16kHz mono).
    #[arg(long, default_value_t = false)]
    stdin: bool,

    /// Synthesize a sine tone at this frequency (Hz) as input.
    #[arg(long)]
    sine: Option<f64>,

    /// Peak amplitude of the --sine tone, full scale = 1.0.
    #[arg(long, default_value_t = 0.5)]
    amplitude: f32,

    /// Length of the --sine tone in samples.
    #[arg(long, default_value_t = MIN_SAMPLES)]
    sine_samples: usize,

    /// Untimed calls before measuring.
    #[arg(long, default_value_t = 2)]
    warmup: usize,

    /// Timed calls.
    #[arg(long, default_value_t = 10)]
    iters: usize,

    /// Write mel/conv outputs to a safetensors file.
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Compare against mel/conv tensors in a safetensors file (F64 or F32).
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Check outputs against a golden JSON file; fails the run on divergence.
    #[arg(long)]
    golden: Option<PathBuf>,

    /// Write this run's outputs as a golden JSON file.
    #[arg(long)]
    write_golden: Option<PathBuf>,

    /// Relative tolerance for --golden and --reference.
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Absolute tolerance added to the relative bound, in log-mel units.
    #[arg(long, default_value_t = DEFAULT_ABS_TOLERANCE)]
    abs_tolerance: f64,

    /// Print the report as JSON on stdout.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Print the frontend params as JSON and exit.
    #[arg(long, default_value_t = false)]
    print_params: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.print_params {
        println!("{}", FrontendParams::current().to_json_string()?);
        return Ok(());
    }

    let modes =
        u32::from(args.audio.is_some()) + u32::from(args.stdin) + u32::from(args.sine.is_some());
    if modes != 1 {
        anyhow::bail!("choose exactly one input mode: --audio, --stdin, or --sine");
    }
    if args.iters == 0 {
        anyhow::bail!("--iters must be at least 1");
    }

    let input = load_input(&args)?;
    let pcm = pcm_view(&input.bytes, args.audio.is_some())?;
    run(&args, pcm, input.label, input.signal)
}

struct LoadedInput {
    bytes: Vec<u8>,
    label: String,
    signal: Option<GoldenSignal>,
}

/// Raw bytes plus a label for reports. WAV inputs keep their header here;
/// [`pcm_view`] borrows the payload out of them.
fn load_input(args: &Args) -> Result<LoadedInput> {
    if let Some(path) = &args.audio {
        let bytes = std::fs::read(path).with_context(|| format!("read file {path:?}"))?;
        return Ok(LoadedInput {
            bytes,
            label: path.display().to_string(),
            signal: None,
        });
    }
    if args.stdin {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("read stdin")?;
        return Ok(LoadedInput {
            bytes,
            label: "stdin".to_string(),
            signal: None,
        });
    }
    let hz = args.sine.context("no input selected")?;
    if !(0.0..=1.0).contains(&args.amplitude) {
        anyhow::bail!("--amplitude must be within [0, 1], got {}", args.amplitude);
    }
    let signal = GoldenSignal::Sine {
        freq_hz: hz,
        amplitude: args.amplitude,
        n_samples: args.sine_samples,
    };
    Ok(LoadedInput {
        bytes: signal.pcm(),
        label: format!("sine {hz}Hz amp={} n={}", args.amplitude, args.sine_samples),
        signal: Some(signal),
    })
}

fn pcm_view(buf: &[u8], require_wav: bool) -> Result<&[u8]> {
    if require_wav || looks_like_wav(buf) {
        let wav = parse_wav_pcm(buf).context("parse wav")?;
        return wav.require_pipeline_format().context("wav layout");
    }
    Ok(buf)
}

fn run(args: &Args, pcm: &[u8], label: String, signal: Option<GoldenSignal>) -> Result<()> {
    let tolerance = Tolerance::new(args.tolerance, args.abs_tolerance);
    melpipe::init();
    let pipeline = FeaturePipeline::new();

    let baseline = pipeline.extract(pcm).context("run pipeline")?;
    let mut maps = FeatureMaps::zeroed();

    for _ in 0..args.warmup {
        pipeline.run(pcm, &mut maps.mel, &mut maps.conv)?;
    }

    let mut rss = RssSampler::new();
    let rss_before = rss.sample();
    let mut samples = Vec::with_capacity(args.iters);
    let mut deterministic = true;
    for i in 0..args.iters {
        let started = Instant::now();
        pipeline.run(pcm, &mut maps.mel, &mut maps.conv)?;
        samples.push(started.elapsed());
        if !maps.bit_identical(&baseline) {
            tracing::warn!(iteration = i, "output differs from the first run");
            deterministic = false;
        }
    }
    let rss_after = rss.sample();

    let n_samples = pcm.len() / BYTES_PER_SAMPLE;
    let input = InputInfo {
        label: label.clone(),
        pcm_bytes: pcm.len(),
        samples: n_samples,
        seconds: n_samples as f64 / f64::from(SAMPLE_RATE_HZ),
    };
    let mut report = RunReport::new(
        input,
        LatencySummary::from_samples(args.warmup, samples),
        MemoryDelta::new(rss_before, rss_after),
    );
    report.deterministic = deterministic;
    report.mel = MatrixStats::of(&maps.mel[..]);
    report.conv = MatrixStats::of(&maps.conv[..]);

    if let Some(path) = &args.dump {
        write_feature_maps(path, &maps).with_context(|| format!("dump outputs to {path:?}"))?;
        tracing::info!(path = %path.display(), "wrote safetensors dump");
    }
    if let Some(path) = &args.write_golden {
        GoldenFile::from_maps(label, signal, &maps).save(path)?;
        tracing::info!(path = %path.display(), "wrote golden file");
    }
    if let Some(path) = &args.reference {
        report.reference = Some(compare_reference(path, &maps, tolerance)?);
    }
    if let Some(path) = &args.golden {
        let golden = GoldenFile::load(path)?;
        if golden.signal != signal || golden.label != report.input.label {
            tracing::warn!(golden = %golden.label, input = %report.input.label, "golden was produced from a different input");
        }
        report.golden = Some(golden.check(&maps, tolerance));
    }

    if args.json {
        let json = serde_json::to_vec_pretty(&report).context("serialize report")?;
        println!("{}", String::from_utf8_lossy(&json));
    } else {
        report::print_text(&report);
    }

    if !deterministic {
        anyhow::bail!("outputs were not bit-identical across iterations");
    }
    if let Some(golden) = report.golden.filter(|g| !g.passed()) {
        anyhow::bail!(
            "golden mismatch: {} mel and {} conv values outside rel={:e} abs={:e}",
            golden.mel.failures,
            golden.conv.failures,
            golden.tolerance.rel,
            golden.tolerance.abs
        );
    }
    Ok(())
}

fn compare_reference(
    path: &Path,
    maps: &FeatureMaps,
    tolerance: Tolerance,
) -> Result<ReferenceReport> {
    let store =
        ReferenceStore::open(path).with_context(|| format!("open reference {path:?}"))?;
    if let Some(params) = store.params().context("read reference metadata")? {
        FrontendParams::current()
            .ensure_compatible(&params)
            .context("reference was produced with different params")?;
    }
    let expected = store.feature_maps().context("load reference tensors")?;
    Ok(ReferenceReport {
        path: path.display().to_string(),
        tolerance,
        mel: Divergence::between(&maps.mel[..], &expected.mel[..], tolerance),
        conv: Divergence::between(&maps.conv[..], &expected.conv[..], tolerance),
    })
}
