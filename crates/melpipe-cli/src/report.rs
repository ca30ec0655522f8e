use std::time::Duration;

use melpipe::golden::{Divergence, GoldenReport, Tolerance};
use melpipe::params::FrontendParams;
use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub melpipe_version: String,
    pub os: String,
    pub arch: String,
    pub input: InputInfo,
    pub params: FrontendParams,
    pub latency: LatencySummary,
    pub memory: MemoryDelta,
    pub deterministic: bool,
    pub mel: MatrixStats,
    pub conv: MatrixStats,
    pub golden: Option<GoldenReport>,
    pub reference: Option<ReferenceReport>,
}

impl RunReport {
    pub fn new(input: InputInfo, latency: LatencySummary, memory: MemoryDelta) -> Self {
        Self {
            melpipe_version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            input,
            params: FrontendParams::current(),
            latency,
            memory,
            deterministic: true,
            mel: MatrixStats::default(),
            conv: MatrixStats::default(),
            golden: None,
            reference: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InputInfo {
    pub label: String,
    pub pcm_bytes: usize,
    pub samples: usize,
    pub seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceReport {
    pub path: String,
    pub tolerance: Tolerance,
    pub mel: Divergence,
    pub conv: Divergence,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub warmup_iters: usize,
    pub measure_iters: usize,
    pub min_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub max_us: u64,
    pub mean_us: f64,
}

impl LatencySummary {
    pub fn from_samples(warmup_iters: usize, mut samples: Vec<Duration>) -> Self {
        samples.sort_unstable();
        let samples_us: Vec<u64> = samples.iter().map(|d| d.as_micros() as u64).collect();
        let mean_us = if samples_us.is_empty() {
            0.0
        } else {
            samples_us.iter().map(|&v| v as f64).sum::<f64>() / samples_us.len() as f64
        };
        Self {
            warmup_iters,
            measure_iters: samples_us.len(),
            min_us: *samples_us.first().unwrap_or(&0),
            p50_us: percentile(&samples_us, 0.50),
            p95_us: percentile(&samples_us, 0.95),
            max_us: *samples_us.last().unwrap_or(&0),
            mean_us,
        }
    }
}

fn percentile(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatrixStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub non_finite: usize,
}

impl MatrixStats {
    pub fn of(values: &[f64]) -> Self {
        let mut stats = Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            non_finite: 0,
        };
        let mut sum = 0.0f64;
        let mut n = 0usize;
        for &v in values {
            if !v.is_finite() {
                stats.non_finite += 1;
                continue;
            }
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
            sum += v;
            n += 1;
        }
        if n > 0 {
            stats.mean = sum / n as f64;
        } else {
            stats.min = 0.0;
            stats.max = 0.0;
        }
        stats
    }
}

/// Resident set size of this process, sampled around the measured loop.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryDelta {
    pub rss_before_bytes: u64,
    pub rss_after_bytes: u64,
    pub growth_bytes: i64,
}

pub struct RssSampler {
    system: System,
    pid: Option<Pid>,
}

impl RssSampler {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if pid.is_none() {
            tracing::warn!("current pid unavailable; memory figures will read 0");
        }
        Self {
            system: System::new(),
            pid,
        }
    }

    pub fn sample(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        self.system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

impl MemoryDelta {
    pub fn new(before: u64, after: u64) -> Self {
        Self {
            rss_before_bytes: before,
            rss_after_bytes: after,
            growth_bytes: after as i64 - before as i64,
        }
    }
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

pub fn print_text(report: &RunReport) {
    let l = &report.latency;
    println!(
        "input: {} ({} samples, {:.3}s)",
        report.input.label, report.input.samples, report.input.seconds
    );
    println!(
        "latency: warmup={} iters={} min={}us p50={}us p95={}us max={}us mean={:.1}us",
        l.warmup_iters, l.measure_iters, l.min_us, l.p50_us, l.p95_us, l.max_us, l.mean_us
    );
    println!(
        "host rss: before={:.1}MiB after={:.1}MiB growth={}B",
        mib(report.memory.rss_before_bytes),
        mib(report.memory.rss_after_bytes),
        report.memory.growth_bytes
    );
    println!("deterministic: {}", report.deterministic);
    for (name, s) in [("mel", &report.mel), ("conv", &report.conv)] {
        println!(
            "{name}: min={:.6} max={:.6} mean={:.6} non_finite={}",
            s.min, s.max, s.mean, s.non_finite
        );
    }
    if let Some(g) = &report.golden {
        println!(
            "golden: {} (rel={:e} abs={:e}) mel failures={} max_abs={:e} | conv failures={} max_abs={:e}",
            if g.passed() { "pass" } else { "FAIL" },
            g.tolerance.rel,
            g.tolerance.abs,
            g.mel.failures,
            g.mel.max_abs,
            g.conv.failures,
            g.conv.max_abs
        );
    }
    if let Some(r) = &report.reference {
        println!(
            "reference {}: mel max_abs={:e} max_rel={:e} @{} failures={} | conv max_abs={:e} max_rel={:e} @{} failures={}",
            r.path,
            r.mel.max_abs,
            r.mel.max_rel,
            r.mel.worst_index,
            r.mel.failures,
            r.conv.max_abs,
            r.conv.max_rel,
            r.conv.worst_index,
            r.conv.failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_percentiles() {
        let samples = (1..=10).rev().map(Duration::from_micros).collect();
        let s = LatencySummary::from_samples(2, samples);
        assert_eq!(s.measure_iters, 10);
        assert_eq!((s.min_us, s.max_us), (1, 10));
        assert_eq!(s.p50_us, 6);
        assert_eq!(s.p95_us, 10);
        assert!((s.mean_us - 5.5).abs() < 1e-12);
    }

    #[test]
    fn matrix_stats_skip_non_finite() {
        let s = MatrixStats::of(&[1.0, f64::NAN, -3.0, f64::INFINITY]);
        assert_eq!(s.non_finite, 2);
        assert_eq!((s.min, s.max, s.mean), (-3.0, 1.0, -1.0));
    }

    #[test]
    fn memory_growth_is_signed() {
        assert_eq!(MemoryDelta::new(100, 40).growth_bytes, -60);
    }
}
