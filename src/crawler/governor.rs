//! Resource governor
//!
//! Samples the process's memory and CPU once per orchestrator tick and
//! compares them with the configured limits. Checking never halts anything
//! by itself; the configured policy decides what a breach does.

use crate::config::{LimitPolicy, LimitsConfig};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// One measurement of the process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub memory_mb: f64,
    pub cpu_percent: f64,
    pub timestamp: DateTime<Utc>,
}

impl ResourceSample {
    pub fn new(memory_mb: f64, cpu_percent: f64) -> Self {
        Self {
            memory_mb,
            cpu_percent,
            timestamp: Utc::now(),
        }
    }
}

/// Which limits a sample exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitCheck {
    pub mem_exceeded: bool,
    pub cpu_exceeded: bool,
}

impl LimitCheck {
    pub fn any(&self) -> bool {
        self.mem_exceeded || self.cpu_exceeded
    }

    /// Number of warnings this check logged
    pub fn warnings(&self) -> u64 {
        self.mem_exceeded as u64 + self.cpu_exceeded as u64
    }
}

/// Source of resource samples
pub trait ResourceSampler: Send {
    fn sample(&mut self) -> ResourceSample;
}

/// Compares a sample with the limits, logging one warning per exceeded limit
pub fn check_limits(sample: &ResourceSample, mem_limit_mb: f64, cpu_limit_percent: f64) -> LimitCheck {
    let check = LimitCheck {
        mem_exceeded: sample.memory_mb > mem_limit_mb,
        cpu_exceeded: sample.cpu_percent > cpu_limit_percent,
    };

    if check.mem_exceeded {
        tracing::warn!(
            "Memory limit exceeded ({:.2} MB > {} MB)",
            sample.memory_mb,
            mem_limit_mb
        );
    }
    if check.cpu_exceeded {
        tracing::warn!(
            "CPU limit exceeded ({:.2}% > {}%)",
            sample.cpu_percent,
            cpu_limit_percent
        );
    }

    check
}

/// What the orchestrator should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorAction {
    Continue,
    Stop,
}

/// Applies the limit policy to the admission gate
pub struct Governor {
    sampler: Box<dyn ResourceSampler>,
    limits: LimitsConfig,
    gate: Arc<Semaphore>,
    capacity: usize,

    /// Permits taken out of circulation while throttled
    withheld: Vec<OwnedSemaphorePermit>,

    warnings: u64,
}

impl Governor {
    /// Builds a governor over `gate`; must be called while no permit is held
    pub fn new(
        sampler: Box<dyn ResourceSampler>,
        limits: LimitsConfig,
        gate: Arc<Semaphore>,
    ) -> Self {
        Self {
            sampler,
            limits,
            capacity: gate.available_permits(),
            gate,
            withheld: Vec::new(),
            warnings: 0,
        }
    }

    /// Samples, checks and applies the policy once
    pub fn tick(&mut self) -> GovernorAction {
        let sample = self.sampler.sample();
        tracing::trace!(
            "Resource sample: {:.1} MB, {:.1}% CPU",
            sample.memory_mb,
            sample.cpu_percent
        );

        let check = check_limits(
            &sample,
            self.limits.memory_limit_mb,
            self.limits.cpu_limit_percent,
        );
        self.warnings += check.warnings();

        if !check.any() {
            self.release_all();
            return GovernorAction::Continue;
        }

        match self.limits.on_exceeded {
            LimitPolicy::Warn => GovernorAction::Continue,
            LimitPolicy::Throttle => {
                self.withhold_one();
                GovernorAction::Continue
            }
            LimitPolicy::Stop => {
                tracing::warn!("Resource limit exceeded, stopping crawl");
                GovernorAction::Stop
            }
        }
    }

    fn withhold_one(&mut self) {
        // One permit always stays in circulation
        if self.capacity.saturating_sub(self.withheld.len()) <= 1 {
            return;
        }

        match self.gate.clone().try_acquire_owned() {
            Ok(permit) => {
                self.withheld.push(permit);
                tracing::info!("Throttling: {} worker slot(s) withheld", self.withheld.len());
            }
            Err(_) => tracing::debug!("Throttling: no idle worker slot to withhold"),
        }
    }

    /// Returns every withheld permit to the gate
    pub fn release_all(&mut self) {
        if !self.withheld.is_empty() {
            tracing::info!(
                "Resources back under limits, releasing {} worker slot(s)",
                self.withheld.len()
            );
            self.withheld.clear();
        }
    }

    pub fn withheld(&self) -> usize {
        self.withheld.len()
    }

    /// Total limit warnings logged so far
    pub fn warnings(&self) -> u64 {
        self.warnings
    }
}

/// Samples the current process through procfs
pub struct ProcessSampler {
    last_cpu: Option<(f64, Instant)>,
    /// Kernel clock ticks per second, the unit of /proc/self/stat times
    clock_ticks: f64,
}

/// USER_HZ on every mainstream Linux build; used when `getconf` is unavailable
const DEFAULT_CLOCK_TICKS: f64 = 100.0;

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSampler {
    pub fn new() -> Self {
        let mut sampler = Self {
            last_cpu: None,
            clock_ticks: clock_ticks_per_second(),
        };
        // Prime the CPU baseline so the first tick reports a real delta
        sampler.cpu_percent();
        sampler
    }

    fn cpu_percent(&mut self) -> f64 {
        let Some(cpu_seconds) = read_cpu_seconds(self.clock_ticks) else {
            return 0.0;
        };
        let now = Instant::now();

        let percent = match self.last_cpu {
            Some((last_seconds, last_at)) => {
                let wall = now.duration_since(last_at).as_secs_f64();
                if wall > 0.0 {
                    ((cpu_seconds - last_seconds) / wall * 100.0).max(0.0)
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        self.last_cpu = Some((cpu_seconds, now));
        percent
    }
}

impl ResourceSampler for ProcessSampler {
    fn sample(&mut self) -> ResourceSample {
        let memory_mb = read_rss_mb().unwrap_or(0.0);
        let cpu_percent = self.cpu_percent();
        ResourceSample::new(memory_mb, cpu_percent)
    }
}

#[cfg(target_os = "linux")]
fn read_rss_mb() -> Option<f64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss_kb(&status).map(|kb| kb as f64 / 1024.0)
}

#[cfg(not(target_os = "linux"))]
fn read_rss_mb() -> Option<f64> {
    None
}

#[cfg(target_os = "linux")]
fn read_cpu_seconds(clock_ticks: f64) -> Option<f64> {
    let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
    parse_cpu_ticks(&stat).map(|ticks| ticks as f64 / clock_ticks)
}

#[cfg(not(target_os = "linux"))]
fn read_cpu_seconds(_clock_ticks: f64) -> Option<f64> {
    None
}

/// Asks `getconf CLK_TCK` once, falling back to [`DEFAULT_CLOCK_TICKS`]
fn clock_ticks_per_second() -> f64 {
    let reported = std::process::Command::new("getconf")
        .arg("CLK_TCK")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| parse_clock_ticks(&String::from_utf8_lossy(&output.stdout)));

    reported.unwrap_or_else(|| {
        tracing::debug!(
            "getconf CLK_TCK unavailable, assuming {} ticks per second",
            DEFAULT_CLOCK_TICKS
        );
        DEFAULT_CLOCK_TICKS
    })
}

fn parse_clock_ticks(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|ticks| *ticks > 0)
        .map(f64::from)
}

/// Extracts `VmRSS` (kB) from /proc/<pid>/status
fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

/// Extracts utime + stime (clock ticks) from /proc/<pid>/stat
fn parse_cpu_ticks(stat: &str) -> Option<u64> {
    // The command name may contain spaces; fields resume after the last ')'
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // utime and stime are fields 14 and 15 of the full line
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}
