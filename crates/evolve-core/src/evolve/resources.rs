//! Resource measurement around a wrapped call and the check of resource
//! constraints against it.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Pid, ProcessesToUpdate, RefreshKind, System};
use tracing::debug;

use crate::models::Constraint;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What one call used. Memory and CPU are only present when they were
/// sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResourceUsage {
    pub elapsed: Duration,
    /// Peak resident memory of this process, in megabytes.
    pub peak_memory_mb: Option<f64>,
    /// Peak global CPU usage, in percent.
    pub peak_cpu_percent: Option<f64>,
}

/// A resource constraint that the measured usage did not stay below.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub constraint: Constraint,
    pub measured: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (measured {})", self.constraint, self.measured)
    }
}

struct Sampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl Sampler {
    fn new() -> Self {
        let refresh_kind = RefreshKind::new()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(err) => {
                debug!(error = %err, "process id unavailable, memory will not be sampled");
                None
            }
        };
        Self {
            system: Mutex::new(System::new_with_specifics(refresh_kind)),
            pid,
        }
    }

    /// Resident memory of this process in MB and global CPU usage.
    fn sample(&self) -> (Option<f64>, f64) {
        let mut sys = self.system.lock();
        sys.refresh_cpu_all();
        let memory = self.pid.and_then(|pid| {
            sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), false);
            sys.process(pid).map(|process| process.memory() as f64 / BYTES_PER_MB)
        });
        (memory, f64::from(sys.global_cpu_usage()))
    }
}

fn peak(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Times calls and, when a memory or CPU constraint asks for it, samples the
/// process before and after.
pub struct ResourceMonitor {
    sampler: Option<Sampler>,
}

impl ResourceMonitor {
    /// Only the elapsed time is measured.
    pub fn timing_only() -> Self {
        Self { sampler: None }
    }

    pub fn sampling() -> Self {
        Self {
            sampler: Some(Sampler::new()),
        }
    }

    /// Sample memory and CPU only when one of `constraints` limits them.
    pub fn for_constraints(constraints: &[Constraint]) -> Self {
        let needs_sampling = constraints.iter().any(|constraint| {
            matches!(
                constraint,
                Constraint::MemoryBelow { .. } | Constraint::CpuBelow { .. }
            )
        });
        if needs_sampling {
            Self::sampling()
        } else {
            Self::timing_only()
        }
    }

    pub fn is_sampling(&self) -> bool {
        self.sampler.is_some()
    }

    /// Run `f` and report what it used. Memory and CPU are the peak of the
    /// samples taken before and after.
    pub fn measure<R>(&self, f: impl FnOnce() -> R) -> (R, ResourceUsage) {
        let before = self.sampler.as_ref().map(Sampler::sample);
        let started = Instant::now();
        let result = f();
        let elapsed = started.elapsed();
        let after = self.sampler.as_ref().map(Sampler::sample);

        let mut usage = ResourceUsage {
            elapsed,
            ..ResourceUsage::default()
        };
        if let (Some((mem_before, cpu_before)), Some((mem_after, cpu_after))) = (before, after) {
            usage.peak_memory_mb = peak(mem_before, mem_after);
            usage.peak_cpu_percent = Some(cpu_before.max(cpu_after));
        }
        (result, usage)
    }
}

/// Resource constraints in `constraints` that `usage` did not stay below.
/// Unmeasured resources never count as violations.
pub fn violations(constraints: &[Constraint], usage: &ResourceUsage) -> Vec<Violation> {
    constraints
        .iter()
        .filter_map(|constraint| {
            let measured = match constraint {
                Constraint::RuntimeBelow(limit) if usage.elapsed >= *limit => {
                    format!("{:.3}ms", usage.elapsed.as_secs_f64() * 1000.0)
                }
                Constraint::MemoryBelow { megabytes } => {
                    let peak = usage.peak_memory_mb.filter(|peak| peak >= megabytes)?;
                    format!("{peak:.2}MB")
                }
                Constraint::CpuBelow { percent } => {
                    let peak = usage.peak_cpu_percent.filter(|peak| peak >= percent)?;
                    format!("{peak:.1}%")
                }
                _ => return None,
            };
            Some(Violation {
                constraint: constraint.clone(),
                measured,
            })
        })
        .collect()
}
