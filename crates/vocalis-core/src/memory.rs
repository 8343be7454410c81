//! Process memory sampling and periodic hygiene

use serde::Serialize;
use tracing::{debug, info};

/// Point-in-time process memory reading.
///
/// Fields are absent on platforms where they cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemorySample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_memory_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_memory_percent: Option<f64>,
}

impl MemorySample {
    pub fn is_empty(&self) -> bool {
        self.cpu_memory_mb.is_none() && self.cpu_memory_percent.is_none()
    }

    /// Build a sample from the contents of `/proc/self/status` and `/proc/meminfo`
    pub fn from_proc(status: &str, meminfo: &str) -> Self {
        let rss_kb = kb_field(status, "VmRSS:");
        let total_kb = kb_field(meminfo, "MemTotal:");

        Self {
            cpu_memory_mb: rss_kb.map(|kb| kb as f64 / 1024.0),
            cpu_memory_percent: match (rss_kb, total_kb) {
                (Some(rss), Some(total)) if total > 0 => {
                    Some(rss as f64 / total as f64 * 100.0)
                }
                _ => None,
            },
        }
    }
}

fn kb_field(contents: &str, key: &str) -> Option<u64> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

/// Sample the current process
#[cfg(target_os = "linux")]
pub fn sample() -> MemorySample {
    let status = std::fs::read_to_string("/proc/self/status");
    let meminfo = std::fs::read_to_string("/proc/meminfo");
    match (status, meminfo) {
        (Ok(status), Ok(meminfo)) => MemorySample::from_proc(&status, &meminfo),
        (Ok(status), Err(_)) => MemorySample::from_proc(&status, ""),
        _ => MemorySample::default(),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn sample() -> MemorySample {
    MemorySample::default()
}

/// Hygiene pass run every `memory_cleanup_interval` requests.
///
/// Rust frees chunk buffers on drop, so the pass only reports where memory
/// settled after the last batch of requests.
pub fn cleanup(request_count: u64) -> MemorySample {
    let after = sample();
    match after.cpu_memory_mb {
        Some(mb) => info!(
            "Memory cleanup after request #{}: {:.1} MB resident",
            request_count, mb
        ),
        None => debug!("Memory cleanup after request #{}", request_count),
    }
    after
}
