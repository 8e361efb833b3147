//! CPU, memory and network throughput.
//!
//! One source feeds both the CPU/RAM widget and the network activity widget.
//! It keeps its `sysinfo` handles between polls: CPU usage and throughput are
//! both deltas against the previous refresh, throughput per interface name.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use sysinfo::{Networks, System};

use crate::error::Result;
use crate::performance::Metric;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Published system statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    /// Global CPU usage in percent.
    pub cpu_load: f32,
    /// Used memory in percent.
    pub ram_usage: f64,
    pub ram_used_gb: f64,
    pub ram_total_gb: f64,
    /// KB/s sent across all interfaces.
    pub upload_speed: f64,
    /// KB/s received across all interfaces.
    pub download_speed: f64,
}

/// Byte counters of one interface, or a sum of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkTotals {
    pub received: u64,
    pub transmitted: u64,
}

/// Cumulative counters keyed by interface name.
pub type InterfaceCounters = HashMap<String, NetworkTotals>;

/// Bytes moved between two samples, summed over interfaces.
///
/// Only interfaces present in both samples count: one that appears between
/// them has no baseline yet, and counters that went backwards (interface
/// reset) count as zero.
#[must_use]
pub fn counter_delta(previous: &InterfaceCounters, current: &InterfaceCounters) -> NetworkTotals {
    current
        .iter()
        .filter_map(|(name, now)| previous.get(name).map(|before| (before, now)))
        .fold(NetworkTotals::default(), |delta, (before, now)| NetworkTotals {
            received: delta.received.saturating_add(now.received.saturating_sub(before.received)),
            transmitted: delta.transmitted.saturating_add(now.transmitted.saturating_sub(before.transmitted)),
        })
}

/// Throughput in KB/s of `delta` bytes over `elapsed`, as `(upload, download)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn throughput(delta: NetworkTotals, elapsed: Duration) -> (f64, f64) {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return (0.0, 0.0);
    }

    (delta.transmitted as f64 / 1024.0 / seconds, delta.received as f64 / 1024.0 / seconds)
}

/// Memory usage as `(percent, used GiB, total GiB)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn memory_usage(used_bytes: u64, total_bytes: u64) -> (f64, f64, f64) {
    if total_bytes == 0 {
        return (0.0, 0.0, 0.0);
    }

    let used = used_bytes as f64;
    let total = total_bytes as f64;
    ((used / total * 100.0).clamp(0.0, 100.0), used / BYTES_PER_GIB, total / BYTES_PER_GIB)
}

/// Polls sysinfo for CPU, memory and network counters.
pub struct SystemMonitorSource {
    system: System,
    networks: Networks,
    last_sample: Option<(Instant, InterfaceCounters)>,
}

impl std::fmt::Debug for SystemMonitorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemMonitorSource").field("last_sample", &self.last_sample).finish_non_exhaustive()
    }
}

impl Default for SystemMonitorSource {
    fn default() -> Self { Self::new() }
}

impl SystemMonitorSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new(),
            networks: Networks::new_with_refreshed_list(),
            last_sample: None,
        }
    }

    fn interface_counters(&mut self) -> InterfaceCounters {
        self.networks.refresh(true);
        self.networks
            .iter()
            .map(|(name, data)| {
                let totals = NetworkTotals {
                    received: data.total_received(),
                    transmitted: data.total_transmitted(),
                };
                (name.clone(), totals)
            })
            .collect()
    }
}

impl MetricSource for SystemMonitorSource {
    type State = SystemStats;

    const METRIC: Metric = Metric::System;
    const WIDGET_IDS: &'static [&'static str] = &[ids::CPU_RAM, ids::NETWORK_ACTIVITY];

    fn poll(&mut self) -> Result<SystemStats> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let (ram_usage, ram_used_gb, ram_total_gb) =
            memory_usage(self.system.used_memory(), self.system.total_memory());

        let now = Instant::now();
        let counters = self.interface_counters();
        let (upload_speed, download_speed) = self.last_sample.as_ref().map_or((0.0, 0.0), |(at, previous)| {
            throughput(counter_delta(previous, &counters), now.duration_since(*at))
        });
        self.last_sample = Some((now, counters));

        Ok(SystemStats {
            cpu_load: self.system.global_cpu_usage().clamp(0.0, 100.0),
            ram_usage,
            ram_used_gb,
            ram_total_gb,
            upload_speed,
            download_speed,
        })
    }
}
