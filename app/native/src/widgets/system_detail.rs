//! CPU and memory breakdown shown in the CPU/RAM popup.
//!
//! `top -l 1 -n 0` reports the user/system/idle split of the CPU and
//! `vm_stat` the page counts behind active, wired and compressed memory. The
//! source only runs while the popup is open.

use serde::Serialize;
use sysinfo::System;

use crate::error::{BarikError, Result};
use crate::performance::Metric;
use crate::utils::command::run_binary;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Published popup detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemDetail {
    /// Percent of CPU time in user space.
    pub cpu_user: f64,
    /// Percent of CPU time in the kernel.
    pub cpu_system: f64,
    pub cpu_idle: f64,
    pub ram_active_gb: f64,
    pub ram_wired_gb: f64,
    pub ram_compressed_gb: f64,
    pub ram_total_gb: f64,
}

/// CPU split in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuSplit {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
}

/// Page counts read from `vm_stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryPages {
    pub page_size: u64,
    pub active: u64,
    pub wired: u64,
    pub compressed: u64,
}

impl MemoryPages {
    #[allow(clippy::cast_precision_loss)]
    fn gib(self, pages: u64) -> f64 { pages.saturating_mul(self.page_size) as f64 / BYTES_PER_GIB }
}

/// Parses the `CPU usage: 12.5% user, 3.2% sys, 84.3% idle` line of `top`.
///
/// Idle is whatever user and system leave.
///
/// # Errors
///
/// Returns [`BarikError::Decode`] when the line or the user share is missing.
pub fn parse_cpu_split(top: &str) -> Result<CpuSplit> {
    let line = top
        .lines()
        .find_map(|line| line.trim().strip_prefix("CPU usage:"))
        .ok_or_else(|| BarikError::Decode("top reported no CPU usage".to_string()))?;

    let mut user = None;
    let mut system = 0.0;
    for part in line.split(',') {
        let Some((value, label)) = part.trim().split_once('%') else { continue };
        let Ok(value) = value.trim().parse::<f64>() else { continue };
        match label.trim() {
            "user" => user = Some(value),
            "sys" => system = value,
            _ => {}
        }
    }

    let user = user
        .ok_or_else(|| BarikError::Decode(format!("no user share in '{line}'")))?
        .clamp(0.0, 100.0);
    let system = system.clamp(0.0, 100.0);
    Ok(CpuSplit {
        user,
        system,
        idle: (100.0 - user - system).clamp(0.0, 100.0),
    })
}

/// Parses the page size header and page counts of `vm_stat`.
///
/// # Errors
///
/// Returns [`BarikError::Decode`] when the page size is missing.
pub fn parse_vm_stat(output: &str) -> Result<MemoryPages> {
    let page_size = output
        .lines()
        .next()
        .and_then(|header| header.split("page size of ").nth(1))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|size| size.parse().ok())
        .ok_or_else(|| BarikError::Decode("vm_stat reported no page size".to_string()))?;

    let mut pages = MemoryPages {
        page_size,
        ..MemoryPages::default()
    };
    for line in output.lines().skip(1) {
        let Some((label, count)) = line.split_once(':') else { continue };
        let Ok(count) = count.trim().trim_end_matches('.').parse::<u64>() else { continue };
        match label.trim() {
            "Pages active" => pages.active = count,
            "Pages wired down" => pages.wired = count,
            "Pages occupied by compressor" => pages.compressed = count,
            _ => {}
        }
    }
    Ok(pages)
}

/// Combines the command readings with the physical memory size.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn system_detail(cpu: CpuSplit, pages: MemoryPages, total_memory: u64) -> SystemDetail {
    SystemDetail {
        cpu_user: cpu.user,
        cpu_system: cpu.system,
        cpu_idle: cpu.idle,
        ram_active_gb: pages.gib(pages.active),
        ram_wired_gb: pages.gib(pages.wired),
        ram_compressed_gb: pages.gib(pages.compressed),
        ram_total_gb: total_memory as f64 / BYTES_PER_GIB,
    }
}

/// Polls `vm_stat`, `top` and sysinfo for the popup.
pub struct SystemDetailSource {
    system: System,
}

impl std::fmt::Debug for SystemDetailSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemDetailSource").finish_non_exhaustive()
    }
}

impl Default for SystemDetailSource {
    fn default() -> Self { Self::new() }
}

impl SystemDetailSource {
    #[must_use]
    pub fn new() -> Self { Self { system: System::new() } }
}

impl MetricSource for SystemDetailSource {
    type State = SystemDetail;

    const METRIC: Metric = Metric::SystemPopup;
    const WIDGET_IDS: &'static [&'static str] = &[ids::CPU_RAM_POPUP];

    fn poll(&mut self) -> Result<SystemDetail> {
        let pages = parse_vm_stat(&run_binary("vm_stat", &[] as &[&str])?)?;
        let cpu = parse_cpu_split(&run_binary("top", &["-l", "1", "-n", "0"])?)?;

        self.system.refresh_memory();
        Ok(system_detail(cpu, pages, self.system.total_memory()))
    }
}
