use battery::units::ratio::percent;
use battery::units::time::second;
use battery::State;
#[cfg(target_os = "linux")]
use std::fs;
use sysinfo::{CpuExt, System, SystemExt};
use tracing::debug;

use crate::snapshot::{usage_percent, BatteryMetrics, CpuMetrics, MemoryMetrics};

/// Samples CPU load over the library's minimum measurement window. Two
/// refreshes are required; a single one always reads 0%.
pub async fn collect_cpu() -> CpuMetrics {
    let mut system = System::new();
    system.refresh_cpu();
    tokio::time::sleep(System::MINIMUM_CPU_UPDATE_INTERVAL).await;
    system.refresh_cpu();

    let cpus = system.cpus();
    if cpus.is_empty() {
        return CpuMetrics::default();
    }

    let sum: f32 = cpus.iter().map(|cpu| cpu.cpu_usage()).sum();
    let utilization = (sum / cpus.len() as f32) as f64;
    let frequency = cpus
        .first()
        .map(|cpu| cpu.frequency() as f64)
        .filter(|mhz| *mhz > 0.0);

    CpuMetrics {
        utilization,
        cores: cpus.len() as u32,
        frequency,
        max_frequency: max_cpu_frequency_mhz(),
    }
}

#[cfg(target_os = "linux")]
fn max_cpu_frequency_mhz() -> Option<f64> {
    let raw = fs::read_to_string("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq").ok()?;
    let khz: f64 = raw.trim().parse().ok()?;
    if khz <= 0.0 {
        return None;
    }
    Some(khz / 1000.0)
}

#[cfg(not(target_os = "linux"))]
fn max_cpu_frequency_mhz() -> Option<f64> {
    None
}

pub fn collect_memory() -> MemoryMetrics {
    let mut system = System::new();
    system.refresh_memory();

    let total = system.total_memory();
    let used = system.used_memory();
    let swap_total = system.total_swap();
    let swap_used = system.used_swap();

    MemoryMetrics {
        total,
        used,
        available: system.available_memory(),
        percent: usage_percent(used, total),
        swap_total,
        swap_used,
        swap_percent: usage_percent(swap_used, swap_total),
    }
}

/// First battery reported by the platform, if any. Desktops and servers
/// simply have none.
pub fn collect_battery() -> Option<BatteryMetrics> {
    let manager = match battery::Manager::new() {
        Ok(manager) => manager,
        Err(err) => {
            debug!(error = %err, "battery manager unavailable");
            return None;
        }
    };
    let mut batteries = match manager.batteries() {
        Ok(batteries) => batteries,
        Err(err) => {
            debug!(error = %err, "battery enumeration failed");
            return None;
        }
    };
    let battery = batteries.next()?.ok()?;

    let level = f64::from(battery.state_of_charge().get::<percent>());
    let charging = matches!(battery.state(), State::Charging | State::Full);
    let time_remaining = battery
        .time_to_empty()
        .map(|time| time.get::<second>() as u64)
        .filter(|seconds| *seconds > 0);

    Some(BatteryMetrics {
        level,
        charging,
        time_remaining,
    })
}
