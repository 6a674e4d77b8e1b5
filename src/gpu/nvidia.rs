use nvml_wrapper::enum_wrappers::device::{Clock, TemperatureSensor};
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use tracing::{error, warn};

use crate::snapshot::{usage_percent, GpuMetrics, GpuVendor};

/// Handle over the NVIDIA management library. Initialized once at process
/// start and reused for every query afterwards.
pub struct NvidiaAdapter {
    nvml: Nvml,
    device_count: u32,
}

impl NvidiaAdapter {
    /// Loads the management library and counts devices. Returns None when
    /// the library is missing, fails to initialize, or sees no devices.
    pub fn probe() -> Option<Self> {
        let nvml = match Nvml::init() {
            Ok(nvml) => nvml,
            Err(err) => {
                warn!(error = %err, "nvml unavailable");
                return None;
            }
        };
        let device_count = match nvml.device_count() {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "nvml device enumeration failed");
                return None;
            }
        };
        if device_count == 0 {
            return None;
        }
        Some(NvidiaAdapter { nvml, device_count })
    }

    pub fn device_count(&self) -> u32 {
        self.device_count
    }

    /// Metrics for one device. Name, memory, utilization and temperature
    /// must all resolve; power and clocks may be missing on older cards.
    pub fn metrics(&self, device_index: u32) -> Option<GpuMetrics> {
        if device_index >= self.device_count {
            return None;
        }
        let device = log_query(self.nvml.device_by_index(device_index), "device handle")?;

        let model = log_query(device.name(), "name")?;
        let memory = log_query(device.memory_info(), "memory info")?;
        let utilization = log_query(device.utilization_rates(), "utilization")?;
        let temperature = log_query(device.temperature(TemperatureSensor::Gpu), "temperature")?;

        Some(GpuMetrics {
            model,
            vendor: GpuVendor::Nvidia,
            memory_total: memory.total,
            memory_used: memory.used,
            memory_free: memory.free,
            memory_percent: usage_percent(memory.used, memory.total),
            utilization: f64::from(utilization.gpu),
            memory_utilization: f64::from(utilization.memory),
            temperature: f64::from(temperature),
            power_draw: device.power_usage().ok().map(|mw| f64::from(mw) / 1000.0),
            graphics_clock: device.clock_info(Clock::Graphics).ok(),
            memory_clock: device.clock_info(Clock::Memory).ok(),
        })
    }
}

fn log_query<T>(result: Result<T, NvmlError>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            error!(error = %err, query = what, "nvidia query failed");
            None
        }
    }
}
