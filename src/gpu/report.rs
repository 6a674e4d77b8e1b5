use serde::Serialize;

use crate::gpu::specs::{self, GIB};
use crate::snapshot::GpuMetrics;

/// One row of the detection report: live metrics plus the static capability
/// figures for accelerators the table knows about.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuReportEntry {
    pub index: usize,
    #[serde(flatten)]
    pub metrics: GpuMetrics,
    pub memory_bandwidth: Option<u32>,
    pub compute_units: Option<u32>,
    pub clock_speed: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DetectionReport {
    pub gpus: Vec<GpuReportEntry>,
    pub count: usize,
    pub mi300x_detected: bool,
}

impl DetectionReport {
    pub fn from_metrics(all: Vec<GpuMetrics>) -> Self {
        let gpus: Vec<GpuReportEntry> = all
            .into_iter()
            .enumerate()
            .map(|(index, metrics)| {
                let spec = specs::match_model(&metrics.model);
                GpuReportEntry {
                    index,
                    memory_bandwidth: spec.map(|s| s.memory_bandwidth_gbs),
                    compute_units: spec.map(|s| s.compute_units),
                    clock_speed: metrics.graphics_clock.or(spec.map(|s| s.clock_mhz)),
                    metrics,
                }
            })
            .collect();
        let count = gpus.len();
        let mi300x_detected = gpus.iter().any(|gpu| gpu.metrics.model == "MI300X");
        DetectionReport {
            gpus,
            count,
            mi300x_detected,
        }
    }

    /// Human-readable companion to the json report.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec!["=== GPU Detection Summary ===".to_string()];
        for gpu in &self.gpus {
            lines.push(format!(
                "GPU {}: {} {}",
                gpu.index,
                gpu.metrics.vendor.as_str(),
                gpu.metrics.model
            ));
            if gpu.metrics.model == "MI300X" {
                lines.push("  ✓ MI300X Detected!".to_string());
                lines.push(format!(
                    "  Memory: {:.0} GB HBM3",
                    gpu.metrics.memory_total as f64 / GIB as f64
                ));
                if let Some(bandwidth) = gpu.memory_bandwidth {
                    lines.push(format!("  Bandwidth: {bandwidth} GB/s"));
                }
                if let Some(units) = gpu.compute_units {
                    lines.push(format!("  Compute Units: {units}"));
                }
            }
            if gpu.metrics.utilization > 0.0 {
                lines.push(format!("  Utilization: {:.1}%", gpu.metrics.utilization));
            }
            if gpu.metrics.temperature > 0.0 {
                lines.push(format!("  Temperature: {:.1}°C", gpu.metrics.temperature));
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::GpuVendor;

    fn metrics(model: &str) -> GpuMetrics {
        GpuMetrics {
            model: model.to_string(),
            vendor: GpuVendor::Amd,
            memory_total: 192 * GIB,
            memory_used: 0,
            memory_free: 192 * GIB,
            memory_percent: 0.0,
            utilization: 0.0,
            memory_utilization: 0.0,
            temperature: 0.0,
            power_draw: None,
            graphics_clock: None,
            memory_clock: None,
        }
    }

    #[test]
    fn known_accelerators_gain_static_capability_columns() {
        let report = DetectionReport::from_metrics(vec![metrics("MI300X")]);
        assert_eq!(report.count, 1);
        assert!(report.mi300x_detected);
        let entry = &report.gpus[0];
        assert_eq!(entry.memory_bandwidth, Some(5300));
        assert_eq!(entry.compute_units, Some(304));
        assert_eq!(entry.clock_speed, Some(1700));
    }

    #[test]
    fn live_clock_beats_the_table_figure() {
        let mut live = metrics("MI300X");
        live.graphics_clock = Some(2100);
        let report = DetectionReport::from_metrics(vec![live]);
        assert_eq!(report.gpus[0].clock_speed, Some(2100));
    }

    #[test]
    fn unknown_models_report_without_extras() {
        let report = DetectionReport::from_metrics(vec![metrics("Radeon RX 7600")]);
        assert!(!report.mi300x_detected);
        let entry = &report.gpus[0];
        assert_eq!(entry.memory_bandwidth, None);
        assert_eq!(entry.compute_units, None);
        assert_eq!(entry.clock_speed, None);
    }

    #[test]
    fn report_serializes_flat_entries() {
        let report = DetectionReport::from_metrics(vec![metrics("MI300X")]);
        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["count"], 1);
        assert_eq!(value["mi300x_detected"], true);
        let entry = &value["gpus"][0];
        assert_eq!(entry["index"], 0);
        assert_eq!(entry["model"], "MI300X");
        assert!(entry["memoryTotal"].is_number());
        assert_eq!(entry["memoryBandwidth"], 5300);
        assert_eq!(entry["computeUnits"], 304);
    }

    #[test]
    fn summary_highlights_high_memory_accelerators() {
        let mut live = metrics("MI300X");
        live.utilization = 12.5;
        live.temperature = 48.0;
        let report = DetectionReport::from_metrics(vec![live, metrics("Radeon RX 7600")]);
        let lines = report.summary_lines();

        assert_eq!(lines[0], "=== GPU Detection Summary ===");
        assert_eq!(lines[1], "GPU 0: AMD MI300X");
        assert!(lines.contains(&"  ✓ MI300X Detected!".to_string()));
        assert!(lines.contains(&"  Memory: 192 GB HBM3".to_string()));
        assert!(lines.contains(&"  Bandwidth: 5300 GB/s".to_string()));
        assert!(lines.contains(&"  Utilization: 12.5%".to_string()));
        assert!(lines.contains(&"  Temperature: 48.0°C".to_string()));
        assert!(lines.contains(&"GPU 1: AMD Radeon RX 7600".to_string()));
        // The quiet second card adds no detail rows.
        assert_eq!(lines.last(), Some(&"GPU 1: AMD Radeon RX 7600".to_string()));
    }
}
