use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::exec::{run_command, CommandOutcome};
use crate::gpu::specs::{self, DEFAULT_MEMORY_TOTAL_BYTES, GIB};
use crate::snapshot::{usage_percent, GpuMetrics, GpuVendor};

const ROCM_SMI: &str = "rocm-smi";
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);
const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// One query serves both the streaming path and the detection CLI, so both
/// always see the same fields.
const QUERY_ARGS: &[&str] = &[
    "--showid",
    "--showproductname",
    "--showmeminfo",
    "vram",
    "--showmemuse",
    "--showtemp",
    "--showuse",
    "--showpower",
    "--json",
];
const TEXT_QUERY_ARGS: &[&str] = &["-i", "0", "-d"];

const GENERIC_MODEL: &str = "AMD GPU";
const MIB: u64 = 1024 * 1024;

// rocm-smi renames fields between releases. Each logical field keeps an
// ordered candidate list; the first key with a usable value wins.
const MODEL_KEYS: &[&str] = &[
    "Card Series",
    "Card series",
    "Device Name",
    "Card Model",
    "Card SKU",
    "Card Vendor",
];
const SKU_KEYS: &[&str] = &["Card SKU"];
const VRAM_TOTAL_KEYS: &[&str] = &[
    "VRAM Total Memory (B)",
    "VRAM Total Memory(B)",
    "vram_total_memory",
];
const VRAM_USED_KEYS: &[&str] = &[
    "VRAM Total Used Memory (B)",
    "VRAM Total Used Memory(B)",
    "vram_used_memory",
];
const VRAM_PERCENT_KEYS: &[&str] = &["GPU Memory Allocated (VRAM%)"];
const UTILIZATION_KEYS: &[&str] = &["GPU use (%)", "GPU use(%)", "gpu_use_percent"];
const TEMPERATURE_KEYS: &[&str] = &[
    "Temperature (Sensor edge) (C)",
    "Temperature (Sensor 1) (C)",
    "Temperature(Sensor 1)(C)",
    "temperature",
];
const POWER_KEYS: &[&str] = &["Average Graphics Package Power (W)", "Power (W)"];
const GRAPHICS_CLOCK_KEYS: &[&str] = &["GPU Clock (MHz)"];

static MEMORY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(gb|mb|b)").expect("invalid memory pattern"));
static PERCENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("invalid percent pattern"));
static TEMPERATURE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*c").expect("invalid temperature pattern"));

/// Capability handle for the ROCm CLI. Constructed only after a successful
/// version probe.
pub struct AmdAdapter;

impl AmdAdapter {
    /// Checks whether `rocm-smi` answers a version query within one second.
    pub async fn probe() -> Option<Self> {
        match run_command(ROCM_SMI, &["--version"], PROBE_TIMEOUT).await {
            CommandOutcome::Success { .. } => Some(AmdAdapter),
            outcome => {
                debug!(?outcome, "rocm-smi probe failed");
                None
            }
        }
    }

    /// Metrics for the primary card, for the streaming path.
    pub async fn metrics(&self) -> Option<GpuMetrics> {
        self.query().await.into_iter().next()
    }

    /// Metrics for every card the tool reports, for one-shot detection.
    pub async fn enumerate(&self) -> Vec<GpuMetrics> {
        self.query().await
    }

    async fn query(&self) -> Vec<GpuMetrics> {
        match run_command(ROCM_SMI, QUERY_ARGS, QUERY_TIMEOUT).await {
            CommandOutcome::Success { stdout } => {
                let records = parse_structured(&stdout);
                if !records.is_empty() {
                    return records;
                }
            }
            CommandOutcome::NotFound => {
                debug!("rocm-smi disappeared after probing succeeded");
                return Vec::new();
            }
            CommandOutcome::TimedOut => {
                error!("rocm-smi query timed out");
                return Vec::new();
            }
            CommandOutcome::NonZeroExit { code, stderr } => {
                debug!(?code, stderr = stderr.trim(), "rocm-smi json query failed");
            }
        }

        // Some rocm-smi builds ship with broken json output. Fall back to
        // scraping the per-device text listing.
        match run_command(ROCM_SMI, TEXT_QUERY_ARGS, QUERY_TIMEOUT).await {
            CommandOutcome::Success { stdout } => parse_plain_text(&stdout).into_iter().collect(),
            outcome => {
                debug!(?outcome, "rocm-smi text fallback failed");
                Vec::new()
            }
        }
    }
}

fn parse_structured(stdout: &str) -> Vec<GpuMetrics> {
    let data: Value = match serde_json::from_str(stdout) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "rocm-smi output is not valid json");
            return Vec::new();
        }
    };
    resolve_gpu_records(&data)
        .into_iter()
        .map(record_to_metrics)
        .collect()
}

/// Locates the per-card records inside a structurally ambiguous response.
/// rocm-smi has shipped `{"card0": {..}}`, `{"card": [..]}` and a bare
/// record at different points in its history.
fn resolve_gpu_records(data: &Value) -> Vec<&Map<String, Value>> {
    let Some(top) = data.as_object() else {
        return Vec::new();
    };

    let mut indexed: Vec<(u32, &Map<String, Value>)> = top
        .iter()
        .filter_map(|(key, value)| {
            let index = key.strip_prefix("card")?.parse::<u32>().ok()?;
            Some((index, value.as_object()?))
        })
        .collect();
    if !indexed.is_empty() {
        indexed.sort_by_key(|(index, _)| *index);
        return indexed.into_iter().map(|(_, record)| record).collect();
    }

    if let Some(cards) = top.get("card") {
        match cards {
            Value::Array(items) => {
                if let Some(first) = items.first().and_then(Value::as_object) {
                    return vec![first];
                }
            }
            Value::Object(record) => return vec![record],
            _ => {}
        }
    }

    if top.contains_key("Device Name") {
        return vec![top];
    }

    Vec::new()
}

fn record_to_metrics(record: &Map<String, Value>) -> GpuMetrics {
    let raw_model = pick_string(record, MODEL_KEYS);
    let sku = pick_string(record, SKU_KEYS);
    let model = classify_model(raw_model.as_deref(), sku.as_deref());

    let reported_total = pick_u64(record, VRAM_TOTAL_KEYS).filter(|total| *total > 0);
    let memory_total = reported_total
        .or_else(|| specs::match_model(&model).map(|spec| spec.memory_total_bytes))
        .unwrap_or(DEFAULT_MEMORY_TOTAL_BYTES);
    // A directly reported used-bytes value is kept even when the total had
    // to be synthesized, so used may exceed total on heuristic paths.
    let memory_used = pick_u64(record, VRAM_USED_KEYS)
        .or_else(|| {
            pick_f64(record, VRAM_PERCENT_KEYS)
                .map(|pct| (memory_total as f64 * pct / 100.0) as u64)
        })
        .unwrap_or(0);

    let utilization = pick_f64(record, UTILIZATION_KEYS).unwrap_or(0.0);
    let temperature = pick_f64(record, TEMPERATURE_KEYS).unwrap_or(0.0);

    GpuMetrics {
        model,
        vendor: GpuVendor::Amd,
        memory_total,
        memory_used,
        memory_free: memory_total.saturating_sub(memory_used),
        memory_percent: usage_percent(memory_used, memory_total),
        utilization,
        // rocm-smi exposes no dedicated memory-activity counter.
        memory_utilization: utilization,
        temperature,
        power_draw: pick_f64(record, POWER_KEYS),
        graphics_clock: pick_f64(record, GRAPHICS_CLOCK_KEYS).map(|clock| clock.max(0.0) as u32),
        memory_clock: None,
    }
}

/// Resolves the display model, overriding it with the canonical family name
/// when a known marker appears. OEM boards sometimes bury the marker in the
/// SKU while the series field carries a codename.
fn classify_model(raw_model: Option<&str>, sku: Option<&str>) -> String {
    let base = raw_model.unwrap_or(GENERIC_MODEL);
    if let Some(spec) = specs::match_model(base) {
        return spec.model.to_string();
    }
    if let Some(spec) = sku.and_then(specs::match_model) {
        return spec.model.to_string();
    }
    base.to_string()
}

fn pick_string(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(value_as_string))
}

fn pick_u64(record: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(value_as_u64))
}

fn pick_f64(record: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(value_as_f64))
}

fn value_as_string(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.to_string())
}

/// Byte counters arrive as numbers or numeric strings depending on the tool
/// version.
fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().map(|v| v.max(0.0) as u64)),
        Value::String(text) => parse_f64_loose(text).map(|v| v.max(0.0) as u64),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_f64_loose(text),
        _ => None,
    }
}

/// Tolerant float parse for values like "45%", "62C" or "1 234,5".
fn parse_f64_loose(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }

    if let Ok(v) = trimmed.replace(',', ".").parse::<f64>() {
        return Some(v);
    }

    let filtered: String = trimmed
        .chars()
        .filter(|c| {
            c.is_ascii_digit()
                || *c == '.'
                || *c == ','
                || *c == 'e'
                || *c == 'E'
                || *c == '-'
                || *c == '+'
        })
        .collect();
    if filtered.is_empty() {
        return None;
    }

    filtered.replace(',', ".").parse::<f64>().ok()
}

/// Scrapes the per-device text listing. Each line is tested independently
/// against keyword triggers; later matching lines overwrite earlier ones.
fn parse_plain_text(output: &str) -> Option<GpuMetrics> {
    let mut model = GENERIC_MODEL.to_string();
    let mut memory_total: u64 = 0;
    let mut utilization = 0.0;
    let mut temperature = 0.0;

    for line in output.lines() {
        let lower = line.to_lowercase();

        if lower.contains("card") || lower.contains("gpu") {
            if let Some(spec) = specs::match_model(&lower) {
                model = spec.model.to_string();
                memory_total = spec.memory_total_bytes;
            } else if lower.contains("radeon") {
                model = "AMD Radeon Graphics".to_string();
                memory_total = DEFAULT_MEMORY_TOTAL_BYTES;
            }
        }
        if lower.contains("memory") || lower.contains("vram") {
            if let Some(captures) = MEMORY_PATTERN.captures(&lower) {
                if let Ok(value) = captures[1].parse::<u64>() {
                    memory_total = match &captures[2] {
                        "gb" => value.saturating_mul(GIB),
                        "mb" => value.saturating_mul(MIB),
                        _ => value,
                    };
                }
            }
        }
        if lower.contains("use") || lower.contains("utilization") {
            if let Some(captures) = PERCENT_PATTERN.captures(&lower) {
                if let Ok(value) = captures[1].parse::<f64>() {
                    utilization = value;
                }
            }
        }
        if lower.contains("temp") {
            if let Some(captures) = TEMPERATURE_PATTERN.captures(&lower) {
                if let Ok(value) = captures[1].parse::<f64>() {
                    temperature = value;
                }
            }
        }
    }

    if memory_total == 0 && model == GENERIC_MODEL {
        return None;
    }

    Some(GpuMetrics {
        model,
        vendor: GpuVendor::Amd,
        memory_total,
        memory_used: 0,
        memory_free: memory_total,
        memory_percent: 0.0,
        utilization,
        memory_utilization: utilization,
        temperature,
        power_draw: None,
        graphics_clock: None,
        memory_clock: None,
    })
}
