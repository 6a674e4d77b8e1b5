pub const GIB: u64 = 1024 * 1024 * 1024;

/// Fallback VRAM size when a GPU reports no usable total.
pub const DEFAULT_MEMORY_TOTAL_BYTES: u64 = 8 * GIB;

/// Published figures for accelerators whose management tools are known to
/// under-report. Matched by substring against reported model names.
#[derive(Debug, Clone, Copy)]
pub struct StaticGpuSpec {
    pub marker: &'static str,
    pub model: &'static str,
    pub memory_total_bytes: u64,
    pub memory_bandwidth_gbs: u32,
    pub compute_units: u32,
    pub clock_mhz: u32,
}

pub const KNOWN_GPUS: &[StaticGpuSpec] = &[
    StaticGpuSpec {
        marker: "mi300",
        model: "MI300X",
        memory_total_bytes: 192 * GIB,
        memory_bandwidth_gbs: 5300,
        compute_units: 304,
        clock_mhz: 1700,
    },
    StaticGpuSpec {
        marker: "mi250",
        model: "MI250X",
        memory_total_bytes: 128 * GIB,
        memory_bandwidth_gbs: 3277,
        compute_units: 220,
        clock_mhz: 1700,
    },
    StaticGpuSpec {
        marker: "mi210",
        model: "MI210",
        memory_total_bytes: 64 * GIB,
        memory_bandwidth_gbs: 1638,
        compute_units: 104,
        clock_mhz: 1700,
    },
    StaticGpuSpec {
        marker: "strix",
        model: "AMD Strix Halo (RDNA 3.5)",
        memory_total_bytes: 16 * GIB,
        memory_bandwidth_gbs: 256,
        compute_units: 40,
        clock_mhz: 2900,
    },
    StaticGpuSpec {
        marker: "halo",
        model: "AMD Strix Halo (RDNA 3.5)",
        memory_total_bytes: 16 * GIB,
        memory_bandwidth_gbs: 256,
        compute_units: 40,
        clock_mhz: 2900,
    },
];

/// Looks up the first known accelerator whose marker appears in `model`,
/// case-insensitively.
pub fn match_model(model: &str) -> Option<&'static StaticGpuSpec> {
    let needle = model.to_lowercase();
    KNOWN_GPUS.iter().find(|spec| needle.contains(spec.marker))
}
