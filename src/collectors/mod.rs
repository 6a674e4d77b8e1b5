pub mod system;

use chrono::Utc;

use crate::gpu::GpuSupport;
use crate::snapshot::Snapshot;

/// Assembles full snapshots out of the individual readers.
pub struct MetricsAggregator {
    gpu: GpuSupport,
    nvidia_device_index: u32,
}

impl MetricsAggregator {
    pub fn new(gpu: GpuSupport, nvidia_device_index: u32) -> Self {
        MetricsAggregator {
            gpu,
            nvidia_device_index,
        }
    }

    pub fn gpu(&self) -> &GpuSupport {
        &self.gpu
    }

    /// Builds one fresh snapshot. Individual readers degrade to defaults or
    /// absent fields; the snapshot itself always materializes.
    pub async fn collect_snapshot(&self) -> Snapshot {
        Snapshot {
            timestamp: Utc::now(),
            cpu: system::collect_cpu().await,
            memory: system::collect_memory(),
            gpu: self.gpu.collect(self.nvidia_device_index).await,
            battery: system::collect_battery(),
        }
    }
}
