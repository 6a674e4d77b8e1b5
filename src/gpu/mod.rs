pub mod amd;
pub mod nvidia;
pub mod report;
pub mod specs;

use tracing::info;

use crate::snapshot::GpuMetrics;

use self::amd::AmdAdapter;
use self::nvidia::NvidiaAdapter;

/// Vendor capabilities, probed once at process start and never re-probed.
pub struct GpuSupport {
    nvidia: Option<NvidiaAdapter>,
    amd: Option<AmdAdapter>,
}

impl GpuSupport {
    pub async fn detect() -> Self {
        let support = GpuSupport {
            nvidia: NvidiaAdapter::probe(),
            amd: AmdAdapter::probe().await,
        };
        info!(
            nvidia = support.nvidia_available(),
            rocm = support.rocm_available(),
            gpu_support = support.label(),
            "gpu capabilities probed"
        );
        support
    }

    /// A support value with no vendor present, for wiring up tests.
    pub fn unavailable() -> Self {
        GpuSupport {
            nvidia: None,
            amd: None,
        }
    }

    pub fn nvidia_available(&self) -> bool {
        self.nvidia.is_some()
    }

    pub fn rocm_available(&self) -> bool {
        self.amd.is_some()
    }

    pub fn amd(&self) -> Option<&AmdAdapter> {
        self.amd.as_ref()
    }

    pub fn label(&self) -> &'static str {
        if self.nvidia.is_some() {
            "NVIDIA"
        } else if self.amd.is_some() {
            "AMD/ROCm"
        } else {
            "None"
        }
    }

    /// One GPU record per snapshot. NVIDIA is consulted first; AMD gets a
    /// turn whenever NVIDIA yielded nothing.
    pub async fn collect(&self, nvidia_device_index: u32) -> Option<GpuMetrics> {
        if let Some(nvidia) = &self.nvidia {
            if let Some(metrics) = nvidia.metrics(nvidia_device_index) {
                return Some(metrics);
            }
        }
        if let Some(amd) = &self.amd {
            return amd.metrics().await;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_support_collects_nothing() {
        let support = GpuSupport::unavailable();
        assert!(!support.nvidia_available());
        assert!(!support.rocm_available());
        assert_eq!(support.label(), "None");
        assert!(support.collect(0).await.is_none());
    }
}
