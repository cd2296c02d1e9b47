//! Swapchain status codes shared by acquire and submit.

use crate::error::{FrameError, Result};
use ash::vk;
use cadence_gpu::GpuError;

/// Three-way outcome of acquire and submit/present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainStatus {
    /// The chain matches the surface.
    Success,
    /// Still usable, but the surface no longer matches exactly.
    Suboptimal,
    /// The surface no longer matches; the chain must be rebuilt.
    OutOfDate,
}

impl SwapchainStatus {
    /// Build a status from the `suboptimal` flag Vulkan returns on success.
    pub fn from_suboptimal(suboptimal: bool) -> Self {
        if suboptimal {
            Self::Suboptimal
        } else {
            Self::Success
        }
    }

    /// Whether the chain should be rebuilt after this frame.
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, Self::Success)
    }

    /// Classify the result of a present call.
    pub(crate) fn from_present(operation: &'static str, result: cadence_gpu::Result<bool>) -> Result<Self> {
        match result {
            Ok(suboptimal) => Ok(Self::from_suboptimal(suboptimal)),
            Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR)) => Ok(Self::OutOfDate),
            Err(e) => Err(FrameError::runtime(operation, e)),
        }
    }
}

/// Outcome of acquiring the next presentable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    /// An image is available; rendering may proceed.
    Ready { image_index: u32, suboptimal: bool },
    /// No image was acquired; the chain must be rebuilt.
    OutOfDate,
}

impl AcquiredImage {
    /// Classify the result of an acquire call.
    pub(crate) fn from_acquire(result: cadence_gpu::Result<(u32, bool)>) -> Result<Self> {
        match result {
            Ok((image_index, suboptimal)) => Ok(Self::Ready {
                image_index,
                suboptimal,
            }),
            Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR)) => Ok(Self::OutOfDate),
            Err(e) => Err(FrameError::runtime("acquire_next_image", e)),
        }
    }

    /// The status of this acquisition.
    pub fn status(&self) -> SwapchainStatus {
        match self {
            Self::Ready { suboptimal, .. } => SwapchainStatus::from_suboptimal(*suboptimal),
            Self::OutOfDate => SwapchainStatus::OutOfDate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_results() {
        assert_eq!(
            SwapchainStatus::from_present("present", Ok(false)).ok(),
            Some(SwapchainStatus::Success)
        );
        assert_eq!(
            SwapchainStatus::from_present("present", Ok(true)).ok(),
            Some(SwapchainStatus::Suboptimal)
        );
        assert_eq!(
            SwapchainStatus::from_present(
                "present",
                Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR))
            )
            .ok(),
            Some(SwapchainStatus::OutOfDate)
        );
        assert!(matches!(
            SwapchainStatus::from_present(
                "present",
                Err(GpuError::Vulkan(vk::Result::ERROR_SURFACE_LOST_KHR))
            ),
            Err(FrameError::Vulkan { .. })
        ));
    }

    #[test]
    fn acquire_results() {
        let ready = AcquiredImage::from_acquire(Ok((2, true))).ok();
        assert_eq!(
            ready,
            Some(AcquiredImage::Ready {
                image_index: 2,
                suboptimal: true
            })
        );
        assert_eq!(
            ready.map(|r| r.status()),
            Some(SwapchainStatus::Suboptimal)
        );

        let stale =
            AcquiredImage::from_acquire(Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR)));
        assert_eq!(stale.ok(), Some(AcquiredImage::OutOfDate));

        let timeout = AcquiredImage::from_acquire(Err(GpuError::Vulkan(vk::Result::TIMEOUT)));
        assert!(matches!(timeout, Err(FrameError::Timeout { .. })));
    }

    #[test]
    fn rebuild_needed_for_stale_statuses() {
        assert!(!SwapchainStatus::Success.needs_rebuild());
        assert!(SwapchainStatus::Suboptimal.needs_rebuild());
        assert!(SwapchainStatus::OutOfDate.needs_rebuild());
    }
}
