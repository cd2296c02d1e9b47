//! Device-level errors.

use ash::vk;
use gpu_allocator::AllocationError;
use raw_window_handle::HandleError;
use thiserror::Error;

/// Errors raised by the device collaborator.
///
/// Raw `vk::Result` codes are kept intact in [`GpuError::Vulkan`] so that
/// callers can tell stale swapchains, timeouts and device loss apart.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("Vulkan loader unavailable: {0}")]
    Loading(String),

    #[error("No device has a Vulkan 1.1 graphics queue that can present to the surface")]
    NoSuitableDevice,

    #[error("Device memory allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Allocator used after shutdown")]
    AllocatorShutDown,

    #[error("Window handle unavailable: {0}")]
    WindowHandle(#[from] HandleError),

    #[error("Queue family {0} cannot present to the surface")]
    PresentNotSupported(u32),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GpuError {
    /// The Vulkan result code, if this error carries one.
    pub fn vk_result(&self) -> Option<vk::Result> {
        match self {
            Self::Vulkan(result) => Some(*result),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vulkan_codes_are_preserved() {
        let err = GpuError::from(vk::Result::ERROR_OUT_OF_DATE_KHR);
        assert_eq!(err.vk_result(), Some(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert_eq!(GpuError::NoSuitableDevice.vk_result(), None);
    }

    #[test]
    fn window_handle_errors_convert() {
        let err = GpuError::from(HandleError::Unavailable);
        assert!(matches!(err, GpuError::WindowHandle(HandleError::Unavailable)));
        let source = std::error::Error::source(&err).expect("handle error source");
        assert_eq!(source.to_string(), HandleError::Unavailable.to_string());
    }

    #[test]
    fn present_support_names_the_family() {
        let message = GpuError::PresentNotSupported(3).to_string();
        assert!(message.contains("Queue family 3"), "{message}");
    }
}
