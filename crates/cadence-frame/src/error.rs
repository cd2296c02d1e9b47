//! Frame lifecycle error types.
//!
//! Stale-swapchain conditions are not errors; they surface as
//! [`SwapchainStatus`](crate::SwapchainStatus) values and are absorbed by the
//! orchestrator. Everything here terminates the frame loop.

use ash::vk;
use cadence_gpu::GpuError;
use thiserror::Error;

/// Broad classification of a [`FrameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A collaborator broke its contract (formats, creation failures).
    Configuration,
    /// The caller broke the begin/end protocol.
    Protocol,
    /// The device stalled, was lost, or returned an unexpected code.
    Device,
}

/// Colour and depth formats a chain was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainFormats {
    pub color: vk::Format,
    pub depth: Option<vk::Format>,
}

/// Misuse of the frame protocol by the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("begin_frame called while a frame is already in progress")]
    FrameAlreadyActive,

    #[error("{operation} called while no frame is in progress")]
    FrameNotActive { operation: &'static str },

    #[error("{operation} called with a command buffer from a different frame")]
    ForeignCommandBuffer { operation: &'static str },

    #[error("begin_render_pass called twice in the same frame")]
    RenderPassAlreadyOpen,

    #[error("end_render_pass called without a matching begin_render_pass")]
    RenderPassNotOpen,

    #[error("end_frame called while the render pass is still open")]
    RenderPassStillOpen,
}

/// Fatal frame lifecycle errors.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Rebuilt chain negotiated different formats than the chain it replaces.
    #[error("Swapchain formats changed from {previous:?} to {current:?}")]
    FormatChanged {
        previous: ChainFormats,
        current: ChainFormats,
    },

    /// Surface reports no formats.
    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,

    /// Surface reports no present modes.
    #[error("Surface reports no supported present modes")]
    NoPresentMode,

    /// None of the depth format candidates is usable as an attachment.
    #[error("No supported depth format")]
    NoDepthFormat,

    /// Frames in flight configured as zero.
    #[error("Frames in flight must be at least 1")]
    ZeroFramesInFlight,

    /// More frames in flight than the first chain has images.
    #[error("{frames_in_flight} frames in flight exceed the {image_count} swapchain images")]
    TooManyFramesInFlight {
        frames_in_flight: usize,
        image_count: usize,
    },

    /// A chain or frame resource could not be created.
    #[error("Failed to create {what}: {source}")]
    ResourceCreation {
        what: &'static str,
        #[source]
        source: GpuError,
    },

    /// GPU collaborator error outside of a frame operation.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    /// Frame protocol misuse.
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// The device was lost.
    #[error("Device lost during {operation}")]
    DeviceLost { operation: &'static str },

    /// A bounded wait expired.
    #[error("Timed out during {operation}")]
    Timeout { operation: &'static str },

    /// Any other unexpected Vulkan result.
    #[error("Vulkan error during {operation}: {result}")]
    Vulkan {
        operation: &'static str,
        result: vk::Result,
    },
}

impl FrameError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FormatChanged { .. }
            | Self::NoSurfaceFormat
            | Self::NoPresentMode
            | Self::NoDepthFormat
            | Self::ZeroFramesInFlight
            | Self::TooManyFramesInFlight { .. }
            | Self::ResourceCreation { .. }
            | Self::Gpu(_) => ErrorKind::Configuration,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::DeviceLost { .. } | Self::Timeout { .. } | Self::Vulkan { .. } => {
                ErrorKind::Device
            }
        }
    }

    /// Map an error returned while driving a frame (waits, submits, recording).
    pub(crate) fn runtime(operation: &'static str, error: GpuError) -> Self {
        match error {
            GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST) => Self::DeviceLost { operation },
            GpuError::Vulkan(vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
                Self::Timeout { operation }
            }
            GpuError::Vulkan(result) => Self::Vulkan { operation, result },
            other => Self::Gpu(other),
        }
    }

    /// Map an error returned while creating a resource.
    pub(crate) fn creation(what: &'static str, error: GpuError) -> Self {
        match error {
            GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST) => {
                Self::DeviceLost { operation: what }
            }
            source => Self::ResourceCreation { what, source },
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_mapping() {
        assert!(matches!(
            FrameError::runtime("wait", GpuError::Vulkan(vk::Result::TIMEOUT)),
            FrameError::Timeout { operation: "wait" }
        ));
        assert!(matches!(
            FrameError::runtime("submit", GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST)),
            FrameError::DeviceLost { .. }
        ));
        assert!(matches!(
            FrameError::runtime(
                "submit",
                GpuError::Vulkan(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
            ),
            FrameError::Vulkan {
                result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
                ..
            }
        ));
    }

    #[test]
    fn kinds() {
        let protocol = FrameError::from(ProtocolViolation::RenderPassNotOpen);
        assert_eq!(protocol.kind(), ErrorKind::Protocol);

        let creation = FrameError::creation(
            "render pass",
            GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
        );
        assert_eq!(creation.kind(), ErrorKind::Configuration);

        let lost = FrameError::creation("fence", GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
        assert_eq!(lost.kind(), ErrorKind::Device);

        let formats = ChainFormats {
            color: vk::Format::B8G8R8A8_SRGB,
            depth: Some(vk::Format::D32_SFLOAT),
        };
        let changed = FrameError::FormatChanged {
            previous: formats,
            current: ChainFormats {
                color: vk::Format::R8G8B8A8_UNORM,
                ..formats
            },
        };
        assert_eq!(changed.kind(), ErrorKind::Configuration);

        let too_many = FrameError::TooManyFramesInFlight {
            frames_in_flight: 5,
            image_count: 3,
        };
        assert_eq!(too_many.kind(), ErrorKind::Configuration);
    }
}
