//! Frame pacing configuration.

use crate::error::{FrameError, Result};
use std::time::Duration;

/// Configuration for the presentation chain and frame orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    /// Number of frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Prefer FIFO presentation over mailbox/immediate.
    pub vsync: bool,
    /// Give every image a depth attachment.
    pub depth_buffer: bool,
    /// Upper bound for fence waits and image acquisition.
    pub fence_timeout: Duration,
    /// Colour attachment clear value.
    pub clear_color: [f32; 4],
    /// Depth attachment clear value.
    pub clear_depth: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            vsync: false,
            depth_buffer: true,
            fence_timeout: Duration::from_secs(5),
            clear_color: [0.01, 0.01, 0.01, 1.0],
            clear_depth: 1.0,
        }
    }
}

impl FrameConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable the depth attachment.
    pub fn with_depth_buffer(mut self, depth: bool) -> Self {
        self.depth_buffer = depth;
        self
    }

    /// Set the fence/acquire timeout.
    pub fn with_fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = timeout;
        self
    }

    /// Set the colour clear value.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set the depth clear value.
    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.clear_depth = depth;
        self
    }

    /// Fence timeout in nanoseconds, saturating at `u64::MAX`.
    pub fn fence_timeout_ns(&self) -> u64 {
        u64::try_from(self.fence_timeout.as_nanos()).unwrap_or(u64::MAX)
    }

    /// Reject configurations the frame loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(FrameError::ZeroFramesInFlight);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FrameConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert!(config.depth_buffer);
        assert_eq!(config.clear_color, [0.01, 0.01, 0.01, 1.0]);
        assert_eq!(config.fence_timeout_ns(), 5_000_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder() {
        let config = FrameConfig::new()
            .with_frames_in_flight(3)
            .with_vsync(true)
            .with_depth_buffer(false)
            .with_fence_timeout(Duration::from_millis(16))
            .with_clear_color([1.0, 0.0, 0.0, 1.0])
            .with_clear_depth(0.0);
        assert_eq!(config.frames_in_flight, 3);
        assert!(config.vsync);
        assert!(!config.depth_buffer);
        assert_eq!(config.fence_timeout_ns(), 16_000_000);
        assert_eq!(config.clear_depth, 0.0);
    }

    #[test]
    fn zero_frames_rejected() {
        let config = FrameConfig::new().with_frames_in_flight(0);
        assert!(matches!(
            config.validate(),
            Err(FrameError::ZeroFramesInFlight)
        ));
    }

    #[test]
    fn huge_timeout_saturates() {
        let config = FrameConfig::new().with_fence_timeout(Duration::MAX);
        assert_eq!(config.fence_timeout_ns(), u64::MAX);
    }
}
