//! Window integration for the Cadence frame pacer.
//!
//! Provides window configuration, GPU and surface creation for winit windows,
//! and [`WindowSurface`], the [`SurfaceProvider`] the frame orchestrator polls
//! for extents and resize notifications.

use ash::vk;
use cadence_frame::SurfaceProvider;
use cadence_gpu::{GpuContext, GpuContextBuilder, GpuError, SurfaceContext};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::window::{Window, WindowAttributes};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Surface creation failed: {0}")]
    Surface(#[from] GpuError),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    /// How long to sleep between extent polls while the window is minimised.
    pub extent_poll_interval: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Cadence".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
            extent_poll_interval: Duration::from_millis(10),
        }
    }
}

impl PlatformConfig {
    /// Window attributes for this configuration.
    pub fn window_attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(LogicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }
}

/// Create the GPU context and a Vulkan surface for `window`, selecting a
/// queue family that can present to it.
pub fn create_gpu_for_window(
    builder: GpuContextBuilder,
    window: &Window,
) -> Result<(GpuContext, SurfaceContext)> {
    // SAFETY: the window outlives the surface; callers destroy the surface
    // before dropping the window.
    let (gpu, surface) = unsafe { builder.build_with_surface(window)? };
    Ok((gpu, surface))
}

/// Convert a physical window size to a Vulkan extent.
pub fn physical_to_extent(size: PhysicalSize<u32>) -> vk::Extent2D {
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

/// A winit window as seen by the frame orchestrator.
///
/// The resize flag is raised by the event loop via
/// [`notify_resized`](Self::notify_resized) and cleared by the orchestrator
/// once it has rebuilt the chain.
pub struct WindowSurface {
    window: Arc<Window>,
    resized: bool,
    poll_interval: Duration,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>, poll_interval: Duration) -> Self {
        Self {
            window,
            resized: false,
            poll_interval,
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Record that the window size changed.
    pub fn notify_resized(&mut self) {
        self.resized = true;
    }

    /// Whether the window currently has no drawable area.
    pub fn is_minimized(&self) -> bool {
        !cadence_frame::is_presentable(self.extent())
    }
}

impl SurfaceProvider for WindowSurface {
    fn extent(&self) -> vk::Extent2D {
        physical_to_extent(self.window.inner_size())
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_events(&mut self) {
        // The event loop is driving this call, so events cannot be pumped here;
        // sleep and let the next size query observe the restored window.
        trace!(interval = ?self.poll_interval, "Waiting for presentable window size");
        std::thread::sleep(self.poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlatformConfig::default();
        assert_eq!(config.title, "Cadence");
        assert!(config.resizable);
        assert_eq!(config.extent_poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn physical_size_to_extent() {
        let extent = physical_to_extent(PhysicalSize::new(1920, 1080));
        assert_eq!((extent.width, extent.height), (1920, 1080));

        let minimised = physical_to_extent(PhysicalSize::new(0, 0));
        assert!(!cadence_frame::is_presentable(minimised));
    }

    #[test]
    fn surface_errors_convert() {
        let err = PlatformError::from(GpuError::PresentNotSupported(1));
        assert!(matches!(err, PlatformError::Surface(GpuError::PresentNotSupported(1))));
        assert!(err.to_string().starts_with("Surface creation failed"));
    }
}
