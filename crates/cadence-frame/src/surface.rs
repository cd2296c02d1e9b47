//! The window-side collaborator of the frame loop.

use ash::vk;

/// Source of drawable extents and resize notifications.
///
/// Implemented by the platform layer for real windows and by test doubles.
pub trait SurfaceProvider {
    /// Current drawable size in pixels. Zero in either dimension while minimised.
    fn extent(&self) -> vk::Extent2D;

    /// Whether the window was resized since the flag was last reset.
    fn was_resized(&self) -> bool;

    /// Clear the resize flag.
    fn reset_resized_flag(&mut self);

    /// Block until window events arrive (or a poll interval elapses).
    fn wait_events(&mut self);
}

/// Whether `extent` can back a swapchain.
pub fn is_presentable(extent: vk::Extent2D) -> bool {
    extent.width > 0 && extent.height > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presentable_extents() {
        assert!(is_presentable(vk::Extent2D { width: 1, height: 1 }));
        assert!(!is_presentable(vk::Extent2D { width: 0, height: 600 }));
        assert!(!is_presentable(vk::Extent2D { width: 800, height: 0 }));
    }
}
