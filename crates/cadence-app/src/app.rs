//! `FrameApp` trait definition.

use crate::context::AppContext;
use crate::frame::FrameContext;
use cadence_frame::RebuildEvent;
use winit::event::WindowEvent;

/// Trait for Cadence applications.
///
/// The framework owns the window, device and frame loop. Each frame it calls
/// [`update`](Self::update), opens the render pass, calls
/// [`render`](Self::render), then closes the pass and presents.
pub trait FrameApp: Sized {
    /// Initialize the application.
    ///
    /// Called once after the window, device and first swapchain exist.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// # Arguments
    /// * `ctx` - Application context
    /// * `dt` - Delta time in seconds since last frame
    fn update(&mut self, ctx: &mut AppContext, dt: f32);

    /// Record a frame.
    ///
    /// The render pass is already open on `frame.command_buffer`, with the
    /// viewport and scissor covering the whole extent. Do not end it.
    fn render(&mut self, ctx: &AppContext, frame: &FrameContext) -> anyhow::Result<()>;

    /// Called after the swapchain was rebuilt.
    ///
    /// Recreate per-image or size-dependent resources here. The device is
    /// idle when this is called.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn on_rebuild(&mut self, ctx: &mut AppContext, event: RebuildEvent) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle window events.
    ///
    /// Return `true` if the event was handled and should not be processed
    /// further.
    ///
    /// Default implementation does nothing and returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup resources before shutdown. The device is idle.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
