//! Frame orchestrator: the begin/end protocol over a presentation chain.
//!
//! A frame is driven as
//!
//! ```text
//! begin_frame -> begin_render_pass -> (record) -> end_render_pass -> end_frame
//! ```
//!
//! `begin_frame` returns `None` when the swapchain was out of date; the chain
//! has already been rebuilt and the caller simply skips the frame. Protocol
//! violations are rejected before any device call and leave the state as it
//! was, except for a render pass left open at `end_frame`: the frame is still
//! finished and the violation reported afterwards.

use crate::backend::PresentBackend;
use crate::chain::PresentationChain;
use crate::config::FrameConfig;
use crate::error::{FrameError, ProtocolViolation, Result};
use crate::frame::{FrameCommandBuffer, FrameInfo, RebuildEvent};
use crate::status::AcquiredImage;
use crate::surface::{is_presentable, SurfaceProvider};
use ash::vk;
use cadence_gpu::GpuError;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Where the orchestrator is in the frame protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No frame in progress.
    Idle,
    /// An image is acquired and the frame's command buffer is recording.
    Active,
}

/// Drives the acquire / record / submit / present cycle and rebuilds the
/// presentation chain when the surface changes.
pub struct FrameOrchestrator<B: PresentBackend, S: SurfaceProvider> {
    chain: PresentationChain<B>,
    /// One per sync slot, indexed by frame index.
    command_buffers: Vec<vk::CommandBuffer>,
    backend: Arc<B>,
    surface: S,
    config: FrameConfig,
    state: FrameState,
    render_pass_open: bool,
    frame_index: usize,
    image_index: u32,
    frames_begun: u64,
    rebuild_count: u64,
    last_rebuild: Option<RebuildEvent>,
}

impl<B: PresentBackend, S: SurfaceProvider> FrameOrchestrator<B, S> {
    /// Build the first chain and allocate one command buffer per frame in flight.
    ///
    /// Blocks while the surface reports a zero extent.
    pub fn new(backend: Arc<B>, mut surface: S, config: FrameConfig) -> Result<Self> {
        config.validate()?;

        let extent = Self::wait_for_presentable_extent(&mut surface);
        let chain = PresentationChain::new(Arc::clone(&backend), &config, extent)?;

        let mut orchestrator = Self {
            chain,
            command_buffers: Vec::new(),
            backend,
            surface,
            config,
            state: FrameState::Idle,
            render_pass_open: false,
            frame_index: 0,
            image_index: 0,
            frames_begun: 0,
            rebuild_count: 0,
            last_rebuild: None,
        };
        orchestrator.ensure_command_buffers()?;

        Ok(orchestrator)
    }

    /// Start a frame.
    ///
    /// Waits for the current frame slot to retire, acquires an image and
    /// begins its command buffer. Returns `None` when the swapchain was out of
    /// date; it has been rebuilt and no frame was started.
    ///
    /// The returned buffer is only accepted until this frame ends.
    pub fn begin_frame(&mut self) -> Result<Option<FrameCommandBuffer>> {
        if self.state == FrameState::Active {
            return Err(ProtocolViolation::FrameAlreadyActive.into());
        }

        let image_index = match self.chain.acquire_next_image(self.frame_index)? {
            AcquiredImage::Ready {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    trace!(image_index, "Acquired image from suboptimal swapchain");
                }
                image_index
            }
            AcquiredImage::OutOfDate => {
                debug!("Swapchain out of date on acquire");
                self.rebuild()?;
                return Ok(None);
            }
        };

        let cmd = self.command_buffers[self.frame_index];
        // SAFETY: the fence guarding this buffer's last submission was waited in
        // `acquire_next_image`.
        unsafe { self.backend.begin_command_buffer(cmd) }
            .map_err(|e| FrameError::runtime("begin command buffer", e))?;

        let token = FrameCommandBuffer {
            handle: cmd,
            frame_number: self.frames_begun,
        };
        self.image_index = image_index;
        self.render_pass_open = false;
        self.frames_begun += 1;
        self.state = FrameState::Active;

        Ok(Some(token))
    }

    /// Begin the chain's render pass on `cmd` with the configured clear values,
    /// and set a full-extent viewport and scissor.
    pub fn begin_render_pass(&mut self, cmd: FrameCommandBuffer) -> Result<()> {
        self.check_recording(cmd, "begin_render_pass")?;
        let cmd = cmd.handle;
        if self.render_pass_open {
            return Err(ProtocolViolation::RenderPassAlreadyOpen.into());
        }

        let framebuffer = self
            .chain
            .framebuffer(self.image_index)
            .ok_or_else(|| {
                FrameError::Gpu(GpuError::InvalidState(format!(
                    "no framebuffer for image {}",
                    self.image_index
                )))
            })?;
        let extent = self.chain.extent();
        let clear_values = self.clear_values();
        let clear_values = if self.chain.depth_format().is_some() {
            &clear_values[..]
        } else {
            &clear_values[..1]
        };

        // SAFETY: `cmd` is recording outside a render pass; the framebuffer
        // belongs to the acquired image.
        unsafe {
            self.backend.cmd_begin_render_pass(
                cmd,
                self.chain.render_pass(),
                framebuffer,
                extent,
                clear_values,
            );
            self.backend.cmd_set_viewport_and_scissor(cmd, extent);
        }

        self.render_pass_open = true;
        Ok(())
    }

    /// End the render pass opened by [`begin_render_pass`](Self::begin_render_pass).
    pub fn end_render_pass(&mut self, cmd: FrameCommandBuffer) -> Result<()> {
        self.check_recording(cmd, "end_render_pass")?;
        if !self.render_pass_open {
            return Err(ProtocolViolation::RenderPassNotOpen.into());
        }

        // SAFETY: `cmd` is recording inside the render pass.
        unsafe { self.backend.cmd_end_render_pass(cmd.handle) };

        self.render_pass_open = false;
        Ok(())
    }

    /// Finish recording, submit and present.
    ///
    /// Rebuilds the chain when presentation reports it stale or the surface
    /// was resized. The orchestrator returns to idle and advances the frame
    /// index whether or not this succeeds.
    ///
    /// A render pass still open is closed and the frame submitted as usual;
    /// [`ProtocolViolation::RenderPassStillOpen`] is returned afterwards
    /// unless the submission itself failed.
    pub fn end_frame(&mut self) -> Result<()> {
        if self.state != FrameState::Active {
            return Err(ProtocolViolation::FrameNotActive {
                operation: "end_frame",
            }
            .into());
        }

        let cmd = self.command_buffers[self.frame_index];
        let left_open = std::mem::take(&mut self.render_pass_open);
        if left_open {
            warn!(frame_index = self.frame_index, "end_frame closing an open render pass");
            // SAFETY: `cmd` is recording inside the render pass.
            unsafe { self.backend.cmd_end_render_pass(cmd) };
        }

        let result = self.submit_frame(cmd);

        self.state = FrameState::Idle;
        self.frame_index = (self.frame_index + 1) % self.config.frames_in_flight;

        result?;
        if left_open {
            return Err(ProtocolViolation::RenderPassStillOpen.into());
        }
        Ok(())
    }

    fn submit_frame(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        // SAFETY: `cmd` is recording outside a render pass.
        unsafe { self.backend.end_command_buffer(cmd) }
            .map_err(|e| FrameError::runtime("end command buffer", e))?;

        let status = self
            .chain
            .submit_command_buffers(cmd, self.image_index, self.frame_index)?;

        let resized = self.surface.was_resized();
        if status.needs_rebuild() || resized {
            debug!(?status, resized, "Swapchain stale after present");
            self.surface.reset_resized_flag();
            self.rebuild()?;
        }

        Ok(())
    }

    fn check_recording(&self, cmd: FrameCommandBuffer, operation: &'static str) -> Result<()> {
        if self.state != FrameState::Active {
            return Err(ProtocolViolation::FrameNotActive { operation }.into());
        }
        if cmd.frame_number + 1 != self.frames_begun
            || cmd.handle != self.command_buffers[self.frame_index]
        {
            return Err(ProtocolViolation::ForeignCommandBuffer { operation }.into());
        }
        Ok(())
    }

    fn clear_values(&self) -> [vk::ClearValue; 2] {
        [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.config.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.config.clear_depth,
                    stencil: 0,
                },
            },
        ]
    }

    /// Replace the chain with one matching the surface's current extent.
    fn rebuild(&mut self) -> Result<()> {
        let extent = Self::wait_for_presentable_extent(&mut self.surface);

        self.backend
            .wait_idle()
            .map_err(|e| FrameError::runtime("wait idle before rebuild", e))?;

        let previous_image_count = self.chain.image_count();
        let replacement = PresentationChain::from_previous(&mut self.chain, &self.config, extent)?;
        // The device is idle, so the retired chain can go right away.
        drop(std::mem::replace(&mut self.chain, replacement));

        self.ensure_command_buffers()?;

        let event = RebuildEvent {
            previous_image_count,
            image_count: self.chain.image_count(),
            extent: self.chain.extent(),
        };
        if event.image_count_changed() {
            info!(
                previous = event.previous_image_count,
                current = event.image_count,
                "Swapchain image count changed"
            );
        }

        self.rebuild_count += 1;
        self.last_rebuild = Some(event);
        Ok(())
    }

    /// Poll the surface until it reports a non-zero extent.
    fn wait_for_presentable_extent(surface: &mut S) -> vk::Extent2D {
        let mut extent = surface.extent();
        let mut polls = 0u32;
        while !is_presentable(extent) {
            surface.wait_events();
            polls += 1;
            extent = surface.extent();
        }
        if polls > 0 {
            debug!(polls, width = extent.width, height = extent.height, "Surface presentable");
        }
        extent
    }

    /// Keep exactly one command buffer per sync slot.
    fn ensure_command_buffers(&mut self) -> Result<()> {
        let wanted = self.chain.frames_in_flight();
        if self.command_buffers.len() == wanted {
            return Ok(());
        }

        if !self.command_buffers.is_empty() {
            // SAFETY: only reached while the device is idle.
            unsafe { self.backend.free_command_buffers(&self.command_buffers) };
            self.command_buffers.clear();
        }

        let count = u32::try_from(wanted).map_err(|_| {
            FrameError::creation(
                "command buffers",
                GpuError::InvalidState(format!("{wanted} frames in flight")),
            )
        })?;
        self.command_buffers = self
            .backend
            .allocate_command_buffers(count)
            .map_err(|e| FrameError::creation("command buffers", e))?;

        debug!(count, "Allocated frame command buffers");
        Ok(())
    }

    /// Whether a frame is between `begin_frame` and `end_frame`.
    pub fn is_frame_in_progress(&self) -> bool {
        self.state == FrameState::Active
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Command buffer of the frame in progress.
    pub fn current_command_buffer(&self) -> Result<FrameCommandBuffer> {
        self.require_active("current_command_buffer")?;
        Ok(FrameCommandBuffer {
            handle: self.command_buffers[self.frame_index],
            frame_number: self.frames_begun - 1,
        })
    }

    /// Sync slot index of the frame in progress.
    pub fn frame_index(&self) -> Result<usize> {
        self.require_active("frame_index")?;
        Ok(self.frame_index)
    }

    /// Acquired image index of the frame in progress.
    pub fn image_index(&self) -> Result<u32> {
        self.require_active("image_index")?;
        Ok(self.image_index)
    }

    /// Everything recording code needs for the frame in progress.
    pub fn frame_info(&self, frame_time: f32) -> Result<FrameInfo> {
        self.require_active("frame_info")?;
        Ok(FrameInfo {
            command_buffer: self.command_buffers[self.frame_index],
            frame_index: self.frame_index,
            image_index: self.image_index,
            extent: self.chain.extent(),
            render_pass: self.chain.render_pass(),
            frame_time,
        })
    }

    fn require_active(&self, operation: &'static str) -> Result<()> {
        if self.state == FrameState::Active {
            Ok(())
        } else {
            Err(ProtocolViolation::FrameNotActive { operation }.into())
        }
    }

    /// Render pass compatible with every framebuffer of the current chain.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.chain.render_pass()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.chain.extent()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.chain.extent_aspect_ratio()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.config.frames_in_flight
    }

    pub fn chain(&self) -> &PresentationChain<B> {
        &self.chain
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Frames started so far, skipped frames excluded.
    pub fn frames_begun(&self) -> u64 {
        self.frames_begun
    }

    /// Number of chain rebuilds so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Take the most recent rebuild notification, if any.
    pub fn take_rebuild_event(&mut self) -> Option<RebuildEvent> {
        self.last_rebuild.take()
    }

    /// Change the colour the render pass clears to.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.config.clear_color = color;
    }

    /// Block until the device is idle.
    pub fn wait_idle(&self) -> Result<()> {
        self.backend
            .wait_idle()
            .map_err(|e| FrameError::runtime("wait idle", e))
    }
}

impl<B: PresentBackend, S: SurfaceProvider> Drop for FrameOrchestrator<B, S> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            warn!("Failed to wait for device idle on shutdown: {e}");
        }
        if !self.command_buffers.is_empty() {
            // SAFETY: the device is idle.
            unsafe { self.backend.free_command_buffers(&self.command_buffers) };
        }
    }
}
