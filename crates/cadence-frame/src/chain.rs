//! The presentation chain: one swapchain with its per-image resources,
//! render pass and per-frame synchronization.

use crate::backend::PresentBackend;
use crate::config::FrameConfig;
use crate::error::{ChainFormats, FrameError, Result};
use crate::slots::{ImageSlot, SyncSlot};
use crate::status::{AcquiredImage, SwapchainStatus};
use ash::vk;
use cadence_gpu::{
    calculate_extent, select_image_count, select_present_mode, select_surface_format,
    SwapchainDesc,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A swapchain and everything needed to render into and present its images.
///
/// Image resources (views, depth targets, framebuffers) are sized to the
/// swapchain's image count and rebuilt with it. Sync slots are sized to the
/// configured frames in flight and move from chain to chain on rebuild.
///
/// Dropping a chain destroys its resources immediately; the device must not be
/// using any of them.
pub struct PresentationChain<B: PresentBackend> {
    backend: Arc<B>,
    swapchain: vk::SwapchainKHR,
    surface_format: vk::SurfaceFormatKHR,
    formats: ChainFormats,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    render_pass: vk::RenderPass,
    images: Vec<ImageSlot>,
    sync: Vec<SyncSlot>,
    fence_timeout_ns: u64,
}

impl<B: PresentBackend> PresentationChain<B> {
    /// Build a chain for a window of `window_extent`, with fresh sync slots.
    ///
    /// Fails with [`FrameError::TooManyFramesInFlight`] when the swapchain
    /// has fewer images than the configured frames in flight.
    pub fn new(backend: Arc<B>, config: &FrameConfig, window_extent: vk::Extent2D) -> Result<Self> {
        config.validate()?;

        let mut chain = Self::build(backend, config, window_extent, None)?;
        if config.frames_in_flight > chain.image_count() {
            return Err(FrameError::TooManyFramesInFlight {
                frames_in_flight: config.frames_in_flight,
                image_count: chain.image_count(),
            });
        }
        for _ in 0..config.frames_in_flight {
            let slot = SyncSlot::create(chain.backend.as_ref())?;
            chain.sync.push(slot);
        }

        info!(
            images = chain.image_count(),
            frames_in_flight = chain.frames_in_flight(),
            width = chain.extent.width,
            height = chain.extent.height,
            format = ?chain.formats.color,
            present_mode = ?chain.present_mode,
            "Presentation chain created"
        );

        Ok(chain)
    }

    /// Build a replacement for `previous`.
    ///
    /// `previous`'s swapchain is retired into the new one and its sync slots
    /// are moved over, so the number of frames in flight never changes.
    /// `previous` keeps its image resources and swapchain until it is dropped,
    /// which the caller does once the device no longer uses them.
    ///
    /// Fails with [`FrameError::FormatChanged`] before creating anything when
    /// the surface now negotiates different formats. On any error `previous`
    /// is left intact.
    pub fn from_previous(
        previous: &mut Self,
        config: &FrameConfig,
        window_extent: vk::Extent2D,
    ) -> Result<Self> {
        let backend = Arc::clone(&previous.backend);
        let mut chain = Self::build(backend, config, window_extent, Some(&*previous))?;
        chain.sync = std::mem::take(&mut previous.sync);

        // Frames in flight are fixed, so a shrinking surface can leave fewer
        // images than sync slots. Per-image fence tracking keeps that safe.
        if chain.frames_in_flight() > chain.image_count() {
            warn!(
                frames_in_flight = chain.frames_in_flight(),
                images = chain.image_count(),
                "Rebuilt chain has fewer images than frames in flight"
            );
        }

        info!(
            previous_images = previous.image_count(),
            images = chain.image_count(),
            width = chain.extent.width,
            height = chain.extent.height,
            "Presentation chain rebuilt"
        );

        Ok(chain)
    }

    fn build(
        backend: Arc<B>,
        config: &FrameConfig,
        window_extent: vk::Extent2D,
        previous: Option<&Self>,
    ) -> Result<Self> {
        let support = backend
            .surface_support()
            .map_err(|e| FrameError::creation("surface support query", e))?;

        let surface_format =
            select_surface_format(&support.formats).ok_or(FrameError::NoSurfaceFormat)?;
        if support.present_modes.is_empty() {
            return Err(FrameError::NoPresentMode);
        }
        let present_mode = select_present_mode(&support.present_modes, config.vsync);

        let depth = if config.depth_buffer {
            Some(backend.depth_format().ok_or(FrameError::NoDepthFormat)?)
        } else {
            None
        };
        let formats = ChainFormats {
            color: surface_format.format,
            depth,
        };

        if let Some(previous) = previous {
            if previous.formats != formats {
                return Err(FrameError::FormatChanged {
                    previous: previous.formats,
                    current: formats,
                });
            }
        }

        let desc = SwapchainDesc {
            surface_format,
            present_mode,
            extent: calculate_extent(
                &support.capabilities,
                window_extent.width,
                window_extent.height,
            ),
            min_image_count: select_image_count(&support.capabilities),
            pre_transform: support.capabilities.current_transform,
        };
        debug!(?desc, "Negotiated swapchain");

        let old_swapchain = previous.map_or(vk::SwapchainKHR::null(), |p| p.swapchain);

        // Resources are attached as they are created so that an early return
        // drops (and destroys) exactly what exists.
        let mut chain = Self {
            backend,
            swapchain: vk::SwapchainKHR::null(),
            surface_format,
            formats,
            present_mode,
            extent: desc.extent,
            render_pass: vk::RenderPass::null(),
            images: Vec::new(),
            sync: Vec::new(),
            fence_timeout_ns: config.fence_timeout_ns(),
        };

        // SAFETY: `old_swapchain` is null or owned by the live previous chain.
        chain.swapchain = unsafe { chain.backend.create_swapchain(&desc, old_swapchain) }
            .map_err(|e| FrameError::creation("swapchain", e))?;

        // SAFETY: the swapchain was just created.
        let images = unsafe { chain.backend.swapchain_images(chain.swapchain) }
            .map_err(|e| FrameError::creation("swapchain images", e))?;

        chain.render_pass = chain
            .backend
            .create_render_pass(formats.color, formats.depth)
            .map_err(|e| FrameError::creation("render pass", e))?;

        for image in images {
            let slot = ImageSlot::create(
                chain.backend.as_ref(),
                image,
                formats,
                chain.extent,
                chain.render_pass,
            )?;
            chain.images.push(slot);
        }

        Ok(chain)
    }

    /// Wait for `frame_index`'s previous submission to retire, then acquire
    /// the next image, signalling that slot's image-available semaphore.
    ///
    /// The slot's fence is left signaled; it is reset at submission so an
    /// out-of-date acquire never strands an unsignaled fence.
    ///
    /// # Panics
    /// If `frame_index >= self.frames_in_flight()`.
    pub fn acquire_next_image(&self, frame_index: usize) -> Result<AcquiredImage> {
        let sync = self.sync[frame_index];

        // SAFETY: the fence belongs to a sync slot owned by this chain.
        unsafe {
            self.backend
                .wait_for_fence(sync.in_flight, self.fence_timeout_ns)
        }
        .map_err(|e| FrameError::runtime("wait for frame fence", e))?;

        // SAFETY: swapchain and semaphore are live; the semaphore's previous
        // signal was consumed by the submission the fence just retired.
        let result = unsafe {
            self.backend.acquire_next_image(
                self.swapchain,
                sync.image_available,
                self.fence_timeout_ns,
            )
        };
        AcquiredImage::from_acquire(result)
    }

    /// Submit `cmd` for `image_index` using `frame_index`'s sync slot, then
    /// present the image.
    ///
    /// If another frame slot last rendered into this image, its fence is
    /// waited first.
    ///
    /// # Panics
    /// If either index is out of range.
    pub fn submit_command_buffers(
        &mut self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        frame_index: usize,
    ) -> Result<SwapchainStatus> {
        let sync = self.sync[frame_index];
        let slot = image_index as usize;

        if let Some(owner) = self.images[slot]
            .in_flight_frame
            .filter(|&owner| owner != frame_index)
        {
            // SAFETY: `owner` indexes a sync slot of this chain.
            unsafe {
                self.backend
                    .wait_for_fence(self.sync[owner].in_flight, self.fence_timeout_ns)
            }
            .map_err(|e| FrameError::runtime("wait for image fence", e))?;
        }
        self.images[slot].in_flight_frame = Some(frame_index);

        // SAFETY: the fence was waited in `acquire_next_image` and is not pending.
        unsafe { self.backend.reset_fence(sync.in_flight) }
            .map_err(|e| FrameError::runtime("reset frame fence", e))?;

        // SAFETY: `cmd` finished recording; primitives belong to this chain.
        unsafe {
            self.backend.submit(
                cmd,
                sync.image_available,
                sync.render_finished,
                sync.in_flight,
            )
        }
        .map_err(|e| FrameError::runtime("queue submit", e))?;

        // SAFETY: the image was acquired and its render-finished semaphore is pending.
        let result = unsafe {
            self.backend
                .present(self.swapchain, image_index, sync.render_finished)
        };
        SwapchainStatus::from_present("queue present", result)
    }

    /// Number of swapchain images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Number of sync slots.
    pub fn frames_in_flight(&self) -> usize {
        self.sync.len()
    }

    /// Swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn width(&self) -> u32 {
        self.extent.width
    }

    pub fn height(&self) -> u32 {
        self.extent.height
    }

    /// Width over height.
    pub fn extent_aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// Colour format of the swapchain images.
    pub fn color_format(&self) -> vk::Format {
        self.formats.color
    }

    /// Depth attachment format, `None` when the chain has no depth buffer.
    pub fn depth_format(&self) -> Option<vk::Format> {
        self.formats.depth
    }

    pub fn formats(&self) -> ChainFormats {
        self.formats
    }

    /// Whether `other` was built with the same colour and depth formats.
    pub fn compare_formats(&self, other: &Self) -> bool {
        self.formats == other.formats
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Framebuffer for `image_index`.
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.images
            .get(image_index as usize)
            .map(|slot| slot.framebuffer)
    }

    /// Colour view for `image_index`.
    pub fn image_view(&self, image_index: u32) -> Option<vk::ImageView> {
        self.images.get(image_index as usize).map(|slot| slot.view)
    }

    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Sync slot for `frame_index`.
    pub fn sync_slot(&self, frame_index: usize) -> Option<&SyncSlot> {
        self.sync.get(frame_index)
    }

    /// The backend this chain was built on.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: PresentBackend> Drop for PresentationChain<B> {
    fn drop(&mut self) {
        let backend = Arc::clone(&self.backend);
        let backend = backend.as_ref();

        // SAFETY: the owner guarantees the device has finished with this chain.
        unsafe {
            for slot in &mut self.images {
                slot.destroy_framebuffer(backend);
            }
            for slot in &mut self.images {
                slot.destroy_depth(backend);
            }
            for slot in &mut self.images {
                slot.destroy_view(backend);
            }
            if self.render_pass != vk::RenderPass::null() {
                backend.destroy_render_pass(self.render_pass);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                backend.destroy_swapchain(self.swapchain);
            }
            for sync in self.sync.drain(..) {
                sync.destroy(backend);
            }
        }

        debug!("Presentation chain destroyed");
    }
}
