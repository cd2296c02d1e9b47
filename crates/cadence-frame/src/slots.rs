//! Per-image and per-frame resource bundles owned by a presentation chain.

use crate::backend::PresentBackend;
use crate::error::{ChainFormats, FrameError, Result};
use ash::vk;

/// Depth attachment of one image slot.
#[derive(Debug, Clone, Copy)]
pub struct DepthTarget {
    pub image: vk::Image,
    pub view: vk::ImageView,
}

/// Resources for one swapchain image.
#[derive(Debug)]
pub struct ImageSlot {
    /// Owned by the swapchain; never destroyed directly.
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub depth: Option<DepthTarget>,
    pub framebuffer: vk::Framebuffer,
    /// Sync slot whose fence guards the last submission that rendered here.
    pub(crate) in_flight_frame: Option<usize>,
}

impl ImageSlot {
    /// Create the view, depth target and framebuffer for `image`.
    ///
    /// Partially created resources are released before an error is returned.
    pub(crate) fn create<B: PresentBackend>(
        backend: &B,
        image: vk::Image,
        formats: ChainFormats,
        extent: vk::Extent2D,
        render_pass: vk::RenderPass,
    ) -> Result<Self> {
        let mut slot = Self {
            image,
            view: vk::ImageView::null(),
            depth: None,
            framebuffer: vk::Framebuffer::null(),
            in_flight_frame: None,
        };

        match slot.populate(backend, formats, extent, render_pass) {
            Ok(()) => Ok(slot),
            Err(e) => {
                // SAFETY: nothing created here has been used by the device.
                unsafe {
                    slot.destroy_framebuffer(backend);
                    slot.destroy_depth(backend);
                    slot.destroy_view(backend);
                }
                Err(e)
            }
        }
    }

    fn populate<B: PresentBackend>(
        &mut self,
        backend: &B,
        formats: ChainFormats,
        extent: vk::Extent2D,
        render_pass: vk::RenderPass,
    ) -> Result<()> {
        // SAFETY: `image` belongs to a live swapchain.
        self.view = unsafe {
            backend.create_image_view(self.image, formats.color, vk::ImageAspectFlags::COLOR)
        }
        .map_err(|e| FrameError::creation("swapchain image view", e))?;

        if let Some(format) = formats.depth {
            let image = backend
                .create_depth_image(extent, format)
                .map_err(|e| FrameError::creation("depth image", e))?;

            // SAFETY: `image` was just created.
            let view = match unsafe { backend.create_image_view(image, format, depth_aspect(format)) } {
                Ok(view) => view,
                Err(e) => {
                    // SAFETY: never used by the device.
                    unsafe { backend.destroy_depth_image(image) };
                    return Err(FrameError::creation("depth image view", e));
                }
            };
            self.depth = Some(DepthTarget { image, view });
        }

        let mut attachments = vec![self.view];
        attachments.extend(self.depth.map(|depth| depth.view));

        // SAFETY: the render pass and views are live.
        self.framebuffer = unsafe { backend.create_framebuffer(render_pass, &attachments, extent) }
            .map_err(|e| FrameError::creation("framebuffer", e))?;

        Ok(())
    }

    /// # Safety
    /// The framebuffer must not be in use by the device.
    pub(crate) unsafe fn destroy_framebuffer<B: PresentBackend>(&mut self, backend: &B) {
        if self.framebuffer != vk::Framebuffer::null() {
            unsafe { backend.destroy_framebuffer(self.framebuffer) };
            self.framebuffer = vk::Framebuffer::null();
        }
    }

    /// # Safety
    /// The depth target must not be in use by the device.
    pub(crate) unsafe fn destroy_depth<B: PresentBackend>(&mut self, backend: &B) {
        if let Some(depth) = self.depth.take() {
            unsafe {
                backend.destroy_image_view(depth.view);
                backend.destroy_depth_image(depth.image);
            }
        }
    }

    /// # Safety
    /// The colour view must not be in use by the device.
    pub(crate) unsafe fn destroy_view<B: PresentBackend>(&mut self, backend: &B) {
        if self.view != vk::ImageView::null() {
            unsafe { backend.destroy_image_view(self.view) };
            self.view = vk::ImageView::null();
        }
    }
}

/// Synchronization for one frame in flight.
#[derive(Debug, Clone, Copy)]
pub struct SyncSlot {
    /// Signaled when the acquired image is ready to be rendered to.
    pub image_available: vk::Semaphore,
    /// Signaled when rendering finished; presentation waits on it.
    pub render_finished: vk::Semaphore,
    /// Signaled when the slot's last submission retired. Created signaled.
    pub in_flight: vk::Fence,
}

impl SyncSlot {
    pub(crate) fn create<B: PresentBackend>(backend: &B) -> Result<Self> {
        let image_available = backend
            .create_semaphore()
            .map_err(|e| FrameError::creation("image available semaphore", e))?;

        let render_finished = match backend.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(e) => {
                // SAFETY: never used by the device.
                unsafe { backend.destroy_semaphore(image_available) };
                return Err(FrameError::creation("render finished semaphore", e));
            }
        };

        let in_flight = match backend.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                // SAFETY: never used by the device.
                unsafe {
                    backend.destroy_semaphore(render_finished);
                    backend.destroy_semaphore(image_available);
                }
                return Err(FrameError::creation("in-flight fence", e));
            }
        };

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// # Safety
    /// No operation on these primitives may be pending.
    pub(crate) unsafe fn destroy<B: PresentBackend>(&self, backend: &B) {
        unsafe {
            backend.destroy_semaphore(self.render_finished);
            backend.destroy_semaphore(self.image_available);
            backend.destroy_fence(self.in_flight);
        }
    }
}

/// View aspect for a depth attachment of `format`.
pub fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D16_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stencil_formats_include_stencil_aspect() {
        assert_eq!(
            depth_aspect(vk::Format::D32_SFLOAT),
            vk::ImageAspectFlags::DEPTH
        );
        assert!(depth_aspect(vk::Format::D24_UNORM_S8_UINT).contains(vk::ImageAspectFlags::STENCIL));
    }
}
