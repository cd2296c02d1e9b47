//! [`PresentBackend`] over a real Vulkan device and window surface.

use crate::backend::PresentBackend;
use crate::error::{FrameError, Result as FrameResult};
use ash::vk;
use cadence_gpu::swapchain::{acquire_next_image, create_swapchain, present};
use cadence_gpu::{
    find_supported_format, AttachmentDesc, AttachmentImage, GpuContext, GpuError, Result,
    SurfaceCapabilities, SurfaceContext, SwapchainDesc,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Depth formats tried in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Vulkan device plus the window surface it presents to.
pub struct VulkanBackend {
    depth_images: Mutex<HashMap<vk::Image, AttachmentImage>>,
    surface: SurfaceContext,
    gpu: GpuContext,
}

impl VulkanBackend {
    /// Wrap a device and surface, checking the graphics queue can present.
    pub fn new(gpu: GpuContext, surface: SurfaceContext) -> FrameResult<Self> {
        let family = gpu.graphics_queue_family();
        match surface.supports_present(&gpu, family) {
            Ok(true) => {}
            outcome => {
                // SAFETY: nothing has been created against the surface yet.
                unsafe { surface.destroy() };
                return Err(match outcome {
                    Err(e) => FrameError::Gpu(e),
                    Ok(_) => FrameError::Gpu(GpuError::PresentNotSupported(family)),
                });
            }
        }

        debug!(queue_family = family, "Surface presentation supported");

        Ok(Self {
            depth_images: Mutex::new(HashMap::new()),
            surface,
            gpu,
        })
    }

    /// The device context.
    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// The window surface.
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    fn device(&self) -> &ash::Device {
        self.gpu.device()
    }
}

impl PresentBackend for VulkanBackend {
    fn surface_support(&self) -> Result<SurfaceCapabilities> {
        self.surface.query_support(&self.gpu)
    }

    fn depth_format(&self) -> Option<vk::Format> {
        // SAFETY: instance and physical device live as long as `self.gpu`.
        unsafe {
            find_supported_format(
                self.gpu.instance(),
                self.gpu.physical_device(),
                &DEPTH_FORMAT_CANDIDATES,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
        }
    }

    unsafe fn create_swapchain(
        &self,
        desc: &SwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<vk::SwapchainKHR> {
        unsafe {
            create_swapchain(
                &self.surface.swapchain_fn,
                self.surface.handle,
                desc,
                old_swapchain,
                self.gpu.graphics_queue_family(),
            )
        }
    }

    unsafe fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        let images = unsafe {
            self.surface
                .swapchain_fn
                .get_swapchain_images(swapchain)?
        };
        Ok(images)
    }

    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe {
            self.surface
                .swapchain_fn
                .destroy_swapchain(swapchain, None);
        }
    }

    unsafe fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { self.device().create_image_view(&create_info, None)? };
        Ok(view)
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device().destroy_image_view(view, None) };
    }

    fn create_depth_image(&self, extent: vk::Extent2D, format: vk::Format) -> Result<vk::Image> {
        let attachment = self
            .gpu
            .allocator()
            .lock()
            .create_attachment(&AttachmentDesc::depth(extent, format))?;

        let handle = attachment.image;
        self.depth_images.lock().insert(handle, attachment);
        Ok(handle)
    }

    unsafe fn destroy_depth_image(&self, image: vk::Image) {
        let Some(attachment) = self.depth_images.lock().remove(&image) else {
            warn!(?image, "Destroying unknown depth image");
            return;
        };
        if let Err(e) = self.gpu.allocator().lock().free_attachment(attachment) {
            warn!("Failed to free depth image: {e}");
        }
    }

    fn create_render_pass(
        &self,
        color: vk::Format,
        depth: Option<vk::Format>,
    ) -> Result<vk::RenderPass> {
        let mut attachments = vec![vk::AttachmentDescription::default()
            .format(color)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

        if let Some(depth) = depth {
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(depth)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
        }

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if depth.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }

        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            );

        let subpasses = [subpass];
        let dependencies = [dependency];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        // SAFETY: the create info only references locals that outlive the call.
        let render_pass = unsafe { self.device().create_render_pass(&create_info, None)? };
        Ok(render_pass)
    }

    unsafe fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device().destroy_render_pass(render_pass, None) };
    }

    unsafe fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { self.device().create_framebuffer(&create_info, None)? };
        Ok(framebuffer)
    }

    unsafe fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device().destroy_framebuffer(framebuffer, None) };
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::default();
        // SAFETY: the device lives as long as `self.gpu`.
        let semaphore = unsafe { self.device().create_semaphore(&create_info, None)? };
        Ok(semaphore)
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device().destroy_semaphore(semaphore, None) };
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        // SAFETY: the device lives as long as `self.gpu`.
        let fence = unsafe { self.device().create_fence(&create_info, None)? };
        Ok(fence)
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device().destroy_fence(fence, None) };
    }

    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    unsafe fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        unsafe { self.device().wait_for_fences(&[fence], true, timeout_ns)? };
        Ok(())
    }

    unsafe fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        unsafe { self.device().reset_fences(&[fence])? };
        Ok(())
    }

    fn allocate_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        // SAFETY: the pool and device live as long as `self.gpu`.
        unsafe { self.gpu.command_pool().allocate_primary(self.device(), count) }
    }

    unsafe fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        unsafe { self.gpu.command_pool().free(self.device(), command_buffers) };
    }

    unsafe fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        // Recorded once per frame, then resubmitted only after re-recording.
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device().begin_command_buffer(cmd, &begin_info)? };
        Ok(())
    }

    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { self.device().end_command_buffer(cmd)? };
        Ok(())
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        unsafe {
            self.device()
                .cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    unsafe fn cmd_set_viewport_and_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device().cmd_set_viewport(cmd, 0, &[viewport]);
            self.device().cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device().cmd_end_render_pass(cmd) };
    }

    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<(u32, bool)> {
        unsafe {
            acquire_next_image(
                &self.surface.swapchain_fn,
                swapchain,
                semaphore,
                timeout_ns,
            )
        }
    }

    unsafe fn submit(
        &self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()> {
        let command_buffers = [cmd];
        let wait_semaphores = [wait];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [signal];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device()
                .queue_submit(self.gpu.graphics_queue(), &[submit_info], fence)?;
        }
        Ok(())
    }

    unsafe fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<bool> {
        unsafe {
            present(
                &self.surface.swapchain_fn,
                self.gpu.graphics_queue(),
                swapchain,
                image_index,
                &[wait],
            )
        }
    }

    fn wait_idle(&self) -> Result<()> {
        self.gpu.wait_idle()
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        let _ = self.gpu.wait_idle();

        let leaked: Vec<_> = self.depth_images.lock().drain().map(|(_, image)| image).collect();
        if !leaked.is_empty() {
            warn!(count = leaked.len(), "Freeing depth images still alive at shutdown");
        }
        for attachment in leaked {
            let _ = self.gpu.allocator().lock().free_attachment(attachment);
        }

        // SAFETY: every swapchain created against the surface has been destroyed
        // by its presentation chain; the device is idle.
        unsafe { self.surface.destroy() };
    }
}
