//! A simulated device implementing [`PresentBackend`].
//!
//! Submissions stay pending until their fence is waited or the device is
//! waited idle, at which point the simulated GPU "completes" them. Misuse a
//! real driver would punish (re-recording a pending command buffer, resetting
//! a pending fence, destroying unknown handles) is recorded as a violation
//! instead of crashing.

use ash::vk::{self, Handle};
use cadence_frame::PresentBackend;
use cadence_gpu::{GpuError, Result, SurfaceCapabilities, SwapchainDesc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::trace;

/// Static description of the simulated surface and device.
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub min_image_count: u32,
    /// 0 means unbounded.
    pub max_image_count: u32,
    pub color_format: vk::Format,
    pub depth_format: Option<vk::Format>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            min_image_count: 2,
            max_image_count: 0,
            color_format: vk::Format::B8G8R8A8_SRGB,
            depth_format: Some(vk::Format::D32_SFLOAT),
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Submission {
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
}

#[derive(Debug)]
struct SwapchainState {
    images: Vec<vk::Image>,
    next_image: u32,
}

#[derive(Debug, Default)]
struct Counters {
    swapchains_created: usize,
    acquires: usize,
    submits: usize,
    presents: usize,
    wait_idles: usize,
}

#[derive(Debug, Default)]
struct State {
    next_handle: u64,
    calls: Vec<&'static str>,
    live: HashSet<u64>,
    swapchains: HashMap<vk::SwapchainKHR, SwapchainState>,
    fences: HashMap<vk::Fence, bool>,
    pending: Vec<Submission>,
    max_pending: usize,
    violations: Vec<String>,
    acquire_script: VecDeque<Result<bool>>,
    present_script: VecDeque<Result<bool>>,
    fence_timeouts: usize,
    counters: Counters,
}

impl State {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create(&mut self) -> u64 {
        let raw = self.handle();
        self.live.insert(raw);
        raw
    }

    fn destroy(&mut self, what: &str, raw: u64) {
        if !self.live.remove(&raw) {
            self.violations
                .push(format!("destroyed unknown or already destroyed {what} {raw:#x}"));
        }
    }

    fn complete(&mut self, fence: vk::Fence) -> bool {
        let before = self.pending.len();
        self.pending.retain(|s| s.fence != fence);
        let completed = self.pending.len() != before;
        if completed {
            self.fences.insert(fence, true);
        }
        completed
    }

    fn complete_all(&mut self) {
        for submission in std::mem::take(&mut self.pending) {
            self.fences.insert(submission.fence, true);
        }
    }

    fn is_pending_cmd(&self, cmd: vk::CommandBuffer) -> bool {
        self.pending.iter().any(|s| s.cmd == cmd)
    }

    fn is_pending_fence(&self, fence: vk::Fence) -> bool {
        self.pending.iter().any(|s| s.fence == fence)
    }
}

/// Simulated GPU for exercising the frame loop without a device.
#[derive(Debug)]
pub struct MockBackend {
    config: Mutex<MockConfig>,
    state: Mutex<State>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl MockBackend {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Mutex::new(config),
            state: Mutex::new(State::default()),
        }
    }

    fn log(&self, call: &'static str) -> parking_lot::MutexGuard<'_, State> {
        trace!(call, "mock backend");
        let mut state = self.state.lock();
        state.calls.push(call);
        state
    }

    // Scripting

    /// Make the next acquire return `result` instead of an image.
    pub fn fail_next_acquire(&self, result: vk::Result) {
        self.state
            .lock()
            .acquire_script
            .push_back(Err(GpuError::Vulkan(result)));
    }

    /// Make the next acquire succeed but report the swapchain suboptimal.
    pub fn suboptimal_next_acquire(&self) {
        self.state.lock().acquire_script.push_back(Ok(true));
    }

    /// Make the next present return `result`.
    pub fn fail_next_present(&self, result: vk::Result) {
        self.state
            .lock()
            .present_script
            .push_back(Err(GpuError::Vulkan(result)));
    }

    /// Make the next present succeed but report the swapchain suboptimal.
    pub fn suboptimal_next_present(&self) {
        self.state.lock().present_script.push_back(Ok(true));
    }

    /// Make the next `count` fence waits time out.
    pub fn time_out_fence_waits(&self, count: usize) {
        self.state.lock().fence_timeouts += count;
    }

    /// Change the colour format the surface reports from now on.
    pub fn set_color_format(&self, format: vk::Format) {
        self.config.lock().color_format = format;
    }

    /// Change the minimum image count the surface reports from now on.
    pub fn set_min_image_count(&self, count: u32) {
        self.config.lock().min_image_count = count;
    }

    // Inspection

    /// Calls made since creation or the last [`clear_calls`](Self::clear_calls).
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// How many times `call` appears in the call log.
    pub fn call_count(&self, call: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Misuse detected so far.
    pub fn violations(&self) -> Vec<String> {
        self.state.lock().violations.clone()
    }

    /// Submissions the simulated GPU has not completed yet.
    pub fn pending_submissions(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Highest number of simultaneously pending submissions observed.
    pub fn max_pending_submissions(&self) -> usize {
        self.state.lock().max_pending
    }

    /// Objects created and not yet destroyed.
    pub fn live_objects(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn swapchains_created(&self) -> usize {
        self.state.lock().counters.swapchains_created
    }

    pub fn acquires(&self) -> usize {
        self.state.lock().counters.acquires
    }

    pub fn submits(&self) -> usize {
        self.state.lock().counters.submits
    }

    pub fn presents(&self) -> usize {
        self.state.lock().counters.presents
    }

    pub fn wait_idles(&self) -> usize {
        self.state.lock().counters.wait_idles
    }
}

impl PresentBackend for MockBackend {
    fn surface_support(&self) -> Result<SurfaceCapabilities> {
        drop(self.log("surface_support"));
        let config = self.config.lock();
        Ok(SurfaceCapabilities {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: config.min_image_count,
                max_image_count: config.max_image_count,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 16384,
                    height: 16384,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: config.color_format,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: config.present_modes.clone(),
        })
    }

    fn depth_format(&self) -> Option<vk::Format> {
        drop(self.log("depth_format"));
        self.config.lock().depth_format
    }

    unsafe fn create_swapchain(
        &self,
        desc: &SwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<vk::SwapchainKHR> {
        let mut state = self.log("create_swapchain");
        if old_swapchain != vk::SwapchainKHR::null()
            && !state.swapchains.contains_key(&old_swapchain)
        {
            state
                .violations
                .push("old swapchain is not live".to_string());
        }

        let swapchain = vk::SwapchainKHR::from_raw(state.create());
        let images = (0..desc.min_image_count)
            .map(|_| {
                let raw = state.handle();
                vk::Image::from_raw(raw)
            })
            .collect();
        state.swapchains.insert(
            swapchain,
            SwapchainState {
                images,
                next_image: 0,
            },
        );
        state.counters.swapchains_created += 1;
        Ok(swapchain)
    }

    unsafe fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        let state = self.log("swapchain_images");
        state
            .swapchains
            .get(&swapchain)
            .map(|s| s.images.clone())
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_UNKNOWN))
    }

    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.log("destroy_swapchain");
        state.swapchains.remove(&swapchain);
        state.destroy("swapchain", swapchain.as_raw());
    }

    unsafe fn create_image_view(
        &self,
        _image: vk::Image,
        _format: vk::Format,
        _aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let mut state = self.log("create_image_view");
        Ok(vk::ImageView::from_raw(state.create()))
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        self.log("destroy_image_view")
            .destroy("image view", view.as_raw());
    }

    fn create_depth_image(&self, _extent: vk::Extent2D, _format: vk::Format) -> Result<vk::Image> {
        let mut state = self.log("create_depth_image");
        Ok(vk::Image::from_raw(state.create()))
    }

    unsafe fn destroy_depth_image(&self, image: vk::Image) {
        self.log("destroy_depth_image")
            .destroy("depth image", image.as_raw());
    }

    fn create_render_pass(
        &self,
        _color: vk::Format,
        _depth: Option<vk::Format>,
    ) -> Result<vk::RenderPass> {
        let mut state = self.log("create_render_pass");
        Ok(vk::RenderPass::from_raw(state.create()))
    }

    unsafe fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.log("destroy_render_pass")
            .destroy("render pass", render_pass.as_raw());
    }

    unsafe fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _attachments: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let mut state = self.log("create_framebuffer");
        Ok(vk::Framebuffer::from_raw(state.create()))
    }

    unsafe fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.log("destroy_framebuffer")
            .destroy("framebuffer", framebuffer.as_raw());
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let mut state = self.log("create_semaphore");
        Ok(vk::Semaphore::from_raw(state.create()))
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.log("destroy_semaphore")
            .destroy("semaphore", semaphore.as_raw());
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let mut state = self.log("create_fence");
        let fence = vk::Fence::from_raw(state.create());
        state.fences.insert(fence, signaled);
        Ok(fence)
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.log("destroy_fence");
        if state.is_pending_fence(fence) {
            state
                .violations
                .push("destroyed a fence with a pending submission".to_string());
        }
        state.fences.remove(&fence);
        state.destroy("fence", fence.as_raw());
    }

    unsafe fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> Result<()> {
        let mut state = self.log("wait_for_fence");
        if state.fence_timeouts > 0 {
            state.fence_timeouts -= 1;
            return Err(GpuError::Vulkan(vk::Result::TIMEOUT));
        }
        if state.fences.get(&fence).copied().unwrap_or(false) || state.complete(fence) {
            Ok(())
        } else {
            // Unsignaled with nothing pending would block forever on a real device.
            Err(GpuError::Vulkan(vk::Result::TIMEOUT))
        }
    }

    unsafe fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        let mut state = self.log("reset_fence");
        if state.is_pending_fence(fence) {
            state
                .violations
                .push("reset a fence with a pending submission".to_string());
        }
        state.fences.insert(fence, false);
        Ok(())
    }

    fn allocate_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let mut state = self.log("allocate_command_buffers");
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(state.create()))
            .collect())
    }

    unsafe fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        let mut state = self.log("free_command_buffers");
        for &cmd in command_buffers {
            if state.is_pending_cmd(cmd) {
                state
                    .violations
                    .push("freed a pending command buffer".to_string());
            }
            state.destroy("command buffer", cmd.as_raw());
        }
    }

    unsafe fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let mut state = self.log("begin_command_buffer");
        if state.is_pending_cmd(cmd) {
            state
                .violations
                .push(format!("re-recorded pending command buffer {:#x}", cmd.as_raw()));
        }
        Ok(())
    }

    unsafe fn end_command_buffer(&self, _cmd: vk::CommandBuffer) -> Result<()> {
        drop(self.log("end_command_buffer"));
        Ok(())
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        _cmd: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        _framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        _clear_values: &[vk::ClearValue],
    ) {
        drop(self.log("cmd_begin_render_pass"));
    }

    unsafe fn cmd_set_viewport_and_scissor(&self, _cmd: vk::CommandBuffer, _extent: vk::Extent2D) {
        drop(self.log("cmd_set_viewport_and_scissor"));
    }

    unsafe fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {
        drop(self.log("cmd_end_render_pass"));
    }

    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _semaphore: vk::Semaphore,
        _timeout_ns: u64,
    ) -> Result<(u32, bool)> {
        let mut state = self.log("acquire_next_image");
        state.counters.acquires += 1;

        let suboptimal = match state.acquire_script.pop_front() {
            Some(Err(e)) => return Err(e),
            Some(Ok(suboptimal)) => suboptimal,
            None => false,
        };

        let chain = state
            .swapchains
            .get_mut(&swapchain)
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_SURFACE_LOST_KHR))?;
        let count = u32::try_from(chain.images.len()).unwrap_or(u32::MAX).max(1);
        let index = chain.next_image;
        chain.next_image = (index + 1) % count;
        Ok((index, suboptimal))
    }

    unsafe fn submit(
        &self,
        cmd: vk::CommandBuffer,
        _wait: vk::Semaphore,
        _signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()> {
        let mut state = self.log("submit");
        if state.fences.get(&fence).copied().unwrap_or(false) {
            state
                .violations
                .push("submitted with a signaled fence".to_string());
        }
        if state.is_pending_cmd(cmd) {
            state
                .violations
                .push("submitted a command buffer that is already pending".to_string());
        }
        state.pending.push(Submission { cmd, fence });
        state.max_pending = state.max_pending.max(state.pending.len());
        state.counters.submits += 1;
        Ok(())
    }

    unsafe fn present(
        &self,
        _swapchain: vk::SwapchainKHR,
        _image_index: u32,
        _wait: vk::Semaphore,
    ) -> Result<bool> {
        let mut state = self.log("present");
        state.counters.presents += 1;
        state.present_script.pop_front().unwrap_or(Ok(false))
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.log("wait_idle");
        state.complete_all();
        state.counters.wait_idles += 1;
        Ok(())
    }
}
