//! Command pool for per-frame command buffers.

use crate::error::Result;
use ash::vk;

/// A resettable pool on one queue family.
///
/// Buffers are reset individually when re-recorded, so each frame slot can
/// reuse its buffer once that slot's fence has signaled.
pub struct CommandPool {
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandPool {
    /// # Safety
    /// The device must be valid and `queue_family` must exist on it.
    pub(crate) unsafe fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.create_command_pool(&create_info, None)? };
        Ok(Self { pool, queue_family })
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Allocate `count` primary command buffers.
    ///
    /// # Safety
    /// `device` must be the device this pool was created on.
    pub unsafe fn allocate_primary(
        &self,
        device: &ash::Device,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { device.allocate_command_buffers(&allocate_info)? };
        Ok(buffers)
    }

    /// # Safety
    /// `device` must be the device this pool was created on, and none of the
    /// buffers may be pending execution.
    pub unsafe fn free(&self, device: &ash::Device, buffers: &[vk::CommandBuffer]) {
        if !buffers.is_empty() {
            unsafe { device.free_command_buffers(self.pool, buffers) };
        }
    }

    /// # Safety
    /// No buffer from this pool may be pending execution.
    pub(crate) unsafe fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_command_pool(self.pool, None) };
    }
}
