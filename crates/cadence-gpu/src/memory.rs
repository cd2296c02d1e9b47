//! Device memory for render attachments.
//!
//! Swapchain images are owned by the presentation engine; every other
//! attachment a frame renders into (depth buffers today) is allocated here.

use crate::error::{GpuError, Result};
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::{AllocatorDebugSettings, MemoryLocation};
use std::sync::Arc;
use tracing::debug;

/// Shape of a 2D, single-sample, optimally tiled attachment.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentDesc {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    /// Allocation label shown in leak reports.
    pub name: &'static str,
}

impl AttachmentDesc {
    /// A depth(-stencil) attachment of `format` covering `extent`.
    pub fn depth(extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            name: "depth attachment",
        }
    }

    fn image_create_info(&self) -> vk::ImageCreateInfo<'static> {
        vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }
}

/// An attachment image bound to its device-local allocation.
#[derive(Debug)]
pub struct AttachmentImage {
    pub image: vk::Image,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    allocation: Allocation,
}

/// `gpu-allocator` wrapper owned by the [`GpuContext`](crate::GpuContext).
pub struct GpuAllocator {
    allocator: Option<Allocator>,
    device: Arc<ash::Device>,
}

impl GpuAllocator {
    /// # Safety
    /// The instance, device, and physical device must be valid and outlive
    /// the allocator.
    pub(crate) unsafe fn new(
        instance: &ash::Instance,
        device: Arc<ash::Device>,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: (*device).clone(),
            physical_device,
            debug_settings: AllocatorDebugSettings {
                log_leaks_on_shutdown: true,
                store_stack_traces: cfg!(debug_assertions),
                ..Default::default()
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        Ok(Self {
            allocator: Some(allocator),
            device,
        })
    }

    /// Create and bind an attachment image.
    ///
    /// Nothing is left behind on failure.
    pub fn create_attachment(&mut self, desc: &AttachmentDesc) -> Result<AttachmentImage> {
        let allocator = self.allocator.as_mut().ok_or(GpuError::AllocatorShutDown)?;

        // SAFETY: the device is live while the allocator exists.
        let image = unsafe { self.device.create_image(&desc.image_create_info(), None)? };
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let allocation = match allocator.allocate(&AllocationCreateDesc {
            name: desc.name,
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                // SAFETY: the image has no memory bound and was never used.
                unsafe { self.device.destroy_image(image, None) };
                return Err(e.into());
            }
        };

        // SAFETY: the allocation satisfies the image's requirements.
        let bound = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            // SAFETY: never used by the device.
            unsafe { self.device.destroy_image(image, None) };
            allocator.free(allocation)?;
            return Err(e.into());
        }

        debug!(
            name = desc.name,
            format = ?desc.format,
            width = desc.extent.width,
            height = desc.extent.height,
            "Allocated attachment"
        );

        Ok(AttachmentImage {
            image,
            format: desc.format,
            extent: desc.extent,
            allocation,
        })
    }

    /// Destroy `attachment` and return its memory.
    ///
    /// The device must no longer use the image.
    pub fn free_attachment(&mut self, attachment: AttachmentImage) -> Result<()> {
        // SAFETY: ownership of the image is consumed here.
        unsafe { self.device.destroy_image(attachment.image, None) };
        self.allocator
            .as_mut()
            .ok_or(GpuError::AllocatorShutDown)?
            .free(attachment.allocation)?;
        Ok(())
    }

    /// Release the allocator. Outstanding allocations are reported as leaks.
    ///
    /// Must run before the device is destroyed.
    pub(crate) fn shutdown(&mut self) {
        drop(self.allocator.take());
    }
}

impl Drop for GpuAllocator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_attachment_desc() {
        let extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        let desc = AttachmentDesc::depth(extent, vk::Format::D32_SFLOAT);
        let info = desc.image_create_info();

        assert_eq!(info.format, vk::Format::D32_SFLOAT);
        assert_eq!((info.extent.width, info.extent.height, info.extent.depth), (640, 480, 1));
        assert_eq!(info.usage, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(info.tiling, vk::ImageTiling::OPTIMAL);
    }
}
