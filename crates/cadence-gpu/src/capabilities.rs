//! GPU capability detection.

use ash::vk;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Minimum Vulkan API version accepted by the engine (1.1).
pub const MIN_API_VERSION: u32 = vk::API_VERSION_1_1;

/// Detected GPU capabilities.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Device name
    pub device_name: String,
    /// Device type (discrete, integrated, ...)
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version
    pub api_version: u32,
    /// Driver version
    pub driver_version: u32,
    /// Device-local memory in MB
    pub device_local_memory_mb: u64,
    /// Whether `VK_KHR_swapchain` is exposed by the device
    pub supports_swapchain: bool,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let (properties, memory_properties, extensions) = unsafe {
            (
                instance.get_physical_device_properties(physical_device),
                instance.get_physical_device_memory_properties(physical_device),
                instance
                    .enumerate_device_extension_properties(physical_device)
                    .unwrap_or_default(),
            )
        };

        let supports_swapchain = extensions.iter().any(|ext| {
            ext.extension_name_as_c_str()
                .is_ok_and(|name| name == ash::khr::swapchain::NAME)
        });

        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let device_local_memory_mb: u64 = memory_properties
            .memory_heaps
            .iter()
            .take(memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        Self {
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            driver_version: properties.driver_version,
            device_local_memory_mb,
            supports_swapchain,
        }
    }

    /// Check if the GPU can drive a presentation chain.
    pub fn meets_requirements(&self) -> bool {
        api_version_at_least(self.api_version, MIN_API_VERSION) && self.supports_swapchain
    }

    /// Get a human-readable summary of capabilities.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.device_name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.device_local_memory_mb,
        )
    }
}

/// Compare two packed API versions by major/minor only.
pub fn api_version_at_least(version: u32, minimum: u32) -> bool {
    let have = (vk::api_version_major(version), vk::api_version_minor(version));
    let need = (vk::api_version_major(minimum), vk::api_version_minor(minimum));
    have >= need
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(api_version: u32, supports_swapchain: bool) -> GpuCapabilities {
        GpuCapabilities {
            vendor: GpuVendor::Other(0),
            device_name: "test".to_string(),
            device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
            api_version,
            driver_version: 0,
            device_local_memory_mb: 512,
            supports_swapchain,
        }
    }

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn version_comparison_ignores_patch() {
        assert!(api_version_at_least(vk::make_api_version(0, 1, 1, 0), MIN_API_VERSION));
        assert!(api_version_at_least(vk::make_api_version(0, 1, 3, 250), MIN_API_VERSION));
        assert!(!api_version_at_least(vk::make_api_version(0, 1, 0, 99), MIN_API_VERSION));
    }

    #[test]
    fn requirements_need_swapchain_extension() {
        assert!(caps(vk::API_VERSION_1_2, true).meets_requirements());
        assert!(!caps(vk::API_VERSION_1_2, false).meets_requirements());
        assert!(!caps(vk::API_VERSION_1_0, true).meets_requirements());
    }
}
