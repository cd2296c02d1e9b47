//! Vulkan instance creation and physical device selection.

use crate::capabilities::{api_version_at_least, GpuCapabilities};
use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::{c_char, CStr, CString};

/// Engine name reported to the driver.
const ENGINE_NAME: &CStr = c"Cadence";

/// Required instance extensions for windowed presentation.
pub fn required_instance_extensions() -> Vec<&'static CStr> {
    let extensions = vec![
        ash::khr::surface::NAME,
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::xlib_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::wayland_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::ext::metal_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_enumeration::NAME,
    ];

    extensions
}

/// Validation layers to enable when requested.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Create a Vulkan instance.
///
/// Requested validation layers that the loader does not know about are
/// skipped with a warning instead of failing instance creation.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|e| GpuError::InvalidState(format!("Application name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(ENGINE_NAME)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_2);

    let extension_names: Vec<*const c_char> = required_instance_extensions()
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();

    let requested_layers = if enable_validation {
        validation_layers()
    } else {
        vec![]
    };

    let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
    let layers: Vec<&CStr> = requested_layers
        .into_iter()
        .filter(|layer| {
            let found = available_layers
                .iter()
                .any(|props| props.layer_name_as_c_str().is_ok_and(|name| name == *layer));
            if !found {
                tracing::warn!("Validation layer {:?} not available", layer);
            }
            found
        })
        .collect();

    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    let instance = unsafe { entry.create_instance(&create_info, None)? };

    Ok(instance)
}

/// Select the best physical device together with the queue family the
/// presentation chain will use.
///
/// `can_present(device, family)` reports whether a queue family can present
/// to the target surface. Devices without a graphics family that can present
/// are skipped.
///
/// # Safety
/// The instance must be valid.
pub unsafe fn select_physical_device<F>(
    instance: &ash::Instance,
    can_present: F,
) -> Result<(vk::PhysicalDevice, u32)>
where
    F: Fn(vk::PhysicalDevice, u32) -> bool,
{
    let devices = unsafe { instance.enumerate_physical_devices()? };

    devices
        .into_iter()
        .filter_map(|device| {
            let families =
                unsafe { instance.get_physical_device_queue_family_properties(device) };
            let Some(family) = select_queue_family(&families, |index| can_present(device, index))
            else {
                tracing::debug!(?device, "No graphics queue family can present, skipping");
                return None;
            };
            let score = unsafe { score_physical_device(instance, device) };
            (score >= 0).then_some((score, device, family))
        })
        .max_by_key(|(score, ..)| *score)
        .map(|(_, device, family)| (device, family))
        .ok_or(GpuError::NoSuitableDevice)
}

/// Index of the first queue family with graphics support that can present.
pub fn select_queue_family<F>(families: &[vk::QueueFamilyProperties], can_present: F) -> Option<u32>
where
    F: Fn(u32) -> bool,
{
    families
        .iter()
        .zip(0u32..)
        .find(|(family, index)| {
            family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && can_present(*index)
        })
        .map(|(_, index)| index)
}

/// Score a physical device for selection. Negative scores are unusable.
unsafe fn score_physical_device(instance: &ash::Instance, device: vk::PhysicalDevice) -> i32 {
    let capabilities = unsafe { GpuCapabilities::query(instance, device) };
    if !capabilities.meets_requirements() {
        return -1;
    }

    let mut score = match capabilities.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        _ => 0,
    };

    // Prefer more VRAM, +1 per GB
    score += i32::try_from(capabilities.device_local_memory_mb / 1024).unwrap_or(i32::MAX / 2);

    if api_version_at_least(capabilities.api_version, vk::API_VERSION_1_3) {
        score += 10;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn queue_family_must_present() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];

        assert_eq!(select_queue_family(&families, |index| index == 1), Some(1));
        assert_eq!(select_queue_family(&families, |_| true), Some(0));
        assert_eq!(select_queue_family(&families, |_| false), None);
    }

    #[test]
    fn queue_family_must_support_graphics() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
        ];
        assert_eq!(select_queue_family(&families, |_| true), Some(2));

        let empty = vk::QueueFamilyProperties {
            queue_count: 0,
            ..family(vk::QueueFlags::GRAPHICS)
        };
        assert_eq!(select_queue_family(&[empty], |_| true), None);
    }
}
