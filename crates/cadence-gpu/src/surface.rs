//! The window surface a swapchain presents to.

use crate::context::GpuContext;
use crate::error::Result;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// A `VkSurfaceKHR` plus the extension function tables needed to query it
/// and build swapchains on it.
///
/// Created by [`GpuContextBuilder::build_with_surface`](crate::GpuContextBuilder::build_with_surface)
/// alongside the context it belongs to. The surface is not destroyed on
/// drop; call [`destroy`](Self::destroy) after every swapchain built on it is
/// gone.
pub struct SurfaceContext {
    pub handle: vk::SurfaceKHR,
    pub surface_fn: ash::khr::surface::Instance,
    pub swapchain_fn: ash::khr::swapchain::Device,
}

/// Create a raw surface for `window`.
///
/// # Safety
/// The window must outlive the surface.
pub(crate) unsafe fn create_window_surface<W>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR>
where
    W: HasDisplayHandle + HasWindowHandle,
{
    let display = window.display_handle()?.as_raw();
    let window = window.window_handle()?.as_raw();

    let surface = unsafe { ash_window::create_surface(entry, instance, display, window, None)? };
    Ok(surface)
}

impl SurfaceContext {
    /// Current capabilities, formats and present modes of the surface on
    /// `gpu`'s physical device.
    pub fn query_support(&self, gpu: &GpuContext) -> Result<SurfaceCapabilities> {
        let physical_device = gpu.physical_device();

        // SAFETY: the surface and physical device are live.
        unsafe {
            Ok(SurfaceCapabilities {
                capabilities: self
                    .surface_fn
                    .get_physical_device_surface_capabilities(physical_device, self.handle)?,
                formats: self
                    .surface_fn
                    .get_physical_device_surface_formats(physical_device, self.handle)?,
                present_modes: self
                    .surface_fn
                    .get_physical_device_surface_present_modes(physical_device, self.handle)?,
            })
        }
    }

    /// Whether `queue_family` can present to this surface.
    pub fn supports_present(&self, gpu: &GpuContext, queue_family: u32) -> Result<bool> {
        // SAFETY: the surface and physical device are live.
        let supported = unsafe {
            self.surface_fn.get_physical_device_surface_support(
                gpu.physical_device(),
                queue_family,
                self.handle,
            )?
        };
        Ok(supported)
    }

    /// # Safety
    /// Every swapchain created on this surface must already be destroyed.
    pub unsafe fn destroy(&self) {
        unsafe { self.surface_fn.destroy_surface(self.handle, None) };
    }
}

/// What a surface supports right now. Re-queried on every chain build.
#[derive(Debug, Clone, Default)]
pub struct SurfaceCapabilities {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}
