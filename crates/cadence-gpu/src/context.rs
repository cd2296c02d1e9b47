//! GPU context management.

use crate::capabilities::GpuCapabilities;
use crate::command::CommandPool;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_physical_device};
use crate::memory::GpuAllocator;
use crate::surface::{create_window_surface, SurfaceContext};
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr};
use std::sync::Arc;

/// Main GPU context holding Vulkan resources.
///
/// Owns the execution queue, a resettable command pool and the memory
/// allocator. Everything presentation-related is created on top of it.
pub struct GpuContext {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) capabilities: GpuCapabilities,
    pub(crate) allocator: Mutex<GpuAllocator>,
    pub(crate) command_pool: CommandPool,

    pub(crate) graphics_queue_family: u32,
    pub(crate) graphics_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan entry point.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get the graphics queue. It can present to the surface the context
    /// was built with.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Get the command pool for the graphics queue family.
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Wait for device to be idle.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            self.command_pool.destroy(&self.device);

            // Shutdown allocator BEFORE destroying device
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Cadence".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context and a surface for `window`.
    ///
    /// The surface exists before the physical device is chosen, so only
    /// devices with a graphics queue family that can present to it are
    /// considered. That family becomes the context's graphics queue.
    ///
    /// # Safety
    /// The window must outlive the returned surface.
    pub unsafe fn build_with_surface<W>(self, window: &W) -> Result<(GpuContext, SurfaceContext)>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let instance = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        let surface_fn = ash::khr::surface::Instance::new(&entry, &instance);
        let surface = match unsafe { create_window_surface(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        let opened = match unsafe { open_device(&instance, &surface_fn, surface) } {
            Ok(opened) => opened,
            Err(e) => {
                unsafe {
                    surface_fn.destroy_surface(surface, None);
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let capabilities = unsafe { GpuCapabilities::query(&instance, opened.physical_device) };
        tracing::info!(
            queue_family = opened.queue_family,
            "Selected GPU: {}",
            capabilities.summary()
        );

        let surface = SurfaceContext {
            handle: surface,
            surface_fn,
            swapchain_fn: ash::khr::swapchain::Device::new(&instance, &opened.device),
        };

        let gpu = GpuContext {
            entry,
            instance,
            physical_device: opened.physical_device,
            device: opened.device,
            capabilities,
            allocator: Mutex::new(opened.allocator),
            command_pool: opened.command_pool,
            graphics_queue_family: opened.queue_family,
            graphics_queue: opened.queue,
        };

        Ok((gpu, surface))
    }
}

struct OpenedDevice {
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
    device: Arc<ash::Device>,
    queue: vk::Queue,
    command_pool: CommandPool,
    allocator: GpuAllocator,
}

/// Pick a physical device and queue family that can present to `surface`,
/// then create the logical device, command pool and allocator on it.
///
/// The device is destroyed again if a later step fails.
///
/// # Safety
/// The instance and surface must be valid.
unsafe fn open_device(
    instance: &ash::Instance,
    surface_fn: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<OpenedDevice> {
    let (physical_device, queue_family) = unsafe {
        select_physical_device(instance, |device, family| {
            surface_fn
                .get_physical_device_surface_support(device, family, surface)
                .unwrap_or(false)
        })
    }?;

    let (device, queue) = unsafe { create_device(instance, physical_device, queue_family)? };
    let device = Arc::new(device);

    let command_pool = match unsafe { CommandPool::new(&device, queue_family) } {
        Ok(pool) => pool,
        Err(e) => {
            unsafe { device.destroy_device(None) };
            return Err(e);
        }
    };

    match unsafe { GpuAllocator::new(instance, Arc::clone(&device), physical_device) } {
        Ok(allocator) => Ok(OpenedDevice {
            physical_device,
            queue_family,
            device,
            queue,
            command_pool,
            allocator,
        }),
        Err(e) => {
            unsafe {
                command_pool.destroy(&device);
                device.destroy_device(None);
            }
            Err(e)
        }
    }
}

/// Required device extensions.
fn required_device_extensions() -> Vec<&'static CStr> {
    vec![
        ash::khr::swapchain::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_subset::NAME,
    ]
}

/// Create the logical device and retrieve the graphics queue.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_queue_family: u32,
) -> Result<(ash::Device, vk::Queue)> {
    let queue_priority = 1.0_f32;
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_queue_family)
        .queue_priorities(std::slice::from_ref(&queue_priority))];

    let extensions = required_device_extensions();
    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device, &device_create_info, None)? };

    let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

    Ok((device, graphics_queue))
}
