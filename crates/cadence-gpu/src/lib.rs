//! Vulkan device collaborators for the Cadence frame pacer.
//!
//! This crate provides:
//! - Vulkan instance and physical device selection
//! - A logical device with a graphics+present queue and command pool
//! - Image memory allocation via gpu-allocator (depth targets)
//! - Surface creation and surface capability queries
//! - Raw swapchain helpers and negotiation rules

pub mod capabilities;
pub mod command;
pub mod context;
pub mod error;
pub mod instance;
pub mod memory;
pub mod surface;
pub mod swapchain;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use error::{GpuError, Result};
pub use memory::{AttachmentDesc, AttachmentImage, GpuAllocator};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::{
    calculate_extent, find_supported_format, select_image_count, select_present_mode,
    select_surface_format, SwapchainDesc,
};
