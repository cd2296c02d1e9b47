//! Frame lifecycle and swapchain management.
//!
//! This crate provides:
//! - [`PresentationChain`]: a swapchain with per-image views, depth targets and
//!   framebuffers, a render pass, and per-frame synchronization
//! - [`FrameOrchestrator`]: the begin/end frame protocol, frames-in-flight
//!   pacing, and chain rebuilds on resize or stale swapchains
//! - [`PresentBackend`]: the device seam both are written against, with
//!   [`VulkanBackend`] as the real implementation
//! - [`SurfaceProvider`]: the window-side collaborator

pub mod backend;
pub mod chain;
pub mod config;
pub mod error;
pub mod frame;
pub mod orchestrator;
pub mod slots;
pub mod status;
pub mod surface;
pub mod vulkan;

pub use backend::PresentBackend;
pub use chain::PresentationChain;
pub use config::FrameConfig;
pub use error::{ChainFormats, ErrorKind, FrameError, ProtocolViolation, Result};
pub use frame::{FrameCommandBuffer, FrameInfo, RebuildEvent};
pub use orchestrator::{FrameOrchestrator, FrameState};
pub use slots::{DepthTarget, ImageSlot, SyncSlot};
pub use status::{AcquiredImage, SwapchainStatus};
pub use surface::{is_presentable, SurfaceProvider};
pub use vulkan::{VulkanBackend, DEPTH_FORMAT_CANDIDATES};
