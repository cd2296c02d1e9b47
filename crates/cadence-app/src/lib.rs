//! Application framework for the Cadence frame pacer.
//!
//! This crate provides a trait-based application framework that handles
//! common boilerplate like:
//! - Window creation and management
//! - GPU context and surface initialization
//! - The begin/end frame protocol and render pass
//! - Swapchain rebuilds on resize
//! - Event loop handling
//!
//! # Example
//!
//! ```no_run
//! use cadence_app::{run_app, AppConfig, AppContext, FrameApp, FrameContext};
//!
//! struct MyApp;
//!
//! impl FrameApp for MyApp {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//!
//!     fn update(&mut self, _ctx: &mut AppContext, _dt: f32) {}
//!
//!     fn render(&mut self, _ctx: &AppContext, _frame: &FrameContext) -> anyhow::Result<()> {
//!         // Record draw commands inside the open render pass
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default())
//! }
//! ```

mod app;
mod context;
mod frame;
mod runner;

pub use app::FrameApp;
pub use context::AppContext;
pub use frame::FrameContext;
pub use runner::{run_app, AppConfig};

// Re-export commonly used types for convenience
pub use cadence_frame::{FrameConfig, FrameInfo, RebuildEvent};
pub use cadence_gpu::{GpuContext, GpuContextBuilder};
pub use winit::event::WindowEvent;
