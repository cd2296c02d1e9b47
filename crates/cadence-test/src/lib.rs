//! Test harness for the Cadence frame pacer.
//!
//! Provides a simulated device, a scripted surface and a frame loop harness so
//! the frame protocol can be exercised without a GPU.

pub mod backend;
pub mod harness;
pub mod surface;

pub use backend::{MockBackend, MockConfig};
pub use harness::{FrameHarness, FrameRecord};
pub use surface::ScriptedSurface;

use cadence_frame::FrameError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("Frame {frame} was skipped for a swapchain rebuild")]
    FrameSkipped { frame: usize },
}

pub type Result<T> = std::result::Result<T, TestError>;
