//! Frame loop harness over the simulated device.

use crate::backend::{MockBackend, MockConfig};
use crate::surface::ScriptedSurface;
use crate::{Result, TestError};
use cadence_frame::{FrameConfig, FrameOrchestrator};
use std::sync::Arc;

/// What a rendered frame reported while it was in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    pub frame_index: usize,
    pub image_index: u32,
}

/// An orchestrator driving a [`MockBackend`] and [`ScriptedSurface`].
pub struct FrameHarness {
    pub backend: Arc<MockBackend>,
    pub orchestrator: FrameOrchestrator<MockBackend, ScriptedSurface>,
}

impl FrameHarness {
    /// Default simulated device (three images) and an 800x600 surface.
    pub fn new(config: FrameConfig) -> Result<Self> {
        Self::with_mock(MockConfig::default(), ScriptedSurface::new(800, 600), config)
    }

    pub fn with_mock(
        mock: MockConfig,
        surface: ScriptedSurface,
        config: FrameConfig,
    ) -> Result<Self> {
        let backend = Arc::new(MockBackend::new(mock));
        let orchestrator = FrameOrchestrator::new(Arc::clone(&backend), surface, config)?;
        Ok(Self {
            backend,
            orchestrator,
        })
    }

    /// Run one full frame with an empty render pass.
    ///
    /// Returns `None` when the frame was skipped for a rebuild.
    pub fn run_frame(&mut self) -> cadence_frame::Result<Option<FrameRecord>> {
        let Some(cmd) = self.orchestrator.begin_frame()? else {
            return Ok(None);
        };
        let record = FrameRecord {
            frame_index: self.orchestrator.frame_index()?,
            image_index: self.orchestrator.image_index()?,
        };
        self.orchestrator.begin_render_pass(cmd)?;
        self.orchestrator.end_render_pass(cmd)?;
        self.orchestrator.end_frame()?;
        Ok(Some(record))
    }

    /// Run `count` frames, failing if any is skipped.
    pub fn run_frames(&mut self, count: usize) -> Result<Vec<FrameRecord>> {
        (0..count)
            .map(|frame| {
                self.run_frame()?
                    .ok_or(TestError::FrameSkipped { frame })
            })
            .collect()
    }

    pub fn surface_mut(&mut self) -> &mut ScriptedSurface {
        self.orchestrator.surface_mut()
    }
}
