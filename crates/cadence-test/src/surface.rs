//! A scripted [`SurfaceProvider`] for driving resizes and minimisation.

use ash::vk;
use cadence_frame::SurfaceProvider;
use std::cell::Cell;

/// Surface whose extent and resize events are set by the test.
#[derive(Debug)]
pub struct ScriptedSurface {
    extent: vk::Extent2D,
    resized: bool,
    zero_polls: Cell<usize>,
    extent_queries: Cell<usize>,
    waits: usize,
}

impl ScriptedSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            resized: false,
            zero_polls: Cell::new(0),
            extent_queries: Cell::new(0),
            waits: 0,
        }
    }

    /// Report a new size and raise the resize flag.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.extent = vk::Extent2D { width, height };
        self.resized = true;
    }

    /// Report a zero extent for the next `polls` extent queries.
    pub fn minimize_for(&mut self, polls: usize) {
        self.zero_polls.set(polls);
    }

    /// Extent queries since creation or the last [`reset_counters`](Self::reset_counters).
    pub fn extent_queries(&self) -> usize {
        self.extent_queries.get()
    }

    /// `wait_events` calls since creation or the last reset.
    pub fn waits(&self) -> usize {
        self.waits
    }

    pub fn reset_counters(&mut self) {
        self.extent_queries.set(0);
        self.waits = 0;
    }
}

impl SurfaceProvider for ScriptedSurface {
    fn extent(&self) -> vk::Extent2D {
        self.extent_queries.set(self.extent_queries.get() + 1);
        let zero_polls = self.zero_polls.get();
        if zero_polls > 0 {
            self.zero_polls.set(zero_polls - 1);
            return vk::Extent2D::default();
        }
        self.extent
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_events(&mut self) {
        self.waits += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimised_polls_report_zero() {
        let mut surface = ScriptedSurface::new(800, 600);
        surface.minimize_for(2);
        assert_eq!(surface.extent().width, 0);
        assert_eq!(surface.extent().height, 0);
        assert_eq!(surface.extent().width, 800);
        assert_eq!(surface.extent_queries(), 3);
    }

    #[test]
    fn resize_flag() {
        let mut surface = ScriptedSurface::new(800, 600);
        assert!(!surface.was_resized());
        surface.resize(1024, 768);
        assert!(surface.was_resized());
        surface.reset_resized_flag();
        assert!(!surface.was_resized());
        assert_eq!(surface.extent().width, 1024);
    }
}
