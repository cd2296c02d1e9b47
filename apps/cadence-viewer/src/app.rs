//! Viewer application: a clear-colour animation.

use cadence_app::{AppContext, FrameApp, FrameContext, RebuildEvent};
use glam::Vec3;
use tracing::info;

/// Command line options.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerOptions {
    pub vsync: bool,
    pub frames_in_flight: usize,
    pub target_fps: Option<u32>,
    pub speed: f32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            vsync: false,
            frames_in_flight: 2,
            target_fps: None,
            speed: 0.5,
        }
    }
}

impl ViewerOptions {
    /// Parse options from the process arguments.
    pub fn from_args() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--vsync" => options.vsync = true,
                "--frames-in-flight" => {
                    if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                        options.frames_in_flight = v;
                    }
                }
                "--target-fps" => {
                    options.target_fps = args.next().and_then(|v| v.parse().ok());
                }
                "--speed" => {
                    if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                        options.speed = v;
                    }
                }
                _ => {}
            }
        }

        options
    }
}

/// Colour at `phase` radians: three phase-shifted sines, kept dim.
fn cycle_color(phase: f32) -> [f32; 4] {
    const THIRD: f32 = std::f32::consts::TAU / 3.0;
    let wave = Vec3::new(phase.sin(), (phase + THIRD).sin(), (phase + 2.0 * THIRD).sin());
    let color = (wave * 0.5 + Vec3::splat(0.5)) * 0.4;
    [color.x, color.y, color.z, 1.0]
}

pub struct Viewer {
    elapsed: f32,
    speed: f32,
}

impl FrameApp for Viewer {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let options = ViewerOptions::from_args();
        info!(
            "Swapchain: {}x{}, {} images, {} frames in flight",
            ctx.extent().width,
            ctx.extent().height,
            ctx.image_count(),
            ctx.frames_in_flight()
        );

        Ok(Self {
            elapsed: 0.0,
            speed: options.speed,
        })
    }

    fn update(&mut self, ctx: &mut AppContext, dt: f32) {
        self.elapsed += dt;
        ctx.set_clear_color(cycle_color(self.elapsed * self.speed));
    }

    fn render(&mut self, _ctx: &AppContext, _frame: &FrameContext) -> anyhow::Result<()> {
        // The render pass clear does all the drawing.
        Ok(())
    }

    fn on_rebuild(&mut self, _ctx: &mut AppContext, event: RebuildEvent) -> anyhow::Result<()> {
        if event.image_count_changed() {
            info!(
                "Swapchain image count changed: {} -> {}",
                event.previous_image_count, event.image_count
            );
        }
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut AppContext) {
        info!(
            "Viewer ran for {:.1}s over {} frames",
            self.elapsed, ctx.frame_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_options() {
        let options = ViewerOptions::parse(args(&[
            "--vsync",
            "--frames-in-flight",
            "3",
            "--target-fps",
            "60",
            "--speed",
            "2.0",
        ]));
        assert!(options.vsync);
        assert_eq!(options.frames_in_flight, 3);
        assert_eq!(options.target_fps, Some(60));
        assert!((options.speed - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn ignores_bad_values() {
        let options = ViewerOptions::parse(args(&["--frames-in-flight", "many", "--unknown"]));
        assert_eq!(options, ViewerOptions::default());
    }

    #[test]
    fn colors_stay_in_range() {
        for step in 0..64 {
            let color = cycle_color(step as f32 * 0.25);
            assert!(color[..3].iter().all(|c| (0.0..=0.4).contains(c)));
            assert_eq!(color[3], 1.0);
        }
    }
}
