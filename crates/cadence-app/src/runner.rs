//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cadence_frame::{
    FrameCommandBuffer, FrameConfig, FrameOrchestrator, PresentBackend, SurfaceProvider,
    VulkanBackend,
};
use cadence_gpu::GpuContextBuilder;
use cadence_platform::{create_gpu_for_window, PlatformConfig, WindowSurface};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::app::FrameApp;
use crate::context::AppContext;
use crate::frame::FrameContext;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Frame loop configuration.
    pub frame: FrameConfig,
    /// Sleep between size polls while minimised.
    pub extent_poll_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Cadence".to_string(),
            width: 1280,
            height: 720,
            target_fps: None,
            validation: cfg!(debug_assertions),
            frame: FrameConfig::default(),
            extent_poll_interval: PlatformConfig::default().extent_poll_interval,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.frame.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frame.frames_in_flight = frames;
        self
    }

    /// Set the initial clear colour.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.frame.clear_color = color;
        self
    }

    fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: true,
            extent_poll_interval: self.extent_poll_interval,
        }
    }

    fn target_frame_time(&self) -> Option<Duration> {
        self.target_fps
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)))
    }
}

/// Run a [`FrameApp`] with the given configuration.
///
/// This function initializes logging, creates the window, device and frame
/// orchestrator, and runs the event loop until the window closes or a fatal
/// frame error occurs. The fatal error, if any, is returned.
pub fn run_app<A: FrameApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        fatal: None,
    };

    if let Err(e) = event_loop.run_app(&mut runner) {
        error!("Event loop error: {e}");
    }

    runner.fatal.map_or(Ok(()), Err)
}

/// Internal application runner that implements winit's `ApplicationHandler`.
struct AppRunner<A: FrameApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
    fatal: Option<anyhow::Error>,
}

/// Internal application state.
struct AppState<A: FrameApp> {
    ctx: AppContext,
    app: A,
    target_frame_time: Option<Duration>,
    // FPS tracking
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
}

impl<A: FrameApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e}");
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                if let Err(e) = state.render_frame() {
                    error!("Fatal frame error: {e:#}");
                    if let Some(mut state) = self.state.take() {
                        state.cleanup();
                    }
                    self.fatal = Some(e);
                    event_loop.exit();
                    return;
                }
                state.ctx.window().request_redraw();
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.ctx.orchestrator.surface_mut().notify_resized();
                    info!("Resized to {}x{}", size.width, size.height);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window().request_redraw();
        }
    }
}

impl<A: FrameApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let platform = self.config.platform();

        // Create window
        let window = Arc::new(event_loop.create_window(platform.window_attributes())?);

        // GPU context and surface; the queue family is chosen against the surface
        let builder = GpuContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation);
        let (gpu, surface) = create_gpu_for_window(builder, &window)?;

        info!("GPU: {}", gpu.capabilities().summary());

        // Backend and frame orchestrator
        let backend = Arc::new(VulkanBackend::new(gpu, surface)?);
        let window_surface = WindowSurface::new(window, platform.extent_poll_interval);
        let orchestrator =
            FrameOrchestrator::new(backend, window_surface, self.config.frame.clone())?;

        let mut ctx = AppContext::new(orchestrator);

        // Initialize the application
        let app = A::init(&mut ctx)?;

        Ok(AppState {
            ctx,
            app,
            target_frame_time: self.config.target_frame_time(),
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
        })
    }
}

impl<A: FrameApp> AppState<A> {
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    fn render_frame(&mut self) -> anyhow::Result<()> {
        // The window has no drawable area; nothing to present.
        if self.ctx.orchestrator.surface().is_minimized() {
            return Ok(());
        }

        let frame_start = Instant::now();

        // Calculate delta time
        let dt = {
            let now = Instant::now();
            let dt = now.duration_since(self.ctx.last_frame_time).as_secs_f32();
            self.ctx.last_frame_time = now;

            // Update FPS tracking
            if dt > 0.0 {
                let fps = 1.0 / f64::from(dt);
                self.min_fps = self.min_fps.min(fps);
                self.max_fps = self.max_fps.max(fps);
                self.fps_sum += fps;
            }

            dt
        };

        // Update the application
        {
            #[cfg(feature = "profiling-tracy")]
            let _span = tracing::trace_span!("frame.update").entered();
            self.app.update(&mut self.ctx, dt);
        }

        // Acquire; `None` means the chain was rebuilt and this frame is skipped
        let cmd = {
            #[cfg(feature = "profiling-tracy")]
            let _span = tracing::trace_span!("frame.begin").entered();
            self.ctx.orchestrator.begin_frame()?
        };
        let Some(cmd) = cmd else {
            return self.notify_rebuild();
        };

        // Record
        let recorded = {
            #[cfg(feature = "profiling-tracy")]
            let _span = tracing::trace_span!("frame.record").entered();
            self.record_frame(cmd, dt)
        };

        {
            #[cfg(feature = "profiling-tracy")]
            let _span = tracing::trace_span!("frame.end").entered();
            close_frame(&mut self.ctx.orchestrator, recorded)?;
        }

        self.ctx.frame_count += 1;
        self.notify_rebuild()?;

        // Frame pacing
        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn record_frame(&mut self, cmd: FrameCommandBuffer, dt: f32) -> anyhow::Result<()> {
        let frame = FrameContext::new(
            self.ctx.orchestrator.frame_info(dt)?,
            self.ctx.frame_count,
        );
        self.ctx.orchestrator.begin_render_pass(cmd)?;
        let rendered = self.app.render(&self.ctx, &frame);
        self.ctx.orchestrator.end_render_pass(cmd)?;
        rendered
    }

    fn notify_rebuild(&mut self) -> anyhow::Result<()> {
        if let Some(event) = self.ctx.orchestrator.take_rebuild_event() {
            info!(
                "Swapchain rebuilt: {}x{} ({} images)",
                event.extent.width, event.extent.height, event.image_count
            );
            self.app.on_rebuild(&mut self.ctx, event)?;
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        // Print FPS statistics
        if self.ctx.frame_count > 0 {
            let avg_fps = self.fps_sum / self.ctx.frame_count as f64;
            info!("FPS Statistics:");
            info!("  Min: {:.1}", self.min_fps);
            info!("  Max: {:.1}", self.max_fps);
            info!("  Avg: {:.1}", avg_fps);
            info!("  Total frames: {}", self.ctx.frame_count);
            info!("  Swapchain rebuilds: {}", self.ctx.orchestrator.rebuild_count());
        }

        info!("Starting cleanup...");
        if let Err(e) = self.ctx.orchestrator.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        // Let the app cleanup first; the orchestrator releases the rest on drop
        self.app.cleanup(&mut self.ctx);

        info!("Cleanup complete");
    }
}

/// Submit and present the frame in progress, then report how recording went.
///
/// Runs even when recording failed part way, so the orchestrator is idle
/// again whatever happened.
fn close_frame<B: PresentBackend, S: SurfaceProvider>(
    orchestrator: &mut FrameOrchestrator<B, S>,
    recorded: anyhow::Result<()>,
) -> anyhow::Result<()> {
    orchestrator.end_frame()?;
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_frame::{FrameError, FrameState, ProtocolViolation};
    use cadence_test::FrameHarness;

    #[test]
    fn failed_recording_still_closes_the_frame() {
        let mut h = FrameHarness::new(FrameConfig::default()).expect("harness");
        let stale = h.orchestrator.begin_frame().expect("begin").expect("image");
        h.orchestrator.end_frame().expect("end");

        h.orchestrator.begin_frame().expect("begin").expect("image");
        let recorded = h
            .orchestrator
            .begin_render_pass(stale)
            .map_err(anyhow::Error::from);

        let err = close_frame(&mut h.orchestrator, recorded).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FrameError>(),
            Some(FrameError::Protocol(ProtocolViolation::ForeignCommandBuffer { .. }))
        ));
        assert_eq!(h.orchestrator.state(), FrameState::Idle);
        assert_eq!(h.backend.submits(), 2);
        assert!(h.backend.violations().is_empty(), "{:?}", h.backend.violations());
    }

    #[test]
    fn render_error_is_reported_after_present() {
        let mut h = FrameHarness::new(FrameConfig::default()).expect("harness");
        let cmd = h.orchestrator.begin_frame().expect("begin").expect("image");
        h.orchestrator.begin_render_pass(cmd).expect("begin pass");
        h.orchestrator.end_render_pass(cmd).expect("end pass");

        let err = close_frame(&mut h.orchestrator, Err(anyhow::anyhow!("render failed")))
            .unwrap_err();
        assert_eq!(err.to_string(), "render failed");
        assert_eq!(h.orchestrator.state(), FrameState::Idle);
        assert_eq!(h.backend.presents(), 1);
    }

    #[test]
    fn builder_sets_frame_config() {
        let config = AppConfig::new("test")
            .with_size(640, 480)
            .with_vsync(true)
            .with_frames_in_flight(3)
            .with_clear_color([0.0, 0.0, 1.0, 1.0]);

        assert_eq!(config.title, "test");
        assert_eq!((config.width, config.height), (640, 480));
        assert!(config.frame.vsync);
        assert_eq!(config.frame.frames_in_flight, 3);
        assert_eq!(config.frame.clear_color, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(config.platform().title, "test");
    }

    #[test]
    fn target_frame_time() {
        assert_eq!(AppConfig::default().target_frame_time(), None);
        assert_eq!(
            AppConfig::default().with_target_fps(50).target_frame_time(),
            Some(Duration::from_millis(20))
        );
        assert_eq!(
            AppConfig::default().with_target_fps(0).target_frame_time(),
            None
        );
    }
}
