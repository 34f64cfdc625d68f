//! gnve - orbit-camera viewer for a single glTF scene
//!
//! Usage: `gnve <SCENE> [--width W] [--height H] [--validation] ...`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use gnve_engine::gnve::frame::{Camera, Extent2D, FrameLoop, ResizeSignal, TickOutcome, WindowPort};
use gnve_engine::gnve::log::{DefaultLogger, FanoutLogger, Log, LogSeverity, Logger, MemoryLogger};
use gnve_engine::gnve::{EngineConfig, Error, Result};
use gnve_engine::{engine_debug, engine_error, engine_info};
use gnve_engine_renderer_vulkan::VulkanRenderer;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const SOURCE: &str = "gnve::demo";

/// Lines kept in memory for the exit report
const RECENT_LINES: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "gnve", version, about = "Render a glTF scene with the GNVE Vulkan renderer")]
struct CliArgs {
    /// Self-contained glTF or GLB scene to render
    scene: PathBuf,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    #[arg(long, default_value_t = 2)]
    frames_in_flight: usize,

    /// Bindless texture table capacity
    #[arg(long, default_value_t = 1024)]
    max_textures: u32,

    /// Enable validation layers (needs the `vulkan-validation` feature)
    #[arg(long)]
    validation: bool,

    /// trace, debug, info, warn or error
    #[arg(long, default_value = "info")]
    log_level: LogSeverity,

    /// Vertex shader, .spv or (with `shaderc`) .vert
    #[arg(long)]
    vert_shader: Option<PathBuf>,

    /// Fragment shader, .spv or (with `shaderc`) .frag
    #[arg(long)]
    frag_shader: Option<PathBuf>,
}

impl CliArgs {
    fn engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            app_name: "GNVE Viewer".to_string(),
            width: self.width,
            height: self.height,
            frames_in_flight: self.frames_in_flight,
            max_textures: self.max_textures,
            enable_validation: self.validation,
            log_level: self.log_level,
            vertex_shader: self.vert_shader.clone().unwrap_or(defaults.vertex_shader.clone()),
            fragment_shader: self.frag_shader.clone().unwrap_or(defaults.fragment_shader.clone()),
            ..defaults
        }
    }
}

/// Frame loop view of a winit window
///
/// winit delivers events through the handler, so there is nothing to pump
/// here; waiting just yields until the next poll of the size.
struct WinitWindow<'a>(&'a Window);

impl WindowPort for WinitWindow<'_> {
    fn framebuffer_size(&self) -> Extent2D {
        let size = self.0.inner_size();
        Extent2D::new(size.width, size.height)
    }

    fn is_minimized(&self) -> bool {
        self.0.is_minimized().unwrap_or(false) || self.framebuffer_size().is_zero()
    }

    fn wait_events(&mut self) {
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Everything that exists once the window is up
///
/// Field order is drop order: the renderer goes before the window it
/// presents to.
struct Viewer {
    renderer: VulkanRenderer,
    frame_loop: FrameLoop,
    resize: ResizeSignal,
    window: Arc<Window>,
}

struct App {
    config: EngineConfig,
    scene: PathBuf,
    log: Log,
    camera: Camera,
    started: Instant,
    viewer: Option<Viewer>,
    failure: Option<Error>,
}

impl App {
    fn new(config: EngineConfig, scene: PathBuf, log: Log) -> Self {
        Self {
            config,
            scene,
            log,
            camera: Camera::default(),
            started: Instant::now(),
            viewer: None,
            failure: None,
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Viewer> {
        let attributes = Window::default_attributes()
            .with_title(self.config.app_name.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = event_loop
            .create_window(attributes)
            .map(Arc::new)
            .map_err(|e| Error::InitializationFailed(format!("window creation failed: {}", e)))?;

        let mut renderer = VulkanRenderer::new(window.as_ref(), &self.config, self.log.clone())?;
        engine_info!(
            self.log,
            SOURCE,
            "Rendering on {} ({} swapchain images, {:?})",
            renderer.device_name(),
            renderer.swapchain_image_count(),
            renderer.present_mode()
        );

        let summary = renderer.import_scene(&self.scene)?;
        engine_info!(
            self.log,
            SOURCE,
            "Loaded {}: {} mesh(es), {} texture(s)",
            self.scene.display(),
            summary.meshes,
            summary.textures
        );

        let frame_loop = FrameLoop::new(self.config.frames_in_flight, self.log.clone());
        let resize = frame_loop.resize_signal();
        Ok(Viewer {
            renderer,
            frame_loop,
            resize,
            window,
        })
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(viewer) = self.viewer.as_mut() else {
            return Ok(());
        };
        let mut port = WinitWindow(viewer.window.as_ref());
        if port.is_minimized() {
            return Ok(());
        }

        let time = self.started.elapsed().as_secs_f32();
        let uniforms = self.camera.uniforms(time, port.framebuffer_size());
        let outcome = viewer.frame_loop.tick(&mut viewer.renderer, &mut port, &uniforms)?;
        if outcome != TickOutcome::Presented {
            engine_debug!(self.log, SOURCE, "Tick ended with {:?}", outcome);
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Error) {
        engine_error!(self.log, SOURCE, "{}", error);
        self.failure = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(viewer) => {
                event_loop.set_control_flow(ControlFlow::Poll);
                self.started = Instant::now();
                self.viewer = Some(viewer);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(viewer) = &self.viewer {
                    viewer.resize.notify();
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = &self.viewer {
            viewer.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.take() {
            let stats = viewer.frame_loop.stats();
            engine_info!(
                self.log,
                SOURCE,
                "{} frame(s), {} swapchain rebuild(s)",
                stats.frame_count,
                stats.swapchain_rebuilds
            );
            if let Some(validation) = viewer.renderer.validation_stats() {
                engine_info!(self.log, SOURCE, "{} validation message(s)", validation.total());
            }
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config = args.engine_config();

    let recent = Arc::new(MemoryLogger::new(RECENT_LINES));
    let sinks: Vec<Arc<dyn Logger>> = vec![Arc::new(DefaultLogger), recent.clone()];
    let log = Log::new(Arc::new(FanoutLogger::new(sinks)), config.log_level);

    if let Err(e) = config.validate() {
        engine_error!(log, SOURCE, "{}", e);
        return ExitCode::FAILURE;
    }

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            engine_error!(log, SOURCE, "Cannot open the event loop: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut app = App::new(config, args.scene, log.clone());
    if let Err(e) = event_loop.run_app(&mut app) {
        engine_error!(log, SOURCE, "Event loop failed: {}", e);
        return ExitCode::FAILURE;
    }

    match app.failure {
        Some(_) => {
            let lines = recent.lines();
            eprintln!("Last {} log line(s) before the failure:", lines.len());
            for line in lines {
                eprintln!("  {}", line);
            }
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
