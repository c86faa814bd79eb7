// =============================================================================
// FRAME-RHI DEMO - Clear the window and draw one triangle
// =============================================================================
//
// Drives the device layer the way a real renderer would:
//
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit window                                                   │
// │    └── Instance ── Surface ── Device                            │
// │          └── SwapChain (recreated on resize / out-of-date)      │
// │                └── RenderPass, Pipeline, FrameBuffer per image  │
// │                      └── one pre-recorded CommandBuffer / image │
// │    └── FrameLoop (fences + semaphores per frame in flight)      │
// └─────────────────────────────────────────────────────────────────┘
//
// Set `graphics.backend = "mock"` in config.toml to run without a GPU.
//
// =============================================================================

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use frame_rhi::config::Config;
use frame_rhi::{
    Backend, BackendKind, BeginRenderPassInfo, CommandBuffer, CommandPool, CommandPoolInfo,
    CompileOptions, Device, DrawInfo, ErrorKind, FrameBuffer, FrameBufferInfo, FrameLoop,
    GlslcCompiler, Instance, InstanceInfo, MockDriver, NativeWindow, Pipeline, PipelineInfo,
    PresentStatus, RenderPass, RenderPassInfo, Shader, ShaderCompiler, ShaderSet, ShaderStage,
    Surface, SurfaceInfo, SwapChain, SwapChainInfo, Version, required_surface_extensions,
};
use glam::{IVec2, Vec4};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting frame-rhi demo");
    log::info!(
        "Window: {}x{}, backend: {}, frames in flight: {}",
        config.window.width,
        config.window.height,
        config.backend_kind(),
        config.frames_in_flight()
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

/// `RUST_LOG` wins over the configured filter.
fn init_logging(config: &Config) {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or(config.debug.log_filter.as_str())).init();
}

// =============================================================================
// GPU STATE
// =============================================================================

/// Everything that depends on the current swapchain.
///
/// Field order is drop order: recorded commands before the frame buffers
/// they reference, frame buffers before the chain that owns their views.
struct SwapchainResources {
    command_buffers: Vec<CommandBuffer>,
    frame_buffers: Vec<FrameBuffer>,
    pipeline: Pipeline,
    render_pass: RenderPass,
    swapchain: SwapChain,
}

/// Device-level objects that live for the whole run.
struct Renderer {
    // ─────────────────────────────────────────────────────────────────────────
    // PER-SWAPCHAIN (rebuilt on resize)
    // ─────────────────────────────────────────────────────────────────────────
    resources: Option<SwapchainResources>,

    // ─────────────────────────────────────────────────────────────────────────
    // FRAME PACING
    // ─────────────────────────────────────────────────────────────────────────
    frame_loop: FrameLoop,
    command_pool: CommandPool,

    // ─────────────────────────────────────────────────────────────────────────
    // SHADERS
    // ─────────────────────────────────────────────────────────────────────────
    vertex_shader: Shader,
    fragment_shader: Shader,

    // ─────────────────────────────────────────────────────────────────────────
    // CORE OBJECTS
    // ─────────────────────────────────────────────────────────────────────────
    device: Device,
    _surface: Surface,
    _instance: Instance,

    clear_color: Vec4,
}

impl Renderer {
    fn new(config: &Config, window: &Window) -> Result<Self> {
        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Instance + surface
        // ─────────────────────────────────────────────────────────────────────
        let backend = match config.backend_kind() {
            BackendKind::Vulkan => Backend::Vulkan,
            BackendKind::Mock => Backend::Mock(MockDriver::new()),
        };
        let native = NativeWindow::from_window(window)?;
        let instance = Instance::new(&InstanceInfo {
            backend,
            debug_level: config.debug_level(),
            required_extensions: required_surface_extensions(native.display)?,
            application_name: config.window.title.clone(),
            application_version: Version::new(0, 1, 0),
            ..InstanceInfo::default()
        })
        .context("Failed to create instance")?;

        let surface = instance
            .create_surface(SurfaceInfo::native(native))
            .context("Failed to create surface")?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Device on the best adapter
        // ─────────────────────────────────────────────────────────────────────
        let device = instance
            .create_device(&surface)
            .context("Failed to create device")?;
        let adapter = device.adapter();
        log::info!(
            "Using {:?} adapter '{}' (score {})",
            adapter.adapter_type,
            adapter.name,
            adapter.score
        );

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Shaders
        // ─────────────────────────────────────────────────────────────────────
        let compiler = GlslcCompiler::new();
        let vertex_shader = load_shader(&device, &compiler, &config.shaders.vertex, ShaderStage::Vertex)?;
        let fragment_shader =
            load_shader(&device, &compiler, &config.shaders.fragment, ShaderStage::Fragment)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Command pool + frame loop
        // ─────────────────────────────────────────────────────────────────────
        let command_pool = device.create_command_pool(&CommandPoolInfo::default())?;
        let frame_loop = FrameLoop::new(&device, config.frames_in_flight(), config.fence_timeout())?;

        let mut renderer = Self {
            resources: None,
            frame_loop,
            command_pool,
            vertex_shader,
            fragment_shader,
            device,
            _surface: surface,
            _instance: instance,
            clear_color: Vec4::from_array(config.graphics.clear_color),
        };

        let size = window.inner_size();
        renderer.recreate_swapchain(size.width, size.height)?;
        Ok(renderer)
    }

    /// Rebuild everything sized by the swapchain.
    ///
    /// The old chain is dropped only after the device went idle.
    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;
        self.resources = None;

        let swapchain = self.device.create_swapchain(&SwapChainInfo::new(width, height))?;
        let extent = swapchain.extent();

        let render_pass = self.device.create_render_pass(&RenderPassInfo {
            color_format: swapchain.format(),
        })?;

        let pipeline = self.device.create_pipeline(&PipelineInfo {
            render_pass: &render_pass,
            shaders: ShaderSet::new()
                .with(ShaderStage::Vertex, &self.vertex_shader)
                .with(ShaderStage::Fragment, &self.fragment_shader),
            viewport_size: extent,
            scissor_size: extent,
        })?;

        let frame_buffers = swapchain
            .image_views()
            .iter()
            .map(|view| {
                self.device.create_frame_buffer(&FrameBufferInfo {
                    render_pass: &render_pass,
                    attachments: &[view],
                    extent,
                })
            })
            .collect::<frame_rhi::Result<Vec<_>>>()?;

        // ─────────────────────────────────────────────────────────────────────
        // Record once: the scene never changes between frames
        // ─────────────────────────────────────────────────────────────────────
        let mut command_buffers = self
            .command_pool
            .allocate_command_buffers(frame_buffers.len())?;
        for (buffer, frame_buffer) in command_buffers.iter_mut().zip(&frame_buffers) {
            buffer.begin()?;
            buffer.begin_render_pass(&BeginRenderPassInfo {
                render_pass: &render_pass,
                frame_buffer,
                area_offset: IVec2::ZERO,
                area_extent: extent,
                clear_colors: &[self.clear_color],
            })?;
            buffer.bind_pipeline(&pipeline)?;
            buffer.draw(&DrawInfo {
                vertex_count: 3,
                first_vertex: 0,
            })?;
            buffer.end_render_pass()?;
            buffer.end()?;
        }

        log::info!(
            "Swapchain ready: {}x{}, {} images, {:?}, {:?}",
            extent.x,
            extent.y,
            swapchain.image_count(),
            swapchain.format(),
            swapchain.present_mode()
        );

        self.resources = Some(SwapchainResources {
            command_buffers,
            frame_buffers,
            pipeline,
            render_pass,
            swapchain,
        });
        Ok(())
    }

    /// Draw one frame. `Ok(false)` asks the caller to recreate the swapchain.
    fn render_frame(&mut self) -> Result<bool> {
        let resources = self.resources.as_ref().context("Swapchain not initialized")?;

        match self
            .frame_loop
            .draw_frame(&self.device, &resources.swapchain, &resources.command_buffers)
        {
            Ok(PresentStatus::Optimal) => Ok(true),
            Ok(PresentStatus::Suboptimal) => Ok(false),
            Err(err) if err.kind() == ErrorKind::SwapchainOutOfDate => {
                log::debug!("Swapchain out of date: {}", err);
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Waiting for the device before teardown...");
        if let Err(e) = self.device.wait_idle() {
            log::warn!("wait_idle failed during teardown: {}", e);
        }
    }
}

/// Compile a GLSL file to SPIR-V and create the shader module.
fn load_shader(device: &Device, compiler: &dyn ShaderCompiler, path: &Path, stage: ShaderStage) -> Result<Shader> {
    let source = std::fs::read(path).with_context(|| format!("Failed to read shader {:?}", path))?;
    let name = path.display().to_string();

    let binary = compiler
        .compile(&source, &name, stage, &CompileOptions::default())?
        .into_binary()
        .with_context(|| format!("Failed to compile {}", name))?;
    log::debug!("Compiled {} ({} bytes of SPIR-V)", name, binary.len());

    Ok(device.create_shader(&binary)?)
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// The renderer is declared before the window so it drops first: the
/// surface must not outlive the native window.
struct App {
    config: Config,
    renderer: Option<Renderer>,
    window: Option<Arc<Window>>,
    needs_resize: bool,
    is_minimized: bool,

    // FPS tracking
    frame_count: u32,
    last_fps_update: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            needs_resize: false,
            is_minimized: false,
            frame_count: 0,
            last_fps_update: Instant::now(),
        }
    }

    fn redraw(&mut self) -> Result<()> {
        if self.is_minimized {
            return Ok(());
        }
        let (Some(renderer), Some(window)) = (self.renderer.as_mut(), self.window.as_ref()) else {
            return Ok(());
        };

        if self.needs_resize {
            let size = window.inner_size();
            renderer.recreate_swapchain(size.width, size.height)?;
            self.needs_resize = false;
        }

        if renderer.render_frame()? {
            self.frame_count += 1;
        } else {
            self.needs_resize = true;
        }

        self.update_fps();
        Ok(())
    }

    fn update_fps(&mut self) {
        let elapsed = self.last_fps_update.elapsed().as_secs_f32();
        if elapsed < 1.0 {
            return;
        }

        if let Some(ref window) = self.window {
            let fps = self.frame_count as f32 / elapsed;
            window.set_title(&format!("{} - {:.0} FPS", self.config.window.title, fps));
        }
        self.frame_count = 0;
        self.last_fps_update = Instant::now();
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        match Renderer::new(&self.config, &window) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => {
                log::error!("Failed to initialize renderer: {:?}", e);
                event_loop.exit();
                return;
            }
        }

        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: winit::window::WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.renderer = None;
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.is_minimized = size.width == 0 || size.height == 0;
                if !self.is_minimized {
                    self.needs_resize = true;
                }
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    log::error!("Render error: {:?}", e);
                    event_loop.exit();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    self.renderer = None;
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    /// Redraw continuously.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
