// ============================================================================
// app.rs — Life GPU
// Application state and winit event-loop handler with egui UI integration.
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::ActiveEventLoop,
    window::{Window, WindowAttributes},
};

use crate::capture;
use crate::config::{AppConfig, SimulationSettings, UI_WIDTH};
use crate::controller::{LifeController, TickKind};
use crate::gpu::{self, GpuError};
use crate::input::{command_for_key, Command, PointerState, WindowChrome};
use crate::presentation::{Presentation, Viewport};
use crate::rules;
use crate::stats::FrameStats;
use crate::ui::{self, PanelView, StatusLine};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("the GPU adapter cannot present to this window")]
    SurfaceUnsupported,
}

// ======================== Application ========================

pub struct App {
    state: Option<AppState>,
    config: AppConfig,
    settings: SimulationSettings,
    error: Option<AppError>,
}

struct AppState {
    // GPU
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    present_modes: Vec<wgpu::PresentMode>,
    vsync: bool,

    // Simulation
    controller: LifeController,
    presentation: Presentation,

    // Window & Input
    window: Arc<Window>,
    chrome: WindowChrome,
    pointer: PointerState,

    // egui
    egui_ctx: egui::Context,
    egui_winit_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // Timing & status
    started: Instant,
    stats: FrameStats,
    status: StatusLine,
    screenshot_requested: bool,
    screenshot_dir: PathBuf,
}

impl App {
    pub fn new(config: AppConfig, settings: SimulationSettings) -> Self {
        Self {
            state: None,
            config,
            settings,
            error: None,
        }
    }

    /// Startup failure that ended the event loop, if any.
    pub fn take_error(&mut self) -> Option<AppError> {
        self.error.take()
    }

    fn init(&self, event_loop: &ActiveEventLoop) -> Result<AppState, AppError> {
        let window_attrs = WindowAttributes::default()
            .with_title("Life GPU")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(GpuError::from)?;

        let gpu_ctx = pollster::block_on(gpu::request_device(&instance, Some(&surface)))?;
        let (device, queue) = (gpu_ctx.device, gpu_ctx.queue);

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&gpu_ctx.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .ok_or(AppError::SurfaceUnsupported)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .ok_or(AppError::SurfaceUnsupported)?;
        let present_mode = choose_present_mode(&surface_caps.present_modes, self.config.vsync);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let controller = LifeController::new(&device, &self.settings)?;
        let presentation = Presentation::new(
            &device,
            surface_format,
            viewport_for(size, window.scale_factor()),
        )?;

        // ---- Initialize egui ----
        let egui_ctx = egui::Context::default();
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = egui::Color32::from_rgb(20, 20, 28);
        egui_ctx.set_visuals(visuals);

        let egui_winit_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            event_loop,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        log::info!(
            "Life GPU initialized: window {}x{}, surface {:?}, present mode {:?}",
            size.width,
            size.height,
            surface_format,
            present_mode
        );

        let now = Instant::now();
        Ok(AppState {
            device,
            queue,
            surface,
            surface_config,
            present_modes: surface_caps.present_modes,
            vsync: self.config.vsync,
            controller,
            presentation,
            window,
            chrome: WindowChrome::default(),
            pointer: PointerState::default(),
            egui_ctx,
            egui_winit_state,
            egui_renderer,
            started: now,
            stats: FrameStats::new(now),
            status: StatusLine::default(),
            screenshot_requested: false,
            screenshot_dir: self.config.screenshot_dir.clone(),
        })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => {
                // Initial redraw, required on macOS with winit 0.30
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => {
                log::error!("Startup failed: {}", err);
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        // Pass events to egui first
        let egui_response = state.egui_winit_state.on_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput { event, .. } => {
                if !event.state.is_pressed() || event.repeat {
                    return;
                }
                if let Some(command) = command_for_key(&event.logical_key) {
                    // Quit, fullscreen and capture work even while egui has focus.
                    let global = matches!(
                        command,
                        Command::Quit | Command::ToggleFullscreen | Command::Screenshot
                    );
                    if global || !egui_response.consumed {
                        apply_command(state, event_loop, command);
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                state.pointer.position = Some((position.x, position.y));
            }

            WindowEvent::CursorLeft { .. } => {
                state.pointer.position = None;
            }

            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                let pressed = button_state == ElementState::Pressed;
                match button {
                    MouseButton::Left if !pressed => state.pointer.left_held = false,
                    MouseButton::Left if !egui_response.consumed => state.pointer.left_held = true,
                    MouseButton::Right if pressed && !egui_response.consumed => {
                        apply_command(state, event_loop, Command::Reset);
                    }
                    _ => {}
                }
            }

            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    state.surface_config.width = new_size.width;
                    state.surface_config.height = new_size.height;
                    state.surface.configure(&state.device, &state.surface_config);
                    state
                        .presentation
                        .reshape(viewport_for(new_size, state.window.scale_factor()));
                }
            }

            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let size = state.window.inner_size();
                state.presentation.reshape(viewport_for(size, scale_factor));
            }

            WindowEvent::RedrawRequested => {
                redraw(state, event_loop);
            }

            _ => {}
        }
    }
}

// ======================== Helpers ========================

/// Viewport with the UI strip converted to physical pixels.
fn viewport_for(size: PhysicalSize<u32>, scale_factor: f64) -> Viewport {
    let ui_width = (UI_WIDTH as f64 * scale_factor).round() as u32;
    Viewport::new(size.width, size.height, ui_width)
}

/// VSync → Fifo. Otherwise Mailbox (uncapped, no tearing) if available,
/// else Immediate, else Fifo.
fn choose_present_mode(available: &[wgpu::PresentMode], vsync: bool) -> wgpu::PresentMode {
    if vsync {
        return wgpu::PresentMode::Fifo;
    }
    [wgpu::PresentMode::Mailbox, wgpu::PresentMode::Immediate]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(wgpu::PresentMode::Fifo)
}

fn apply_command(state: &mut AppState, event_loop: &ActiveEventLoop, command: Command) {
    match command {
        Command::Quit => event_loop.exit(),
        Command::ToggleFullscreen => state.chrome.toggle(&state.window),
        Command::SetModelSize(size) => {
            match state.controller.set_model_size(&state.device, size) {
                Ok(()) => state.status.set(format!("Model size {}", size), Instant::now()),
                Err(err) => state.status.set(
                    format!("Keeping {}: {}", state.controller.model_size(), err),
                    Instant::now(),
                ),
            }
        }
        Command::SelectRule(index) => {
            if let Some(rule) = rules::rule_by_index(index) {
                state.controller.set_rule(rule);
            }
        }
        Command::SetInitialMode(mode) => state.controller.set_initial_mode(mode),
        Command::Reset => state.controller.request_reset(),
        Command::Screenshot => state.screenshot_requested = true,
        Command::ToggleVsync => {
            state.vsync = !state.vsync;
            state.surface_config.present_mode = choose_present_mode(&state.present_modes, state.vsync);
            state.surface.configure(&state.device, &state.surface_config);
            log::info!("Present mode: {:?}", state.surface_config.present_mode);
        }
    }
}

// ======================== Frame Rendering ========================

fn redraw(state: &mut AppState, event_loop: &ActiveEventLoop) {
    let now = Instant::now();

    // ---- Manual drawing (Empty mode only) ----
    if let Some((x, y)) = state.pointer.drawing_at() {
        if let Some(pos) = state.presentation.viewport().cursor_to_activity(x, y) {
            state.controller.set_activity(pos);
        }
    }

    // ---- egui frame ----
    let view = PanelView {
        model_size: state.controller.model_size(),
        rule_index: rules::index_of(state.controller.rule()).unwrap_or(0),
        initial_mode: state.controller.initial_mode(),
        generation: state.controller.generation(),
        vsync: state.vsync,
        stats: &state.stats,
    };
    let status = state.status.current(now).map(str::to_owned);
    let raw_input = state.egui_winit_state.take_egui_input(&state.window);
    let mut commands = Vec::new();
    let full_output = state.egui_ctx.run(raw_input, |ctx| {
        commands = ui::render_panel(ctx, &view, status.as_deref());
    });
    state
        .egui_winit_state
        .handle_platform_output(&state.window, full_output.platform_output);

    for command in commands {
        apply_command(state, event_loop, command);
    }

    // ---- Simulation tick ----
    let elapsed = now.duration_since(state.started);
    let mut sim_encoder = state
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sim_encoder"),
        });
    let tick = state
        .controller
        .tick(&state.device, &mut sim_encoder, elapsed);
    gpu::debug_scope(&state.device, "simulation tick", || {
        state.queue.submit(std::iter::once(sim_encoder.finish()));
    });
    state.stats.frame(now, tick == TickKind::Stepped);

    if let Some(grid) = state.controller.current_grid() {
        state.presentation.show(grid);
    }
    state.presentation.set_time(elapsed.as_secs_f32());

    // ---- Grid snapshot ----
    if state.screenshot_requested {
        state.screenshot_requested = false;
        save_snapshot(state);
    }

    // ---- Render pass ----
    let output = match state.surface.get_current_texture() {
        Ok(t) => t,
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            state.surface.configure(&state.device, &state.surface_config);
            return;
        }
        Err(e) => {
            log::error!("Surface error: {:?}", e);
            return;
        }
    };
    let view = output
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = state
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });
    state
        .presentation
        .draw(&state.device, &mut encoder, &view);

    // ---- egui render pass (on top of the board) ----
    let paint_jobs = state
        .egui_ctx
        .tessellate(full_output.shapes, full_output.pixels_per_point);
    for (id, image_delta) in &full_output.textures_delta.set {
        state
            .egui_renderer
            .update_texture(&state.device, &state.queue, *id, image_delta);
    }
    let screen_descriptor = egui_wgpu::ScreenDescriptor {
        size_in_pixels: [state.surface_config.width, state.surface_config.height],
        pixels_per_point: full_output.pixels_per_point,
    };
    state.egui_renderer.update_buffers(
        &state.device,
        &state.queue,
        &mut encoder,
        &paint_jobs,
        &screen_descriptor,
    );
    render_egui_pass(
        &state.egui_renderer,
        &mut encoder,
        &view,
        &paint_jobs,
        &screen_descriptor,
    );

    state.queue.submit(std::iter::once(encoder.finish()));
    output.present();

    for id in &full_output.textures_delta.free {
        state.egui_renderer.free_texture(id);
    }
}

fn save_snapshot(state: &mut AppState) {
    let path = capture::screenshot_path(
        &state.screenshot_dir,
        state.controller.generation(),
        state.controller.rule(),
        chrono::Local::now(),
    );
    let result = state
        .controller
        .read_current(&state.device, &state.queue)
        .map_err(|e| e.to_string())
        .and_then(|grid| capture::save_grid_png(&path, &grid).map_err(|e| e.to_string()));
    match result {
        Ok(()) => state.status.set(format!("Snapshot saved: {:?}", path), Instant::now()),
        Err(e) => {
            log::error!("Snapshot failed: {}", e);
            state.status.set(format!("Snapshot failed: {}", e), Instant::now());
        }
    }
}

// ======================== egui Render Helper ========================

/// Render egui paint jobs into a render pass.
/// Extracted as a free function to decouple the egui::Renderer lifetime
/// from the AppState borrow, allowing the render pass encoder to be local.
fn render_egui_pass(
    renderer: &egui_wgpu::Renderer,
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    paint_jobs: &[egui::ClippedPrimitive],
    screen_descriptor: &egui_wgpu::ScreenDescriptor,
) {
    let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("egui_render_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    // egui_wgpu::Renderer::render needs a RenderPass<'static>.
    let mut pass = pass.forget_lifetime();
    renderer.render(&mut pass, paint_jobs, screen_descriptor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::PresentMode;

    #[test]
    fn test_present_mode_preference() {
        let all = [PresentMode::Fifo, PresentMode::Immediate, PresentMode::Mailbox];
        assert_eq!(choose_present_mode(&all, false), PresentMode::Mailbox);
        assert_eq!(choose_present_mode(&all, true), PresentMode::Fifo);
        assert_eq!(
            choose_present_mode(&[PresentMode::Fifo, PresentMode::Immediate], false),
            PresentMode::Immediate
        );
        assert_eq!(choose_present_mode(&[PresentMode::Fifo], false), PresentMode::Fifo);
    }

    #[test]
    fn test_viewport_scales_ui_strip() {
        let vp = viewport_for(PhysicalSize::new(1600, 1200), 2.0);
        assert_eq!(vp, Viewport::new(1600, 1200, 500));
        assert_eq!(viewport_for(PhysicalSize::new(800, 600), 1.0).ui_width, 250);
    }
}
