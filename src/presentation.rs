// ============================================================================
// presentation.rs — Life GPU
// Maps the current generation into window pixels: a square board centred
// to the right of the UI strip, drawn with an orthographic projection.
// ============================================================================

use cgmath::Matrix4;

use crate::controller::ActivityPos;
use crate::generation::CellGrid;
use crate::gpu::GpuError;
use crate::shaders;
use crate::surface::PlanarRenderer;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Square area of the window showing the grid, in pixels from the top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoardRect {
    pub x: f32,
    pub y: f32,
    pub side: f32,
}

/// Window size and the strip on the left reserved for the UI, in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub ui_width: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, ui_width: u32) -> Self {
        Self {
            width,
            height,
            ui_width,
        }
    }

    /// Largest square right of the UI strip, centred in that area.
    pub fn board(&self) -> BoardRect {
        let avail_w = self.width.saturating_sub(self.ui_width) as f32;
        let avail_h = self.height as f32;
        let side = avail_w.min(avail_h);
        BoardRect {
            x: self.ui_width as f32 + (avail_w - side) / 2.0,
            y: (avail_h - side) / 2.0,
            side,
        }
    }

    /// Projection taking the unit quad ([-1, 1]²) onto the board.
    pub fn projection(&self) -> Matrix4<f32> {
        let board = self.board();
        if board.side <= 0.0 || self.width == 0 || self.height == 0 {
            return Matrix4::from_scale(0.0);
        }
        let (w, h) = (self.width as f32, self.height as f32);

        let x0 = 2.0 * board.x / w - 1.0;
        let x1 = 2.0 * (board.x + board.side) / w - 1.0;
        let y0 = 1.0 - 2.0 * (board.y + board.side) / h;
        let y1 = 1.0 - 2.0 * board.y / h;

        // ortho() maps [l, r] onto [-1, 1]; choose l, r so that [-1, 1]
        // lands on [x0, x1] instead.
        let (ax, cx) = ((x1 - x0) / 2.0, (x1 + x0) / 2.0);
        let (ay, cy) = ((y1 - y0) / 2.0, (y1 + y0) / 2.0);
        let left = (-1.0 - cx) / ax;
        let right = (1.0 - cx) / ax;
        let bottom = (-1.0 - cy) / ay;
        let top = (1.0 - cy) / ay;

        OPENGL_TO_WGPU_MATRIX * cgmath::ortho(left, right, bottom, top, -1.0, 1.0)
    }

    /// Normalized grid position under a cursor, or `None` off the board
    /// (including anywhere over the UI strip).
    pub fn cursor_to_activity(&self, x: f64, y: f64) -> Option<ActivityPos> {
        let board = self.board();
        if board.side <= 0.0 {
            return None;
        }
        let s = (x as f32 - board.x) / board.side;
        let t = (y as f32 - board.y) / board.side;
        ActivityPos::new(s, t)
    }
}

// ======================== Presentation ========================

pub struct Presentation {
    renderer: PlanarRenderer,
    viewport: Viewport,
}

impl Presentation {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        viewport: Viewport,
    ) -> Result<Self, GpuError> {
        let renderer = PlanarRenderer::configure(device, &shaders::SCREEN, format)?;
        let mut presentation = Self { renderer, viewport };
        presentation.reshape(viewport);
        Ok(presentation)
    }

    pub fn reshape(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.renderer.resize(viewport.width, viewport.height);
        self.renderer.set_projection(viewport.projection());
        log::debug!("Reshape {}x{}, board {:?}", viewport.width, viewport.height, viewport.board());
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Display `grid` from the next draw on.
    pub fn show(&mut self, grid: &CellGrid) {
        if self.renderer.texture_id() != Some(grid.id()) {
            self.renderer.set_texture(grid);
        }
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.renderer.set_time(seconds);
    }

    /// Clear `view` to black and draw the board.
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) {
        self.renderer.upload(device, encoder);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("screen_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.renderer.draw(device, &mut pass);
    }
}
