// ============================================================================
// target.rs — Life GPU
// Off-screen render target: redirects drawing into whichever cell grid is
// receiving the next generation.
// ============================================================================

use crate::generation::{CellGrid, GridId};

#[derive(Default)]
pub struct OffscreenTarget {
    attachment: Option<(GridId, wgpu::TextureView)>,
}

impl OffscreenTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `grid` the color attachment of subsequent passes.
    pub fn attach(&mut self, grid: &CellGrid) {
        let view = grid.texture().create_view(&wgpu::TextureViewDescriptor::default());
        self.attachment = Some((grid.id(), view));
    }

    pub fn detach(&mut self) {
        self.attachment = None;
    }

    pub fn attached(&self) -> Option<GridId> {
        self.attachment.as_ref().map(|(id, _)| *id)
    }

    /// Start a pass writing every texel of the attached grid.
    /// Returns `None` while nothing is attached.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
    ) -> Option<wgpu::RenderPass<'e>> {
        let (_, view) = self.attachment.as_ref()?;
        Some(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
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
        }))
    }
}
