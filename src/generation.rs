// ============================================================================
// generation.rs — Life GPU
// GenerationStore: the ping-pong pair of cell-grid textures. One holds the
// current generation, the other receives the next one.
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ModelSize;
use crate::gpu::{self, GpuError};
use crate::reference::CpuGrid;

pub const CELL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

static NEXT_GRID_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one allocated grid texture. Never reused, so bind groups
/// cached against an id stay valid for exactly that texture's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridId(u64);

// ======================== CellGrid ========================

/// Exclusive owner of one `size × size` single-channel texture.
/// The texture is destroyed when the grid is dropped.
pub struct CellGrid {
    id: GridId,
    texture: wgpu::Texture,
    size: u32,
}

impl CellGrid {
    fn new(device: &wgpu::Device, size: ModelSize, label: &str) -> Self {
        let texels = size.texels();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: texels,
                height: texels,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CELL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Self {
            id: GridId(NEXT_GRID_ID.fetch_add(1, Ordering::Relaxed)),
            texture,
            size: texels,
        }
    }

    pub fn id(&self) -> GridId {
        self.id
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Drop for CellGrid {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

// ======================== GenerationStore ========================

pub struct GenerationStore {
    grids: Option<[CellGrid; 2]>,
    // Ping-pong index: 0 or 1
    current: usize,
    size: ModelSize,
    generation: u64,
}

impl GenerationStore {
    /// Empty store; call [`GenerationStore::allocate`] before use.
    pub fn new(size: ModelSize) -> Self {
        Self {
            grids: None,
            current: 0,
            size,
            generation: 0,
        }
    }

    /// Create a fresh texture pair of `size`. The previous pair is released
    /// only once the new one exists; on failure the store is left untouched.
    pub fn allocate(&mut self, device: &wgpu::Device, size: ModelSize) -> Result<(), GpuError> {
        let pair = gpu::capture(device, || {
            [
                CellGrid::new(device, size, "cell_grid_0"),
                CellGrid::new(device, size, "cell_grid_1"),
            ]
        })
        .map_err(|err| GpuError::Allocation {
            label: "cell grid pair",
            msg: err.to_string(),
        })?;

        self.release();
        self.grids = Some(pair);
        self.current = 0;
        self.size = size;
        self.generation = 0;
        log::debug!("Allocated cell grids {} ({} live textures)", size, self.live_textures());
        Ok(())
    }

    /// Destroy both textures. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.grids.take().is_some() {
            log::debug!("Released cell grids {}", self.size);
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.grids.is_some()
    }

    /// Number of grid textures currently owned (0 or 2).
    pub fn live_textures(&self) -> usize {
        self.grids.as_ref().map_or(0, |g| g.len())
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    pub fn current(&self) -> Option<&CellGrid> {
        self.grids.as_ref().map(|g| &g[self.current])
    }

    pub fn next(&self) -> Option<&CellGrid> {
        self.grids.as_ref().map(|g| &g[1 - self.current])
    }

    pub fn size(&self) -> ModelSize {
        self.size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn advance_generation(&mut self) {
        self.generation += 1;
    }

    pub fn reset_generation(&mut self) {
        self.generation = 0;
    }

    /// Copy the current generation back to the CPU.
    pub fn read_current(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<CpuGrid, GpuError> {
        let grid = self.current().ok_or(GpuError::NotAllocated)?;
        let texels = gpu::read_texture(device, queue, grid.texture(), 1)?;
        Ok(CpuGrid::from_texels(grid.size(), &texels))
    }

    #[cfg(test)]
    pub fn upload_current(&self, queue: &wgpu::Queue, cells: &CpuGrid) {
        let Some(grid) = self.current() else {
            return;
        };
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: grid.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &cells.to_texels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(grid.size()),
                rows_per_image: Some(grid.size()),
            },
            grid.texture().size(),
        );
    }
}
