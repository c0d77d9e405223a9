// ============================================================================
// gpu.rs — Life GPU
// Device acquisition, error scopes and texture readback shared by the
// windowed and headless front ends.
// ============================================================================

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("Failed to allocate {label}: {msg}")]
    Allocation { label: &'static str, msg: String },

    #[error("Failed to build shader program {label}: {msg}")]
    Program { label: &'static str, msg: String },

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Readback channel closed before the buffer was mapped")]
    ReadbackLost,

    #[error("Cell grids have not been allocated")]
    NotAllocated,
}

pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

/// Pick an adapter (compatible with `surface` when one is given) and open a
/// device on it. Uncaptured errors are logged instead of aborting.
pub async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<GpuContext, GpuError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GpuError::NoAdapter)?;

    let info = adapter.get_info();
    log::info!("GPU: {} ({:?}, {:?})", info.name, info.device_type, info.backend);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("life_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;

    device.on_uncaptured_error(Box::new(|err| {
        log::error!("Uncaptured GPU error: {}", err);
    }));

    Ok(GpuContext {
        adapter,
        device,
        queue,
    })
}

// ======================== Error Scopes ========================

/// Run `make` inside validation and out-of-memory error scopes and report
/// the first error raised while it ran.
pub fn capture<T>(device: &wgpu::Device, make: impl FnOnce() -> T) -> Result<T, wgpu::Error> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = make();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    match validation.or(oom) {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

/// Debug builds check every scoped GPU call and log failures with `label`.
/// Release builds just run `f`.
pub fn debug_scope<T>(device: &wgpu::Device, label: &str, f: impl FnOnce() -> T) -> T {
    #[cfg(debug_assertions)]
    {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("GPU validation error in {}: {}", label, err);
        }
        value
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = (device, label);
        f()
    }
}

// ======================== Readback ========================

/// Copy a whole 2D texture into tightly packed rows on the CPU.
/// Blocks until the GPU has finished all submitted work.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    bytes_per_pixel: u32,
) -> Result<Vec<u8>, GpuError> {
    let width = texture.width();
    let height = texture.height();
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let unpadded_bpr = width * bytes_per_pixel;
    let padded_bpr = (unpadded_bpr + align - 1) / align * align;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback_staging"),
        size: (padded_bpr * height) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv().map_err(|_| GpuError::ReadbackLost)??;

    let data = slice.get_mapped_range();
    let mut packed = Vec::with_capacity((unpadded_bpr * height) as usize);
    for row in 0..height {
        let start = (row * padded_bpr) as usize;
        packed.extend_from_slice(&data[start..start + unpadded_bpr as usize]);
    }
    drop(data);
    staging.unmap();
    Ok(packed)
}

/// Device for GPU tests; `None` when the machine has no usable adapter.
#[cfg(test)]
pub fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    match pollster::block_on(request_device(&instance, None)) {
        Ok(ctx) => Some((ctx.device, ctx.queue)),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_reports_validation_errors() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        let ok = capture(&device, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("ok"),
                size: 64,
                usage: wgpu::BufferUsages::UNIFORM,
                mapped_at_creation: false,
            })
        });
        assert!(ok.is_ok());

        // MAP_READ may only be combined with COPY_DST.
        let bad = capture(&device, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("bad"),
                size: 64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::UNIFORM,
                mapped_at_creation: false,
            })
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_read_texture_strips_row_padding() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        // 8 bytes per row, far below the 256-byte copy alignment.
        let (w, h) = (8u32, 3u32);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("readback_test"),
            size: wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let pixels: Vec<u8> = (0..w * h).map(|i| i as u8).collect();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(w),
                rows_per_image: Some(h),
            },
            texture.size(),
        );
        let back = read_texture(&device, &queue, &texture, 1).unwrap();
        assert_eq!(back, pixels);
    }
}
