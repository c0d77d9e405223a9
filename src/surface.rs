// ============================================================================
// surface.rs — Life GPU
// PlanarRenderer: draws one textured unit quad with a configured program.
// Used for the simulation step, the initial state and the on-screen view.
// ============================================================================

use bytemuck::{Pod, Zeroable};
use cgmath::{Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::generation::{CellGrid, GridId};
use crate::gpu::{self, GpuError};
use crate::shaders::ShaderProgram;

// ======================== Geometry ========================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct QuadVertex {
    coord: [f32; 2],
    tex_coord: [f32; 2],
}

// Texture row 0 is the top of the quad.
const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { coord: [-1.0, -1.0], tex_coord: [0.0, 1.0] },
    QuadVertex { coord: [-1.0, 1.0], tex_coord: [0.0, 0.0] },
    QuadVertex { coord: [1.0, -1.0], tex_coord: [1.0, 1.0] },
    QuadVertex { coord: [1.0, 1.0], tex_coord: [1.0, 0.0] },
];

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

/// Uniforms shared by every program (`PlanarUniforms` in planar.wgsl).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PlanarUniforms {
    pub mvp: [[f32; 4]; 4],
    pub res: [f32; 2],
    pub time: f32,
    pub _pad: f32,
}

// ======================== PlanarRenderer ========================

pub struct PlanarRenderer {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    params: Option<(wgpu::Buffer, wgpu::BindGroup)>,
    pending_params: Option<Vec<u8>>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,

    texture: Option<(GridId, wgpu::TextureView)>,
    // One entry per ping-pong grid.
    bind_groups: [Option<(GridId, wgpu::BindGroup)>; 2],
    next_slot: usize,

    projection: Matrix4<f32>,
    time: f32,
    width: u32,
    height: u32,
}

impl PlanarRenderer {
    /// Build the pipeline for `program` rendering into `format`. Shader
    /// compilation and layout validation failures are returned, not raised.
    pub fn configure(
        device: &wgpu::Device,
        program: &ShaderProgram,
        format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        gpu::capture(device, || Self::build(device, program, format)).map_err(|err| {
            GpuError::Program {
                label: program.label,
                msg: err.to_string(),
            }
        })
    }

    fn build(device: &wgpu::Device, program: &ShaderProgram, format: wgpu::TextureFormat) -> Self {
        let label = program.label;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(program.source.into()),
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label}_texture_bgl")),
            entries: &[bgl_uniform(0), bgl_texture(1), bgl_sampler(2)],
        });

        let params_layout = (program.params_size > 0).then(|| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label}_params_bgl")),
                entries: &[bgl_uniform(0)],
            })
        });

        let mut layouts = vec![&texture_layout];
        layouts.extend(params_layout.as_ref());
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label}_pipeline_layout")),
            bind_group_layouts: &layouts,
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label}_pipeline")),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Nearest + repeat: every sample is one whole cell and the grid is a torus.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label}_sampler")),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}_uniforms")),
            size: std::mem::size_of::<PlanarUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params = params_layout.map(|layout| {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label}_params")),
                size: program.params_size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label}_params_bg")),
                layout: &layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            (buffer, bind_group)
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_quad_vertices")),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_quad_indices")),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            label,
            pipeline,
            texture_layout,
            sampler,
            uniform_buffer,
            params,
            pending_params: None,
            vertex_buffer,
            index_buffer,
            texture: None,
            bind_groups: [None, None],
            next_slot: 0,
            projection: Matrix4::identity(),
            time: 0.0,
            width: 0,
            height: 0,
        }
    }

    // ======================== Setters ========================

    /// Sample `grid` on the next draw.
    pub fn set_texture(&mut self, grid: &CellGrid) {
        let view = grid.texture().create_view(&wgpu::TextureViewDescriptor::default());
        self.texture = Some((grid.id(), view));
    }

    pub fn clear_texture(&mut self) {
        self.texture = None;
    }

    /// Drop cached bind groups, e.g. after the grids were reallocated.
    pub fn forget_textures(&mut self) {
        self.clear_texture();
        self.bind_groups = [None, None];
        self.next_slot = 0;
    }

    pub fn texture_id(&self) -> Option<GridId> {
        self.texture.as_ref().map(|(id, _)| *id)
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.time = seconds;
    }

    pub fn set_projection(&mut self, projection: Matrix4<f32>) {
        self.projection = projection;
    }

    /// Size of the surface drawn into; also the `res` uniform.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Program-specific uniforms for bind group 1, uploaded on the next draw.
    pub fn set_params<T: Pod>(&mut self, params: &T) {
        debug_assert!(self.params.is_some(), "{} has no params block", self.label);
        self.pending_params = Some(bytemuck::bytes_of(params).to_vec());
    }

    pub fn uniforms(&self) -> PlanarUniforms {
        PlanarUniforms {
            mvp: self.projection.into(),
            res: [self.width as f32, self.height as f32],
            time: self.time,
            _pad: 0.0,
        }
    }

    // ======================== Draw ========================

    /// Record copies of the shared uniforms and any pending params into
    /// `encoder`. Must come before the pass that draws with them, so several
    /// draws recorded into one encoder each see their own values.
    pub fn upload(&mut self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        let uniforms = self.uniforms();
        stage_copy(device, encoder, &self.uniform_buffer, bytemuck::bytes_of(&uniforms), self.label);
        if let (Some((buffer, _)), Some(bytes)) = (&self.params, self.pending_params.take()) {
            stage_copy(device, encoder, buffer, &bytes, self.label);
        }
    }

    /// Record the quad into `pass`, using the values of the last `upload`.
    /// Does nothing without a texture or with a zero-sized surface.
    pub fn draw(&mut self, device: &wgpu::Device, pass: &mut wgpu::RenderPass<'_>) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let Some((id, view)) = &self.texture else {
            return;
        };
        let id = *id;

        let slot = match self
            .bind_groups
            .iter()
            .position(|entry| matches!(entry, Some((cached, _)) if *cached == id))
        {
            Some(slot) => slot,
            None => {
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("{}_texture_bg", self.label)),
                    layout: &self.texture_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: self.uniform_buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                });
                let slot = self.next_slot;
                self.next_slot = 1 - slot;
                self.bind_groups[slot] = Some((id, bind_group));
                log::trace!("{}: new bind group for {:?} in slot {}", self.label, id, slot);
                slot
            }
        };

        let Some((_, texture_bind_group)) = &self.bind_groups[slot] else {
            return;
        };
        pass.set_viewport(0.0, 0.0, self.width as f32, self.height as f32, 0.0, 1.0);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, texture_bind_group, &[]);
        if let Some((_, params_bind_group)) = &self.params {
            pass.set_bind_group(1, params_bind_group, &[]);
        }
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
    }
}

// ======================== Helpers ========================

/// Copy `bytes` into `dst` through a one-shot staging buffer, in encoder order.
fn stage_copy(
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    dst: &wgpu::Buffer,
    bytes: &[u8],
    label: &str,
) {
    let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{label}_staging")),
        contents: bytes,
        usage: wgpu::BufferUsages::COPY_SRC,
    });
    encoder.copy_buffer_to_buffer(&staging, 0, dst, 0, bytes.len() as wgpu::BufferAddress);
}

fn bgl_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn bgl_sampler(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSize;
    use crate::generation::GenerationStore;
    use crate::gpu::test_device;
    use crate::shaders::{self, InitParams};

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<PlanarUniforms>(), 80);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
    }

    #[test]
    fn test_all_programs_configure() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        for program in [shaders::SIMULATION, shaders::INITIAL_STATE] {
            PlanarRenderer::configure(&device, &program, crate::generation::CELL_FORMAT).unwrap();
        }
        PlanarRenderer::configure(&device, &shaders::SCREEN, wgpu::TextureFormat::Bgra8UnormSrgb)
            .unwrap();
    }

    #[test]
    fn test_broken_program_is_an_error() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        let broken = ShaderProgram {
            label: "broken",
            source: "@fragment fn fs_main() -> @location(0) vec4<f32> { return nope; }",
            params_size: 0,
        };
        let result = PlanarRenderer::configure(&device, &broken, crate::generation::CELL_FORMAT);
        assert!(matches!(result, Err(GpuError::Program { label: "broken", .. })));
    }

    #[test]
    fn test_bind_group_cache_holds_both_grids() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        let mut store = GenerationStore::new(ModelSize::S128);
        store.allocate(&device, ModelSize::S128).unwrap();
        let mut renderer =
            PlanarRenderer::configure(&device, &shaders::INITIAL_STATE, crate::generation::CELL_FORMAT)
                .unwrap();
        renderer.resize(128, 128);
        renderer.set_params(&InitParams::default());

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("cache_test_target"),
            size: wgpu::Extent3d {
                width: 128,
                height: 128,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: crate::generation::CELL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target.create_view(&Default::default());

        let ids = [store.current().unwrap().id(), store.next().unwrap().id()];
        for source in [store.current().unwrap(), store.next().unwrap(), store.current().unwrap()] {
            renderer.set_texture(source);
            let mut encoder = device.create_command_encoder(&Default::default());
            renderer.upload(&device, &mut encoder);
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("cache_test"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
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
                renderer.draw(&device, &mut pass);
            }
            drop(encoder);
        }
        let cached: Vec<GridId> = renderer.bind_groups.iter().flatten().map(|(id, _)| *id).collect();
        assert_eq!(cached.len(), 2);
        assert!(ids.iter().all(|id| cached.contains(id)));
        assert_eq!(renderer.next_slot, 0);
    }
}
