use std::{borrow::Cow, mem::size_of, num::NonZeroU64};

use glam::{Mat4, Vec4};
use umbra::{
    types::{DeviceCapabilities, PolygonMode, RenderState},
    util::typedefs::FastHashMap,
    RenderContext,
};
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    Buffer, BufferAddress, BufferBindingType, BufferDescriptor, BufferUsages, Color, CommandEncoder, Device, Features,
    FragmentState, LoadOp, MultisampleState, Operations, PipelineLayout, PipelineLayoutDescriptor, Queue,
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor, RenderPipeline,
    RenderPipelineDescriptor, ShaderModule, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp,
    TextureFormat, TextureView, VertexAttribute, VertexBufferLayout, VertexState, VertexStepMode,
};

use crate::{
    conv,
    recording::{ColorVertex, DrawKind, FrameRecording, PipelineKey},
    shaders::shader_source,
};

const VERTEX_ATTRIBUTES: [VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];

/// Stencil bits of the depth stencil formats wgpu exposes.
const STENCIL_BITS: u8 = 8;

fn load_shader(device: &Device, name: &str) -> ShaderModule {
    let source = shader_source(name).unwrap_or_else(|| panic!("shader {name} is not embedded"));
    device.create_shader_module(ShaderModuleDescriptor {
        label: Some(name),
        source: ShaderSource::Wgsl(Cow::Owned(source)),
    })
}

/// Device resources for drawing umbra frames with wgpu.
///
/// Pipelines are created the first time a render state is used and kept for
/// the life of the routine. The shadow renderer only ever uses a handful of
/// states per scene, so the cache stays small.
pub struct ShadowVolumeRoutine {
    world_module: ShaderModule,
    screen_module: ShaderModule,
    layout: PipelineLayout,
    uniform_buffer: Buffer,
    bind_group: BindGroup,
    pipelines: FastHashMap<PipelineKey, RenderPipeline>,
    color_format: TextureFormat,
    depth_format: TextureFormat,
    line_mode: bool,
}

impl ShadowVolumeRoutine {
    pub fn new(device: &Device, color_format: TextureFormat, depth_format: TextureFormat) -> Self {
        profiling::scope!("ShadowVolumeRoutine::new");

        let world_module = load_shader(device, "shadow_volume.wgsl");
        let screen_module = load_shader(device, "shadow_composite.wgsl");

        let bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("shadow uniforms"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(size_of::<Mat4>() as u64),
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("shadow uniforms"),
            size: size_of::<Mat4>() as BufferAddress,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("shadow uniforms"),
            layout: &bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("shadow pipelines"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let line_mode = device.features().contains(Features::POLYGON_MODE_LINE);
        if !line_mode {
            log::debug!("Device lacks POLYGON_MODE_LINE, wireframe draws will be skipped");
        }

        Self {
            world_module,
            screen_module,
            layout,
            uniform_buffer,
            bind_group,
            pipelines: FastHashMap::default(),
            color_format,
            depth_format,
            line_mode,
        }
    }

    /// wgpu always has independent front and back stencil state. Stencil
    /// bits depend on the depth format the routine renders with.
    pub fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            stencil_bits: if self.depth_format.has_stencil_aspect() {
                STENCIL_BITS
            } else {
                0
            },
            two_sided_stencil: true,
        }
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Starts recording a frame seen through `view_proj`.
    pub fn begin_frame(&mut self, queue: &Queue, view_proj: Mat4) -> ShadowFrame<'_> {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&view_proj));
        ShadowFrame {
            routine: self,
            state: RenderState::default(),
            recording: FrameRecording::new(),
        }
    }

    fn ensure_pipeline(&mut self, device: &Device, key: &PipelineKey) {
        if self.pipelines.contains_key(key) {
            return;
        }
        let pipeline = self.create_pipeline(device, key);
        self.pipelines.insert(*key, pipeline);
    }

    fn create_pipeline(&self, device: &Device, key: &PipelineKey) -> RenderPipeline {
        profiling::scope!("ShadowVolumeRoutine::create_pipeline");
        log::debug!("Creating {:?} pipeline for {:?}", key.kind, key.state);

        let (label, module) = match key.kind {
            DrawKind::World => ("shadow world pipeline", &self.world_module),
            DrawKind::Screen => ("shadow screen pipeline", &self.screen_module),
        };

        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&self.layout),
            vertex: VertexState {
                module,
                entry_point: "vs_main",
                buffers: &[VertexBufferLayout {
                    array_stride: size_of::<ColorVertex>() as BufferAddress,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
            },
            primitive: conv::primitive_state(&key.state),
            depth_stencil: Some(conv::depth_stencil_state(&key.state, self.depth_format)),
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                module,
                entry_point: "fs_main",
                targets: &[Some(conv::color_target_state(&key.state, self.color_format))],
            }),
            multiview: None,
        })
    }
}

pub struct ShadowFrameFinishArgs<'a> {
    pub device: &'a Device,
    pub encoder: &'a mut CommandEncoder,

    pub color: &'a TextureView,
    pub depth_stencil: &'a TextureView,

    /// Color the frame starts with. Depth starts at 1.0 and stencil at 0.
    pub clear_color: Color,
}

/// A frame being recorded. Implements [`RenderContext`], hand it to
/// [`StencilShadowRenderer::render_frame`](umbra::StencilShadowRenderer::render_frame)
/// and then [`finish`](Self::finish) it.
///
/// Positions are in world space, the view projection given to
/// [`ShadowVolumeRoutine::begin_frame`] takes them to clip space.
pub struct ShadowFrame<'a> {
    routine: &'a mut ShadowVolumeRoutine,
    state: RenderState,
    recording: FrameRecording,
}

impl<'a> ShadowFrame<'a> {
    pub fn recording(&self) -> &FrameRecording {
        &self.recording
    }

    /// Encodes the recorded frame into `args.encoder`.
    pub fn finish(self, args: ShadowFrameFinishArgs<'_>) {
        profiling::scope!("ShadowFrame::finish");

        let ShadowFrame { routine, recording, .. } = self;
        for key in recording.keys() {
            routine.ensure_pipeline(args.device, key);
        }
        let routine: &ShadowVolumeRoutine = routine;

        let vertex_buffer = (!recording.vertices.is_empty()).then(|| {
            args.device.create_buffer_init(&BufferInitDescriptor {
                label: Some("shadow frame vertices"),
                contents: bytemuck::cast_slice(&recording.vertices),
                usage: BufferUsages::VERTEX,
            })
        });
        let has_stencil = routine.depth_format.has_stencil_aspect();

        for (idx, pass) in recording.passes.iter().enumerate() {
            let first = idx == 0;
            let stencil_load = match pass.clear_stencil {
                Some(value) => LoadOp::Clear(value as u32),
                None if first => LoadOp::Clear(0),
                None => LoadOp::Load,
            };

            let mut rpass = args.encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("shadow frame"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: args.color,
                    resolve_target: None,
                    ops: Operations {
                        load: if first { LoadOp::Clear(args.clear_color) } else { LoadOp::Load },
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: args.depth_stencil,
                    depth_ops: Some(Operations {
                        load: if first { LoadOp::Clear(1.0) } else { LoadOp::Load },
                        store: StoreOp::Store,
                    }),
                    stencil_ops: has_stencil.then_some(Operations {
                        load: stencil_load,
                        store: StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let Some(vertex_buffer) = &vertex_buffer else {
                continue;
            };
            rpass.set_vertex_buffer(0, vertex_buffer.slice(..));
            rpass.set_bind_group(0, &routine.bind_group, &[]);

            for draw in &pass.draws {
                let Some(pipeline) = routine.pipelines.get(&draw.key) else {
                    continue;
                };
                rpass.set_pipeline(pipeline);
                rpass.set_stencil_reference(draw.stencil_reference);
                rpass.draw(draw.first_vertex..draw.first_vertex + draw.vertex_count, 0..1);
            }
        }
    }
}

impl<'a> RenderContext for ShadowFrame<'a> {
    fn capabilities(&self) -> DeviceCapabilities {
        self.routine.capabilities()
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn set_render_state(&mut self, state: &RenderState) {
        self.state = *state;
    }

    fn clear_stencil(&mut self, value: u8) {
        self.recording.clear_stencil(value);
    }

    fn draw_triangles(&mut self, positions: &[Vec4], color: Vec4) {
        if self.state.polygon_mode == PolygonMode::Line && !self.routine.line_mode {
            return;
        }
        self.recording.draw(DrawKind::World, &self.state, positions, color);
    }

    fn draw_fullscreen_quad(&mut self, color: Vec4) {
        if self.state.polygon_mode == PolygonMode::Line && !self.routine.line_mode {
            return;
        }
        self.recording.draw_fullscreen(&self.state, color);
    }
}
