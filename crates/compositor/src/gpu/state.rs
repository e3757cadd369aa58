use std::time::{Duration, Instant};

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::backend::{blur_radius, Backend, CompositeFrame};
use crate::dotmask::DotMask;
use crate::geometry::{mesh, Vertex};
use crate::textures::{TextureId, TextureLayout, TextureSet};
use crate::types::{DotMaskStyle, Enhancer, GpuSettings, Upscaler};
use crate::uniforms::{BlurUniforms, FilterUniforms, FragmentUniforms, MergeUniforms, VertexUniforms};

use super::context::GpuContext;
use super::kernels::{KernelKind, Kernels};
use super::shaders;
use super::textures::{GpuTexture, Samplers, DEPTH_FORMAT};

/// Composite bindings in set 1: scanlined, bloom r/g/b, dot mask, then the two samplers.
const COMPOSITE_TEXTURES: u32 = 5;

struct CompositePipeline {
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
}

impl CompositePipeline {
    fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite uniform layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite texture layout"),
            entries: &build_texture_layout_entries(),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("composite pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let vertex_module = shaders::composite_vertex_module(device);
        let fragment_module = shaders::composite_fragment_module(device);
        let attributes = wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x2];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("composite pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_layout,
            texture_layout,
        }
    }

    fn uniforms(&self, device: &wgpu::Device) -> CompositeUniforms {
        let vertex = uniform_buffer(device, "vertex uniforms", std::mem::size_of::<VertexUniforms>());
        let fragment =
            uniform_buffer(device, "fragment uniforms", std::mem::size_of::<FragmentUniforms>());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite uniforms"),
            layout: &self.uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: vertex.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: fragment.as_entire_binding(),
                },
            ],
        });
        CompositeUniforms {
            vertex,
            fragment,
            bind_group,
        }
    }

    /// Binds scanlined, the bloom channels and the dot mask. Only the dot mask
    /// is ever replaced, so this is rebuilt when a new mask is installed.
    fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        textures: &TextureSet<GpuTexture>,
        dot_mask: &GpuTexture,
        samplers: &Samplers,
    ) -> wgpu::BindGroup {
        let views = [
            &textures[TextureId::Scanlined].view,
            &textures[TextureId::BloomR].view,
            &textures[TextureId::BloomG].view,
            &textures[TextureId::BloomB].view,
            &dot_mask.view,
        ];
        let mut entries: Vec<wgpu::BindGroupEntry<'_>> = views
            .iter()
            .enumerate()
            .map(|(index, view)| wgpu::BindGroupEntry {
                binding: index as u32,
                resource: wgpu::BindingResource::TextureView(*view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: COMPOSITE_TEXTURES,
            resource: wgpu::BindingResource::Sampler(&samplers.linear),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: COMPOSITE_TEXTURES + 1,
            resource: wgpu::BindingResource::Sampler(&samplers.nearest),
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite textures"),
            layout: &self.texture_layout,
            entries: &entries,
        })
    }
}

/// Composite uniform blocks, written in place before every draw.
struct CompositeUniforms {
    vertex: wgpu::Buffer,
    fragment: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn build_texture_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries: Vec<_> = (0..COMPOSITE_TEXTURES)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        })
        .collect();
    for binding in [COMPOSITE_TEXTURES, COMPOSITE_TEXTURES + 1] {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

/// Measured presentation rate, logged once per second.
struct FrameStats {
    last_update: Instant,
    frames_since_update: u32,
    frames_per_second: f32,
    frame_count: u64,
}

impl FrameStats {
    fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frames_since_update: 0,
            frames_per_second: 0.0,
            frame_count: 0,
        }
    }

    fn record(&mut self, frame: &CompositeFrame) {
        let now = Instant::now();
        self.frame_count += 1;
        self.frames_since_update += 1;
        let elapsed = now.saturating_duration_since(self.last_update);
        if elapsed >= Duration::from_secs(1) {
            self.frames_per_second = self.frames_since_update as f32 / elapsed.as_secs_f32();
            self.frames_since_update = 0;
            self.last_update = now;
            debug!(
                fps = self.frames_per_second.round(),
                frame_count = self.frame_count,
                geometry = ?frame.geometry,
                alpha = frame.fragment.alpha,
                "render stats"
            );
        }
    }
}

/// wgpu implementation of [`Backend`].
///
/// Stage calls record compute passes into a lazily created encoder; the
/// composite call appends the render pass, submits everything and presents.
pub struct GpuBackend {
    context: GpuContext,
    layout: TextureLayout,
    textures: TextureSet<GpuTexture>,
    dot_mask: GpuTexture,
    depth: GpuTexture,
    samplers: Samplers,
    kernels: Kernels,
    composite: CompositePipeline,
    composite_uniforms: CompositeUniforms,
    composite_textures: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    encoder: Option<wgpu::CommandEncoder>,
    stats: FrameStats,
}

impl GpuBackend {
    pub fn new<T>(
        target: &T,
        size: PhysicalSize<u32>,
        layout: TextureLayout,
        settings: GpuSettings,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, &layout, &settings)?;
        let device = &context.device;

        let textures = TextureSet::build(&layout, |id, extent| GpuTexture::storage(device, id, extent));
        let dot_mask = GpuTexture::dot_mask(
            device,
            &context.queue,
            &DotMask::synthesize(DotMaskStyle::None, 1.0),
        );
        let depth = GpuTexture::depth(device, (context.config.width, context.config.height));
        let samplers = Samplers::new(device);
        let kernels = Kernels::new(device);
        let composite = CompositePipeline::new(device, context.surface_format);
        let composite_uniforms = composite.uniforms(device);
        let composite_textures =
            composite.texture_bind_group(device, &textures, &dot_mask, &samplers);
        let vertices = mesh();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("composite mesh"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let (field_width, field_height) = layout.field_size();
        debug!(
            field_width,
            field_height,
            surface_format = ?context.surface_format,
            "gpu backend ready"
        );

        Ok(Self {
            context,
            layout,
            textures,
            dot_mask,
            depth,
            samplers,
            kernels,
            composite,
            composite_uniforms,
            composite_textures,
            vertex_buffer,
            encoder: None,
            stats: FrameStats::new(),
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.depth = GpuTexture::depth(&self.context.device, (new_size.width, new_size.height));
    }

    pub fn set_vsync(&mut self, enabled: bool) {
        self.context.set_vsync(enabled);
    }

    pub fn frames_per_second(&self) -> f32 {
        self.stats.frames_per_second
    }

    fn run(&mut self, kind: KernelKind, inputs: &[TextureId], outputs: &[TextureId], uniform: Option<&[u8]>) {
        let Self {
            context,
            textures,
            kernels,
            encoder,
            ..
        } = self;
        if encoder.is_none() {
            kernels.rewind();
        }
        let encoder = encoder.get_or_insert_with(|| {
            context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                })
        });
        kernels.get_mut(kind).dispatch(
            &context.device,
            &context.queue,
            encoder,
            textures,
            inputs,
            outputs,
            uniform,
        );
    }

    /// Submits recorded compute work without drawing.
    fn submit_pending(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}

impl Backend for GpuBackend {
    type Error = wgpu::SurfaceError;

    fn layout(&self) -> TextureLayout {
        self.layout
    }

    fn output_size(&self) -> (u32, u32) {
        (self.context.config.width, self.context.config.height)
    }

    fn upload(&mut self, target: TextureId, pixels: &[u32]) {
        self.textures[target].write_pixels(&self.context.queue, bytemuck::cast_slice(pixels));
    }

    fn merge_interlaced(&mut self, scales: MergeUniforms) {
        self.run(
            KernelKind::Merge,
            &[TextureId::LongField, TextureId::ShortField],
            &[TextureId::Merged],
            Some(bytemuck::bytes_of(&scales)),
        );
    }

    fn merge_bypass(&mut self, source: TextureId) {
        self.run(KernelKind::LineDouble, &[source], &[TextureId::Merged], None);
    }

    fn enhance(&mut self, enhancer: Enhancer) {
        let kind = match enhancer {
            Enhancer::Bypass => KernelKind::Copy,
            Enhancer::Epx => KernelKind::EpxEnhance,
            Enhancer::Xbr => KernelKind::XbrEnhance,
        };
        self.run(kind, &[TextureId::Merged], &[TextureId::Enhanced], None);
    }

    fn split_bloom(&mut self, brightness: f32) {
        let params = FilterUniforms {
            brightness,
            weight: 0.0,
            mode: 0,
            padding: 0.0,
        };
        self.run(
            KernelKind::BloomSplit,
            &[TextureId::Merged],
            &TextureId::BLOOM,
            Some(bytemuck::bytes_of(&params)),
        );
    }

    fn blur(&mut self, target: TextureId, sigma: f32) {
        let radius = blur_radius(sigma);
        let Some(scratch) = target.blur_scratch() else {
            warn!(texture = target.label(), "texture has no blur scratch; skipping blur");
            return;
        };
        if radius == 0 {
            return;
        }
        for (direction, from, to) in [([1, 0], target, scratch), ([0, 1], scratch, target)] {
            let params = BlurUniforms {
                direction,
                radius: radius as i32,
                sigma,
            };
            self.run(KernelKind::Blur, &[from], &[to], Some(bytemuck::bytes_of(&params)));
        }
    }

    fn upscale(&mut self, upscaler: Upscaler) {
        let kind = match upscaler {
            Upscaler::Bypass => KernelKind::ReplicateUpscale,
            Upscaler::Epx => KernelKind::EpxUpscale,
            Upscaler::Xbr => KernelKind::XbrUpscale,
        };
        self.run(kind, &[TextureId::Enhanced], &[TextureId::Upscaled], None);
    }

    fn apply_scanlines(&mut self, params: FilterUniforms) {
        self.run(
            KernelKind::Scanlines,
            &[TextureId::Upscaled],
            &[TextureId::Scanlined],
            Some(bytemuck::bytes_of(&params)),
        );
    }

    fn clear(&mut self, target: TextureId) {
        self.run(KernelKind::Clear, &[], &[target], None);
    }

    fn install_dot_mask(&mut self, mask: &DotMask) {
        let device = &self.context.device;
        self.dot_mask = GpuTexture::dot_mask(device, &self.context.queue, mask);
        self.composite_textures = self.composite.texture_bind_group(
            device,
            &self.textures,
            &self.dot_mask,
            &self.samplers,
        );
    }

    fn composite(&mut self, frame: &CompositeFrame) -> Result<(), Self::Error> {
        let surface_texture = match self.context.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err) => {
                // The stage work is still valid; keep the textures current.
                self.submit_pending();
                return Err(err);
            }
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let queue = &self.context.queue;
        queue.write_buffer(&self.composite_uniforms.vertex, 0, bytemuck::bytes_of(&frame.vertex));
        queue.write_buffer(
            &self.composite_uniforms.fragment,
            0,
            bytemuck::bytes_of(&frame.fragment),
        );

        let mut encoder = self.encoder.take().unwrap_or_else(|| {
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                })
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.composite.pipeline);
            render_pass.set_bind_group(0, &self.composite_uniforms.bind_group, &[]);
            render_pass.set_bind_group(1, &self.composite_textures, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.draw(frame.geometry.vertex_range(), 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        self.stats.record(frame);
        Ok(())
    }
}
