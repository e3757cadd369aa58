use std::collections::HashMap;

use crate::textures::{TextureId, TextureSet};

use super::shaders;
use super::textures::{GpuTexture, STORAGE_FORMAT};

const WORKGROUP_SIZE: u32 = 8;
/// Most textures bound by one kernel (bloom split: one input, three outputs).
const MAX_TEXTURES: usize = 4;

/// Bindings of a kernel: sampled inputs first, then storage outputs, then an
/// optional uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct KernelShape {
    pub inputs: u32,
    pub outputs: u32,
    pub uniform: bool,
}

impl KernelShape {
    const fn new(inputs: u32, outputs: u32, uniform: bool) -> Self {
        Self {
            inputs,
            outputs,
            uniform,
        }
    }

    fn uniform_binding(&self) -> u32 {
        self.inputs + self.outputs
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KernelKind {
    Merge,
    LineDouble,
    Copy,
    EpxEnhance,
    EpxUpscale,
    ReplicateUpscale,
    BloomSplit,
    Blur,
    Scanlines,
    Clear,
    XbrEnhance,
    XbrUpscale,
}

impl KernelKind {
    const ALL: [KernelKind; 12] = [
        KernelKind::Merge,
        KernelKind::LineDouble,
        KernelKind::Copy,
        KernelKind::EpxEnhance,
        KernelKind::EpxUpscale,
        KernelKind::ReplicateUpscale,
        KernelKind::BloomSplit,
        KernelKind::Blur,
        KernelKind::Scanlines,
        KernelKind::Clear,
        KernelKind::XbrEnhance,
        KernelKind::XbrUpscale,
    ];

    fn label(self) -> &'static str {
        match self {
            KernelKind::Merge => "merge kernel",
            KernelKind::LineDouble => "line double kernel",
            KernelKind::Copy => "copy kernel",
            KernelKind::EpxEnhance => "epx enhance kernel",
            KernelKind::EpxUpscale => "epx upscale kernel",
            KernelKind::ReplicateUpscale => "replicate upscale kernel",
            KernelKind::BloomSplit => "bloom split kernel",
            KernelKind::Blur => "blur kernel",
            KernelKind::Scanlines => "scanline kernel",
            KernelKind::Clear => "clear kernel",
            KernelKind::XbrEnhance => "xbr enhance kernel",
            KernelKind::XbrUpscale => "xbr upscale kernel",
        }
    }

    fn shape(self) -> KernelShape {
        match self {
            KernelKind::Merge => KernelShape::new(2, 1, true),
            KernelKind::BloomSplit => KernelShape::new(1, 3, true),
            KernelKind::Blur | KernelKind::Scanlines => KernelShape::new(1, 1, true),
            KernelKind::Clear => KernelShape::new(0, 1, false),
            KernelKind::LineDouble
            | KernelKind::Copy
            | KernelKind::EpxEnhance
            | KernelKind::EpxUpscale
            | KernelKind::XbrEnhance
            | KernelKind::XbrUpscale
            | KernelKind::ReplicateUpscale => KernelShape::new(1, 1, false),
        }
    }

    fn source(self) -> String {
        match self {
            KernelKind::Merge => shaders::MERGE_WGSL.to_owned(),
            KernelKind::Clear => shaders::CLEAR_WGSL.to_owned(),
            KernelKind::LineDouble => shaders::with_prelude(shaders::LINE_DOUBLE_WGSL),
            KernelKind::Copy => shaders::with_prelude(shaders::COPY_WGSL),
            KernelKind::EpxEnhance => shaders::with_prelude(shaders::EPX_ENHANCE_WGSL),
            KernelKind::EpxUpscale => shaders::with_prelude(shaders::EPX_UPSCALE_WGSL),
            KernelKind::XbrEnhance => shaders::with_prelude(shaders::XBR_ENHANCE_WGSL),
            KernelKind::XbrUpscale => shaders::with_prelude(shaders::XBR_UPSCALE_WGSL),
            KernelKind::ReplicateUpscale => shaders::with_prelude(shaders::REPLICATE_UPSCALE_WGSL),
            KernelKind::BloomSplit => shaders::with_prelude(shaders::BLOOM_SPLIT_WGSL),
            KernelKind::Blur => shaders::with_prelude(shaders::BLUR_WGSL),
            KernelKind::Scanlines => shaders::with_prelude(shaders::SCANLINES_WGSL),
        }
    }
}

/// Hands out items in order and reuses them once rewound.
///
/// A kernel that runs several times in one frame (the blur passes) needs one
/// uniform buffer per run, because every `write_buffer` lands before the
/// frame's command buffer executes.
#[derive(Debug)]
struct SlotPool<T> {
    items: Vec<T>,
    next: usize,
}

impl<T> SlotPool<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            next: 0,
        }
    }

    fn claim(&mut self, create: impl FnOnce() -> T) -> (usize, &T) {
        if self.next == self.items.len() {
            self.items.push(create());
        }
        let slot = self.next;
        self.next += 1;
        (slot, &self.items[slot])
    }

    fn rewind(&mut self) {
        self.next = 0;
    }
}

/// Textures and uniform slot a cached bind group was built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct BindingKey {
    textures: [Option<TextureId>; MAX_TEXTURES],
    uniform_slot: Option<usize>,
}

impl BindingKey {
    fn new(inputs: &[TextureId], outputs: &[TextureId], uniform_slot: Option<usize>) -> Self {
        let mut textures = [None; MAX_TEXTURES];
        for (slot, &id) in textures.iter_mut().zip(inputs.iter().chain(outputs)) {
            *slot = Some(id);
        }
        Self {
            textures,
            uniform_slot,
        }
    }
}

pub(crate) struct ComputeKernel {
    label: &'static str,
    shape: KernelShape,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    uniforms: SlotPool<wgpu::Buffer>,
    bind_groups: HashMap<BindingKey, wgpu::BindGroup>,
}

impl ComputeKernel {
    fn new(device: &wgpu::Device, kind: KernelKind) -> Self {
        let label = kind.label();
        let shape = kind.shape();
        let module = shaders::compute_module(device, label, &kind.source());
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &build_layout_entries(shape),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        Self {
            label,
            shape,
            pipeline,
            layout,
            uniforms: SlotPool::new(),
            bind_groups: HashMap::new(),
        }
    }

    /// Records one pass over the first output.
    ///
    /// Uniform buffers and bind groups are created on first use and reused
    /// by later frames; `uniform` is written into the claimed buffer.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn dispatch(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        textures: &TextureSet<GpuTexture>,
        inputs: &[TextureId],
        outputs: &[TextureId],
        uniform: Option<&[u8]>,
    ) {
        debug_assert_eq!(inputs.len() as u32, self.shape.inputs, "{}", self.label);
        debug_assert_eq!(outputs.len() as u32, self.shape.outputs, "{}", self.label);
        debug_assert_eq!(uniform.is_some(), self.shape.uniform, "{}", self.label);

        let label = self.label;
        let uniform_slot = uniform.map(|contents| {
            let (slot, buffer) = self.uniforms.claim(|| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size: contents.len() as wgpu::BufferAddress,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            });
            queue.write_buffer(buffer, 0, contents);
            slot
        });

        let key = BindingKey::new(inputs, outputs, uniform_slot);
        let Self {
            shape,
            pipeline,
            layout,
            uniforms,
            bind_groups,
            ..
        } = self;
        let bind_group = bind_groups.entry(key).or_insert_with(|| {
            let mut entries: Vec<wgpu::BindGroupEntry<'_>> = inputs
                .iter()
                .chain(outputs)
                .enumerate()
                .map(|(index, &id)| wgpu::BindGroupEntry {
                    binding: index as u32,
                    resource: wgpu::BindingResource::TextureView(&textures[id].view),
                })
                .collect();
            if let Some(slot) = uniform_slot {
                entries.push(wgpu::BindGroupEntry {
                    binding: shape.uniform_binding(),
                    resource: uniforms.items[slot].as_entire_binding(),
                });
            }
            tracing::trace!(kernel = label, "created bind group");
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &entries,
            })
        });

        let size = outputs.first().map(|&id| textures[id].size).unwrap_or((0, 0));
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &*bind_group, &[]);
        pass.dispatch_workgroups(
            size.0.div_ceil(WORKGROUP_SIZE),
            size.1.div_ceil(WORKGROUP_SIZE),
            1,
        );
    }
}

pub(crate) fn build_layout_entries(shape: KernelShape) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity((shape.inputs + shape.outputs + 1) as usize);
    for binding in 0..shape.inputs {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    for binding in shape.inputs..shape.inputs + shape.outputs {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: STORAGE_FORMAT,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });
    }
    if shape.uniform {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: shape.uniform_binding(),
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    entries
}

/// Every compute pipeline, built once per device.
pub(crate) struct Kernels {
    kernels: Vec<ComputeKernel>,
}

impl Kernels {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let kernels = KernelKind::ALL
            .iter()
            .map(|&kind| ComputeKernel::new(device, kind))
            .collect();
        tracing::debug!(count = KernelKind::ALL.len(), "built compute kernels");
        Self { kernels }
    }

    pub(crate) fn get_mut(&mut self, kind: KernelKind) -> &mut ComputeKernel {
        &mut self.kernels[kind as usize]
    }

    /// Called when a new frame encoder starts; uniform slots become free again.
    pub(crate) fn rewind(&mut self) {
        for kernel in &mut self.kernels {
            kernel.uniforms.rewind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_listed_in_discriminant_order() {
        for (index, kind) in KernelKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, index);
        }
    }

    #[test]
    fn uniform_slots_are_reused_after_rewind() {
        let mut pool = SlotPool::new();
        let mut created = 0;
        for _frame in 0..3 {
            pool.rewind();
            let slots: Vec<usize> = (0..4)
                .map(|_| {
                    pool.claim(|| {
                        created += 1;
                        created
                    })
                    .0
                })
                .collect();
            assert_eq!(slots, vec![0, 1, 2, 3]);
        }
        assert_eq!(created, 4);
        assert_eq!(pool.items.len(), 4);
    }

    #[test]
    fn binding_keys_separate_textures_and_slots() {
        let horizontal = BindingKey::new(&[TextureId::BloomR], &[TextureId::ScratchMerged], Some(0));
        let vertical = BindingKey::new(&[TextureId::ScratchMerged], &[TextureId::BloomR], Some(1));
        assert_ne!(horizontal, vertical);
        assert_eq!(
            horizontal,
            BindingKey::new(&[TextureId::BloomR], &[TextureId::ScratchMerged], Some(0))
        );
        assert_ne!(
            horizontal,
            BindingKey::new(&[TextureId::BloomR], &[TextureId::ScratchMerged], Some(2))
        );

        let split = BindingKey::new(&[TextureId::Merged], &TextureId::BLOOM, None);
        assert!(split.textures.iter().all(Option::is_some));
    }

    #[test]
    fn layout_numbers_inputs_then_outputs_then_uniform() {
        let entries = build_layout_entries(KernelKind::BloomSplit.shape());
        let bindings: Vec<u32> = entries.iter().map(|e| e.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3, 4]);
        assert!(matches!(entries[0].ty, wgpu::BindingType::Texture { .. }));
        assert!(matches!(entries[3].ty, wgpu::BindingType::StorageTexture { .. }));
        assert!(matches!(entries[4].ty, wgpu::BindingType::Buffer { .. }));

        let clear = build_layout_entries(KernelKind::Clear.shape());
        assert_eq!(clear.len(), 1);
        assert!(matches!(clear[0].ty, wgpu::BindingType::StorageTexture { .. }));
    }
}
