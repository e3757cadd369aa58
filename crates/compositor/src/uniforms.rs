use bytemuck::{Pod, Zeroable};

use crate::geometry::{Mat4, IDENTITY};

/// Vertex stage block (`std140`, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct VertexUniforms {
    pub mvp: Mat4,
}

impl Default for VertexUniforms {
    fn default() -> Self {
        Self { mvp: IDENTITY }
    }
}

/// Fragment stage block (`std140`, binding 1). Layout must match
/// `FragmentParams` in the composite shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FragmentUniforms {
    pub alpha: f32,
    pub bloom_weight: f32,
    pub dot_mask_width: i32,
    pub dot_mask_height: i32,
    pub scanline_distance: i32,
    pub scanline_mode: i32,
    pub scanline_brightness: f32,
    pub dot_mask_enabled: i32,
    pub disalignment: [f32; 2],
    pub bloom_enabled: i32,
    /// Mix towards white applied after every other effect.
    pub white: f32,
}

impl Default for FragmentUniforms {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            bloom_weight: 0.0,
            dot_mask_width: 1,
            dot_mask_height: 1,
            scanline_distance: 1,
            scanline_mode: 0,
            scanline_brightness: 1.0,
            dot_mask_enabled: 0,
            disalignment: [0.0, 0.0],
            bloom_enabled: 0,
            white: 0.0,
        }
    }
}

/// Field weights for the interlaced merge kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MergeUniforms {
    pub long_scale: f32,
    pub short_scale: f32,
    pub padding: [f32; 2],
}

impl MergeUniforms {
    pub fn new(long_scale: f32, short_scale: f32) -> Self {
        Self {
            long_scale,
            short_scale,
            padding: [0.0; 2],
        }
    }
}

/// Parameters of one direction of the separable gaussian.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BlurUniforms {
    pub direction: [i32; 2],
    pub radius: i32,
    pub sigma: f32,
}

/// Shared by the bloom split and scanline kernels.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FilterUniforms {
    pub brightness: f32,
    pub weight: f32,
    pub mode: i32,
    pub padding: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_blocks_are_std140_sized() {
        assert_eq!(std::mem::size_of::<VertexUniforms>(), 64);
        assert_eq!(std::mem::size_of::<FragmentUniforms>(), 48);
        assert_eq!(std::mem::size_of::<MergeUniforms>(), 16);
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 16);
        assert_eq!(std::mem::size_of::<FilterUniforms>(), 16);
    }

    #[test]
    fn disalignment_sits_on_an_eight_byte_boundary() {
        let uniforms = FragmentUniforms::default();
        let base = &uniforms as *const _ as usize;
        let offset = &uniforms.disalignment as *const _ as usize - base;
        assert_eq!(offset, 32);
    }
}
