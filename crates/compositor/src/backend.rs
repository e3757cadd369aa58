//! The seam between frame logic and the device that executes it.
//!
//! The field merger, stage chain and compositor only ever talk to a
//! [`Backend`]. The wgpu implementation records compute passes into a command
//! encoder and submits them with the final draw; the CPU implementation runs
//! the same transforms on byte buffers and doubles as the reference the tests
//! check frame semantics against.

use std::ops::Range;

use crate::dotmask::DotMask;
use crate::geometry::{CUBE_FACES, VERTICES_PER_FACE};
use crate::textures::{TextureId, TextureLayout};
use crate::types::{Enhancer, Upscaler};
use crate::uniforms::{FilterUniforms, FragmentUniforms, MergeUniforms, VertexUniforms};

/// Largest gaussian radius any kernel will evaluate.
pub const MAX_BLUR_RADIUS: u32 = 32;

/// Kernel radius covering three standard deviations, capped at [`MAX_BLUR_RADIUS`].
pub fn blur_radius(sigma: f32) -> u32 {
    if !sigma.is_finite() || sigma <= 0.0 {
        return 0;
    }
    ((sigma * 3.0).ceil() as u32).min(MAX_BLUR_RADIUS)
}

/// Which part of the composite mesh a draw covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawGeometry {
    Flat,
    /// Only the face that looks at the viewer.
    CubeFront,
    /// All six faces; used while the cube is turning.
    CubeAll,
}

impl DrawGeometry {
    /// Vertex range inside [`crate::geometry::mesh`].
    pub fn vertex_range(self) -> Range<u32> {
        let quad = VERTICES_PER_FACE;
        match self {
            DrawGeometry::Flat => 0..quad,
            DrawGeometry::CubeFront => quad..quad * 2,
            DrawGeometry::CubeAll => quad..quad + CUBE_FACES * VERTICES_PER_FACE,
        }
    }
}

/// Everything a backend needs to issue the final draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeFrame {
    pub geometry: DrawGeometry,
    pub vertex: VertexUniforms,
    pub fragment: FragmentUniforms,
}

pub trait Backend {
    type Error: std::error::Error + Send + Sync + 'static;

    fn layout(&self) -> TextureLayout;

    /// Size of the current render target in pixels.
    fn output_size(&self) -> (u32, u32);

    /// Copies packed RGBA samples into a field texture.
    fn upload(&mut self, target: TextureId, pixels: &[u32]);

    /// Interleaves long (even rows) and short (odd rows) fields into `merged`.
    fn merge_interlaced(&mut self, scales: MergeUniforms);

    /// Line-doubles `source` into `merged` without weighting.
    fn merge_bypass(&mut self, source: TextureId);

    /// `merged` -> `enhanced`.
    fn enhance(&mut self, enhancer: Enhancer);

    /// `merged` -> `bloom_r`, `bloom_g`, `bloom_b`.
    fn split_bloom(&mut self, brightness: f32);

    /// In-place separable gaussian.
    fn blur(&mut self, target: TextureId, sigma: f32);

    /// `enhanced` -> `upscaled`.
    fn upscale(&mut self, upscaler: Upscaler);

    /// `upscaled` -> `scanlined`.
    fn apply_scanlines(&mut self, params: FilterUniforms);

    /// Fills a texture with transparent black.
    fn clear(&mut self, target: TextureId);

    fn install_dot_mask(&mut self, mask: &DotMask);

    /// Draws into the render target and submits the frame's work.
    fn composite(&mut self, frame: &CompositeFrame) -> Result<(), Self::Error>;
}
