//! Final draw: scanlined frame, bloom and dot mask onto the render target.

use crate::backend::{Backend, CompositeFrame, DrawGeometry};
use crate::geometry::{flat_mvp, CubeTransform};
use crate::timeline::PAUSED_ALPHA;
use crate::types::ShaderOptions;
use crate::uniforms::{FragmentUniforms, VertexUniforms};

/// Output rows covered by one emulated scanline pair, per 256 lines of height.
const SCANLINE_PITCH_DIVISOR: u32 = 256;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Presentation {
    #[default]
    Flat,
    /// Screen mapped onto a cube; `animating` is set while it turns.
    Transition {
        transform: CubeTransform,
        animating: bool,
    },
}

/// View-level state owned by the embedding application.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewState {
    pub paused: bool,
    pub presentation: Presentation,
    /// How far the picture is washed out to white, from `0.0` to `1.0`.
    pub white: f32,
}

/// Holds the uniform blocks between frames and fills them in place.
#[derive(Debug, Default)]
pub struct Compositor {
    flat_vertex: VertexUniforms,
    cube_vertex: VertexUniforms,
    fragment: FragmentUniforms,
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            flat_vertex: VertexUniforms { mvp: flat_mvp() },
            ..Self::default()
        }
    }

    pub fn fragment(&self) -> &FragmentUniforms {
        &self.fragment
    }

    fn update_fragment(
        &mut self,
        options: &ShaderOptions,
        view: &ViewState,
        alpha: f32,
        dot_mask_size: (u32, u32),
        output_height: u32,
    ) {
        let f = &mut self.fragment;
        f.alpha = alpha;
        f.white = view.white.clamp(0.0, 1.0);
        f.bloom_enabled = options.bloom as i32;
        f.bloom_weight = options.bloom_weight;
        f.dot_mask_enabled = options.dot_mask.is_enabled() as i32;
        f.dot_mask_width = dot_mask_size.0.max(1) as i32;
        f.dot_mask_height = dot_mask_size.1.max(1) as i32;
        f.scanline_distance = (output_height / SCANLINE_PITCH_DIVISOR).max(1) as i32;
        f.scanline_mode = options.scanlines.code();
        f.scanline_brightness = options.scanline_brightness;
        f.disalignment = if options.disalignment {
            [options.disalignment_h, options.disalignment_v]
        } else {
            [0.0, 0.0]
        };
    }

    /// Fills the uniforms for `view` and issues the frame's single draw.
    pub fn draw<B: Backend>(
        &mut self,
        backend: &mut B,
        options: &ShaderOptions,
        view: &ViewState,
        fade_alpha: f32,
        dot_mask_size: (u32, u32),
    ) -> Result<CompositeFrame, B::Error> {
        let (width, height) = backend.output_size();
        let alpha = if view.paused { PAUSED_ALPHA } else { fade_alpha };
        self.update_fragment(options, view, alpha, dot_mask_size, height);

        let (geometry, vertex) = match view.presentation {
            Presentation::Flat => (DrawGeometry::Flat, self.flat_vertex),
            Presentation::Transition {
                transform,
                animating,
            } => {
                self.cube_vertex.mvp = transform.mvp(width as f32 / height.max(1) as f32);
                let geometry = if animating {
                    DrawGeometry::CubeAll
                } else {
                    DrawGeometry::CubeFront
                };
                (geometry, self.cube_vertex)
            }
        };

        let frame = CompositeFrame {
            geometry,
            vertex,
            fragment: self.fragment,
        };
        backend.composite(&frame)?;
        Ok(frame)
    }
}
