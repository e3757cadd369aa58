//! Per-frame compositor for emulated CRT output.
//!
//! An emulator publishes half-frames ("fields") at its own pace; once per
//! display refresh the [`FrameDriver`] turns the latest one into pixels:
//!
//! ```text
//!   FieldSource ──▶ FieldMerger ──▶ merged ──▶ enhance ──▶ upscale ──▶ blur ──▶ scanlines
//!                   (flicker,          │                                          │
//!                    noise)            └──▶ bloom split ──▶ bloom blur ──┐         │
//!                                                                        ▼         ▼
//!                                                                   Compositor (flat or cube)
//! ```
//!
//! Everything between the merger and the final draw goes through the
//! [`Backend`] trait. [`GpuBackend`] records the chain as wgpu compute passes
//! and presents to a window surface; [`CpuBackend`] runs the same chain on byte
//! buffers, which is what the tests and headless snapshots use.

mod backend;
mod compositor;
mod cpu;
mod dotmask;
mod driver;
mod geometry;
mod gpu;
mod merger;
mod noise;
mod source;
mod stages;
mod textures;
mod timeline;
mod types;
mod uniforms;

pub use backend::{blur_radius, Backend, CompositeFrame, DrawGeometry, MAX_BLUR_RADIUS};
pub use compositor::{Compositor, Presentation, ViewState};
pub use cpu::{CpuBackend, CpuTexture, DrawRecord, Rgba};
pub use dotmask::{DotMask, DotMaskCache};
pub use driver::{FrameDriver, FrameReport};
pub use geometry::{flat_mvp, mesh, transform, CubeTransform, Mat4, Vertex, IDENTITY};
pub use gpu::GpuBackend;
pub use merger::{FieldMerger, MergeMode, MergeOutcome};
pub use noise::NoiseSource;
pub use source::{FieldSource, LatestField};
pub use stages::{validate_order, OrderError, StageDescriptor, StageKind, StagePlan, STAGES};
pub use textures::{LayoutError, TextureId, TextureLayout, TextureSet};
pub use timeline::{AnimatedFloat, FadeCurve, PowerUpFade, PAUSED_ALPHA, POWER_UP_ALPHA};
pub use types::{
    pack_rgba, unpack_rgba, DotMaskStyle, Enhancer, FieldId, GpuPowerPreference, GpuSettings,
    ScanlineMode, ScreenField, ShaderOptions, Upscaler, DEFAULT_FIELD_HEIGHT,
    DEFAULT_FIELD_WIDTH,
};
pub use uniforms::{BlurUniforms, FilterUniforms, FragmentUniforms, MergeUniforms, VertexUniforms};
pub use wgpu::SurfaceError;
