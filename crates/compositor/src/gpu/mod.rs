//! wgpu backend.
//!
//! - `context` owns the instance, device and surface and reconfigures the
//!   swapchain on resize.
//! - `textures` creates the storage textures, the dot-mask tile, the depth
//!   buffer and the composite samplers.
//! - `kernels` builds one compute pipeline per stage with bind group layouts
//!   derived from the kernel's input and output counts.
//! - `shaders` holds the WGSL kernels and the GLSL composite stages.
//! - `state` implements [`crate::Backend`] on top of the above.

mod context;
mod kernels;
mod shaders;
mod state;
mod textures;

pub use state::GpuBackend;
