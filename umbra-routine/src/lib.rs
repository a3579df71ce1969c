//! wgpu render routine for umbra.
//!
//! [`ShadowVolumeRoutine`] owns the shaders and pipelines; every frame it
//! hands out a [`ShadowFrame`], a [`RenderContext`](umbra::RenderContext)
//! that [`StencilShadowRenderer`](umbra::StencilShadowRenderer) and the
//! caller's scene draw into. Finishing the frame encodes it into render
//! passes.
//!
//! The depth attachment must have a stencil aspect for shadows to work, for
//! example [`wgpu::TextureFormat::Depth24PlusStencil8`].

pub mod conv;
pub mod recording;
mod routine;
pub mod shaders;

pub use routine::*;
