//! Stencil shadow volumes.
//!
//! Shadows are computed in three steps, each usable on its own:
//!
//! 1. [`extract_silhouette`] finds the edges on the boundary between the
//!    triangles of a mesh that face a [`Light`](types::Light) and the ones
//!    that do not.
//! 2. [`VolumeExtruder`] pushes those edges away from the light, producing
//!    the sides (and optionally caps) of a [`ShadowVolumeMesh`].
//! 3. [`StencilShadowRenderer`] counts the volume into the stencil buffer of
//!    any device implementing [`RenderContext`] and composites the shadow
//!    into the frame.
//!
//! [`ShadowVolumeBuilder`] ties the first two steps together and keeps their
//! allocations alive between frames.
//!
//! ```no_run
//! use umbra::{
//!     types::{glam::Vec3, Light, MeshBuilder},
//!     RenderContext, ShadowOptions, ShadowScene, StencilShadowRenderer,
//! };
//!
//! fn frame<C: RenderContext>(ctx: &mut C, scene: &mut impl ShadowScene<C>) -> Result<(), Box<dyn std::error::Error>> {
//!     let mesh = MeshBuilder::new(vec![Vec3::ZERO, Vec3::Z, Vec3::X]).build()?;
//!     let renderer = StencilShadowRenderer::new(&ctx.capabilities(), ShadowOptions::default())?;
//!     let mut builder = renderer.volume_builder();
//!
//!     let light = Light::Directional { direction: -Vec3::Y };
//!     let volume = builder.build(&mesh, &light)?;
//!     renderer.render_frame(ctx, scene, volume);
//!     Ok(())
//! }
//! ```

mod builder;
mod device;
mod extrude;
mod mesh;
mod options;
mod renderer;
mod silhouette;

pub mod util {
    //! Utilities shared by the shadow pipeline.

    pub mod state_guard;
    pub mod typedefs;
}

pub use builder::*;
pub use device::*;
pub use extrude::*;
pub use mesh::*;
pub use options::*;
pub use renderer::{error::*, states, FramePhase, FrameReport, StencilShadowRenderer, DEBUG_VOLUME_COLOR};
pub use silhouette::*;

/// Reexport of umbra-types.
pub use umbra_types as types;
