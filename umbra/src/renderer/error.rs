use thiserror::Error;
use umbra_types::StencilMethod;

/// Reason why the shadow renderer failed to initialize.
///
/// These are never degraded into "no shadows". A caller that wants to run
/// without shadows on such a device must decide to do so itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Device has no stencil buffer. Stencil shadows need at least one stencil bit")]
    MissingStencilBuffer,
    #[error("Stencil method {method:?} requires two sided stencil, which the device does not support")]
    MissingTwoSidedStencil { method: StencilMethod },
}

/// Reason why a shadow volume could not be built this frame.
///
/// Recoverable by skipping shadows for the frame, see
/// [`StencilShadowRenderer::render_frame_or_skip`](crate::StencilShadowRenderer::render_frame_or_skip).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShadowError {
    #[error("Failed to allocate scratch storage for {requested} elements")]
    OutOfMemory { requested: usize },
    #[error("Shadow volume needs {vertices} vertices when the vertex limit is {limit}")]
    VolumeTooLarge { vertices: usize, limit: usize },
    #[error("Face {face} references vertex {index} which is out of bounds for {vertex_count} vertices")]
    IndexOutOfBounds { face: usize, index: u32, vertex_count: usize },
    #[error("Silhouette references vertex {index} but only {vertex_count} positions were given")]
    MismatchedPositions { index: u32, vertex_count: usize },
    #[error("Stencil method {method:?} counts on depth fail and needs a capped volume")]
    UncappedVolume { method: StencilMethod },
}
