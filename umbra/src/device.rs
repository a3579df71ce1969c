use glam::Vec4;
use umbra_types::{DeviceCapabilities, RenderState};

/// The device shadows are rendered with.
///
/// This is the whole surface the shadow renderer needs from a graphics API:
/// reading and replacing render state, clearing stencil and drawing flat
/// colored triangles. Transforms are the implementor's business, positions
/// handed to [`draw_triangles`](Self::draw_triangles) are in the space of the
/// mesh that cast the shadow.
pub trait RenderContext {
    fn capabilities(&self) -> DeviceCapabilities;

    /// The state the next draw will use.
    fn render_state(&self) -> RenderState;

    fn set_render_state(&mut self, state: &RenderState);

    /// Sets every stencil value to `value`, ignoring render state.
    fn clear_stencil(&mut self, value: u8);

    /// Draws an unindexed triangle list of homogeneous positions in a single
    /// color.
    ///
    /// Positions with `w == 0` are points at infinity and must be projected
    /// as such.
    fn draw_triangles(&mut self, positions: &[Vec4], color: Vec4);

    /// Covers the whole render target with `color`. Depth and stencil tests
    /// still apply.
    fn draw_fullscreen_quad(&mut self, color: Vec4);
}

impl<C: RenderContext + ?Sized> RenderContext for &mut C {
    fn capabilities(&self) -> DeviceCapabilities {
        (**self).capabilities()
    }

    fn render_state(&self) -> RenderState {
        (**self).render_state()
    }

    fn set_render_state(&mut self, state: &RenderState) {
        (**self).set_render_state(state)
    }

    fn clear_stencil(&mut self, value: u8) {
        (**self).clear_stencil(value)
    }

    fn draw_triangles(&mut self, positions: &[Vec4], color: Vec4) {
        (**self).draw_triangles(positions, color)
    }

    fn draw_fullscreen_quad(&mut self, color: Vec4) {
        (**self).draw_fullscreen_quad(color)
    }
}

/// Which lighting the scene should be drawn with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScenePass {
    /// Ambient light only, what shadowed surfaces look like.
    Ambient,
    /// Fully lit by the shadowing light.
    Lit,
}

/// The caller's scene, drawn by the shadow renderer when a frame needs it.
///
/// The scene must draw with the render state it finds on the context,
/// changing only what its materials require. The depth compare, stencil and
/// color write state set by the shadow renderer are what make the passes
/// work.
pub trait ShadowScene<C: ?Sized> {
    fn draw(&mut self, ctx: &mut C, pass: ScenePass);
}

impl<C: ?Sized, F> ShadowScene<C> for F
where
    F: FnMut(&mut C, ScenePass),
{
    fn draw(&mut self, ctx: &mut C, pass: ScenePass) {
        self(ctx, pass)
    }
}
