use std::ops::{Deref, DerefMut};

use umbra_types::RenderState;

use crate::RenderContext;

/// Saves the render state of a context and puts it back when dropped.
///
/// Guards nest: a guard can be created on top of another guard, and each
/// restores what it saw when it was created.
#[must_use = "The saved state is restored as soon as the guard is dropped"]
pub struct StateGuard<'a, C: RenderContext + ?Sized> {
    ctx: &'a mut C,
    saved: RenderState,
}

impl<'a, C: RenderContext + ?Sized> StateGuard<'a, C> {
    pub fn new(ctx: &'a mut C) -> Self {
        let saved = ctx.render_state();
        Self { ctx, saved }
    }

    /// Creates a guard and immediately switches to `state`.
    pub fn with_state(ctx: &'a mut C, state: &RenderState) -> Self {
        let mut guard = Self::new(ctx);
        guard.ctx.set_render_state(state);
        guard
    }

    /// The state that will be restored.
    pub fn saved(&self) -> &RenderState {
        &self.saved
    }
}

impl<'a, C: RenderContext + ?Sized> Deref for StateGuard<'a, C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl<'a, C: RenderContext + ?Sized> DerefMut for StateGuard<'a, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl<'a, C: RenderContext + ?Sized> Drop for StateGuard<'a, C> {
    fn drop(&mut self) {
        if self.ctx.render_state() != self.saved {
            self.ctx.set_render_state(&self.saved);
        }
    }
}
