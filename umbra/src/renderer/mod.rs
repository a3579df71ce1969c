use arrayvec::ArrayVec;
use glam::Vec4;
use umbra_types::{DeviceCapabilities, Light, StencilMethod};

use crate::{
    util::state_guard::StateGuard, CapabilityError, CompositeMode, RenderContext, ScenePass, ShadowError,
    ShadowOptions, ShadowScene, ShadowVolumeBuilder, ShadowVolumeMesh, TriangleMesh,
};

pub mod error;
pub mod states;

/// Color the volume wireframe is drawn with.
pub const DEBUG_VOLUME_COLOR: Vec4 = Vec4::new(1.0, 1.0, 0.0, 1.0);

/// The steps of a shadowed frame, in the order they run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FramePhase {
    AmbientPass,
    StencilClear,
    StencilAccumulate,
    ShadowComposite,
    LitPass,
    DebugVolumeOverlay,
}

/// What happened during [`StencilShadowRenderer::render_frame`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Phases that ran, in order.
    pub phases: ArrayVec<FramePhase, 6>,
    pub volume_triangles: usize,
    /// Draws of the volume into the stencil buffer.
    pub stencil_draws: usize,
    /// Set when the shadow was left out of the frame because its volume
    /// could not be built.
    pub skipped_shadow: Option<ShadowError>,
}

/// Counts shadow volumes into the stencil buffer and darkens what they cover.
///
/// Holds no device resources. Every call leaves the context's render state
/// as it found it.
#[derive(Debug, Clone)]
pub struct StencilShadowRenderer {
    method: StencilMethod,
    capabilities: DeviceCapabilities,
    options: ShadowOptions,
}

impl StencilShadowRenderer {
    /// Checks the device can render stencil shadows and picks the stencil
    /// method.
    ///
    /// Without an explicit method in `options`, single pass two sided
    /// stencil is used when available, two pass z-pass otherwise.
    pub fn new(capabilities: &DeviceCapabilities, options: ShadowOptions) -> Result<Self, CapabilityError> {
        if capabilities.stencil_bits == 0 {
            return Err(CapabilityError::MissingStencilBuffer);
        }

        let method = match options.method {
            Some(method) if method.requires_two_sided_stencil() && !capabilities.two_sided_stencil => {
                return Err(CapabilityError::MissingTwoSidedStencil { method });
            }
            Some(method) => method,
            None if capabilities.two_sided_stencil => StencilMethod::SinglePassTwoSidedStencil,
            None => StencilMethod::TwoPassZPass,
        };

        log::debug!(
            "Stencil shadows using {:?} with {} stencil bits (two sided stencil: {})",
            method,
            capabilities.stencil_bits,
            capabilities.two_sided_stencil
        );

        Ok(Self {
            method,
            capabilities: *capabilities,
            options,
        })
    }

    pub fn method(&self) -> StencilMethod {
        self.method
    }

    pub fn options(&self) -> &ShadowOptions {
        &self.options
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Whether volumes for this renderer need caps.
    pub fn caps(&self) -> bool {
        self.options.caps_for(self.method)
    }

    /// A volume builder matching this renderer's method and options.
    pub fn volume_builder(&self) -> ShadowVolumeBuilder {
        ShadowVolumeBuilder::new(self.options.extrusion, self.caps())
            .with_vertex_limit(self.options.max_volume_vertices)
    }

    /// Renders a whole shadowed frame.
    ///
    /// The scene is drawn through `scene`, once with ambient light and once
    /// lit, and `volume` is counted into the stencil in between. An empty
    /// volume only skips the stencil work, the scene is still drawn.
    ///
    /// A volume this renderer can't count correctly, like an uncapped one
    /// with [`StencilMethod::ZFail`], is left out the same way and the reason
    /// is in [`FrameReport::skipped_shadow`].
    pub fn render_frame<C, S>(&self, ctx: &mut C, scene: &mut S, volume: &ShadowVolumeMesh) -> FrameReport
    where
        C: RenderContext + ?Sized,
        S: ShadowScene<C> + ?Sized,
    {
        profiling::scope!("StencilShadowRenderer::render_frame");

        match self.check_volume(volume) {
            Ok(()) => self.render_passes(ctx, scene, volume),
            Err(err) => {
                log::warn!("Skipping shadow for this frame: {}", err);
                let mut report = self.render_passes(ctx, scene, &ShadowVolumeMesh::default());
                report.skipped_shadow = Some(err);
                report
            }
        }
    }

    /// Checks `volume` has what the stencil method counts on.
    pub fn check_volume(&self, volume: &ShadowVolumeMesh) -> Result<(), ShadowError> {
        if self.method.requires_caps() && !volume.is_empty() && volume.cap_vertex_count() == 0 {
            return Err(ShadowError::UncappedVolume { method: self.method });
        }
        Ok(())
    }

    fn render_passes<C, S>(&self, ctx: &mut C, scene: &mut S, volume: &ShadowVolumeMesh) -> FrameReport
    where
        C: RenderContext + ?Sized,
        S: ShadowScene<C> + ?Sized,
    {
        let mut report = FrameReport {
            volume_triangles: volume.triangle_count(),
            ..FrameReport::default()
        };
        let mut ctx = StateGuard::new(ctx);

        self.ambient_pass(&mut *ctx, scene);
        report.phases.push(FramePhase::AmbientPass);

        self.clear_stencil(&mut *ctx);
        report.phases.push(FramePhase::StencilClear);

        if !volume.is_empty() {
            report.stencil_draws = self.accumulate(&mut *ctx, volume);
            report.phases.push(FramePhase::StencilAccumulate);

            self.composite(&mut *ctx, scene);
            report.phases.push(FramePhase::ShadowComposite);
        }

        self.lit_pass(&mut *ctx, scene);
        report.phases.push(FramePhase::LitPass);

        if self.options.debug_volume && !volume.is_empty() {
            self.debug_overlay(&mut *ctx, volume);
            report.phases.push(FramePhase::DebugVolumeOverlay);
        }

        report
    }

    /// Builds the volume of `mesh` and renders the frame with it.
    ///
    /// If the volume can't be built the frame is rendered without the
    /// shadow and the error is in [`FrameReport::skipped_shadow`].
    pub fn render_frame_or_skip<C, S, M>(
        &self,
        ctx: &mut C,
        scene: &mut S,
        builder: &mut ShadowVolumeBuilder,
        mesh: &M,
        light: &Light,
    ) -> FrameReport
    where
        C: RenderContext + ?Sized,
        S: ShadowScene<C> + ?Sized,
        M: TriangleMesh + ?Sized,
    {
        match builder.build(mesh, light) {
            Ok(volume) => self.render_frame(ctx, scene, volume),
            Err(err) => {
                log::warn!("Skipping shadow for this frame: {}", err);
                let mut report = self.render_passes(ctx, scene, &ShadowVolumeMesh::default());
                report.skipped_shadow = Some(err);
                report
            }
        }
    }

    /// Draws the scene with ambient light, laying down the depth the volume
    /// is tested against.
    pub fn ambient_pass<C, S>(&self, ctx: &mut C, scene: &mut S)
    where
        C: RenderContext + ?Sized,
        S: ShadowScene<C> + ?Sized,
    {
        profiling::scope!("ambient pass");
        let state = states::ambient_state(&ctx.render_state(), self.options.composite);
        let mut ctx = StateGuard::with_state(ctx, &state);
        scene.draw(&mut ctx, ScenePass::Ambient);
    }

    pub fn clear_stencil<C: RenderContext + ?Sized>(&self, ctx: &mut C) {
        profiling::scope!("stencil clear");
        ctx.clear_stencil(0);
    }

    /// Counts `volume` into the stencil buffer. Returns the number of draws.
    pub fn accumulate<C: RenderContext + ?Sized>(&self, ctx: &mut C, volume: &ShadowVolumeMesh) -> usize {
        profiling::scope!("stencil accumulate");

        if volume.is_empty() {
            return 0;
        }

        let base = ctx.render_state();
        let passes = states::stencil_accumulate_states(&base, self.method, self.capabilities.two_sided_stencil);
        let mut ctx = StateGuard::new(ctx);
        for state in &passes {
            log::trace!("Counting {} volume triangles", volume.triangle_count());
            ctx.set_render_state(state);
            ctx.draw_triangles(volume.positions(), Vec4::ZERO);
        }
        passes.len()
    }

    /// Darkens every pixel the stencil marks as shadowed.
    pub fn composite<C, S>(&self, ctx: &mut C, scene: &mut S)
    where
        C: RenderContext + ?Sized,
        S: ShadowScene<C> + ?Sized,
    {
        profiling::scope!("shadow composite");
        let state = states::composite_state(&ctx.render_state(), self.options.composite);
        let mut ctx = StateGuard::with_state(ctx, &state);
        match self.options.composite {
            CompositeMode::Overlay => ctx.draw_fullscreen_quad(self.options.shadow_color),
            CompositeMode::AmbientScene => scene.draw(&mut ctx, ScenePass::Ambient),
        }
    }

    /// Draws the lit scene over every pixel out of shadow.
    pub fn lit_pass<C, S>(&self, ctx: &mut C, scene: &mut S)
    where
        C: RenderContext + ?Sized,
        S: ShadowScene<C> + ?Sized,
    {
        profiling::scope!("lit pass");
        let state = states::lit_state(&ctx.render_state());
        let mut ctx = StateGuard::with_state(ctx, &state);
        scene.draw(&mut ctx, ScenePass::Lit);
    }

    /// Draws `volume` as wireframe.
    pub fn debug_overlay<C: RenderContext + ?Sized>(&self, ctx: &mut C, volume: &ShadowVolumeMesh) {
        profiling::scope!("debug volume overlay");
        let state = states::debug_overlay_state(&ctx.render_state());
        let mut ctx = StateGuard::with_state(ctx, &state);
        ctx.draw_triangles(volume.positions(), DEBUG_VOLUME_COLOR);
    }
}
