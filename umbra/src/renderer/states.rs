//! Render state of every frame phase.
//!
//! Each constructor starts from the caller's state (`base`) and changes only
//! what the phase needs, so caller choices like the depth compare function of
//! their scene carry through. A compare function that doesn't order depths
//! (`Always`, `Never`) is replaced, since the volume has to be depth tested
//! against the scene.

use arrayvec::ArrayVec;
use umbra_types::{
    BlendState, ColorWrites, CompareFunction, Face, PolygonMode, RenderState, StencilFaceState, StencilMethod,
    StencilOperation, StencilState,
};

use crate::CompositeMode;

const INCREMENT: StencilOperation = StencilOperation::IncrementWrap;
const DECREMENT: StencilOperation = StencilOperation::DecrementWrap;

/// Depth compare function the scene and the volume are both tested with.
pub fn scene_depth_compare(base: &RenderState) -> CompareFunction {
    match base.depth_compare {
        CompareFunction::Always | CompareFunction::Never => CompareFunction::Less,
        compare => compare,
    }
}

/// State for drawing the scene with ambient light.
///
/// Always writes depth. With [`CompositeMode::AmbientScene`] the ambient
/// color is drawn later, so this pass only writes depth.
pub fn ambient_state(base: &RenderState, composite: CompositeMode) -> RenderState {
    let color_writes = match composite {
        CompositeMode::Overlay => base.color_writes,
        CompositeMode::AmbientScene => ColorWrites::empty(),
    };
    RenderState {
        depth_compare: scene_depth_compare(base),
        depth_write: true,
        color_writes,
        stencil: StencilState::DISABLED,
        polygon_mode: PolygonMode::Fill,
        ..*base
    }
}

/// States to draw the volume with, in order. The volume is drawn once per
/// state.
///
/// None of them write color or depth. Depth is tested with
/// [`scene_depth_compare`], the function the ambient pass drew with.
pub fn stencil_accumulate_states(
    base: &RenderState,
    method: StencilMethod,
    two_sided_stencil: bool,
) -> ArrayVec<RenderState, 2> {
    let counting = RenderState {
        depth_compare: scene_depth_compare(base),
        depth_write: false,
        color_writes: ColorWrites::empty(),
        blend: None,
        cull_mode: None,
        polygon_mode: PolygonMode::Fill,
        ..*base
    };
    let with = |cull_mode: Option<Face>, stencil: StencilState| RenderState {
        cull_mode,
        stencil,
        ..counting
    };
    let two_sided = |front: StencilFaceState, back: StencilFaceState| StencilState {
        front,
        back,
        ..StencilState::DISABLED
    };

    let mut states = ArrayVec::new();
    match method {
        StencilMethod::TwoPassZPass => {
            states.push(with(
                Some(Face::Back),
                StencilState::single_sided(StencilFaceState::on_depth_pass(INCREMENT)),
            ));
            states.push(with(
                Some(Face::Front),
                StencilState::single_sided(StencilFaceState::on_depth_pass(DECREMENT)),
            ));
        }
        StencilMethod::SinglePassTwoSidedStencil => {
            states.push(with(
                None,
                two_sided(
                    StencilFaceState::on_depth_pass(INCREMENT),
                    StencilFaceState::on_depth_pass(DECREMENT),
                ),
            ));
        }
        StencilMethod::ZFail if two_sided_stencil => {
            states.push(with(
                None,
                two_sided(
                    StencilFaceState::on_depth_fail(DECREMENT),
                    StencilFaceState::on_depth_fail(INCREMENT),
                ),
            ));
        }
        StencilMethod::ZFail => {
            states.push(with(
                Some(Face::Front),
                StencilState::single_sided(StencilFaceState::on_depth_fail(INCREMENT)),
            ));
            states.push(with(
                Some(Face::Back),
                StencilState::single_sided(StencilFaceState::on_depth_fail(DECREMENT)),
            ));
        }
    }
    states
}

/// Only touch pixels whose shadow count is not zero.
fn in_shadow() -> StencilState {
    StencilState {
        write_mask: 0,
        ..StencilState::single_sided(StencilFaceState::test(CompareFunction::NotEqual))
    }
}

/// Only touch pixels whose shadow count is zero.
fn out_of_shadow() -> StencilState {
    StencilState {
        write_mask: 0,
        ..StencilState::single_sided(StencilFaceState::test(CompareFunction::Equal))
    }
}

/// State for darkening shadowed pixels.
pub fn composite_state(base: &RenderState, composite: CompositeMode) -> RenderState {
    match composite {
        CompositeMode::Overlay => RenderState {
            depth_compare: CompareFunction::Always,
            depth_write: false,
            color_writes: ColorWrites::ALL,
            blend: Some(BlendState::ALPHA_BLENDING),
            cull_mode: None,
            polygon_mode: PolygonMode::Fill,
            stencil: in_shadow(),
        },
        CompositeMode::AmbientScene => RenderState {
            depth_compare: CompareFunction::LessEqual,
            depth_write: false,
            color_writes: base.color_writes,
            polygon_mode: PolygonMode::Fill,
            stencil: in_shadow(),
            ..*base
        },
    }
}

/// State for drawing the lit scene over every pixel out of shadow.
pub fn lit_state(base: &RenderState) -> RenderState {
    RenderState {
        depth_compare: CompareFunction::LessEqual,
        polygon_mode: PolygonMode::Fill,
        stencil: out_of_shadow(),
        ..*base
    }
}

/// State for drawing the volume as wireframe on top of the frame.
pub fn debug_overlay_state(base: &RenderState) -> RenderState {
    RenderState {
        depth_write: false,
        color_writes: ColorWrites::ALL,
        blend: None,
        cull_mode: None,
        polygon_mode: PolygonMode::Line,
        stencil: StencilState::DISABLED,
        ..*base
    }
}
