//! Conversions from umbra's render state to wgpu's.

use umbra::types::{
    BlendComponent, BlendFactor, BlendState, ColorWrites, CompareFunction, Face, PolygonMode, RenderState,
    StencilFaceState, StencilOperation, StencilState,
};

pub fn compare_function(compare: CompareFunction) -> wgpu::CompareFunction {
    match compare {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

pub fn stencil_operation(op: StencilOperation) -> wgpu::StencilOperation {
    match op {
        StencilOperation::Keep => wgpu::StencilOperation::Keep,
        StencilOperation::Zero => wgpu::StencilOperation::Zero,
        StencilOperation::Replace => wgpu::StencilOperation::Replace,
        StencilOperation::Invert => wgpu::StencilOperation::Invert,
        StencilOperation::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOperation::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

pub fn stencil_face_state(face: &StencilFaceState) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: compare_function(face.compare),
        fail_op: stencil_operation(face.fail_op),
        depth_fail_op: stencil_operation(face.depth_fail_op),
        pass_op: stencil_operation(face.pass_op),
    }
}

/// The reference value is not part of wgpu's pipeline state, it is set on the
/// render pass instead.
pub fn stencil_state(stencil: &StencilState) -> wgpu::StencilState {
    wgpu::StencilState {
        front: stencil_face_state(&stencil.front),
        back: stencil_face_state(&stencil.back),
        read_mask: stencil.read_mask,
        write_mask: stencil.write_mask,
    }
}

pub fn depth_stencil_state(state: &RenderState, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: state.depth_write,
        depth_compare: compare_function(state.depth_compare),
        stencil: stencil_state(&state.stencil),
        bias: wgpu::DepthBiasState::default(),
    }
}

pub fn face(face: Face) -> wgpu::Face {
    match face {
        Face::Front => wgpu::Face::Front,
        Face::Back => wgpu::Face::Back,
    }
}

pub fn polygon_mode(mode: PolygonMode) -> wgpu::PolygonMode {
    match mode {
        PolygonMode::Fill => wgpu::PolygonMode::Fill,
        PolygonMode::Line => wgpu::PolygonMode::Line,
    }
}

/// Counter-clockwise triangles are front facing, as everywhere in umbra.
pub fn primitive_state(state: &RenderState) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: state.cull_mode.map(face),
        unclipped_depth: false,
        polygon_mode: polygon_mode(state.polygon_mode),
        conservative: false,
    }
}

pub fn color_writes(writes: ColorWrites) -> wgpu::ColorWrites {
    let mut out = wgpu::ColorWrites::empty();
    out.set(wgpu::ColorWrites::RED, writes.contains(ColorWrites::RED));
    out.set(wgpu::ColorWrites::GREEN, writes.contains(ColorWrites::GREEN));
    out.set(wgpu::ColorWrites::BLUE, writes.contains(ColorWrites::BLUE));
    out.set(wgpu::ColorWrites::ALPHA, writes.contains(ColorWrites::ALPHA));
    out
}

pub fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

pub fn blend_component(component: &BlendComponent) -> wgpu::BlendComponent {
    wgpu::BlendComponent {
        src_factor: blend_factor(component.src_factor),
        dst_factor: blend_factor(component.dst_factor),
        operation: wgpu::BlendOperation::Add,
    }
}

pub fn blend_state(blend: &BlendState) -> wgpu::BlendState {
    wgpu::BlendState {
        color: blend_component(&blend.color),
        alpha: blend_component(&blend.alpha),
    }
}

pub fn color_target_state(state: &RenderState, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: state.blend.as_ref().map(blend_state),
        write_mask: color_writes(state.color_writes),
    }
}
