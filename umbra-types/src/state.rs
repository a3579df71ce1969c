//! Render state vocabulary.
//!
//! Mirrors the subset of fixed function state that stencil shadows touch. The
//! model follows WebGPU: stencil testing is "on" whenever a face state does
//! something other than [`StencilFaceState::IGNORE`], and depth testing is
//! "off" when the compare function is [`CompareFunction::Always`].

use bitflags::bitflags;

/// Comparison used by depth and stencil tests.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    /// Evaluates `incoming <op> stored`.
    ///
    /// For depth tests `incoming` is the fragment depth, for stencil tests it
    /// is the (masked) reference value.
    pub fn passes<T: PartialOrd>(self, incoming: T, stored: T) -> bool {
        match self {
            Self::Never => false,
            Self::Less => incoming < stored,
            Self::Equal => incoming == stored,
            Self::LessEqual => incoming <= stored,
            Self::Greater => incoming > stored,
            Self::NotEqual => incoming != stored,
            Self::GreaterEqual => incoming >= stored,
            Self::Always => true,
        }
    }
}

/// What happens to a stencil value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    Invert,
    IncrementClamp,
    DecrementClamp,
    IncrementWrap,
    DecrementWrap,
}

impl StencilOperation {
    /// Applies the operation to an 8 bit stencil value.
    pub fn apply(self, current: u8, reference: u8) -> u8 {
        match self {
            Self::Keep => current,
            Self::Zero => 0,
            Self::Replace => reference,
            Self::Invert => !current,
            Self::IncrementClamp => current.saturating_add(1),
            Self::DecrementClamp => current.saturating_sub(1),
            Self::IncrementWrap => current.wrapping_add(1),
            Self::DecrementWrap => current.wrapping_sub(1),
        }
    }
}

/// Stencil behavior for one facing of triangles.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    /// Stencil test failed.
    pub fail_op: StencilOperation,
    /// Stencil test passed, depth test failed.
    pub depth_fail_op: StencilOperation,
    /// Both tests passed.
    pub pass_op: StencilOperation,
}

impl StencilFaceState {
    /// Always passes and never writes.
    pub const IGNORE: Self = Self {
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };

    /// Tests against the reference with `compare` and never writes.
    pub const fn test(compare: CompareFunction) -> Self {
        Self { compare, ..Self::IGNORE }
    }

    /// Always passes the stencil test and applies `op` when the depth test
    /// passes.
    pub const fn on_depth_pass(op: StencilOperation) -> Self {
        Self {
            pass_op: op,
            ..Self::IGNORE
        }
    }

    /// Always passes the stencil test and applies `op` when the depth test
    /// fails.
    pub const fn on_depth_fail(op: StencilOperation) -> Self {
        Self {
            depth_fail_op: op,
            ..Self::IGNORE
        }
    }

    pub fn is_ignored(&self) -> bool {
        *self == Self::IGNORE
    }
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self::IGNORE
    }
}

/// Full stencil configuration.
///
/// Devices without two sided stencil only support `front == back`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub front: StencilFaceState,
    pub back: StencilFaceState,
    pub read_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

impl StencilState {
    pub const DISABLED: Self = Self {
        front: StencilFaceState::IGNORE,
        back: StencilFaceState::IGNORE,
        read_mask: !0,
        write_mask: !0,
        reference: 0,
    };

    /// Same face state for both facings.
    pub const fn single_sided(face: StencilFaceState) -> Self {
        Self {
            front: face,
            back: face,
            ..Self::DISABLED
        }
    }

    pub fn is_enabled(&self) -> bool {
        (!self.front.is_ignored() || !self.back.is_ignored()) && (self.read_mask != 0 || self.write_mask != 0)
    }

    pub fn is_two_sided(&self) -> bool {
        self.front != self.back
    }

    /// Face state for the given facing.
    pub fn face(&self, face: Face) -> &StencilFaceState {
        match face {
            Face::Front => &self.front,
            Face::Back => &self.back,
        }
    }
}

impl Default for StencilState {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Triangle facing. Front faces are wound counter-clockwise on screen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
}

bitflags! {
    /// Color channels written by draws.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const COLOR = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
        const ALL = Self::COLOR.bits() | Self::ALPHA.bits();
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

impl BlendFactor {
    /// Weight of this factor given the incoming alpha.
    pub fn weight(self, src_alpha: f32) -> f32 {
        match self {
            Self::Zero => 0.0,
            Self::One => 1.0,
            Self::SrcAlpha => src_alpha,
            Self::OneMinusSrcAlpha => 1.0 - src_alpha,
        }
    }
}

/// `src * src_factor + dst * dst_factor`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    pub const ALPHA_BLENDING: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
    };
}

/// The render state shadow rendering reads and writes.
///
/// [`RenderState::default`] is the state callers are expected to draw their
/// scene with, and the state shadow rendering returns the device to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RenderState {
    /// [`CompareFunction::Always`] disables depth testing.
    pub depth_compare: CompareFunction,
    pub depth_write: bool,
    pub color_writes: ColorWrites,
    /// `None` replaces the destination.
    pub blend: Option<BlendState>,
    pub cull_mode: Option<Face>,
    pub polygon_mode: PolygonMode,
    pub stencil: StencilState,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_compare: CompareFunction::Less,
            depth_write: true,
            color_writes: ColorWrites::ALL,
            blend: None,
            cull_mode: Some(Face::Back),
            polygon_mode: PolygonMode::Fill,
            stencil: StencilState::DISABLED,
        }
    }
}

impl RenderState {
    /// Whether a triangle with the given facing survives culling.
    pub fn draws_face(&self, face: Face) -> bool {
        self.cull_mode != Some(face)
    }
}
