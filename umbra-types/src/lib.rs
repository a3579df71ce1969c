//! Type declarations for the umbra shadow volume crate.
//!
//! This is reexported in the umbra crate proper and includes all the "surface"
//! api arguments: meshes, lights, stencil method selection and the render
//! state vocabulary the renderer speaks to a device with.

/// Reexport of the glam version umbra is using.
pub use glam;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod state;
pub use state::*;

/// The maximum amount of vertices any one mesh can have.
///
/// Face indices are stored as `u32`, and one value is reserved so that
/// `vertex_count` itself always fits.
pub const MAX_VERTEX_COUNT: u32 = u32::MAX - 1;
/// The maximum amount of indices any one mesh can have.
pub const MAX_INDEX_COUNT: u32 = u32::MAX;

/// Error returned from mesh validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshValidationError {
    #[error("Mesh has {count} vertices when the vertex limit is {MAX_VERTEX_COUNT}")]
    ExceededMaxVertexCount { count: usize },
    #[error("Mesh has {count} indices when maximum index count is {MAX_INDEX_COUNT}")]
    ExceededMaxIndexCount { count: usize },
    #[error("Mesh has {count} indices which is not a multiple of three. Meshes are always composed of triangles")]
    IndexCountNotMultipleOfThree { count: usize },
    #[error(
        "Index at position {index} has the value {value} which is out of bounds for vertex buffers of {max} length"
    )]
    IndexOutOfBounds { index: usize, value: u32, max: u32 },
}

/// Easy to use builder for a [`Mesh`] that deals with common operations for
/// you.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    positions: Vec<Vec3>,
    indices: Option<Vec<u32>>,
    flip_winding_order: bool,
}
impl MeshBuilder {
    /// Create a new [`MeshBuilder`] with a given set of positions.
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    /// Add indices to the given mesh. Every three indices form one triangle.
    ///
    /// If no indices are given, the positions are treated as a plain triangle
    /// list.
    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Flip the winding order
    ///
    /// See [`Mesh::flip_winding_order`] for more information.
    pub fn with_flip_winding_order(mut self) -> Self {
        self.flip_winding_order = true;
        self
    }

    /// Build a mesh, validating it in the process.
    pub fn build(self) -> Result<Mesh, MeshValidationError> {
        let vertex_count = self.positions.len();
        let mut mesh = Mesh {
            positions: self.positions,
            indices: self.indices.unwrap_or_else(|| (0..vertex_count as u32).collect()),
        };

        mesh.validate()?;

        if self.flip_winding_order {
            mesh.flip_winding_order();
        }

        Ok(mesh)
    }
}

/// A triangle mesh that casts shadows.
///
/// Positions and faces are in the caller's object space. Faces are wound
/// counter-clockwise when seen from the side their normal points to.
///
/// These can be annoying to construct, so use the [`MeshBuilder`] to make it
/// easier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Validates that the index buffer describes whole, in-bounds triangles.
    pub fn validate(&self) -> Result<(), MeshValidationError> {
        let position_length = self.positions.len();
        let indices_length = self.indices.len();

        if position_length > MAX_VERTEX_COUNT as usize {
            return Err(MeshValidationError::ExceededMaxVertexCount { count: position_length });
        }

        if indices_length % 3 != 0 {
            return Err(MeshValidationError::IndexCountNotMultipleOfThree { count: indices_length });
        }

        if indices_length >= MAX_INDEX_COUNT as usize {
            return Err(MeshValidationError::ExceededMaxIndexCount { count: indices_length });
        }

        for (index, &value) in self.indices.iter().enumerate() {
            if value as usize >= position_length {
                return Err(MeshValidationError::IndexOutOfBounds {
                    index,
                    value,
                    max: position_length as u32,
                });
            }
        }

        Ok(())
    }

    /// Amount of triangles in the mesh.
    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Converts the winding order from counter-clockwise to clockwise or the
    /// other way around, flipping which side of every face is lit.
    pub fn flip_winding_order(&mut self) {
        for indices in self.indices.chunks_exact_mut(3) {
            if let [_, left, right] = indices {
                std::mem::swap(left, right);
            }
        }
    }
}

/// A light that shadow volumes are cast away from.
///
/// Must be expressed in the same space as the [`Mesh`] it shadows; use
/// [`Light::to_object_space`] to move a world space light into a mesh's
/// frame of reference.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Light {
    /// Infinitely far away light. `direction` is the direction the light
    /// travels in, from the light towards the scene.
    Directional { direction: Vec3 },
    /// Light radiating from a single point.
    Point { position: Vec3 },
}

impl Light {
    /// Vector from `point` towards the light. Not normalized.
    pub fn direction_to_light(&self, point: Vec3) -> Vec3 {
        match *self {
            Self::Directional { direction } => -direction,
            Self::Point { position } => position - point,
        }
    }

    /// Vector from `point` pointing away from the light. Not normalized.
    ///
    /// This is the direction shadow volumes are extruded along.
    pub fn direction_from_light(&self, point: Vec3) -> Vec3 {
        match *self {
            Self::Directional { direction } => direction,
            Self::Point { position } => point - position,
        }
    }

    /// A light that cannot cast a shadow: a directional light with no
    /// direction.
    pub fn is_degenerate(&self) -> bool {
        match *self {
            Self::Directional { direction } => direction.length_squared() == 0.0,
            Self::Point { position } => !position.is_finite(),
        }
    }

    /// Moves a world space light into the object space of a mesh whose
    /// world transform is `world_from_object`.
    pub fn to_object_space(self, world_from_object: Mat4) -> Self {
        let object_from_world = world_from_object.inverse();
        match self {
            Self::Directional { direction } => Self::Directional {
                direction: object_from_world.transform_vector3(direction),
            },
            Self::Point { position } => Self::Point {
                position: object_from_world.transform_point3(position),
            },
        }
    }
}

/// How shadow volumes are counted into the stencil buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StencilMethod {
    /// Depth-pass counting with the volume drawn twice: front faces
    /// increment, then back faces decrement.
    TwoPassZPass,
    /// Depth-pass counting with the volume drawn once using independent
    /// front and back stencil operations.
    SinglePassTwoSidedStencil,
    /// Depth-fail counting. Correct when the eye is inside a shadow volume,
    /// but needs a capped volume.
    ZFail,
}

impl StencilMethod {
    pub const ARRAY: [Self; 3] = [Self::TwoPassZPass, Self::SinglePassTwoSidedStencil, Self::ZFail];

    /// Whether volumes counted with this method must be closed with near and
    /// far caps.
    pub const fn requires_caps(self) -> bool {
        matches!(self, Self::ZFail)
    }

    /// Whether this method needs hardware two sided stencil.
    pub const fn requires_two_sided_stencil(self) -> bool {
        matches!(self, Self::SinglePassTwoSidedStencil)
    }
}

/// How far silhouette edges are pushed away from the light.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Extrusion {
    /// Push extruded vertices `distance` units along the normalized light
    /// direction.
    Finite { distance: f32 },
    /// Push extruded vertices to infinity by emitting them with `w = 0`.
    ///
    /// Requires a projection whose far plane is at infinity, otherwise the
    /// far ends of the volume are clipped away.
    Infinite,
}

impl Default for Extrusion {
    fn default() -> Self {
        Self::Finite { distance: 10.0 }
    }
}

/// What the device can do that shadow rendering cares about.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Bits in the stencil buffer. Zero means there is no stencil buffer.
    pub stencil_bits: u8,
    /// Independent stencil operations for front and back faces in one draw.
    pub two_sided_stencil: bool,
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use crate::{Light, MeshBuilder, MeshValidationError};

    #[test]
    fn index_count_error_message() {
        let err = MeshValidationError::ExceededMaxIndexCount { count: 7 };
        assert_eq!(
            err.to_string(),
            format!("Mesh has 7 indices when maximum index count is {}", u32::MAX)
        );
    }

    #[test]
    fn builder_generates_indices() {
        let mesh = MeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y]).build().unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.face_count(), 1);
    }

    #[test]
    fn builder_flips_winding() {
        let mesh = MeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
            .with_indices(vec![0, 1, 2])
            .with_flip_winding_order()
            .build()
            .unwrap();
        assert_eq!(mesh.indices, vec![0, 2, 1]);
    }

    #[test]
    fn partial_triangle_rejected() {
        let err = MeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
            .with_indices(vec![0, 1])
            .build()
            .unwrap_err();
        assert_eq!(err, MeshValidationError::IndexCountNotMultipleOfThree { count: 2 });
    }

    #[test]
    fn out_of_bounds_rejected() {
        let err = MeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
            .with_indices(vec![0, 1, 3])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            MeshValidationError::IndexOutOfBounds {
                index: 2,
                value: 3,
                max: 3
            }
        );
    }

    #[test]
    fn empty_mesh_is_valid() {
        let mesh = MeshBuilder::new(Vec::new()).build().unwrap();
        assert_eq!(mesh.face_count(), 0);
    }

    #[test]
    fn light_into_object_space() {
        let world_from_object = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));

        let point = Light::Point {
            position: Vec3::new(0.0, 10.0, 0.0),
        }
        .to_object_space(world_from_object);
        assert_eq!(
            point,
            Light::Point {
                position: Vec3::new(0.0, 5.0, 0.0)
            }
        );

        // Translation never affects a direction.
        let directional = Light::Directional { direction: -Vec3::Y }.to_object_space(world_from_object);
        assert_eq!(directional, Light::Directional { direction: -Vec3::Y });
    }

    #[test]
    fn light_directions() {
        let light = Light::Point { position: Vec3::Y };
        assert_eq!(light.direction_to_light(Vec3::ZERO), Vec3::Y);
        assert_eq!(light.direction_from_light(Vec3::ZERO), -Vec3::Y);

        assert!(Light::Directional { direction: Vec3::ZERO }.is_degenerate());
        assert!(!Light::Directional { direction: Vec3::X }.is_degenerate());
    }
}
