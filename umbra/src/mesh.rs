use glam::Vec3;
use umbra_types::Mesh;

/// Read-only view of a triangle mesh that casts shadows.
///
/// Shadow computation only ever needs positions and triangle indices, so
/// anything that can hand those out (a loaded [`Mesh`], a skinned mesh's
/// per-frame positions, procedural geometry) can cast a shadow.
pub trait TriangleMesh {
    /// Vertex positions, in the same space as the light.
    fn positions(&self) -> &[Vec3];

    /// Triangle list indices. Trailing indices that don't form a whole
    /// triangle are ignored.
    fn indices(&self) -> &[u32];

    fn face_count(&self) -> usize {
        self.indices().len() / 3
    }

    /// Indices of the given triangle.
    ///
    /// # Panic
    ///
    /// Will panic if `face` is not less than [`TriangleMesh::face_count`].
    fn face(&self, face: usize) -> [u32; 3] {
        let indices = self.indices();
        [indices[face * 3], indices[face * 3 + 1], indices[face * 3 + 2]]
    }
}

impl TriangleMesh for Mesh {
    fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    fn indices(&self) -> &[u32] {
        &self.indices
    }
}

/// Borrowed mesh data. Useful when the positions live in a buffer owned by
/// someone else, like the output of CPU skinning.
#[derive(Debug, Copy, Clone)]
pub struct MeshRef<'a> {
    pub positions: &'a [Vec3],
    pub indices: &'a [u32],
}

impl<'a> MeshRef<'a> {
    pub fn new(positions: &'a [Vec3], indices: &'a [u32]) -> Self {
        Self { positions, indices }
    }
}

impl<'a> TriangleMesh for MeshRef<'a> {
    fn positions(&self) -> &[Vec3] {
        self.positions
    }

    fn indices(&self) -> &[u32] {
        self.indices
    }
}

impl<'a, T: TriangleMesh + ?Sized> TriangleMesh for &'a T {
    fn positions(&self) -> &[Vec3] {
        (**self).positions()
    }

    fn indices(&self) -> &[u32] {
        (**self).indices()
    }
}
