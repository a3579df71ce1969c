//! Volume extrusion.

use glam::{Vec3, Vec4};
use umbra_types::{Extrusion, Light};

use crate::{ShadowError, Silhouette};

/// Vertices emitted per silhouette edge: one quad as two triangles.
pub const VERTICES_PER_EDGE: usize = 6;

/// Default value of [`VolumeExtruder::vertex_limit`].
pub const DEFAULT_VERTEX_LIMIT: usize = 1 << 20;

/// Geometry of a shadow volume as an unindexed triangle list.
///
/// Positions are homogeneous and in the space of the mesh that cast the
/// shadow. Points extruded to infinity have `w == 0`, every other point has
/// `w == 1`.
///
/// All side quads come first, followed by the near cap and then the far cap.
/// Every triangle is wound counter-clockwise when seen from outside the
/// volume.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShadowVolumeMesh {
    positions: Vec<Vec4>,
    side_vertex_count: usize,
    cap_vertex_count: usize,
}

impl ShadowVolumeMesh {
    pub fn positions(&self) -> &[Vec4] {
        &self.positions
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Vertices belonging to the side quads, always a multiple of
    /// [`VERTICES_PER_EDGE`].
    pub fn side_vertex_count(&self) -> usize {
        self.side_vertex_count
    }

    /// Vertices belonging to both caps together.
    pub fn cap_vertex_count(&self) -> usize {
        self.cap_vertex_count
    }

    pub fn side_positions(&self) -> &[Vec4] {
        &self.positions[..self.side_vertex_count]
    }

    pub fn cap_positions(&self) -> &[Vec4] {
        &self.positions[self.side_vertex_count..]
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec4; 3]> + '_ {
        self.positions.chunks_exact(3).map(|tri| [tri[0], tri[1], tri[2]])
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.side_vertex_count = 0;
        self.cap_vertex_count = 0;
    }
}

/// Turns silhouettes into [`ShadowVolumeMesh`]es.
///
/// Owns the output buffer, which grows to fit the largest volume built so far
/// and is reused for every following one.
#[derive(Debug, Clone)]
pub struct VolumeExtruder {
    volume: ShadowVolumeMesh,
    vertex_limit: usize,
}

impl Default for VolumeExtruder {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeExtruder {
    pub fn new() -> Self {
        Self {
            volume: ShadowVolumeMesh::default(),
            vertex_limit: DEFAULT_VERTEX_LIMIT,
        }
    }

    /// Refuse to build volumes with more than `limit` vertices.
    pub fn with_vertex_limit(mut self, limit: usize) -> Self {
        self.vertex_limit = limit;
        self
    }

    pub fn vertex_limit(&self) -> usize {
        self.vertex_limit
    }

    /// The most recently built volume.
    pub fn volume(&self) -> &ShadowVolumeMesh {
        &self.volume
    }

    pub(crate) fn clear(&mut self) {
        self.volume.clear();
    }

    /// Builds the shadow volume of `silhouette`.
    ///
    /// `positions` must be the positions of the mesh the silhouette was
    /// extracted from. When `caps` is set, the lit faces are added as the
    /// near cap and their extruded copies as the far cap, which closes the
    /// volume.
    ///
    /// On error the previous volume is discarded and the extruder holds an
    /// empty one.
    pub fn extrude(
        &mut self,
        silhouette: &Silhouette,
        positions: &[Vec3],
        light: &Light,
        extrusion: Extrusion,
        caps: bool,
    ) -> Result<&ShadowVolumeMesh, ShadowError> {
        profiling::scope!("VolumeExtruder::extrude");

        self.volume.clear();

        if light.is_degenerate() {
            return Ok(&self.volume);
        }

        let side_vertices = silhouette.edges.len() * VERTICES_PER_EDGE;
        let cap_vertices = if caps { silhouette.lit_faces.len() * 6 } else { 0 };
        let vertices = side_vertices + cap_vertices;
        if vertices > self.vertex_limit {
            return Err(ShadowError::VolumeTooLarge {
                vertices,
                limit: self.vertex_limit,
            });
        }
        if let Err(err) = self.fill(silhouette, positions, light, extrusion, caps, vertices) {
            self.volume.clear();
            return Err(err);
        }

        log::trace!(
            "Extruded {} edges into {} vertices ({} in caps)",
            silhouette.edges.len(),
            self.volume.vertex_count(),
            self.volume.cap_vertex_count
        );

        Ok(&self.volume)
    }

    fn fill(
        &mut self,
        silhouette: &Silhouette,
        positions: &[Vec3],
        light: &Light,
        extrusion: Extrusion,
        caps: bool,
        vertices: usize,
    ) -> Result<(), ShadowError> {
        let volume = &mut self.volume;
        volume
            .positions
            .try_reserve(vertices)
            .map_err(|_| ShadowError::OutOfMemory { requested: vertices })?;

        let fetch = |index: u32| {
            positions.get(index as usize).copied().ok_or(ShadowError::MismatchedPositions {
                index,
                vertex_count: positions.len(),
            })
        };
        let extrude = |point: Vec3| extrude_point(point, light, extrusion);

        for edge in &silhouette.edges {
            let a = fetch(edge.v0)?;
            let b = fetch(edge.v1)?;
            let (a_far, b_far) = (extrude(a), extrude(b));
            let (a, b) = (a.extend(1.0), b.extend(1.0));

            // The edge runs a -> b in its lit face, so b -> a walks the
            // volume side with the outside on the left.
            volume.positions.extend_from_slice(&[b, a, a_far, b, a_far, b_far]);
        }
        volume.side_vertex_count = volume.positions.len();

        if caps {
            for &[i0, i1, i2] in &silhouette.lit_faces {
                let (p0, p1, p2) = (fetch(i0)?, fetch(i1)?, fetch(i2)?);
                volume
                    .positions
                    .extend_from_slice(&[p0.extend(1.0), p1.extend(1.0), p2.extend(1.0)]);
            }
            for &[i0, i1, i2] in &silhouette.lit_faces {
                let (p0, p1, p2) = (fetch(i0)?, fetch(i1)?, fetch(i2)?);
                volume
                    .positions
                    .extend_from_slice(&[extrude(p2), extrude(p1), extrude(p0)]);
            }
            volume.cap_vertex_count = volume.positions.len() - volume.side_vertex_count;
        }

        Ok(())
    }
}

/// Pushes `point` away from the light.
pub fn extrude_point(point: Vec3, light: &Light, extrusion: Extrusion) -> Vec4 {
    let away = light.direction_from_light(point);
    match extrusion {
        Extrusion::Finite { distance } => (point + away.normalize_or_zero() * distance).extend(1.0),
        Extrusion::Infinite => away.extend(0.0),
    }
}
