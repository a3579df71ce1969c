//! Silhouette extraction.
//!
//! Every triangle facing the light contributes its three edges to an
//! [`EdgeSet`]. Adding an edge that is already present removes it, so an edge
//! shared by two lit triangles cancels out and only the boundary of the lit
//! region survives.

use std::{collections::hash_map::Entry, hash::Hash};

use glam::Vec3;
use umbra_types::Light;

use crate::{util::typedefs::FastHashMap, ShadowError, TriangleMesh};

/// Whether a face with the given (not necessarily normalized) normal is lit
/// by a light in the direction `to_light`.
///
/// Faces exactly edge-on to the light count as lit.
pub fn is_lit(normal: Vec3, to_light: Vec3) -> bool {
    normal.dot(to_light) >= 0.0
}

/// Unnormalized normal of a counter-clockwise triangle.
pub fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}

/// An edge between two vertices.
///
/// Equality and hashing ignore direction, `Edge::new(a, b) == Edge::new(b, a)`.
/// The direction is still kept: it is the winding of the lit triangle the
/// edge came from, which the extruder needs to orient the volume.
#[derive(Debug, Copy, Clone)]
pub struct Edge {
    pub v0: u32,
    pub v1: u32,
}

impl Edge {
    pub const fn new(v0: u32, v1: u32) -> Self {
        Self { v0, v1 }
    }

    /// Direction independent identity of the edge.
    pub fn key(self) -> (u32, u32) {
        if self.v0 <= self.v1 {
            (self.v0, self.v1)
        } else {
            (self.v1, self.v0)
        }
    }

    pub fn reversed(self) -> Self {
        Self::new(self.v1, self.v0)
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// A set of edges where inserting a present edge removes it instead.
///
/// Iteration order is deterministic for a given sequence of toggles.
#[derive(Debug, Default, Clone)]
pub struct EdgeSet {
    edges: Vec<Edge>,
    slots: FastHashMap<(u32, u32), usize>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves room for `additional` more edges.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), ShadowError> {
        let oom = |_| ShadowError::OutOfMemory { requested: additional };
        self.edges.try_reserve(additional).map_err(oom)?;
        self.slots.try_reserve(additional).map_err(oom)
    }

    /// Inserts the edge if absent, removes it if present.
    ///
    /// Returns true if the edge is in the set afterwards.
    pub fn toggle(&mut self, edge: Edge) -> bool {
        match self.slots.entry(edge.key()) {
            Entry::Occupied(slot) => {
                let idx = slot.remove();
                self.edges.swap_remove(idx);
                // The last edge now lives where the removed one was.
                if let Some(moved) = self.edges.get(idx) {
                    if let Some(moved_slot) = self.slots.get_mut(&moved.key()) {
                        *moved_slot = idx;
                    }
                }
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(self.edges.len());
                self.edges.push(edge);
                true
            }
        }
    }

    pub fn contains(&self, edge: Edge) -> bool {
        self.slots.contains_key(&edge.key())
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Edge> {
        self.edges.iter()
    }

    pub fn as_slice(&self) -> &[Edge] {
        &self.edges
    }

    /// Removes every edge, keeping the allocations.
    pub fn clear(&mut self) {
        self.edges.clear();
        self.slots.clear();
    }
}

impl<'a> IntoIterator for &'a EdgeSet {
    type Item = &'a Edge;
    type IntoIter = std::slice::Iter<'a, Edge>;

    fn into_iter(self) -> Self::IntoIter {
        self.edges.iter()
    }
}

/// The silhouette of a mesh as seen from a light.
#[derive(Debug, Default, Clone)]
pub struct Silhouette {
    /// Edges between lit and unlit faces, plus open edges of lit faces. Each
    /// edge is directed the way its lit face winds it.
    pub edges: EdgeSet,
    /// Every lit face, in mesh order. Used to cap the volume.
    pub lit_faces: Vec<[u32; 3]>,
}

impl Silhouette {
    /// Recomputes the silhouette for a new mesh or light, reusing this
    /// silhouette's allocations.
    ///
    /// A mesh without faces, or a degenerate light, gives an empty
    /// silhouette.
    pub fn rebuild<M: TriangleMesh + ?Sized>(&mut self, mesh: &M, light: &Light) -> Result<(), ShadowError> {
        profiling::scope!("Silhouette::rebuild");

        self.edges.clear();
        self.lit_faces.clear();

        let face_count = mesh.face_count();
        if face_count == 0 || light.is_degenerate() {
            return Ok(());
        }

        // Worst case every lit face has three open edges.
        self.edges.try_reserve(face_count * 3)?;
        self.lit_faces
            .try_reserve(face_count)
            .map_err(|_| ShadowError::OutOfMemory { requested: face_count })?;

        let positions = mesh.positions();
        for face_idx in 0..face_count {
            let face = mesh.face(face_idx);
            let [a, b, c] = face_positions(positions, face, face_idx)?;

            if !is_lit(face_normal(a, b, c), light.direction_to_light(a)) {
                continue;
            }

            self.lit_faces.push(face);
            self.edges.toggle(Edge::new(face[0], face[1]));
            self.edges.toggle(Edge::new(face[1], face[2]));
            self.edges.toggle(Edge::new(face[2], face[0]));
        }

        log::trace!(
            "Silhouette of {} faces: {} lit, {} edges",
            face_count,
            self.lit_faces.len(),
            self.edges.len()
        );

        Ok(())
    }
}

/// Computes the silhouette of `mesh` as seen from `light`.
pub fn extract_silhouette<M: TriangleMesh + ?Sized>(mesh: &M, light: &Light) -> Result<Silhouette, ShadowError> {
    let mut silhouette = Silhouette::default();
    silhouette.rebuild(mesh, light)?;
    Ok(silhouette)
}

fn face_positions(positions: &[Vec3], face: [u32; 3], face_idx: usize) -> Result<[Vec3; 3], ShadowError> {
    let fetch = |index: u32| {
        positions
            .get(index as usize)
            .copied()
            .ok_or(ShadowError::IndexOutOfBounds {
                face: face_idx,
                index,
                vertex_count: positions.len(),
            })
    };
    Ok([fetch(face[0])?, fetch(face[1])?, fetch(face[2])?])
}
