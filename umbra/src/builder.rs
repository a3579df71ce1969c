use umbra_types::{Extrusion, Light};

use crate::{ShadowError, ShadowVolumeMesh, Silhouette, TriangleMesh, VolumeExtruder};

/// Silhouette extraction and extrusion in one step.
///
/// Keeps the edge set and the volume buffer between calls, so rebuilding
/// the volume of an animated mesh every frame does not allocate once the
/// buffers have grown large enough.
#[derive(Debug, Clone)]
pub struct ShadowVolumeBuilder {
    silhouette: Silhouette,
    extruder: VolumeExtruder,
    extrusion: Extrusion,
    caps: bool,
}

impl Default for ShadowVolumeBuilder {
    fn default() -> Self {
        Self::new(Extrusion::default(), false)
    }
}

impl ShadowVolumeBuilder {
    pub fn new(extrusion: Extrusion, caps: bool) -> Self {
        Self {
            silhouette: Silhouette::default(),
            extruder: VolumeExtruder::new(),
            extrusion,
            caps,
        }
    }

    /// See [`VolumeExtruder::with_vertex_limit`].
    pub fn with_vertex_limit(mut self, limit: usize) -> Self {
        self.extruder = self.extruder.with_vertex_limit(limit);
        self
    }

    pub fn extrusion(&self) -> Extrusion {
        self.extrusion
    }

    pub fn set_extrusion(&mut self, extrusion: Extrusion) {
        self.extrusion = extrusion;
    }

    pub fn caps(&self) -> bool {
        self.caps
    }

    pub fn set_caps(&mut self, caps: bool) {
        self.caps = caps;
    }

    /// Builds the shadow volume `mesh` casts away from `light`.
    ///
    /// The light must be in the mesh's space.
    pub fn build<M: TriangleMesh + ?Sized>(&mut self, mesh: &M, light: &Light) -> Result<&ShadowVolumeMesh, ShadowError> {
        profiling::scope!("ShadowVolumeBuilder::build");

        if let Err(err) = self.silhouette.rebuild(mesh, light) {
            self.silhouette.edges.clear();
            self.silhouette.lit_faces.clear();
            self.extruder.clear();
            return Err(err);
        }
        self.extruder
            .extrude(&self.silhouette, mesh.positions(), light, self.extrusion, self.caps)
    }

    /// Silhouette of the most recent [`build`](Self::build).
    pub fn silhouette(&self) -> &Silhouette {
        &self.silhouette
    }

    /// The most recently built volume.
    pub fn volume(&self) -> &ShadowVolumeMesh {
        self.extruder.volume()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use umbra_types::{Extrusion, Light, MeshBuilder};

    use super::ShadowVolumeBuilder;

    fn quad() -> umbra_types::Mesh {
        MeshBuilder::new(vec![
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, -1.0),
        ])
        .with_indices(vec![0, 1, 2, 0, 2, 3])
        .build()
        .unwrap()
    }

    #[test]
    fn shared_edge_cancels() {
        let mut builder = ShadowVolumeBuilder::default();
        let volume = builder
            .build(&quad(), &Light::Directional { direction: -Vec3::Y })
            .unwrap();

        assert_eq!(volume.vertex_count(), 4 * 6);
        assert_eq!(builder.silhouette().edges.len(), 4);
        assert_eq!(builder.silhouette().lit_faces.len(), 2);
    }

    #[test]
    fn rebuild_replaces_previous_volume() {
        let mut builder = ShadowVolumeBuilder::new(Extrusion::Infinite, true);
        let mesh = quad();

        let lit = builder.build(&mesh, &Light::Directional { direction: -Vec3::Y }).unwrap().clone();
        assert_eq!(lit.vertex_count(), 4 * 6 + 2 * 6);

        let unlit = builder.build(&mesh, &Light::Directional { direction: Vec3::Y }).unwrap();
        assert!(unlit.is_empty());
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let mesh = quad();
        let light = Light::Point {
            position: Vec3::new(0.3, 4.0, -0.2),
        };

        let mut a = ShadowVolumeBuilder::default();
        let mut b = ShadowVolumeBuilder::default();
        a.build(&mesh, &light).unwrap();
        // Warm b's buffers with a different light first.
        b.build(&mesh, &Light::Directional { direction: -Vec3::X }).unwrap();
        b.build(&mesh, &light).unwrap();

        assert_eq!(a.volume(), b.volume());
    }
}
