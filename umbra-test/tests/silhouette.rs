use std::collections::BTreeSet;

use glam::Vec3;
use umbra::{
    extract_silhouette,
    types::{Light, Mesh, MeshBuilder},
    Silhouette,
};
use umbra_test::{cube, oblique_sun, overhead_sun, test_attr};

fn directed_edges(silhouette: &Silhouette) -> BTreeSet<(u32, u32)> {
    silhouette.edges.iter().map(|edge| (edge.v0, edge.v1)).collect()
}

#[test_attr]
pub async fn cube_lit_from_above_outlines_its_base() {
    let mesh = cube();
    let silhouette = extract_silhouette(&mesh, &overhead_sun()).unwrap();

    // Side faces are edge on and count as lit.
    assert_eq!(silhouette.lit_faces.len(), 10);
    assert_eq!(silhouette.edges.len(), 4);
    for edge in &silhouette.edges {
        assert_eq!(mesh.positions[edge.v0 as usize].y, -1.0);
        assert_eq!(mesh.positions[edge.v1 as usize].y, -1.0);
    }
}

#[test_attr]
pub async fn oblique_light_gives_a_closed_hexagon() {
    let mesh = cube();
    let silhouette = extract_silhouette(&mesh, &oblique_sun()).unwrap();

    assert_eq!(silhouette.lit_faces.len(), 6);
    assert_eq!(silhouette.edges.len(), 6);

    // Every vertex on the outline starts exactly one edge and ends exactly one.
    let starts: BTreeSet<u32> = silhouette.edges.iter().map(|e| e.v0).collect();
    let ends: BTreeSet<u32> = silhouette.edges.iter().map(|e| e.v1).collect();
    assert_eq!(starts.len(), 6);
    assert_eq!(starts, ends);
}

#[test_attr]
pub async fn point_light_above_outlines_the_top() {
    let mesh = cube();
    let light = Light::Point {
        position: Vec3::new(0.5, 4.0, 0.5),
    };
    let silhouette = extract_silhouette(&mesh, &light).unwrap();

    assert_eq!(silhouette.lit_faces.len(), 2);
    assert_eq!(silhouette.edges.len(), 4);
    for edge in &silhouette.edges {
        assert_eq!(mesh.positions[edge.v0 as usize].y, 1.0);
    }
}

#[test_attr]
pub async fn face_order_does_not_matter() {
    let mesh = cube();
    let faces: Vec<[u32; 3]> = mesh.indices.chunks_exact(3).map(|f| [f[0], f[1], f[2]]).collect();

    // Reverse the face order and rotate the corners of every face, keeping
    // each winding.
    let indices = faces.iter().rev().flat_map(|&[a, b, c]| [b, c, a]).collect();
    let shuffled = MeshBuilder::new(mesh.positions.clone())
        .with_indices(indices)
        .build()
        .unwrap();

    for light in [overhead_sun(), oblique_sun()] {
        let expected = extract_silhouette(&mesh, &light).unwrap();
        let actual = extract_silhouette(&shuffled, &light).unwrap();
        assert_eq!(directed_edges(&expected), directed_edges(&actual));
    }
}

#[test_attr]
pub async fn open_mesh_keeps_its_border() {
    // Two triangles of a quad facing +z, lit from the front.
    let mesh: Mesh = MeshBuilder::new(vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ])
    .with_indices(vec![0, 1, 2, 0, 2, 3])
    .build()
    .unwrap();

    let lit = extract_silhouette(&mesh, &Light::Directional { direction: -Vec3::Z }).unwrap();
    assert_eq!(
        directed_edges(&lit),
        BTreeSet::from([(0, 1), (1, 2), (2, 3), (3, 0)])
    );

    let unlit = extract_silhouette(&mesh, &Light::Directional { direction: Vec3::Z }).unwrap();
    assert!(unlit.edges.is_empty());
    assert!(unlit.lit_faces.is_empty());
}
