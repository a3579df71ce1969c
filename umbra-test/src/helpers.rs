use std::{fs::create_dir_all, path::Path};

use anyhow::{Context, Result};
use glam::{Mat4, Vec3, Vec4};
use umbra::{
    types::{Light, Mesh, MeshBuilder},
    RenderContext, ScenePass, ShadowScene,
};

use crate::SoftwareDevice;

pub const GROUND_Y: f32 = -2.0;
pub const GROUND_HALF_EXTENT: f32 = 40.0;

pub const AMBIENT_COLOR: Vec4 = Vec4::new(0.2, 0.2, 0.3, 1.0);
pub const LIT_COLOR: Vec4 = Vec4::new(0.9, 0.8, 0.6, 1.0);

/// Cube that is [-1, 1] with eight shared vertices, wound counter-clockwise
/// seen from outside.
pub fn cube() -> Mesh {
    let positions = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 != 0 { 1.0 } else { -1.0 },
                if i & 2 != 0 { 1.0 } else { -1.0 },
                if i & 4 != 0 { 1.0 } else { -1.0 },
            )
        })
        .collect();

    let indices = vec![
        1, 3, 7, 1, 7, 5, // +x
        0, 4, 6, 0, 6, 2, // -x
        2, 6, 7, 2, 7, 3, // +y
        0, 1, 5, 0, 5, 4, // -y
        4, 5, 7, 4, 7, 6, // +z
        0, 2, 3, 0, 3, 1, // -z
    ];

    MeshBuilder::new(positions).with_indices(indices).build().unwrap()
}

/// Horizontal plane that is [-half_extent, half_extent] at height `y`,
/// facing up.
pub fn plane(y: f32, half_extent: f32) -> Mesh {
    let e = half_extent;
    MeshBuilder::new(vec![
        Vec3::new(-e, y, -e),
        Vec3::new(-e, y, e),
        Vec3::new(e, y, e),
        Vec3::new(e, y, -e),
    ])
    .with_indices(vec![0, 1, 2, 0, 2, 3])
    .build()
    .unwrap()
}

/// Unindexed homogeneous positions of every face of `mesh`.
pub fn triangle_list(mesh: &Mesh) -> Vec<Vec4> {
    mesh.indices
        .iter()
        .map(|&i| mesh.positions[i as usize].extend(1.0))
        .collect()
}

pub struct SceneMesh {
    pub triangles: Vec<Vec4>,
    pub ambient: Vec4,
    pub lit: Vec4,
}

/// World space meshes in flat colors, drawable on any [`RenderContext`].
#[derive(Default)]
pub struct TestScene {
    pub meshes: Vec<SceneMesh>,
}

impl TestScene {
    pub fn add(&mut self, mesh: &Mesh, ambient: Vec4, lit: Vec4) -> &mut Self {
        self.meshes.push(SceneMesh {
            triangles: triangle_list(mesh),
            ambient,
            lit,
        });
        self
    }

    /// The unit cube floating over a large ground plane.
    pub fn cube_over_ground() -> Self {
        let mut scene = Self::default();
        scene
            .add(&cube(), AMBIENT_COLOR, LIT_COLOR)
            .add(&plane(GROUND_Y, GROUND_HALF_EXTENT), AMBIENT_COLOR, LIT_COLOR);
        scene
    }
}

impl<C: RenderContext + ?Sized> ShadowScene<C> for TestScene {
    fn draw(&mut self, ctx: &mut C, pass: ScenePass) {
        for mesh in &self.meshes {
            let color = match pass {
                ScenePass::Ambient => mesh.ambient,
                ScenePass::Lit => mesh.lit,
            };
            ctx.draw_triangles(&mesh.triangles, color);
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov: f32,
    pub near: f32,
}

impl Camera {
    /// Looking down at the cube and the ground around it. Every pixel sees
    /// either.
    pub fn overhead() -> Self {
        Self {
            eye: Vec3::new(0.0, 10.0, 6.0),
            target: Vec3::new(0.0, GROUND_Y, 0.0),
            fov: 60f32.to_radians(),
            near: 0.1,
        }
    }

    /// Between the cube and the ground, inside the shadow of the cube.
    pub fn under_cube() -> Self {
        Self {
            eye: Vec3::new(0.0, -1.6, 0.0),
            target: Vec3::new(0.0, GROUND_Y, 4.0),
            fov: 90f32.to_radians(),
            near: 0.05,
        }
    }

    /// Projection with the far plane at infinity.
    pub fn view_proj(&self) -> Mat4 {
        Mat4::perspective_infinite_rh(self.fov, 1.0, self.near) * Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }
}

/// Lights the top, -x and -z faces of the cube and throws its shadow
/// towards the overhead camera.
pub fn oblique_sun() -> Light {
    Light::Directional {
        direction: Vec3::new(0.6, -1.0, 0.8),
    }
}

pub fn overhead_sun() -> Light {
    Light::Directional { direction: -Vec3::Y }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelClass {
    /// Too close to an edge, or not a ground pixel.
    Ambiguous,
    Lit,
    Shadowed,
}

/// Ray traced ground truth for the shadow of an axis aligned box on the
/// ground plane.
#[derive(Debug, Copy, Clone)]
pub struct ShadowProbe {
    pub caster_min: Vec3,
    pub caster_max: Vec3,
    pub light: Light,
    /// Fraction the caster is grown and shrunk by to find pixels too close
    /// to an edge to call.
    pub tolerance: f32,
}

impl ShadowProbe {
    pub fn unit_cube(light: Light) -> Self {
        Self {
            caster_min: Vec3::splat(-1.0),
            caster_max: Vec3::splat(1.0),
            light,
            tolerance: 0.05,
        }
    }

    fn scaled(&self, scale: f32) -> (Vec3, Vec3) {
        let center = (self.caster_min + self.caster_max) * 0.5;
        let half = (self.caster_max - self.caster_min) * 0.5 * scale;
        (center - half, center + half)
    }

    fn occluded(&self, point: Vec3, scale: f32) -> bool {
        let (min, max) = self.scaled(scale);
        match self.light {
            Light::Directional { direction } => ray_box(point, -direction, min, max).is_some(),
            Light::Point { position } => ray_box(point, position - point, min, max).map_or(false, |t| t < 1.0),
        }
    }

    pub fn classify(&self, origin: Vec3, dir: Vec3) -> PixelClass {
        let (min, max) = self.scaled(1.0 + self.tolerance);
        if ray_box(origin, dir, min, max).is_some() {
            return PixelClass::Ambiguous;
        }

        if dir.y >= 0.0 {
            return PixelClass::Ambiguous;
        }
        let t = (GROUND_Y - origin.y) / dir.y;
        let ground = origin + dir * t;
        if t <= 0.0 || ground.x.abs() > GROUND_HALF_EXTENT - 1.0 || ground.z.abs() > GROUND_HALF_EXTENT - 1.0 {
            return PixelClass::Ambiguous;
        }

        let inner = self.occluded(ground, 1.0 - self.tolerance);
        let outer = self.occluded(ground, 1.0 + self.tolerance);
        match (inner, outer) {
            (true, _) => PixelClass::Shadowed,
            (false, false) => PixelClass::Lit,
            (false, true) => PixelClass::Ambiguous,
        }
    }

    pub fn classify_pixel(&self, device: &SoftwareDevice, x: u32, y: u32) -> PixelClass {
        let (origin, dir) = device.pixel_ray(x, y);
        self.classify(origin, dir)
    }
}

/// Slab test. Returns the entry distance along `dir` if the ray starting at
/// `origin` touches the box.
pub fn ray_box(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let inv = dir.recip();
    let t0 = (min - origin) * inv;
    let t1 = (max - origin) * inv;
    let near = t0.min(t1).max_element().max(0.0);
    let far = t0.max(t1).min_element();
    (near <= far).then_some(near)
}

/// Compared against [`ShadowProbe`], in pixels.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ShadowTally {
    pub lit: usize,
    pub shadowed: usize,
    pub wrong: usize,
}

impl ShadowTally {
    /// Checks the stencil of every pixel the probe can call.
    pub fn of(device: &SoftwareDevice, probe: &ShadowProbe) -> Self {
        let mut tally = Self::default();
        for (x, y) in device.pixels() {
            let in_shadow = device.stencil_at(x, y) != 0;
            match probe.classify_pixel(device, x, y) {
                PixelClass::Ambiguous => {}
                PixelClass::Lit if !in_shadow => tally.lit += 1,
                PixelClass::Shadowed if in_shadow => tally.shadowed += 1,
                _ => tally.wrong += 1,
            }
        }
        tally
    }
}

/// Saves the color and stencil of a failed test next to the other results.
pub fn save_failure(device: &SoftwareDevice, name: &str) -> Result<()> {
    let dir = Path::new("tests/results");
    create_dir_all(dir).context("Could not create results directory")?;
    device
        .to_image()
        .save(dir.join(format!("{name}-failure.png")))
        .context("Could not save color image")?;
    device
        .stencil_image()
        .save(dir.join(format!("{name}-stencil-failure.png")))
        .context("Could not save stencil image")?;
    Ok(())
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
