//! A software [`RenderContext`] with real depth and stencil buffers.
//!
//! Follows the same rules as a GPU closely enough for the shadow tests to mean
//! something: homogeneous clipping (so `w == 0` points behave), fixed point
//! edge functions with a top-left fill rule (so shared edges are rasterized
//! exactly once) and depth/stencil tests and ops in the usual order. Pixels
//! are sampled at their centers. Depth is clamped to `[0, 1]` instead of
//! clipping against the far plane, which matters for far caps at infinity.

use glam::{Mat4, Vec2, Vec3, Vec4};
use umbra::{
    types::{
        BlendComponent, ColorWrites, DeviceCapabilities, Face, PolygonMode, RenderState, StencilFaceState,
        StencilOperation,
    },
    RenderContext,
};

/// Sub-pixel precision of the rasterizer, in bits.
const SUBPIXEL_BITS: u32 = 8;
const SUBPIXEL_ONE: i64 = 1 << SUBPIXEL_BITS;
const MIN_W: f32 = 1e-6;
const GUARD_BAND: f32 = 4.0;

#[derive(Debug, Copy, Clone)]
struct ScreenVertex {
    x: i64,
    y: i64,
    depth: f32,
}

pub struct SoftwareDevice {
    width: u32,
    height: u32,
    view_proj: Mat4,
    capabilities: DeviceCapabilities,
    state: RenderState,

    color: Vec<Vec4>,
    depth: Vec<f32>,
    stencil: Vec<u8>,
    /// Increments minus decrements applied to each pixel since the last
    /// stencil clear, without wrapping.
    stencil_net: Vec<i32>,

    state_changes: usize,
    draws: usize,
}

impl SoftwareDevice {
    pub fn new(width: u32, height: u32, view_proj: Mat4, capabilities: DeviceCapabilities) -> Self {
        let pixels = (width * height) as usize;
        Self {
            width,
            height,
            view_proj,
            capabilities,
            state: RenderState::default(),
            color: vec![Vec4::ZERO; pixels],
            depth: vec![1.0; pixels],
            stencil: vec![0; pixels],
            stencil_net: vec![0; pixels],
            state_changes: 0,
            draws: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn view_proj(&self) -> Mat4 {
        self.view_proj
    }

    /// Resets color, depth to 1.0 and stencil to 0.
    pub fn clear(&mut self, color: Vec4) {
        self.color.fill(color);
        self.depth.fill(1.0);
        self.stencil.fill(0);
        self.stencil_net.fill(0);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn color_at(&self, x: u32, y: u32) -> Vec4 {
        self.color[self.index(x, y)]
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[self.index(x, y)]
    }

    pub fn stencil_at(&self, x: u32, y: u32) -> u8 {
        self.stencil[self.index(x, y)]
    }

    pub fn stencil_net_at(&self, x: u32, y: u32) -> i32 {
        self.stencil_net[self.index(x, y)]
    }

    pub fn stencil(&self) -> &[u8] {
        &self.stencil
    }

    pub fn state_changes(&self) -> usize {
        self.state_changes
    }

    pub fn draws(&self) -> usize {
        self.draws
    }

    /// Center of a pixel in normalized device coordinates.
    pub fn pixel_ndc(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32 * 2.0 - 1.0,
            1.0 - (y as f32 + 0.5) / self.height as f32 * 2.0,
        )
    }

    /// World space ray through the center of a pixel, as origin and
    /// normalized direction.
    pub fn pixel_ray(&self, x: u32, y: u32) -> (Vec3, Vec3) {
        let ndc = self.pixel_ndc(x, y);
        let inverse = self.view_proj.inverse();
        let near = inverse.project_point3(ndc.extend(0.0));
        let mid = inverse.project_point3(ndc.extend(0.5));
        (near, (mid - near).normalize())
    }

    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> {
        let (width, height) = (self.width, self.height);
        (0..height).flat_map(move |y| (0..width).map(move |x| (x, y)))
    }

    pub fn to_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.color_at(x, y).clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
            image::Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
        })
    }

    /// Stencil as a grayscale image, non-zero values are white.
    pub fn stencil_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([if self.stencil_at(x, y) != 0 { 255 } else { 0 }])
        })
    }

    fn to_screen(&self, clip: Vec4) -> ScreenVertex {
        let ndc = clip.truncate() / clip.w;
        let sx = (ndc.x * 0.5 + 0.5) * self.width as f32;
        let sy = (0.5 - ndc.y * 0.5) * self.height as f32;
        ScreenVertex {
            x: (sx as f64 * SUBPIXEL_ONE as f64).round() as i64,
            y: (sy as f64 * SUBPIXEL_ONE as f64).round() as i64,
            depth: ndc.z.clamp(0.0, 1.0),
        }
    }

    fn draw_clip_triangle(&mut self, clip: [Vec4; 3], color: Vec4) {
        let polygon = clip_polygon(&clip);
        if polygon.len() < 3 {
            return;
        }

        let screen: Vec<ScreenVertex> = polygon.iter().map(|&v| self.to_screen(v)).collect();

        // Counter-clockwise in normalized device coordinates (y up) is
        // clockwise on screen (y down).
        let area: i64 = (0..screen.len())
            .map(|i| {
                let a = screen[i];
                let b = screen[(i + 1) % screen.len()];
                a.x * b.y - b.x * a.y
            })
            .sum();
        if area == 0 {
            return;
        }
        let face = if area < 0 { Face::Front } else { Face::Back };
        if !self.state.draws_face(face) {
            return;
        }

        match self.state.polygon_mode {
            PolygonMode::Fill => {
                for i in 1..screen.len() - 1 {
                    self.fill_triangle([screen[0], screen[i], screen[i + 1]], face, color);
                }
            }
            PolygonMode::Line => {
                for i in 0..screen.len() {
                    self.draw_line(screen[i], screen[(i + 1) % screen.len()], face, color);
                }
            }
        }
    }

    fn fill_triangle(&mut self, mut tri: [ScreenVertex; 3], face: Face, color: Vec4) {
        // Make the triangle clockwise on screen so every edge function is
        // positive inside.
        if orient(tri[0], tri[1], tri[2]) < 0 {
            tri.swap(1, 2);
        }
        let area = orient(tri[0], tri[1], tri[2]);
        if area == 0 {
            return;
        }

        let min_x = tri.iter().map(|v| v.x).min().unwrap_or(0);
        let max_x = tri.iter().map(|v| v.x).max().unwrap_or(0);
        let min_y = tri.iter().map(|v| v.y).min().unwrap_or(0);
        let max_y = tri.iter().map(|v| v.y).max().unwrap_or(0);

        let px_min = (min_x / SUBPIXEL_ONE).max(0);
        let px_max = (max_x / SUBPIXEL_ONE).min(self.width as i64 - 1);
        let py_min = (min_y / SUBPIXEL_ONE).max(0);
        let py_max = (max_y / SUBPIXEL_ONE).min(self.height as i64 - 1);

        let edges = [(tri[1], tri[2]), (tri[2], tri[0]), (tri[0], tri[1])];
        let biases = edges.map(|(a, b)| if is_top_left(a, b) { 0 } else { -1 });

        for py in py_min..=py_max {
            for px in px_min..=px_max {
                let p = ScreenVertex {
                    x: px * SUBPIXEL_ONE + SUBPIXEL_ONE / 2,
                    y: py * SUBPIXEL_ONE + SUBPIXEL_ONE / 2,
                    depth: 0.0,
                };
                let w = [
                    orient(edges[0].0, edges[0].1, p),
                    orient(edges[1].0, edges[1].1, p),
                    orient(edges[2].0, edges[2].1, p),
                ];
                if (0..3).any(|i| w[i] + biases[i] < 0) {
                    continue;
                }

                let depth = (w[0] as f64 * tri[0].depth as f64
                    + w[1] as f64 * tri[1].depth as f64
                    + w[2] as f64 * tri[2].depth as f64)
                    / area as f64;
                self.shade(px as u32, py as u32, depth as f32, face, color);
            }
        }
    }

    fn draw_line(&mut self, a: ScreenVertex, b: ScreenVertex, face: Face, color: Vec4) {
        let (ax, ay) = (a.x as f32 / SUBPIXEL_ONE as f32, a.y as f32 / SUBPIXEL_ONE as f32);
        let (bx, by) = (b.x as f32 / SUBPIXEL_ONE as f32, b.y as f32 / SUBPIXEL_ONE as f32);
        let steps = (bx - ax).abs().max((by - ay).abs()).ceil().max(1.0) as u32;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let (x, y) = (ax + (bx - ax) * t, ay + (by - ay) * t);
            if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
                continue;
            }
            let depth = a.depth + (b.depth - a.depth) * t;
            self.shade(x as u32, y as u32, depth, face, color);
        }
    }

    /// Runs the stencil test, depth test, stencil ops and color output for
    /// one fragment.
    fn shade(&mut self, x: u32, y: u32, depth: f32, face: Face, color: Vec4) {
        let idx = self.index(x, y);
        let state = self.state;
        let stencil = &state.stencil;
        let has_stencil = self.capabilities.stencil_bits > 0 && stencil.is_enabled();

        let face_state: &StencilFaceState = stencil.face(face);
        let stored = self.stencil[idx];

        if has_stencil {
            let reference = (stencil.reference & stencil.read_mask) as u8;
            let masked = (stored as u32 & stencil.read_mask) as u8;
            if !face_state.compare.passes(reference, masked) {
                self.apply_stencil(idx, face_state.fail_op);
                return;
            }
        }

        if !state.depth_compare.passes(depth, self.depth[idx]) {
            if has_stencil {
                self.apply_stencil(idx, face_state.depth_fail_op);
            }
            return;
        }

        if has_stencil {
            self.apply_stencil(idx, face_state.pass_op);
        }
        if state.depth_write {
            self.depth[idx] = depth;
        }
        self.write_color(idx, color);
    }

    fn apply_stencil(&mut self, idx: usize, op: StencilOperation) {
        let stencil = self.state.stencil;
        let current = self.stencil[idx];
        let value = op.apply(current, stencil.reference as u8);
        let mask = stencil.write_mask as u8;
        self.stencil[idx] = (current & !mask) | (value & mask);

        if mask != 0 {
            match op {
                StencilOperation::IncrementWrap | StencilOperation::IncrementClamp => self.stencil_net[idx] += 1,
                StencilOperation::DecrementWrap | StencilOperation::DecrementClamp => self.stencil_net[idx] -= 1,
                _ => {}
            }
        }
    }

    fn write_color(&mut self, idx: usize, src: Vec4) {
        let writes = self.state.color_writes;
        if writes.is_empty() {
            return;
        }
        let dst = self.color[idx];
        let blended = match self.state.blend {
            None => src,
            Some(blend) => {
                let mix = |component: BlendComponent, s: f32, d: f32| {
                    s * component.src_factor.weight(src.w) + d * component.dst_factor.weight(src.w)
                };
                Vec4::new(
                    mix(blend.color, src.x, dst.x),
                    mix(blend.color, src.y, dst.y),
                    mix(blend.color, src.z, dst.z),
                    mix(blend.alpha, src.w, dst.w),
                )
            }
        };
        let pick = |flag: ColorWrites, new: f32, old: f32| if writes.contains(flag) { new } else { old };
        self.color[idx] = Vec4::new(
            pick(ColorWrites::RED, blended.x, dst.x),
            pick(ColorWrites::GREEN, blended.y, dst.y),
            pick(ColorWrites::BLUE, blended.z, dst.z),
            pick(ColorWrites::ALPHA, blended.w, dst.w),
        );
    }
}

impl RenderContext for SoftwareDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn set_render_state(&mut self, state: &RenderState) {
        self.state = *state;
        self.state_changes += 1;
    }

    fn clear_stencil(&mut self, value: u8) {
        self.stencil.fill(value);
        self.stencil_net.fill(0);
    }

    fn draw_triangles(&mut self, positions: &[Vec4], color: Vec4) {
        self.draws += 1;
        for tri in positions.chunks_exact(3) {
            let clip = [
                self.view_proj * tri[0],
                self.view_proj * tri[1],
                self.view_proj * tri[2],
            ];
            self.draw_clip_triangle(clip, color);
        }
    }

    fn draw_fullscreen_quad(&mut self, color: Vec4) {
        self.draws += 1;
        let corners = [
            Vec4::new(-1.0, -1.0, 0.0, 1.0),
            Vec4::new(1.0, -1.0, 0.0, 1.0),
            Vec4::new(1.0, 1.0, 0.0, 1.0),
            Vec4::new(-1.0, 1.0, 0.0, 1.0),
        ];
        self.draw_clip_triangle([corners[0], corners[1], corners[2]], color);
        self.draw_clip_triangle([corners[0], corners[2], corners[3]], color);
    }
}

/// Twice the signed area of `(a, b, c)` in fixed point screen space.
fn orient(a: ScreenVertex, b: ScreenVertex, c: ScreenVertex) -> i64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Top and left edges of a triangle that is clockwise on screen (y down).
fn is_top_left(a: ScreenVertex, b: ScreenVertex) -> bool {
    let top = a.y == b.y && b.x > a.x;
    let left = b.y < a.y;
    top || left
}

/// Clips a triangle against `z >= 0`, `w >= MIN_W` and a guard band of
/// [`GUARD_BAND`] times the viewport, which keeps fixed point coordinates
/// small.
///
/// Intersections are always interpolated from the inside vertex to the
/// outside one, so an edge shared by two triangles is clipped to the same
/// point in both.
fn clip_polygon(triangle: &[Vec4; 3]) -> Vec<Vec4> {
    let planes: [fn(Vec4) -> f32; 6] = [
        |v| v.z,
        |v| v.w - MIN_W,
        |v| GUARD_BAND * v.w - v.x,
        |v| GUARD_BAND * v.w + v.x,
        |v| GUARD_BAND * v.w - v.y,
        |v| GUARD_BAND * v.w + v.y,
    ];

    let mut polygon = triangle.to_vec();
    for plane in planes {
        if polygon.is_empty() {
            break;
        }
        let mut clipped = Vec::with_capacity(polygon.len() + 1);
        for i in 0..polygon.len() {
            let current = polygon[i];
            let next = polygon[(i + 1) % polygon.len()];
            let (dc, dn) = (plane(current), plane(next));
            if dc >= 0.0 {
                clipped.push(current);
            }
            if (dc >= 0.0) != (dn >= 0.0) {
                let (inside, outside, di, dout) = if dc >= 0.0 {
                    (current, next, dc, dn)
                } else {
                    (next, current, dn, dc)
                };
                clipped.push(inside + (outside - inside) * (di / (di - dout)));
            }
        }
        polygon = clipped;
    }
    polygon
}
