//! Device independent recording of a frame's commands.
//!
//! [`RenderContext`](umbra::RenderContext) is immediate mode, wgpu is not:
//! pipelines must exist before a render pass borrows them and stencil can only
//! be cleared when a pass begins. Commands are therefore recorded first and
//! turned into passes when the frame is finished.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use umbra::types::RenderState;

/// Vertex layout shared by both shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: Vec4,
    pub color: Vec4,
}

/// Which shader a draw goes through.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DrawKind {
    /// Positions are transformed by the frame's view projection matrix.
    World,
    /// Positions are already in clip space.
    Screen,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub kind: DrawKind,
    pub state: RenderState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub key: PipelineKey,
    pub stencil_reference: u32,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

/// Draws sharing one render pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassRecording {
    /// Stencil value the pass starts by clearing to. `None` keeps the
    /// previous contents.
    pub clear_stencil: Option<u8>,
    pub draws: Vec<Draw>,
}

/// Full-screen triangle in clip space.
const FULLSCREEN_TRIANGLE: [Vec4; 3] = [
    Vec4::new(-1.0, -1.0, 0.0, 1.0),
    Vec4::new(3.0, -1.0, 0.0, 1.0),
    Vec4::new(-1.0, 3.0, 0.0, 1.0),
];

#[derive(Debug, Clone, Default)]
pub struct FrameRecording {
    pub vertices: Vec<ColorVertex>,
    pub passes: Vec<PassRecording>,
}

impl FrameRecording {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            passes: vec![PassRecording::default()],
        }
    }

    pub fn clear_stencil(&mut self, value: u8) {
        match self.passes.last_mut() {
            // Nothing drawn yet, the clear can happen as this pass begins.
            Some(pass) if pass.draws.is_empty() => pass.clear_stencil = Some(value),
            _ => self.passes.push(PassRecording {
                clear_stencil: Some(value),
                draws: Vec::new(),
            }),
        }
    }

    pub fn draw(&mut self, kind: DrawKind, state: &RenderState, positions: &[Vec4], color: Vec4) {
        if positions.is_empty() {
            return;
        }

        let first_vertex = self.vertices.len() as u32;
        self.vertices
            .extend(positions.iter().map(|&position| ColorVertex { position, color }));
        let vertex_count = positions.len() as u32;

        let key = PipelineKey { kind, state: *state };
        let stencil_reference = state.stencil.reference;

        let pass = self.current_pass();

        // Extend the previous draw when nothing but the vertices changed.
        if let Some(last) = pass.draws.last_mut() {
            if last.key == key && last.first_vertex + last.vertex_count == first_vertex {
                last.vertex_count += vertex_count;
                return;
            }
        }

        pass.draws.push(Draw {
            key,
            stencil_reference,
            first_vertex,
            vertex_count,
        });
    }

    fn current_pass(&mut self) -> &mut PassRecording {
        if self.passes.is_empty() {
            self.passes.push(PassRecording::default());
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    pub fn draw_fullscreen(&mut self, state: &RenderState, color: Vec4) {
        self.draw(DrawKind::Screen, state, &FULLSCREEN_TRIANGLE, color);
    }

    pub fn draw_count(&self) -> usize {
        self.passes.iter().map(|pass| pass.draws.len()).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PipelineKey> {
        self.passes.iter().flat_map(|pass| pass.draws.iter().map(|draw| &draw.key))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;
    use umbra::types::{PolygonMode, RenderState};

    use super::{DrawKind, FrameRecording};

    const TRIANGLE: [Vec4; 3] = [Vec4::W, Vec4::X, Vec4::Y];

    #[test]
    fn clear_before_draws_stays_in_pass() {
        let mut recording = FrameRecording::new();
        recording.clear_stencil(0);
        recording.draw(DrawKind::World, &RenderState::default(), &TRIANGLE, Vec4::ONE);

        assert_eq!(recording.passes.len(), 1);
        assert_eq!(recording.passes[0].clear_stencil, Some(0));
    }

    #[test]
    fn clear_after_draws_starts_pass() {
        let mut recording = FrameRecording::new();
        recording.draw(DrawKind::World, &RenderState::default(), &TRIANGLE, Vec4::ONE);
        recording.clear_stencil(0);
        recording.draw(DrawKind::World, &RenderState::default(), &TRIANGLE, Vec4::ONE);

        assert_eq!(recording.passes.len(), 2);
        assert_eq!(recording.passes[0].clear_stencil, None);
        assert_eq!(recording.passes[1].clear_stencil, Some(0));
        assert_eq!(recording.passes[1].draws[0].first_vertex, 3);
    }

    #[test]
    fn same_state_draws_merge() {
        let mut recording = FrameRecording::new();
        let wireframe = RenderState {
            polygon_mode: PolygonMode::Line,
            ..RenderState::default()
        };
        recording.draw(DrawKind::World, &RenderState::default(), &TRIANGLE, Vec4::ONE);
        recording.draw(DrawKind::World, &RenderState::default(), &TRIANGLE, Vec4::ZERO);
        recording.draw(DrawKind::World, &wireframe, &TRIANGLE, Vec4::ONE);
        recording.draw_fullscreen(&wireframe, Vec4::ONE);

        assert_eq!(recording.draw_count(), 3);
        assert_eq!(recording.passes[0].draws[0].vertex_count, 6);
        assert_eq!(recording.vertices.len(), 12);
        assert_eq!(recording.vertices[3].color, Vec4::ZERO);
    }

    #[test]
    fn empty_draws_are_dropped() {
        let mut recording = FrameRecording::new();
        recording.draw(DrawKind::World, &RenderState::default(), &[], Vec4::ONE);
        assert_eq!(recording.draw_count(), 0);
        assert!(recording.vertices.is_empty());
    }
}
