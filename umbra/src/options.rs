use glam::Vec4;
use serde::{Deserialize, Serialize};
use umbra_types::{Extrusion, StencilMethod};

use crate::DEFAULT_VERTEX_LIMIT;

/// How shadowed pixels end up darker than lit ones.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompositeMode {
    /// Blend [`ShadowOptions::shadow_color`] over shadowed pixels with a
    /// full-screen quad.
    #[default]
    Overlay,
    /// Draw the scene's ambient pass only where the stencil marks shadow.
    /// The first ambient pass then only lays down depth.
    AmbientScene,
}

/// Options for [`StencilShadowRenderer`](crate::StencilShadowRenderer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowOptions {
    /// Stencil method to use. `None` picks the fastest method the device
    /// supports.
    pub method: Option<StencilMethod>,
    pub extrusion: Extrusion,
    /// Cap volumes even when the stencil method doesn't need it. Volumes
    /// counted with [`StencilMethod::ZFail`] are always capped.
    pub caps: bool,
    pub composite: CompositeMode,
    /// Straight alpha color. Alpha is the strength of the shadow.
    pub shadow_color: Vec4,
    /// Draw the volumes as wireframe after the frame.
    pub debug_volume: bool,
    /// Volumes with more vertices than this are refused.
    pub max_volume_vertices: usize,
}

impl Default for ShadowOptions {
    fn default() -> Self {
        Self {
            method: None,
            extrusion: Extrusion::default(),
            caps: false,
            composite: CompositeMode::default(),
            shadow_color: Vec4::new(0.0, 0.0, 0.0, 127.0 / 255.0),
            debug_volume: false,
            max_volume_vertices: DEFAULT_VERTEX_LIMIT,
        }
    }
}

impl ShadowOptions {
    /// Whether volumes counted with `method` get near and far caps.
    pub fn caps_for(&self, method: StencilMethod) -> bool {
        self.caps || method.requires_caps()
    }
}

#[cfg(test)]
mod tests {
    use umbra_types::{Extrusion, StencilMethod};

    use super::{CompositeMode, ShadowOptions};

    #[test]
    fn missing_fields_use_defaults() {
        let options: ShadowOptions =
            serde_json::from_str(r#"{ "method": "ZFail", "extrusion": "Infinite", "debug_volume": true }"#).unwrap();

        assert_eq!(options.method, Some(StencilMethod::ZFail));
        assert_eq!(options.extrusion, Extrusion::Infinite);
        assert!(options.debug_volume);
        assert_eq!(options.composite, CompositeMode::Overlay);
        assert_eq!(options.max_volume_vertices, ShadowOptions::default().max_volume_vertices);
    }

    #[test]
    fn z_fail_is_always_capped() {
        let options = ShadowOptions::default();
        assert!(options.caps_for(StencilMethod::ZFail));
        assert!(!options.caps_for(StencilMethod::TwoPassZPass));

        let forced = ShadowOptions {
            caps: true,
            ..ShadowOptions::default()
        };
        assert!(forced.caps_for(StencilMethod::SinglePassTwoSidedStencil));
    }
}
