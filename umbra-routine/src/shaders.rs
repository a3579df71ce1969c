//! Holds the sources of all shaders.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/shaders"]
pub struct UmbraShaderSources;

/// WGSL source of an embedded shader.
pub fn shader_source(name: &str) -> Option<String> {
    let file = UmbraShaderSources::get(name)?;
    String::from_utf8(file.data.into_owned()).ok()
}
