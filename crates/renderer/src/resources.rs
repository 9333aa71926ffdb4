//! Read-only assets compiled into the binary, looked up by file name.

use shadertoy::{parse_shader_response, FetchError, ShaderDocument};

pub const VERTEX_SHADER: &str = "vertexshader.glsl";
pub const FALLBACK_SHADER: &str = "shader.json";

const FALLBACK_ID: &str = "bundled";

const ASSETS: &[(&str, &str)] = &[
    (VERTEX_SHADER, include_str!("../assets/vertexshader.glsl")),
    (FALLBACK_SHADER, include_str!("../assets/shader.json")),
];

pub fn load(name: &str) -> Option<&'static str> {
    ASSETS
        .iter()
        .find(|(asset, _)| *asset == name)
        .map(|(_, contents)| *contents)
}

pub fn vertex_shader() -> &'static str {
    load(VERTEX_SHADER).unwrap_or_default()
}

/// The bundled shader used when nothing else validates. It is stored in the
/// same JSON shape the repository serves.
pub fn fallback_document() -> Result<ShaderDocument, FetchError> {
    parse_shader_response(FALLBACK_ID, load(FALLBACK_SHADER).unwrap_or_default())
}
