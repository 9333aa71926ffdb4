mod document;
mod remote;
mod resolver;

pub use document::ShaderDocument;
pub use remote::{parse_shader_response, ShadertoyClient, ShadertoyConfig};
pub use resolver::{fetch_all, spawn_fetch, BatchError, DocumentSource, FetchError};

/// Opaque token naming one shader on the remote repository.
pub type ShaderId = String;

const VIEW_URL_MARKER: &str = "shadertoy.com/view/";

/// Normalises a single user-supplied identifier.
///
/// Accepts bare ids (`3dXyWj`), `shadertoy://3dXyWj`, and view URLs such as
/// `https://www.shadertoy.com/view/3dXyWj`. Returns `None` for blank input.
pub fn normalize_identifier(input: &str) -> Option<ShaderId> {
    let trimmed = input.trim();
    let id = if let Some(id) = trimmed.strip_prefix("shadertoy://") {
        id
    } else if let Some(pos) = trimmed.find(VIEW_URL_MARKER) {
        let rest = &trimmed[pos + VIEW_URL_MARKER.len()..];
        rest.split(['/', '?', '#']).next().unwrap_or(rest)
    } else {
        trimmed
    };
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Splits a comma separated identifier list, preserving order and duplicates.
pub fn parse_identifiers(input: &str) -> Vec<ShaderId> {
    input.split(',').filter_map(normalize_identifier).collect()
}

/// Inverse of [`parse_identifiers`].
pub fn join_identifiers(ids: &[ShaderId]) -> String {
    ids.join(",")
}
