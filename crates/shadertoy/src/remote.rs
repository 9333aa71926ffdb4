use anyhow::{bail, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::document::ShaderDocument;
use crate::resolver::{DocumentSource, FetchError};

const DEFAULT_API_BASE: &str = "https://www.shadertoy.com/api/v1/";

#[derive(Debug, Clone)]
pub struct ShadertoyConfig {
    pub api_key: String,
    pub api_base: Url,
}

impl ShadertoyConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("Shadertoy API key must not be empty");
        }
        Ok(Self {
            api_key: api_key.trim().to_string(),
            api_base: Url::parse(DEFAULT_API_BASE)?,
        })
    }

    /// Points the client at a different repository host (mirrors, local testing).
    pub fn with_api_base(mut self, base: &str) -> Result<Self> {
        let mut url = Url::parse(base)?;
        if url.cannot_be_a_base() {
            bail!("Shadertoy API base '{base}' cannot carry a path");
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.api_base = url;
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct ShadertoyClient {
    http: Client,
    config: ShadertoyConfig,
}

impl ShadertoyClient {
    pub fn new(config: ShadertoyConfig) -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self { http, config })
    }

    /// `GET <api_base>/shaders/{id}?key=<api_key>`
    pub fn shader_url(&self, shader_id: &str) -> Result<Url, FetchError> {
        let mut url = self.config.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FetchError::InvalidRequest("invalid Shadertoy API base url".into()))?;
            segments.pop_if_empty();
            segments.push("shaders");
            segments.push(shader_id);
        }
        url.query_pairs_mut()
            .append_pair("key", &self.config.api_key);
        Ok(url)
    }

    pub fn fetch_shader(&self, shader_id: &str) -> Result<ShaderDocument, FetchError> {
        if shader_id.trim().is_empty() {
            return Err(FetchError::InvalidRequest("shader id must not be empty".into()));
        }
        let url = self.shader_url(shader_id)?;
        debug!(shader = %shader_id, host = ?url.host_str(), "requesting Shadertoy shader");
        let response = self.http.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text()?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        parse_shader_response(shader_id, &body)
    }
}

impl DocumentSource for ShadertoyClient {
    fn fetch_document(&self, id: &str) -> Result<ShaderDocument, FetchError> {
        self.fetch_shader(id)
    }
}

#[derive(Debug, Deserialize)]
struct ShaderApiResponse {
    #[serde(rename = "Shader")]
    shader: ShaderPayload,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(alias = "Error")]
    error: String,
}

#[derive(Debug, Deserialize)]
struct ShaderPayload {
    #[serde(default)]
    info: Option<ShaderInfo>,
    #[serde(rename = "renderpass", default)]
    render_passes: Vec<RenderPass>,
}

#[derive(Debug, Deserialize)]
struct ShaderInfo {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RenderPass {
    #[serde(default)]
    code: String,
}

/// Decodes one repository response body.
///
/// Only the first render pass is kept. A body reporting `Error` becomes a
/// document carrying that message; anything else unrecognised is malformed.
pub fn parse_shader_response(shader_id: &str, body: &str) -> Result<ShaderDocument, FetchError> {
    // Try to decode the happy path first.
    if let Ok(payload) = serde_json::from_str::<ShaderApiResponse>(body) {
        let ShaderPayload {
            info,
            render_passes,
        } = payload.shader;
        let code = render_passes
            .into_iter()
            .next()
            .map(|pass| pass.code)
            .unwrap_or_default();
        let mut document = ShaderDocument::from_source(shader_id, code);
        if let Some(info) = info {
            document = document.with_name(info.name);
        }
        return Ok(document);
    }
    if let Ok(err) = serde_json::from_str::<ApiError>(body) {
        return Ok(ShaderDocument::remote_error(shader_id, err.error));
    }
    let snippet = body.chars().take(200).collect::<String>();
    Err(FetchError::Malformed(snippet))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ShadertoyClient {
        ShadertoyClient::new(ShadertoyConfig::new("k3y").unwrap()).unwrap()
    }

    #[test]
    fn builds_request_url_with_key() {
        let url = client().shader_url("3dXyWj").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.shadertoy.com/api/v1/shaders/3dXyWj?key=k3y"
        );
    }

    #[test]
    fn custom_base_without_trailing_slash() {
        let config = ShadertoyConfig::new("k")
            .unwrap()
            .with_api_base("http://localhost:8080/api/v1")
            .unwrap();
        let client = ShadertoyClient::new(config).unwrap();
        assert_eq!(
            client.shader_url("abc").unwrap().as_str(),
            "http://localhost:8080/api/v1/shaders/abc?key=k"
        );
    }

    #[test]
    fn rejects_blank_api_key() {
        assert!(ShadertoyConfig::new("   ").is_err());
    }

    #[test]
    fn parses_first_render_pass() {
        let body = r#"{
            "Shader": {
                "info": { "name": "Seascape" },
                "renderpass": [
                    { "code": "void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0); }" },
                    { "code": "ignored" }
                ]
            }
        }"#;
        let doc = parse_shader_response("Ms2SD1", body).unwrap();
        assert_eq!(doc.id, "Ms2SD1");
        assert_eq!(doc.label(), "Seascape");
        assert!(doc.code().contains("mainImage"));
        assert_eq!(doc.error(), None);
    }

    #[test]
    fn parses_remote_error() {
        let doc = parse_shader_response("bad", r#"{"Error": "Shader not found"}"#).unwrap();
        assert_eq!(doc.error(), Some("Shader not found"));
    }

    #[test]
    fn missing_render_pass_yields_empty_code() {
        let doc = parse_shader_response("x", r#"{"Shader": {"renderpass": []}}"#).unwrap();
        assert!(doc.code().is_empty());
        assert_eq!(doc.error(), None);
    }

    #[test]
    fn unrecognised_body_is_malformed() {
        let err = parse_shader_response("x", "<html>nope</html>").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(ref snippet) if snippet.contains("html")));
    }
}
