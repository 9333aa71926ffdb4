use std::fmt;

/// Pipeline stage of one shader source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn to_naga(self) -> wgpu::naga::ShaderStage {
        match self {
            ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
            ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Compile,
    Link,
    Remote,
}

/// Human-readable reason a shader was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn compile(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Compile,
            message: message.into(),
        }
    }

    pub fn link(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Link,
            message: message.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Remote,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            DiagnosticKind::Compile => "compile error",
            DiagnosticKind::Link => "link error",
            DiagnosticKind::Remote => "repository error",
        };
        write!(f, "{prefix}: {}", self.message.trim_end())
    }
}

impl std::error::Error for Diagnostic {}

/// Compiles shader stages and links them into a drawable program.
///
/// Failures come back as [`Diagnostic`] values; a failed stage leaves nothing
/// behind.
pub trait ShaderCompiler {
    type Shader;
    type Program;

    fn compile(&self, stage: ShaderStage, source: &str) -> Result<Self::Shader, Diagnostic>;

    fn link(
        &self,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
    ) -> Result<Self::Program, Diagnostic>;
}

/// Fixed text placed around every fragment body: the uniform contract ahead of
/// it and the `main` entry point bridging to `mainImage` after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prelude {
    header: String,
    footer: String,
}

impl Default for Prelude {
    fn default() -> Self {
        Self::new(HEADER, FOOTER)
    }
}

impl Prelude {
    pub fn new(header: impl Into<String>, footer: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            footer: footer.into(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Produces a complete fragment shader from a Shadertoy `mainImage` body.
    ///
    /// Blank bodies are replaced by [`PLACEHOLDER_MAIN_IMAGE`].
    pub fn wrap(&self, body: &str) -> String {
        let body = if body.trim().is_empty() {
            tracing::debug!("empty shader body; using placeholder");
            PLACEHOLDER_MAIN_IMAGE.to_string()
        } else {
            sanitize_fragment(body)
        };
        format!(
            "{header}\n{body}\n{footer}",
            header = self.header,
            footer = self.footer
        )
    }
}

/// Renders opaque black; stands in for documents with no code.
pub const PLACEHOLDER_MAIN_IMAGE: &str =
    "void mainImage(out vec4 fragColor, in vec2 fragCoord) { fragColor = vec4(0.0, 0.0, 0.0, 1.0); }";

const FIXED_UNIFORMS: [&str; 7] = [
    "iResolution",
    "iTime",
    "iTimeDelta",
    "iFrame",
    "iFrameRate",
    "iMouse",
    "isHDRSupported",
];

/// Drops `#version` directives and user declarations of the injected uniforms.
pub fn sanitize_fragment(source: &str) -> String {
    let mut sanitized = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") {
            continue;
        }
        let redeclares_uniform = trimmed.starts_with("uniform ")
            && trimmed
                .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .any(|word| FIXED_UNIFORMS.contains(&word));
        if redeclares_uniform {
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }
    sanitized
}

/// Uniform block layout must match `ShaderUniforms` in `gpu/uniforms.rs`.
const HEADER: &str = r"#version 450
layout(location = 0) out vec4 toysaver_out_color;

layout(std140, set = 0, binding = 0) uniform ToysaverUniforms {
    vec3 _iResolution;
    float _iTime;
    float _iTimeDelta;
    float _iFrame;
    float _iFrameRate;
    int _isHDRSupported;
    vec2 _iMouse;
    vec2 _padding;
} toysaver_ubo;

#define iResolution toysaver_ubo._iResolution
#define iTime toysaver_ubo._iTime
#define iTimeDelta toysaver_ubo._iTimeDelta
#define iFrame toysaver_ubo._iFrame
#define iFrameRate toysaver_ubo._iFrameRate
#define isHDRSupported toysaver_ubo._isHDRSupported
#define iMouse toysaver_ubo._iMouse
";

// Shadertoy puts the origin at the bottom left.
const FOOTER: &str = r"void main() {
    vec4 color = vec4(1e20);
    mainImage(color, vec2(gl_FragCoord.x, iResolution.y - gl_FragCoord.y));
    toysaver_out_color = vec4(color.xyz, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_version_and_fixed_uniforms() {
        let source = r#"
            #version 300 es
            uniform float iTime;
            uniform vec3 iResolution;
            uniform float myOwnTime;
            void mainImage(out vec4 fragColor, in vec2 fragCoord) {
                fragColor = vec4(fragCoord, 0.0, 1.0);
            }
        "#;

        let sanitized = sanitize_fragment(source);
        assert!(!sanitized.contains("#version"));
        assert!(!sanitized.contains("uniform float iTime"));
        assert!(!sanitized.contains("uniform vec3 iResolution"));
        assert!(sanitized.contains("uniform float myOwnTime"));
        assert!(sanitized.contains("mainImage"));
    }

    #[test]
    fn wrap_places_body_between_header_and_footer() {
        let prelude = Prelude::default();
        let wrapped = prelude.wrap("void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0); }");
        let header_end = wrapped.find("#define iMouse").unwrap();
        let body = wrapped.find("void mainImage").unwrap();
        let entry = wrapped.find("void main()").unwrap();
        assert!(wrapped.starts_with("#version 450"));
        assert!(header_end < body && body < entry);
    }

    #[test]
    fn blank_body_uses_placeholder() {
        let wrapped = Prelude::default().wrap("  \n ");
        assert!(wrapped.contains(PLACEHOLDER_MAIN_IMAGE));
    }

    #[test]
    fn diagnostic_display_names_kind() {
        assert_eq!(
            Diagnostic::link("missing entry point\n").to_string(),
            "link error: missing entry point"
        );
    }
}
