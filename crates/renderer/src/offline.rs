//! GPU-free compiler backed by naga's GLSL front end and validator.
//!
//! It parses exactly what the wgpu device would parse, so `toysaver fetch` can
//! reject broken shaders before they are cached and tests can run headless.

use std::collections::BTreeSet;

use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};

use crate::compile::{Diagnostic, ShaderCompiler, ShaderStage};

/// A parsed and validated module for one stage.
#[derive(Debug)]
pub struct NagaShader {
    stage: ShaderStage,
    module: naga::Module,
    _info: ModuleInfo,
}

impl NagaShader {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
}

/// Both stages of a linked program.
#[derive(Debug)]
pub struct NagaProgram {
    pub vertex_outputs: BTreeSet<u32>,
    pub fragment_inputs: BTreeSet<u32>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NagaCompiler;

impl NagaCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl ShaderCompiler for NagaCompiler {
    type Shader = NagaShader;
    type Program = NagaProgram;

    fn compile(&self, stage: ShaderStage, source: &str) -> Result<NagaShader, Diagnostic> {
        let mut frontend = glsl::Frontend::default();
        let options = glsl::Options::from(stage.to_naga());
        let module = frontend
            .parse(&options, source)
            .map_err(|errors| Diagnostic::compile(errors.emit_to_string(source)))?;
        let info = Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|error| Diagnostic::compile(error.emit_to_string(source)))?;
        Ok(NagaShader {
            stage,
            module,
            _info: info,
        })
    }

    fn link(&self, vertex: &NagaShader, fragment: &NagaShader) -> Result<NagaProgram, Diagnostic> {
        if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
            return Err(Diagnostic::link(format!(
                "expected a vertex and a fragment shader, got {:?} and {:?}",
                vertex.stage, fragment.stage
            )));
        }
        let vertex_entry = entry_point(&vertex.module, naga::ShaderStage::Vertex)?;
        let fragment_entry = entry_point(&fragment.module, naga::ShaderStage::Fragment)?;

        let mut vertex_outputs = BTreeSet::new();
        if let Some(result) = &vertex_entry.function.result {
            collect_locations(
                &vertex.module,
                result.ty,
                result.binding.as_ref(),
                &mut vertex_outputs,
            );
        }
        let mut fragment_inputs = BTreeSet::new();
        for argument in &fragment_entry.function.arguments {
            collect_locations(
                &fragment.module,
                argument.ty,
                argument.binding.as_ref(),
                &mut fragment_inputs,
            );
        }

        if let Some(missing) = fragment_inputs.difference(&vertex_outputs).next() {
            return Err(Diagnostic::link(format!(
                "fragment input at location {missing} is not written by the vertex shader"
            )));
        }
        Ok(NagaProgram {
            vertex_outputs,
            fragment_inputs,
        })
    }
}

fn entry_point(
    module: &naga::Module,
    stage: naga::ShaderStage,
) -> Result<&naga::EntryPoint, Diagnostic> {
    module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage && entry.name == "main")
        .ok_or_else(|| Diagnostic::link(format!("no {stage:?} entry point named 'main'")))
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    locations: &mut BTreeSet<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            locations.insert(*location);
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), locations);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Prelude;
    use crate::resources;

    fn fragment(body: &str) -> Result<NagaShader, Diagnostic> {
        NagaCompiler.compile(ShaderStage::Fragment, &Prelude::default().wrap(body))
    }

    #[test]
    fn prelude_compiles_and_links_with_bundled_vertex_shader() {
        let vertex = NagaCompiler
            .compile(ShaderStage::Vertex, resources::vertex_shader())
            .unwrap();
        let fragment = fragment(
            "void mainImage(out vec4 fragColor, in vec2 fragCoord) {\n\
             vec2 uv = fragCoord / iResolution.xy;\n\
             fragColor = vec4(uv, 0.5 + 0.5 * sin(iTime + iFrame / iFrameRate), 1.0);\n\
             }",
        )
        .unwrap();
        let program = NagaCompiler.link(&vertex, &fragment).unwrap();
        assert!(program.fragment_inputs.is_empty());
    }

    #[test]
    fn syntax_errors_become_compile_diagnostics() {
        let err = fragment("void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0) }").unwrap_err();
        assert_eq!(err.kind, crate::compile::DiagnosticKind::Compile);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn redeclared_uniforms_still_compile() {
        fragment(
            "uniform float iTime;\n\
             void mainImage(out vec4 c, in vec2 f) { c = vec4(fract(iTime)); }",
        )
        .unwrap();
    }

    #[test]
    fn placeholder_compiles() {
        fragment("").unwrap();
    }

    #[test]
    fn link_rejects_swapped_stages() {
        let vertex = NagaCompiler
            .compile(ShaderStage::Vertex, resources::vertex_shader())
            .unwrap();
        let fragment = fragment("").unwrap();
        let err = NagaCompiler.link(&fragment, &vertex).unwrap_err();
        assert_eq!(err.kind, crate::compile::DiagnosticKind::Link);
    }
}
