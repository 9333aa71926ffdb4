//! The ordered list of drawable programs.
//!
//! Building validates every document, links the survivors against the shared
//! vertex shader and falls back to the bundled shader when nothing survives,
//! so a finished [`ProgramSet`] is never empty. Rejections are reported to the
//! caller rather than treated as failures.

use shadertoy::{ShaderDocument, ShaderId};
use tracing::{debug, info, warn};

use crate::compile::{Diagnostic, Prelude, ShaderCompiler, ShaderStage};
use crate::validate::{ShaderValidator, ValidationOutcome};

/// Only the bundled assets failing stops a build.
#[derive(Debug, thiserror::Error)]
pub enum ProgramSetError {
    #[error("bundled vertex shader is unusable: {0}")]
    VertexShader(Diagnostic),
    #[error("bundled fallback shader is unusable: {0}")]
    Fallback(Diagnostic),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub id: ShaderId,
    pub diagnostic: Diagnostic,
}

pub struct LoadedProgram<P> {
    pub id: ShaderId,
    pub label: String,
    pub program: P,
}

pub struct ProgramSet<P> {
    programs: Vec<LoadedProgram<P>>,
    rejections: Vec<Rejection>,
    fallback: bool,
}

impl<P> ProgramSet<P> {
    pub fn build<C>(
        compiler: &C,
        prelude: &Prelude,
        documents: &[ShaderDocument],
        vertex_source: &str,
        fallback: &ShaderDocument,
    ) -> Result<Self, ProgramSetError>
    where
        C: ShaderCompiler<Program = P>,
    {
        let vertex = compiler
            .compile(ShaderStage::Vertex, vertex_source)
            .map_err(ProgramSetError::VertexShader)?;
        let validator = ShaderValidator::new(compiler, prelude);

        let mut programs = Vec::with_capacity(documents.len());
        let mut rejections = Vec::new();
        for document in documents {
            match Self::load(compiler, &validator, &vertex, document) {
                Ok(program) => {
                    debug!(shader = %document.id, name = %document.label(), "program ready");
                    programs.push(program);
                }
                Err(diagnostic) => {
                    warn!(shader = %document.id, %diagnostic, "rejected shader");
                    rejections.push(Rejection {
                        id: document.id.clone(),
                        diagnostic,
                    });
                }
            }
        }

        let use_fallback = programs.is_empty();
        if use_fallback {
            warn!(
                rejected = rejections.len(),
                "no usable shaders; rendering the bundled fallback"
            );
            let program = Self::load(compiler, &validator, &vertex, fallback)
                .map_err(ProgramSetError::Fallback)?;
            programs.push(program);
        }

        info!(
            programs = programs.len(),
            rejected = rejections.len(),
            "program set built"
        );
        Ok(Self {
            programs,
            rejections,
            fallback: use_fallback,
        })
    }

    fn load<C>(
        compiler: &C,
        validator: &ShaderValidator<'_, C>,
        vertex: &C::Shader,
        document: &ShaderDocument,
    ) -> Result<LoadedProgram<P>, Diagnostic>
    where
        C: ShaderCompiler<Program = P>,
    {
        let fragment = match validator.validate(document) {
            ValidationOutcome::Valid(shader) => shader,
            ValidationOutcome::Rejected(diagnostic) => return Err(diagnostic),
        };
        let program = compiler.link(vertex, &fragment)?;
        Ok(LoadedProgram {
            id: document.id.clone(),
            label: document.label().to_string(),
            program,
        })
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Always false for a built set.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LoadedProgram<P>> {
        self.programs.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedProgram<P>> {
        self.programs.iter()
    }

    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::compile::DiagnosticKind;
    use crate::offline::NagaCompiler;
    use crate::resources;

    /// Accepts any source unless it contains a marker word.
    #[derive(Default)]
    struct FakeCompiler {
        compiled: RefCell<usize>,
    }

    impl ShaderCompiler for FakeCompiler {
        type Shader = String;
        type Program = String;

        fn compile(&self, _stage: ShaderStage, source: &str) -> Result<String, Diagnostic> {
            *self.compiled.borrow_mut() += 1;
            if source.contains("BROKEN") {
                return Err(Diagnostic::compile("ERROR: 0:1: syntax error"));
            }
            Ok(source.to_string())
        }

        fn link(&self, vertex: &String, fragment: &String) -> Result<String, Diagnostic> {
            if fragment.contains("UNLINKABLE") {
                return Err(Diagnostic::link("varying mismatch"));
            }
            Ok(format!("{}+{}", vertex.len(), fragment.len()))
        }
    }

    const VERTEX: &str = "vertex";

    fn fallback() -> ShaderDocument {
        ShaderDocument::from_source("bundled", "void mainImage() { fallback(); }")
    }

    fn docs(entries: &[(&str, &str)]) -> Vec<ShaderDocument> {
        entries
            .iter()
            .map(|(id, code)| ShaderDocument::from_source(*id, *code))
            .collect()
    }

    fn ids<P>(set: &ProgramSet<P>) -> Vec<&str> {
        set.iter().map(|program| program.id.as_str()).collect()
    }

    #[test]
    fn keeps_one_program_per_document_in_order() {
        let compiler = FakeCompiler::default();
        let set = ProgramSet::build(
            &compiler,
            &Prelude::default(),
            &docs(&[("111", "a"), ("abc", "b")]),
            VERTEX,
            &fallback(),
        )
        .unwrap();
        assert_eq!(ids(&set), ["111", "abc"]);
        assert!(!set.is_fallback());
        assert!(set.rejections().is_empty());
    }

    #[test]
    fn drops_rejected_documents_and_reports_them() {
        let compiler = FakeCompiler::default();
        let mut documents = docs(&[("a", "ok"), ("b", "BROKEN"), ("c", "UNLINKABLE"), ("d", "ok")]);
        documents.push(ShaderDocument::remote_error("e", "not found"));
        let set = ProgramSet::build(
            &compiler,
            &Prelude::default(),
            &documents,
            VERTEX,
            &fallback(),
        )
        .unwrap();
        assert_eq!(ids(&set), ["a", "d"]);
        let kinds: Vec<_> = set
            .rejections()
            .iter()
            .map(|r| (r.id.as_str(), r.diagnostic.kind))
            .collect();
        assert_eq!(
            kinds,
            [
                ("b", DiagnosticKind::Compile),
                ("c", DiagnosticKind::Link),
                ("e", DiagnosticKind::Remote)
            ]
        );
    }

    #[test]
    fn falls_back_when_nothing_survives() {
        let compiler = FakeCompiler::default();
        let set = ProgramSet::build(
            &compiler,
            &Prelude::default(),
            &docs(&[("x", "BROKEN")]),
            VERTEX,
            &fallback(),
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.is_fallback());
        assert_eq!(ids(&set), ["bundled"]);
        assert_eq!(set.rejections().len(), 1);
    }

    #[test]
    fn empty_input_builds_only_the_fallback() {
        let compiler = FakeCompiler::default();
        let set =
            ProgramSet::build(&compiler, &Prelude::default(), &[], VERTEX, &fallback()).unwrap();
        assert_eq!(ids(&set), ["bundled"]);
        // vertex + fallback fragment
        assert_eq!(*compiler.compiled.borrow(), 2);
    }

    #[test]
    fn broken_fallback_is_fatal() {
        let compiler = FakeCompiler::default();
        let broken = ShaderDocument::from_source("bundled", "BROKEN");
        let err = ProgramSet::build(&compiler, &Prelude::default(), &[], VERTEX, &broken)
            .err()
            .unwrap();
        assert!(matches!(err, ProgramSetError::Fallback(_)));
    }

    #[test]
    fn bundled_assets_build_with_naga() {
        let fallback = resources::fallback_document().unwrap();
        let set = ProgramSet::build(
            &NagaCompiler,
            &Prelude::default(),
            &docs(&[("empty", "")]),
            resources::vertex_shader(),
            &fallback,
        )
        .unwrap();
        assert_eq!(ids(&set), ["empty"]);

        let set = ProgramSet::build(
            &NagaCompiler,
            &Prelude::default(),
            &docs(&[("bad", "void mainImage(")]),
            resources::vertex_shader(),
            &fallback,
        )
        .unwrap();
        assert!(set.is_fallback());
        assert_eq!(set.get(0).unwrap().label, "Bundled Plasma");
    }
}
