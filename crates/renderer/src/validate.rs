use shadertoy::ShaderDocument;

use crate::compile::{Diagnostic, Prelude, ShaderCompiler, ShaderStage};

/// Classification of one fetched document.
#[derive(Debug)]
pub enum ValidationOutcome<S> {
    Valid(S),
    Rejected(Diagnostic),
}

impl<S> ValidationOutcome<S> {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            ValidationOutcome::Valid(_) => None,
            ValidationOutcome::Rejected(diagnostic) => Some(diagnostic),
        }
    }
}

/// Compiles document bodies against the prelude.
pub struct ShaderValidator<'a, C> {
    compiler: &'a C,
    prelude: &'a Prelude,
}

impl<'a, C: ShaderCompiler> ShaderValidator<'a, C> {
    pub fn new(compiler: &'a C, prelude: &'a Prelude) -> Self {
        Self { compiler, prelude }
    }

    pub fn validate(&self, document: &ShaderDocument) -> ValidationOutcome<C::Shader> {
        if let Some(message) = document.error() {
            return ValidationOutcome::Rejected(Diagnostic::remote(message));
        }
        let source = self.prelude.wrap(document.code());
        match self.compiler.compile(ShaderStage::Fragment, &source) {
            Ok(shader) => ValidationOutcome::Valid(shader),
            Err(diagnostic) => ValidationOutcome::Rejected(diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::DiagnosticKind;
    use crate::offline::NagaCompiler;

    #[test]
    fn valid_document_compiles() {
        let prelude = Prelude::default();
        let validator = ShaderValidator::new(&NagaCompiler, &prelude);
        let document = ShaderDocument::from_source(
            "111",
            "void mainImage(out vec4 c, in vec2 f) { c = vec4(f / iResolution.xy, 0.0, 1.0); }",
        );
        assert!(validator.validate(&document).is_valid());
    }

    #[test]
    fn validation_is_repeatable() {
        let prelude = Prelude::default();
        let validator = ShaderValidator::new(&NagaCompiler, &prelude);
        let broken = ShaderDocument::from_source("bad", "void mainImage(out vec4 c) { c = nope; }");
        let first = validator.validate(&broken);
        let second = validator.validate(&broken);
        assert_eq!(first.diagnostic(), second.diagnostic());
        assert_eq!(first.diagnostic().unwrap().kind, DiagnosticKind::Compile);
    }

    #[test]
    fn remote_errors_are_rejected_without_compiling() {
        let prelude = Prelude::default();
        let validator = ShaderValidator::new(&NagaCompiler, &prelude);
        let outcome = validator.validate(&ShaderDocument::remote_error("x", "not found"));
        let diagnostic = outcome.diagnostic().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::Remote);
        assert_eq!(diagnostic.message, "not found");
    }
}
