use serde::{Deserialize, Serialize};

use crate::ShaderId;

/// One fetched shader: either usable fragment source or the error the
/// repository reported for it. Only one of the two is ever meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderDocument {
    pub id: ShaderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ShaderDocument {
    pub fn from_source(id: impl Into<ShaderId>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            code: code.into(),
            error: None,
        }
    }

    pub fn remote_error(id: impl Into<ShaderId>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            code: String::new(),
            error: Some(message.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.trim().is_empty()).then_some(name);
        self
    }

    /// Fragment body as published (a `mainImage` definition plus helpers).
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Label used in logs: the shader name when known, otherwise its id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_documents_carry_no_code() {
        let doc = ShaderDocument::remote_error("bad", "not found");
        assert_eq!(doc.error(), Some("not found"));
        assert!(doc.code().is_empty());
    }

    #[test]
    fn blank_names_are_dropped() {
        let doc = ShaderDocument::from_source("111", "void mainImage() {}").with_name("  ");
        assert_eq!(doc.label(), "111");
        let named = doc.with_name("Seascape");
        assert_eq!(named.label(), "Seascape");
    }

    #[test]
    fn serialized_cache_omits_absent_fields() {
        let doc = ShaderDocument::from_source("111", "code");
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"id":"111","code":"code"}"#);
        let back: ShaderDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
