//! Error types for rtform-core

use thiserror::Error;

use crate::field::FieldId;

/// Errors surfaced by the form engine.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Unknown field: {0}")]
    UnknownField(FieldId),

    #[error("Field already registered: {0}")]
    DuplicateField(FieldId),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Patch rejected: {0}")]
    PatchRejected(String),

    #[error("Transport unavailable: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for FormError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            FormError::MalformedDocument(e.to_string())
        } else {
            FormError::Serialization(e.to_string())
        }
    }
}

/// Result type for form operations
pub type FormResult<T> = Result<T, FormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_error_display() {
        let err = FormError::UnknownField(FieldId::new("rtform-x"));
        assert!(err.to_string().contains("Unknown field"));
        assert!(err.to_string().contains("rtform-x"));

        let err = FormError::NotAnObject;
        assert_eq!(err.to_string(), "Document is not a JSON object");
    }

    #[test]
    fn test_json_syntax_maps_to_malformed() {
        let err: FormError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, FormError::MalformedDocument(_)));
    }
}
