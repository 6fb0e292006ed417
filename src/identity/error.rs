use thiserror::Error;

/// Failures raised while selecting an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickerError {
    /// Expected session state is missing: the transaction is broken or expired.
    #[error("flow integrity violation: {0}")]
    FlowIntegrity(String),

    /// A submitted request field is missing or does not resolve.
    #[error("invalid input for '{field}': {message}")]
    Validation { field: String, message: String },

    /// A value read from session or attributes has the wrong structure.
    #[error("unexpected shape: {0}")]
    Shape(String),
}

impl PickerError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PickerError::Validation { field: field.into(), message: message.into() }
    }
}

pub type PickerResult<T> = Result<T, PickerError>;
