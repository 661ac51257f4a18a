use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// A required free-text field was empty after trimming. The message is
    /// shown verbatim as the form field error.
    #[error("the {field} field must not be empty")]
    EmptyField { field: &'static str },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn empty_field(field: &'static str) -> Self {
        Self::EmptyField { field }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
