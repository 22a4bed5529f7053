// crates/core/src/error.rs
use thiserror::Error;

/// Errors raised while validating user-supplied input, before anything is
/// written to the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("Invalid start time '{value}': expected HH:MM")]
    InvalidTime { value: String },

    #[error("Invalid duration '{value}': expected a whole number of minutes between 0 and {max}")]
    InvalidDuration { value: String, max: u32 },

    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Username must be between {min} and {max} characters")]
    UsernameLength { min: usize, max: usize },

    #[error("Invalid email address: {value}")]
    InvalidEmail { value: String },

    #[error("Password must be at least {min} characters and contain a letter and a digit")]
    WeakPassword { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,
}

impl ValidationError {
    pub fn invalid_duration(value: impl Into<String>, max: u32) -> Self {
        Self::InvalidDuration {
            value: value.into(),
            max,
        }
    }
}
