//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Invalid scene options: {0}")]
    InvalidOptions(String),

    #[error("Invalid slide URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request contains no slide URLs")]
    EmptyRequest,

    #[error("Request has {count} slides, limit is {limit}")]
    TooManySlides { count: usize, limit: usize },
}

impl ModelError {
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }
}
