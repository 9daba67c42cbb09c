use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocflowError {
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("config error: {message}")]
    Config { message: String },
}

impl DocflowError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for failures caused by the payload itself; retrying cannot help.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

pub type DocflowResult<T> = Result<T, DocflowError>;

impl From<sea_orm::DbErr> for DocflowError {
    fn from(value: sea_orm::DbErr) -> Self {
        DocflowError::storage(value.to_string())
    }
}
