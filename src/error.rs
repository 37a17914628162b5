use thiserror::Error;

pub type Result<T> = std::result::Result<T, HttpanicError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpanicError {
    #[error("Invalid HTTP status code: {code}")]
    InvalidStatusCode { code: u16 },
}

impl HttpanicError {
    /// Create an invalid status code error
    pub fn invalid_status(code: u16) -> Self {
        Self::InvalidStatusCode { code }
    }
}
