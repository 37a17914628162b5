use crate::error::{HttpanicError, Result};
use crate::exception::ControlledError;
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

/// The built-in controlled error: a status code and an optional message
///
/// Status codes are not validated on construction. Use [`HttpPanic::try_new`]
/// when the code comes from somewhere untrusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpPanic {
    code: u16,
    message: Option<String>,
}

impl HttpPanic {
    /// Create a controlled error. An empty message counts as no message.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code,
            message: (!message.is_empty()).then_some(message),
        }
    }

    /// Create a controlled error that answers with the status reason phrase
    pub fn status(code: u16) -> Self {
        Self {
            code,
            message: None,
        }
    }

    /// Like [`HttpPanic::new`], but rejects codes that are not three digits
    pub fn try_new(code: u16, message: impl Into<String>) -> Result<Self> {
        if !(100..=999).contains(&code) {
            return Err(HttpanicError::invalid_status(code));
        }
        Ok(Self::new(code, message))
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl ControlledError for HttpPanic {
    fn describe(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => reason_phrase(self.code),
        }
    }

    fn status_code(&self) -> u16 {
        self.code
    }
}

impl fmt::Display for HttpPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl std::error::Error for HttpPanic {}

impl IntoResponse for HttpPanic {
    fn into_response(self) -> Response {
        controlled_response(&self)
    }
}

/// Canonical reason phrase for a status code
///
/// Codes without a registered phrase render as `Status <code>`.
pub fn reason_phrase(code: u16) -> String {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .map_or_else(|| format!("Status {code}"), str::to_owned)
}

/// Plain text response carrying a controlled error's status and message
pub fn controlled_response(error: &dyn ControlledError) -> Response {
    let code = error.status_code();
    let body = error.describe();

    let status = StatusCode::from_u16(code).unwrap_or_else(|_| {
        tracing::warn!("Controlled error carries unusable status code {code}, answering 500");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    plain_text(status, body)
}

pub(crate) fn plain_text(status: StatusCode, body: String) -> Response {
    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}
