//! Incidents: unexpected defects surfaced while serving a request
//!
//! An [`Incident`] only lives for the duration of one report. Reporters that
//! need to keep it (queue it, forward it to a telemetry backend) take an owned
//! [`IncidentRecord`] with [`Incident::to_record`].

use axum::http::{HeaderMap, Method, Request, Uri, Version};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::any::Any;
use std::error::Error;
use std::fmt;

use crate::exception::HttpPanic;

/// Correlation identifier linking a 500 response to its log lines
///
/// Rendered as 16 lowercase, zero-padded hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IncidentId(u64);

impl IncidentId {
    /// Draw a new random id from the thread-local generator
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::LowerHex for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Serialize for IncidentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One application frame of a captured stack trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(function: impl Into<String>, file: Option<String>, line: Option<u32>) -> Self {
        Self {
            function: function.into(),
            file,
            line,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}()",
            self.file.as_deref().unwrap_or("??"),
            self.line.unwrap_or(0),
            self.function
        )
    }
}

/// The parts of a request that outlive handing the request to the handler
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }

    /// Method, uri and version only; `headers` is left empty
    pub fn request_line<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: HeaderMap::new(),
        }
    }
}

/// An unexpected defect, as handed to an
/// [`IncidentReporter`](crate::interceptor::IncidentReporter)
#[derive(Debug)]
pub struct Incident<'a> {
    id: IncidentId,
    cause: &'a (dyn Any + Send),
    stack_trace: &'a [StackFrame],
    request: &'a RequestHead,
    location: Option<&'a str>,
    occurred_at: DateTime<Utc>,
}

impl<'a> Incident<'a> {
    pub(crate) fn new(
        id: IncidentId,
        cause: &'a (dyn Any + Send),
        stack_trace: &'a [StackFrame],
        request: &'a RequestHead,
        location: Option<&'a str>,
    ) -> Self {
        Self {
            id,
            cause,
            stack_trace,
            request,
            location,
            occurred_at: Utc::now(),
        }
    }

    pub fn id(&self) -> IncidentId {
        self.id
    }

    /// The raw unwind payload
    pub fn cause(&self) -> &'a (dyn Any + Send) {
        self.cause
    }

    /// The payload rendered as text
    pub fn cause_message(&self) -> String {
        describe_payload(self.cause)
    }

    pub fn stack_trace(&self) -> &'a [StackFrame] {
        self.stack_trace
    }

    pub fn request(&self) -> &'a RequestHead {
        self.request
    }

    /// Source location of the panic, when the panic hook saw it
    pub fn location(&self) -> Option<&'a str> {
        self.location
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn to_record(&self) -> IncidentRecord {
        IncidentRecord {
            id: self.id,
            cause: self.cause_message(),
            location: self.location.map(str::to_owned),
            method: self.request.method.to_string(),
            uri: self.request.uri.to_string(),
            stack_trace: self.stack_trace.to_vec(),
            occurred_at: self.occurred_at,
        }
    }
}

/// Owned, serializable snapshot of an [`Incident`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    pub id: IncidentId,
    pub cause: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub method: String,
    pub uri: String,
    pub stack_trace: Vec<StackFrame>,
    pub occurred_at: DateTime<Utc>,
}

/// Render an unwind payload as text
pub fn describe_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return (*message).to_owned();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    if let Some(error) = payload.downcast_ref::<Box<dyn Error + Send + Sync>>() {
        return error.to_string();
    }
    if let Some(error) = payload.downcast_ref::<HttpPanic>() {
        return error.to_string();
    }
    "Box<dyn Any>".to_owned()
}
