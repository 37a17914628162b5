//! # httpanic
//!
//! A panic boundary for axum and tower services.
//!
//! Handlers abort a request on purpose with the raising helpers; the boundary
//! answers with the status and message they chose. Any other panic becomes an
//! incident: a random correlation id, a stack trace from the panic site and a
//! report to a pluggable reporter, while the client gets a plain 500 carrying
//! the same id.
//!
//! ## Features
//!
//! - **Raising helpers**: [`raise`], [`ensure`], [`raise_if_error`] and [`must`]
//!   abort from anywhere inside a handler
//! - **Open classification**: any type implementing [`ControlledError`] is
//!   answered with its own status and message
//! - **Correlated incidents**: `Internal Server Error\n<16 hex digits>` to the
//!   client, the same id on every log line
//! - **Double-fault safe**: a panicking reporter is logged and contained
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, extract::Path, routing::get};
//! use httpanic::{PanicBoundaryLayer, ensure, raise};
//!
//! async fn user(Path(id): Path<u32>) -> String {
//!     ensure(id != 0, 400, "id must be positive");
//!     if id > 100 {
//!         raise(404, "");
//!     }
//!     format!("user {id}")
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route("/users/{id}", get(user))
//!         .layer(PanicBoundaryLayer::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod error;
pub mod exception;
pub mod incident;
pub mod interceptor;

pub use error::{HttpanicError, Result};
pub use exception::{
    ControlledError, HttpPanic, ResultExt, ensure, must, raise, raise_if_error, raise_with,
};
pub use incident::{Incident, IncidentId, IncidentRecord, RequestHead, StackFrame};
pub use interceptor::{IncidentReporter, LogReporter, PanicBoundary, PanicBoundaryLayer, layer};

/// Prelude module for convenient imports
///
/// ```
/// use httpanic::prelude::*;
/// ```
pub mod prelude {
    pub use crate::exception::{
        ControlledError, HttpPanic, ResultExt, ensure, must, raise, raise_if_error, raise_with,
    };
    pub use crate::incident::{Incident, IncidentId};
    pub use crate::interceptor::{IncidentReporter, LogReporter, PanicBoundaryLayer};
}
