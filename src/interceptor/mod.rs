//! The interception boundary
//!
//! [`PanicBoundaryLayer`] wraps any `tower` service handling
//! `Request<Body>`. When the wrapped service unwinds, the payload is
//! classified:
//!
//! - a [`ControlledError`](crate::exception::ControlledError) is answered with
//!   its own status code and message;
//! - anything else becomes an [`Incident`]: it gets a correlation id and a
//!   stack trace, goes to the [`IncidentReporter`], and the client receives a
//!   500 carrying the id.
//!
//! Either way a response is produced and the panic never leaves the boundary.

use crate::exception::http::plain_text;
use crate::exception::{as_controlled, controlled_response, reason_phrase};
use crate::incident::{Incident, RequestHead};
use axum::{http::StatusCode, response::Response};

pub mod capture;
mod boundary;
mod logging;

pub use capture::{Capture, Caught};
pub use boundary::{PanicBoundary, PanicBoundaryLayer, layer};
pub use logging::{IncidentReporter, LogReporter};

/// Turn a caught unwind into the response sent to the client
pub(crate) fn respond(
    caught: Caught,
    head: &RequestHead,
    reporter: &dyn IncidentReporter,
) -> Response {
    let Caught { payload, capture } = caught;

    // A custom controlled error may itself panic while describing itself
    let controlled = as_controlled(payload.as_ref())
        .map(|error| capture::guarded(|| controlled_response(error)));

    match controlled {
        Some(Ok(response)) => response,
        Some(Err(secondary)) => {
            tracing::error!("Controlled error panicked while building its response");
            incident_response(secondary, head, reporter)
        }
        None => incident_response(Caught { payload, capture }, head, reporter),
    }
}

fn incident_response(
    caught: Caught,
    head: &RequestHead,
    reporter: &dyn IncidentReporter,
) -> Response {
    let capture = caught.capture.unwrap_or_else(Capture::now);

    let incident = Incident::new(
        capture.id,
        caught.payload.as_ref(),
        &capture.frames,
        head,
        capture.location.as_deref(),
    );
    logging::report_guarded(reporter, &incident);

    let body = format!(
        "{}\n{}",
        reason_phrase(StatusCode::INTERNAL_SERVER_ERROR.as_u16()),
        capture.id
    );
    plain_text(StatusCode::INTERNAL_SERVER_ERROR, body)
}
