use crate::incident::RequestHead;
use crate::interceptor::capture::{self, Caught, Enter};
use crate::interceptor::{IncidentReporter, LogReporter, respond};
use axum::{body::Body, http::Request, response::Response};
use futures_util::FutureExt;
use futures_util::future::poll_fn;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer establishing one panic boundary per request
///
/// The boundary covers the inner service's `call` and every poll of the
/// future it returns. `poll_ready` is not covered: a panic there has no
/// request to answer and unwinds out of the layer.
///
/// The request line and headers are copied before the request is handed on,
/// so an incident can describe the request. Layers on hot paths that do not
/// need headers in their reports can skip that copy with
/// [`without_headers`](Self::without_headers).
#[derive(Clone)]
pub struct PanicBoundaryLayer {
    reporter: Arc<dyn IncidentReporter>,
    capture_headers: bool,
}

impl PanicBoundaryLayer {
    /// Boundary that reports incidents through [`LogReporter`]
    pub fn new() -> Self {
        Self::with_reporter(LogReporter)
    }

    /// Boundary that reports incidents through `reporter`
    pub fn with_reporter(reporter: impl IncidentReporter) -> Self {
        capture::install_hook();
        Self {
            reporter: Arc::new(reporter),
            capture_headers: true,
        }
    }

    /// Leave request headers out of incidents
    pub fn without_headers(mut self) -> Self {
        self.capture_headers = false;
        self
    }
}

impl Default for PanicBoundaryLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for PanicBoundaryLayer {
    type Service = PanicBoundary<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PanicBoundary {
            inner,
            reporter: Arc::clone(&self.reporter),
            capture_headers: self.capture_headers,
        }
    }
}

/// Shortcut for [`PanicBoundaryLayer::new`]
pub fn layer() -> PanicBoundaryLayer {
    PanicBoundaryLayer::new()
}

#[derive(Clone)]
pub struct PanicBoundary<S> {
    inner: S,
    reporter: Arc<dyn IncidentReporter>,
    capture_headers: bool,
}

impl<S> Service<Request<Body>> for PanicBoundary<S>
where
    S: Service<Request<Body>, Response = Response>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let head = if self.capture_headers {
            RequestHead::from_request(&request)
        } else {
            RequestHead::request_line(&request)
        };
        let reporter = Arc::clone(&self.reporter);
        let inner = &mut self.inner;

        // A handler can panic before it hands back a future
        match capture::guarded(|| inner.call(request)) {
            Ok(future) => Box::pin(async move {
                // Never polled again once it unwinds
                match AssertUnwindSafe(within_boundary(future)).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Ok(respond(Caught::new(payload), &head, reporter.as_ref())),
                }
            }),
            Err(caught) => {
                let response = respond(caught, &head, reporter.as_ref());
                Box::pin(async move { Ok::<_, S::Error>(response) })
            }
        }
    }
}

/// Polls `future` with the thread marked as inside a boundary
fn within_boundary<F: Future>(future: F) -> impl Future<Output = F::Output> {
    let mut future = Box::pin(future);
    poll_fn(move |cx| {
        let _enter = Enter::new();
        future.as_mut().poll(cx)
    })
}
