use crate::incident::{Incident, describe_payload};
use crate::interceptor::capture;
use std::sync::{Mutex, PoisonError};

/// Serializes incident reports so concurrent incidents never interleave
static REPORT_LOCK: Mutex<()> = Mutex::new(());

/// Receives every incident a boundary catches
///
/// Reporters run after the stack is captured and before the 500 response is
/// produced. A reporter that panics does not affect the response; the failure
/// is logged and dropped.
///
/// Closures taking `&Incident<'_>` are reporters:
///
/// ```
/// use httpanic::incident::Incident;
/// use httpanic::interceptor::PanicBoundaryLayer;
///
/// let layer = PanicBoundaryLayer::with_reporter(|incident: &Incident<'_>| {
///     eprintln!("{} {}", incident.id(), incident.cause_message());
/// });
/// ```
pub trait IncidentReporter: Send + Sync + 'static {
    fn report(&self, incident: &Incident<'_>);
}

impl<F> IncidentReporter for F
where
    F: Fn(&Incident<'_>) + Send + Sync + 'static,
{
    fn report(&self, incident: &Incident<'_>) {
        self(incident)
    }
}

/// The default reporter: one `tracing` error event per line
///
/// ```text
/// panic=3f2a9c0d11e4b7a5 message = index out of bounds: the len is 0 but the index is 3
/// panic=3f2a9c0d11e4b7a5 ./src/orders.rs:42 shop::orders::create()
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl IncidentReporter for LogReporter {
    fn report(&self, incident: &Incident<'_>) {
        let _lock = REPORT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        let id = incident.id();
        tracing::error!("panic={id} message = {}", incident.cause_message());
        for frame in incident.stack_trace() {
            tracing::error!("panic={id} {frame}");
        }
    }
}

/// Hand `incident` to `reporter`, containing any panic it raises
pub(crate) fn report_guarded(reporter: &dyn IncidentReporter, incident: &Incident<'_>) {
    if let Err(caught) = capture::guarded(|| reporter.report(incident)) {
        tracing::error!(
            "Incident reporter for panic={} panicked: {}",
            incident.id(),
            describe_payload(caught.payload.as_ref())
        );
    }
}
