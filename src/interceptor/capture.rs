//! Stack capture at the panic site
//!
//! By the time `catch_unwind` returns, the frames that panicked are gone. A
//! process-wide panic hook therefore records the incident id and the stack
//! while the panicking frames still exist, and parks them in a thread-local
//! slot for the boundary to pick up. Outside of a boundary the hook defers to
//! whatever hook was installed before it.

use crate::exception::as_controlled;
use crate::incident::{IncidentId, StackFrame, describe_payload};
use std::any::{Any, TypeId};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

/// Frames kept per incident
pub const MAX_STACK_FRAMES: usize = 64;

/// Path prefixes of frames owned by the standard library, the async runtime,
/// the test harness and the unwind adapters rather than by the application.
/// Matched after a leading `<` is stripped, so `<core::pin::Pin<P> as ..>`
/// counts as `core::`.
const INTERNAL_FRAME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "test::",
    "tokio::",
    "futures_util::",
    "futures_core::",
    "tower::util::",
    "unknown>",
    "rust_begin_unwind",
    "__rust_",
    "_start",
    "__libc_start",
    "start_thread",
    "clone3",
];

/// Function name fragments of frames that belong to unwinding, backtrace
/// capture and this crate's own interception code
const INTERNAL_FRAME_MARKERS: &[&str] = &[
    " as core::ops::function::",
    " as core::future::into_future::",
    " as core::slice::index::",
    concat!(env!("CARGO_CRATE_NAME"), "::interceptor::"),
    concat!(env!("CARGO_CRATE_NAME"), "::exception::raise::"),
];

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<(Fingerprint, Capture)>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

/// Id and stack of an uncontrolled panic
#[derive(Debug)]
pub struct Capture {
    pub id: IncidentId,
    pub location: Option<String>,
    pub frames: Vec<StackFrame>,
}

impl Capture {
    /// Assign an id, then capture the current stack
    pub fn now() -> Self {
        let id = IncidentId::generate();
        let frames = frames_from(&Backtrace::force_capture());
        Self {
            id,
            location: None,
            frames,
        }
    }
}

/// Identifies the payload a capture was taken for
///
/// A handler may recover from one panic and then unwind with another payload
/// through `resume_unwind`, which skips the hook. The slot then still holds
/// the capture of the recovered panic, and the fingerprint tells them apart.
#[derive(Debug, PartialEq, Eq)]
struct Fingerprint {
    type_id: TypeId,
    text: String,
}

impl Fingerprint {
    fn of(payload: &(dyn Any + Send)) -> Self {
        Self {
            type_id: (*payload).type_id(),
            text: describe_payload(payload),
        }
    }
}

/// An unwind stopped by a boundary
pub struct Caught {
    pub payload: Box<dyn Any + Send>,
    pub capture: Option<Capture>,
}

impl Caught {
    /// Pair `payload` with the capture the hook took for it, if any
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        let capture = take_capture(payload.as_ref());
        Self { payload, capture }
    }
}

fn take_capture(payload: &(dyn Any + Send)) -> Option<Capture> {
    let (fingerprint, capture) = CAPTURED
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()?;
    (fingerprint == Fingerprint::of(payload)).then_some(capture)
}

/// Install the capturing panic hook. Only the first call has an effect.
///
/// While a thread is inside a boundary, the hook replaces the previously
/// installed one for every panic raised there:
///
/// - controlled errors are silent;
/// - any other panic pays for a forced backtrace and is not printed, even
///   when the code that raised it catches it again (a library recovering
///   from its own panic, for instance). Only a panic that reaches the
///   boundary is reported, through the [`IncidentReporter`].
///
/// Outside of a boundary the previous hook runs unchanged.
///
/// [`IncidentReporter`]: crate::interceptor::IncidentReporter
pub fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if DEPTH.try_with(Cell::get).unwrap_or(0) == 0 {
                previous(info);
                return;
            }
            let payload = info.payload();
            if as_controlled(payload).is_some() {
                return;
            }

            let fingerprint = Fingerprint::of(payload);
            let mut capture = Capture::now();
            capture.location = info.location().map(ToString::to_string);
            let _ = CAPTURED.try_with(|slot| *slot.borrow_mut() = Some((fingerprint, capture)));
        }));
    });
}

/// Marks the current thread as inside a boundary while alive
pub(crate) struct Enter;

impl Enter {
    pub(crate) fn new() -> Self {
        DEPTH.with(|depth| {
            if depth.get() == 0 {
                CAPTURED.with(|slot| *slot.borrow_mut() = None);
            }
            depth.set(depth.get() + 1);
        });
        Self
    }
}

impl Drop for Enter {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `f` inside a boundary, stopping any unwind it starts
///
/// The closure is never resumed after it unwinds, so it is treated as unwind
/// safe.
pub fn guarded<R>(f: impl FnOnce() -> R) -> Result<R, Caught> {
    let _enter = Enter::new();
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(Caught::new)
}

pub fn frames_from(backtrace: &Backtrace) -> Vec<StackFrame> {
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    parse_frames(&backtrace.to_string())
}

pub fn is_internal_frame(function: &str) -> bool {
    let path = function.strip_prefix('<').unwrap_or(function);
    INTERNAL_FRAME_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
        || INTERNAL_FRAME_MARKERS
            .iter()
            .any(|marker| function.contains(marker))
}

/// Parse the rendered form of a [`Backtrace`]
///
/// ```text
///    3: app::handler
///              at ./src/app.rs:42:9
///       app::inlined_helper
///              at ./src/app.rs:17:5
/// ```
fn parse_frames(rendered: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();

    for raw in rendered.lines() {
        // Anything flush left is a trailing note, not a frame
        if !raw.starts_with(char::is_whitespace) {
            continue;
        }
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut().filter(|frame| frame.file.is_none()) {
                let (file, line) = split_location(location);
                frame.file = Some(file.to_owned());
                frame.line = line;
            }
            continue;
        }

        let function = match line.split_once(": ") {
            Some((index, name)) if index.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => line,
        };
        frames.push(StackFrame::new(function, None, None));
    }

    frames
        .into_iter()
        .filter(|frame| !is_internal_frame(&frame.function))
        .take(MAX_STACK_FRAMES)
        .collect()
}

/// Split `path:line:column` into the path and line
fn split_location(location: &str) -> (&str, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let column = parts.next();
    let line = parts.next();
    match (column, line, parts.next()) {
        (Some(_), Some(line), Some(file)) => (file, line.parse().ok()),
        _ => (location, None),
    }
}
