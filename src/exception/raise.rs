//! Helpers that abort the current request
//!
//! Each helper either does nothing or unwinds to the nearest
//! [`PanicBoundary`](crate::interceptor::PanicBoundary). They are plain
//! functions, so they work anywhere inside a handler, however deep.

use crate::exception::{BoxedControlled, ControlledError, HttpPanic};
use std::error::Error;
use std::fmt::Display;
use std::panic::panic_any;

/// Abort the request with `code` and `message`
///
/// An empty message makes the response use the status reason phrase.
#[track_caller]
pub fn raise(code: u16, message: impl Into<String>) -> ! {
    panic_any(HttpPanic::new(code, message))
}

/// Abort the request with a custom controlled error
#[track_caller]
pub fn raise_with<E: ControlledError>(error: E) -> ! {
    panic_any(Box::new(error) as BoxedControlled)
}

/// Abort the request with `code` and `message` unless `ok` holds
#[track_caller]
pub fn ensure(ok: bool, code: u16, message: impl Into<String>) {
    if !ok {
        raise(code, message)
    }
}

/// Unwrap `result`, aborting with `code` and the error's text on failure
#[track_caller]
pub fn raise_if_error<T, E: Display>(result: Result<T, E>, code: u16) -> T {
    match result {
        Ok(value) => value,
        Err(error) => raise(code, error.to_string()),
    }
}

/// Unwrap `result`, treating a failure as a defect
///
/// The error is not turned into a controlled error: the boundary reports it
/// as an incident and answers 500.
#[track_caller]
pub fn must<T, E>(result: Result<T, E>) -> T
where
    E: Into<Box<dyn Error + Send + Sync>>,
{
    match result {
        Ok(value) => value,
        Err(error) => panic_any::<Box<dyn Error + Send + Sync>>(error.into()),
    }
}

/// Method forms of [`raise_if_error`] and [`must`]
///
/// ```
/// use httpanic::exception::ResultExt;
///
/// fn port(raw: &str) -> u16 {
///     raw.parse::<u16>().or_raise(400)
/// }
///
/// assert_eq!(port("8080"), 8080);
/// ```
pub trait ResultExt<T> {
    fn or_raise(self, code: u16) -> T;

    fn must(self) -> T;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Display + Into<Box<dyn Error + Send + Sync>>,
{
    #[track_caller]
    fn or_raise(self, code: u16) -> T {
        raise_if_error(self, code)
    }

    #[track_caller]
    fn must(self) -> T {
        must(self)
    }
}
