//! Controlled errors
//!
//! A controlled error is a failure the application chose on purpose. It carries
//! the HTTP status and the message the client should see, and is never logged
//! as an incident.

use std::any::Any;

pub mod http;
pub mod raise;

pub use http::{HttpPanic, controlled_response, reason_phrase};
pub use raise::{ResultExt, ensure, must, raise, raise_if_error, raise_with};

/// The capability contract of a controlled error
///
/// Any type implementing this trait and raised with [`raise_with`] is answered
/// with its own status code and message. The interception layer never needs to
/// know the concrete type.
///
/// # Example
/// ```
/// use httpanic::exception::{ControlledError, raise_with};
///
/// struct QuotaExceeded {
///     limit: u32,
/// }
///
/// impl ControlledError for QuotaExceeded {
///     fn describe(&self) -> String {
///         format!("quota of {} requests exceeded", self.limit)
///     }
///
///     fn status_code(&self) -> u16 {
///         429
///     }
/// }
///
/// fn check(used: u32) {
///     if used > 100 {
///         raise_with(QuotaExceeded { limit: 100 });
///     }
/// }
/// ```
pub trait ControlledError: Send + 'static {
    /// Message sent to the client as the response body
    fn describe(&self) -> String;

    /// HTTP status code of the response
    fn status_code(&self) -> u16;
}

/// Unwind payload used for custom controlled errors
pub(crate) type BoxedControlled = Box<dyn ControlledError>;

/// Return the unwind payload as a controlled error, if it is one
pub fn as_controlled(payload: &(dyn Any + Send)) -> Option<&dyn ControlledError> {
    if let Some(error) = payload.downcast_ref::<HttpPanic>() {
        return Some(error);
    }

    payload
        .downcast_ref::<BoxedControlled>()
        .map(|boxed| &**boxed as &dyn ControlledError)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Teapot;

    impl ControlledError for Teapot {
        fn describe(&self) -> String {
            "short and stout".to_string()
        }

        fn status_code(&self) -> u16 {
            418
        }
    }

    #[test]
    fn test_builtin_payload_is_controlled() {
        let payload: Box<dyn Any + Send> = Box::new(HttpPanic::status(404));
        let error = as_controlled(payload.as_ref()).unwrap();
        assert_eq!(error.status_code(), 404);
        assert_eq!(error.describe(), "Not Found");
    }

    #[test]
    fn test_custom_payload_is_controlled() {
        let payload: Box<dyn Any + Send> = Box::new(Box::new(Teapot) as BoxedControlled);
        let error = as_controlled(payload.as_ref()).unwrap();
        assert_eq!(error.status_code(), 418);
        assert_eq!(error.describe(), "short and stout");
    }

    #[test]
    fn test_other_payloads_are_not_controlled() {
        let message: Box<dyn Any + Send> = Box::new("boom");
        assert!(as_controlled(message.as_ref()).is_none());

        let number: Box<dyn Any + Send> = Box::new(404_u16);
        assert!(as_controlled(number.as_ref()).is_none());
    }
}
