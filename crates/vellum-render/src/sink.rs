//! Response sinks that renders stream into.
//!
//! A [`ResponseSink`] is the registry's view of an HTTP response: a byte
//! stream plus a way to report a failed render with a status code. HTTP
//! frameworks adapt their response type to this trait; [`BufferedResponse`] is
//! an in-memory implementation for buffering handlers and tests.

use std::io;

use http::StatusCode;

/// Output target of [`Registry::render`](crate::Registry::render).
///
/// Rendered bytes arrive through [`io::Write`]. Failures arrive through
/// [`report_error`](Self::report_error), possibly after some bytes were
/// already written; implementations must not try to retract them.
pub trait ResponseSink: io::Write {
    /// Reports a failed render.
    ///
    /// `status` is the status the response should carry if nothing has been
    /// sent yet. `message` is a short human-readable description.
    fn report_error(&mut self, status: StatusCode, message: &str);
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn report_error(&mut self, status: StatusCode, message: &str) {
        (**self).report_error(status, message)
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    fn report_error(&mut self, status: StatusCode, message: &str) {
        (**self).report_error(status, message)
    }
}

/// An in-memory response.
///
/// Behaves like a typical HTTP response writer: the status is `200 OK` until
/// changed, and the first body write commits it. An error reported before any
/// body bytes sets the status; an error reported afterwards can only append
/// its message, because the status line is already gone.
///
/// # Example
///
/// ```rust
/// use http::StatusCode;
/// use vellum_render::{BufferedResponse, ResponseSink};
///
/// let mut response = BufferedResponse::new();
/// response.report_error(StatusCode::INTERNAL_SERVER_ERROR, "Template not found");
///
/// assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
/// assert_eq!(response.body_str(), "Template not found\n");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedResponse {
    status: StatusCode,
    body: Vec<u8>,
    committed: bool,
    error: Option<String>,
}

impl BufferedResponse {
    /// Creates an empty `200 OK` response.
    pub fn new() -> Self {
        Self::default()
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns `true` once the status can no longer change.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// The most recently reported error message, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Consumes the response, returning the body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl io::Write for BufferedResponse {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !buf.is_empty() {
            self.committed = true;
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseSink for BufferedResponse {
    fn report_error(&mut self, status: StatusCode, message: &str) {
        if !self.committed {
            self.status = status;
            self.committed = true;
        }
        self.body.extend_from_slice(message.as_bytes());
        self.body.push(b'\n');
        self.error = Some(message.to_string());
    }
}
