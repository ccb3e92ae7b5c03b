//! Error types.
//!
//! Two families live here. [`Error`] is the *domain* error: an expected,
//! application-raised failure with a stable code, always answered with
//! `400 Bad Request` and a `{"code":…,"msg":…}` body. [`ServeError`] covers
//! infrastructure failures: binding a port, accepting a connection, writing
//! or serialising a response.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An expected failure raised by application code.
///
/// Return it from a handler (`Err(Error::new(..))`) or raise it from deep
/// inside a call stack with [`throw`]. Either way the catcher turns it into
/// a `400` with the error serialised as JSON.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Error {
    pub code: i64,
    pub msg: String,
}

impl Error {
    pub fn new(code: i64, msg: impl Into<String>) -> Self {
        Self { code, msg: msg.into() }
    }

    /// Same code, different message. Handy for predefined error constants:
    ///
    /// ```rust
    /// use kite::Error;
    ///
    /// let not_found = Error::new(1004, "record not found");
    /// let e = not_found.wrap("user 42 not found");
    /// assert_eq!(e.code, 1004);
    /// ```
    pub fn wrap(&self, msg: impl Into<String>) -> Self {
        Self { code: self.code, msg: msg.into() }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for Error {}

/// Raises `err` by unwinding to the request's recovery guard.
///
/// Use this when the failure is detected far below the handler and threading
/// a `Result` back up is not worth it. The catcher sees the original
/// [`Error`] and answers `400`. Outside a request this is an ordinary panic.
pub fn throw(err: Error) -> ! {
    std::panic::panic_any(err)
}

/// Infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid socket address `{0}`")]
    Addr(String),
}
