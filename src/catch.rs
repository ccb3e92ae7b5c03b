//! Failure recovery.
//!
//! Every request runs its chains inside [`guarded`], a `catch_unwind`
//! boundary. Whatever goes wrong in there, an `Err` returned by a handler,
//! a [`throw`](crate::throw)n domain error or an arbitrary panic, comes out
//! as one [`Failure`] and is handed to the server's catcher exactly once.
//!
//! A process-wide panic hook (installed on first use) keeps in-request
//! panics off stderr and, in debug mode, records a stack snapshot at the
//! panic site for the catcher to log.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use http::StatusCode;
use tracing::{debug, error};

use crate::bind::BindError;
use crate::config::RunMode;
use crate::context::Context;
use crate::error::{Error, ServeError};

/// Upper bound on the logged stack snapshot, in bytes.
pub const SNAPSHOT_LIMIT: usize = 4 << 10;

const INTERNAL_ERROR_BODY: &[u8] = b"internal server error";

/// What went wrong while a request was being handled.
#[derive(Debug)]
pub enum Failure {
    /// An expected, application-raised error.
    Domain(Error),
    /// Anything else: a panic, or a non-domain error returned by a handler.
    Unexpected {
        message: String,
        /// Stack at the panic site; only captured in debug mode.
        snapshot: Option<String>,
    },
}

impl Failure {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected { message: message.into(), snapshot: None }
    }

    fn from_panic(payload: Box<dyn Any + Send>, snapshot: Option<String>) -> Self {
        let payload = match payload.downcast::<Error>() {
            Ok(err) => return Self::Domain(*err),
            Err(other) => other,
        };
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        Self::Unexpected { message, snapshot }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(err) => write!(f, "domain error {}: {}", err.code, err.msg),
            Self::Unexpected { message, .. } => write!(f, "unexpected failure: {message}"),
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Self::Domain(err)
    }
}

impl From<BindError> for Failure {
    fn from(err: BindError) -> Self {
        Self::Domain(err.into())
    }
}

impl From<ServeError> for Failure {
    fn from(err: ServeError) -> Self {
        Self::unexpected(err.to_string())
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Self::unexpected(format!("io: {err}"))
    }
}

/// Bind errors surface to clients like domain errors, with code 400.
impl From<BindError> for Error {
    fn from(err: BindError) -> Self {
        Error::new(i64::from(StatusCode::BAD_REQUEST.as_u16()), err.to_string())
    }
}

/// Turns a [`Failure`] into a response. Installed with
/// [`Server::set_catch`](crate::Server::set_catch).
pub type Catcher = Arc<dyn Fn(&mut Context, Failure) + Send + Sync + 'static>;

/// Domain errors → `400` with `{"code":…,"msg":…}`; everything else →
/// `500` with a fixed body. The stack snapshot, if any, is only logged.
pub fn default_catcher(ctx: &mut Context, failure: Failure) {
    match failure {
        Failure::Domain(err) => {
            debug!(code = err.code, msg = %err.msg, "domain error");
            if let Err(e) = ctx.write_json(StatusCode::BAD_REQUEST, &err) {
                error!("failed to write domain error: {e}");
            }
        }
        Failure::Unexpected { message, snapshot } => {
            match snapshot {
                Some(stack) => error!(%message, %stack, "unexpected failure"),
                None => error!(%message, "unexpected failure"),
            }
            if let Err(e) = ctx.write(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY) {
                error!("failed to write internal error: {e}");
            }
        }
    }
}

/// Runs `catcher`; if the catcher itself panics, falls back to a bare `500`.
pub(crate) fn recover(catcher: &Catcher, ctx: &mut Context, failure: Failure) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| catcher(ctx, failure)));
    if outcome.is_err() {
        error!("catcher panicked");
        let _ = ctx.write(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY);
    }
}

thread_local! {
    static GUARD: Cell<Option<RunMode>> = const { Cell::new(None) };
    static SNAPSHOT: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let Some(mode) = GUARD.with(Cell::get) else {
                previous(info);
                return;
            };
            if mode == RunMode::Debug && !info.payload().is::<Error>() {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}", l.file(), l.line()))
                    .unwrap_or_default();
                let stack = format!("at {location}\n{}", Backtrace::force_capture());
                SNAPSHOT.with(|s| *s.borrow_mut() = Some(truncate(stack, SNAPSHOT_LIMIT)));
            }
        }));
    });
}

fn truncate(mut s: String, limit: usize) -> String {
    if s.len() > limit {
        let mut end = limit;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

/// Runs `f`, converting any unwinding into a [`Failure`].
pub(crate) fn guarded<R>(mode: RunMode, f: impl FnOnce() -> R) -> Result<R, Failure> {
    install_hook();
    let outer = GUARD.with(|g| g.replace(Some(mode)));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARD.with(|g| g.set(outer));
    result.map_err(|payload| {
        let snapshot = SNAPSHOT.with(RefCell::take);
        Failure::from_panic(payload, snapshot)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throw;

    #[test]
    fn thrown_error_is_domain() {
        let failure = guarded::<()>(RunMode::Debug, || throw(Error::new(42, "bad"))).unwrap_err();
        match failure {
            Failure::Domain(err) => assert_eq!(err, Error::new(42, "bad")),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn debug_panic_carries_bounded_snapshot() {
        let failure = guarded::<()>(RunMode::Debug, || panic!("kaboom")).unwrap_err();
        match failure {
            Failure::Unexpected { message, snapshot } => {
                assert_eq!(message, "kaboom");
                let stack = snapshot.expect("snapshot in debug mode");
                assert!(stack.len() <= SNAPSHOT_LIMIT);
                assert!(stack.starts_with("at "));
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn release_panic_has_no_snapshot() {
        let n = 3;
        let failure = guarded::<()>(RunMode::Release, || panic!("bad index {n}")).unwrap_err();
        match failure {
            Failure::Unexpected { message, snapshot } => {
                assert_eq!(message, "bad index 3");
                assert!(snapshot.is_none());
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn success_passes_through() {
        assert_eq!(guarded(RunMode::Debug, || 7).unwrap(), 7);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo".to_owned(), 2), "h");
        assert_eq!(truncate("abc".to_owned(), 10), "abc");
    }

    #[test]
    fn bind_error_becomes_400_domain_error() {
        let bind = BindError::Validation { field: "f".into(), message: "f bad".into() };
        let err: Error = bind.into();
        assert_eq!(err, Error::new(400, "f bad"));
    }
}
