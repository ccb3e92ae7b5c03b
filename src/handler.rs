//! Handler trait, type erasure and handler chains.
//!
//! # How handlers are stored
//!
//! Routes and middleware stages hold handlers of many different concrete
//! types in one `Vec`, so each is hidden behind a trait object:
//!
//! ```text
//! fn hello(ctx: &mut Context) -> R { … }           ← user writes this
//!        ↓ chain![hello]
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(&mut ctx)  at request time          ← one vtable dispatch
//!        ↓
//! hello(&mut ctx).into_flow()                      ← Continue | Abort | Fail
//! ```
//!
//! Handlers are plain synchronous functions. The server runs each request's
//! chains on tokio's blocking pool, so a handler may block or sleep without
//! stalling the accept loop.

use std::sync::Arc;

use crate::catch::Failure;
use crate::context::Context;

// ── Flow ──────────────────────────────────────────────────────────────────────

/// What the dispatcher does after a handler returns.
#[derive(Debug)]
pub enum Flow {
    /// Run the next handler, unless the handler called
    /// [`Context::abort`].
    Continue,
    /// Skip the rest of the current chain.
    Abort,
    /// Hand the failure to the catcher and stop.
    Fail(Failure),
}

/// Conversion of a handler's return value into a [`Flow`].
///
/// - `()` → `Continue` (the continuation flag still decides).
/// - `Flow` → itself.
/// - `Result<T, E>` → `Continue` on `Ok`, `Fail` on `Err`. Any `E` that
///   converts into a [`Failure`] works: [`Error`](crate::Error),
///   [`BindError`](crate::bind::BindError), [`ServeError`](crate::ServeError),
///   `std::io::Error`.
pub trait IntoFlow {
    fn into_flow(self) -> Flow;
}

impl IntoFlow for () {
    fn into_flow(self) -> Flow { Flow::Continue }
}

impl IntoFlow for Flow {
    fn into_flow(self) -> Flow { self }
}

impl<T, E: Into<Failure>> IntoFlow for Result<T, E> {
    fn into_flow(self) -> Flow {
        match self {
            Ok(_) => Flow::Continue,
            Err(e) => Flow::Fail(e.into()),
        }
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: &mut Context) -> Flow;

    /// Type name of the wrapped function, for the route table printout.
    fn name(&self) -> &'static str;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// function or closure with the signature:
///
/// ```text
/// fn name(ctx: &mut Context) -> impl IntoFlow
/// ```
///
/// Closures need their parameter type spelled out
/// (`|ctx: &mut Context| …`) so the compiler picks the higher-ranked
/// signature.
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, R> private::Sealed for F
where
    F: Fn(&mut Context) -> R + Send + Sync + 'static,
    R: IntoFlow,
{
}

impl<F, R> Handler for F
where
    F: Fn(&mut Context) -> R + Send + Sync + 'static,
    R: IntoFlow,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(&mut Context) -> R + Send + Sync,
    R: IntoFlow,
{
    fn call(&self, ctx: &mut Context) -> Flow {
        (self.0)(ctx).into_flow()
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<F>()
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered list of handlers: a middleware stage or one route.
///
/// Usually built with [`chain!`](crate::chain):
///
/// ```rust
/// use kite::{Context, chain};
///
/// fn auth(ctx: &mut Context) {
///     if ctx.request().header("authorization").is_none() {
///         ctx.abort();
///     }
/// }
/// fn hello(ctx: &mut Context) -> std::io::Result<()> {
///     ctx.write(http::StatusCode::OK, b"hello")
/// }
///
/// let route = chain![auth, hello];
/// assert_eq!(route.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    handlers: Vec<BoxedHandler>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler`. Returns `self` for chaining.
    pub fn then(mut self, handler: impl Handler) -> Self {
        self.handlers.push(handler.into_boxed_handler());
        self
    }

    /// `self`'s handlers followed by `other`'s.
    pub fn join(&self, other: &Chain) -> Chain {
        let mut handlers = self.handlers.clone();
        handlers.extend(other.handlers.iter().cloned());
        Chain { handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Name of the last handler, conventionally the endpoint.
    pub fn endpoint_name(&self) -> Option<&'static str> {
        self.handlers.last().map(|h| h.name())
    }

    /// Runs handlers in order. `Ok(true)` if the chain ran to the end,
    /// `Ok(false)` if a handler aborted it.
    pub(crate) fn run(&self, ctx: &mut Context) -> Result<bool, Failure> {
        for handler in &self.handlers {
            match handler.call(ctx) {
                Flow::Continue => {
                    if !ctx.is_continuing() {
                        return Ok(false);
                    }
                }
                Flow::Abort => {
                    ctx.abort();
                    return Ok(false);
                }
                Flow::Fail(failure) => return Err(failure),
            }
        }
        Ok(true)
    }
}

/// Builds a [`Chain`] from handlers, in order.
#[macro_export]
macro_rules! chain {
    () => { $crate::Chain::new() };
    ($($handler:expr),+ $(,)?) => { $crate::Chain::new()$(.then($handler))+ };
}
