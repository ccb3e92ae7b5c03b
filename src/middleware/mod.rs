//! Built-in middleware.
//!
//! Middleware are ordinary handlers registered ahead of the endpoint, either
//! server-wide with [`Server::use_middleware`](crate::Server::use_middleware)
//! or per route/group. They talk to later handlers through the context's
//! storage and stop the chain with [`Context::abort`](crate::Context::abort).
//!
//! - [`body_parser`]: always installed first; caches the body, resolves the
//!   media type.
//! - [`cors`]: answers preflights and stamps `Access-Control-Allow-Origin`.
//! - [`limit`]: waits while too many requests for the same path are in flight.

mod body;
mod cors;
mod limit;

pub use body::body_parser;
pub use cors::{CorsOptions, cors};
pub use limit::limit;
