//! # kite
//!
//! A small HTTP framework built around one idea: a request is a [`Context`]
//! passed through ordered chains of plain functions.
//!
//! ## What you get
//!
//! - **Chains**: server-wide middleware, then the route's own handlers, in
//!   registration order. Any handler can stop its chain with
//!   [`Context::abort`] or by returning [`Flow::Abort`].
//! - **Exact-match routing**: `GET`, `POST` and a catch-all `ANY` table,
//!   plus [`Group`]s for shared prefixes and middleware.
//! - **Binding**: [`Context::bind`] fills a typed structure from a JSON body,
//!   a form body or the query string, applies declared defaults and runs
//!   validation with localised messages. See [`bind`].
//! - **Recovery**: returned errors, [`throw`]n domain errors and panics all
//!   end in one catcher: domain errors become `400 {"code":…,"msg":…}`,
//!   everything else a bare `500`.
//! - **Throttling**: a per-path in-flight counter and the
//!   [`middleware::limit`] middleware built on it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use kite::bind::{Bind, Field, Rule};
//! use kite::{Config, Context, Error, Failure, Server, chain, middleware};
//!
//! #[derive(Default, serde::Deserialize)]
//! #[serde(default)]
//! struct Hello {
//!     name: String,
//!     times: i64,
//! }
//!
//! impl Bind for Hello {
//!     fn fields(&mut self) -> Vec<Field<'_>> {
//!         vec![
//!             Field::new("name", &mut self.name).rule(Rule::Required),
//!             Field::new("times", &mut self.times).default("1").rule(Rule::Max(10.0)),
//!         ]
//!     }
//! }
//!
//! fn hello(ctx: &mut Context) -> Result<(), Failure> {
//!     let mut req = Hello::default();
//!     ctx.bind(&mut req)?;
//!     if req.name == "root" {
//!         return Err(Error::new(1001, "reserved name").into());
//!     }
//!     let body = format!("hello {}\n", req.name).repeat(req.times as usize);
//!     ctx.write(StatusCode::OK, body.as_bytes())?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut server = Server::new(Config::from_env());
//!     server.use_middleware(chain![middleware::cors(Default::default())]);
//!     server.get("/hello", chain![middleware::limit(100), hello]);
//!     server.run("0.0.0.0:3000").await.unwrap();
//! }
//! ```

mod access;
mod catch;
mod config;
mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod storage;

pub mod bind;
pub mod middleware;

pub use access::{AccessCounter, AccessGuard, DEFAULT_RESET_INTERVAL};
pub use catch::{Catcher, Failure, SNAPSHOT_LIMIT, default_catcher};
pub use config::{Config, RunMode};
pub use context::Context;
pub use error::{Error, ServeError, throw};
pub use handler::{Chain, Flow, Handler, IntoFlow};
pub use request::Request;
pub use response::{ContentType, ResponseWriter};
pub use router::{Group, RouteInfo, Router};
pub use server::{NOT_FOUND_BODY, Server};
pub use storage::{BODY_KEY, Storage};
