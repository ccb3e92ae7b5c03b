//! HTTP server, request dispatch and graceful shutdown.
//!
//! # Request lifecycle
//!
//! ```text
//! accept → collect body → [blocking pool] serve_request:
//!     counter.enter(path)
//!     Context::new                      continue = true
//!     guarded {
//!         global middleware             body_parser first; abort → done
//!         route lookup                  GET/POST table, then ANY; miss → 404
//!         route chain                   abort → done
//!     }
//!     on failure → catcher (exactly once)
//!     counter guard dropped
//! ```
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server stops accepting, lets every
//! in-flight connection finish, then returns from [`Server::run`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::access::AccessCounter;
use crate::catch::{self, Catcher, Failure, default_catcher};
use crate::config::Config;
use crate::context::Context;
use crate::handler::Chain;
use crate::middleware::body_parser;
use crate::request::Request;
use crate::router::{Group, RouteInfo, Router};

/// Body written when no route matches.
pub const NOT_FOUND_BODY: &[u8] = b"handler not exist";

type HttpResponse = http::Response<Full<Bytes>>;

/// The HTTP server: global middleware, route tables and the catcher.
///
/// Configure it single-threaded, then hand it to [`run`](Server::run) or
/// [`serve`](Server::serve). Nothing can be registered once serving starts.
pub struct Server {
    config: Config,
    middleware: Chain,
    router: Router,
    catcher: Catcher,
    counter: Arc<AccessCounter>,
}

impl Server {
    /// A server with the body parser installed as the first global middleware
    /// and the default catcher.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            middleware: Chain::new().then(body_parser()),
            router: Router::new(),
            catcher: Arc::new(default_catcher),
            counter: Arc::new(AccessCounter::new()),
        }
    }

    /// Appends server-wide middleware, run in registration order before
    /// route resolution.
    pub fn use_middleware(&mut self, chain: Chain) -> &mut Self {
        self.middleware = self.middleware.join(&chain);
        self
    }

    pub fn get(&mut self, path: &str, chain: Chain) -> &mut Self {
        self.router.get(path, chain);
        self
    }

    pub fn post(&mut self, path: &str, chain: Chain) -> &mut Self {
        self.router.post(path, chain);
        self
    }

    pub fn any(&mut self, path: &str, chain: Chain) -> &mut Self {
        self.router.any(path, chain);
        self
    }

    pub fn group(&mut self, prefix: &str, middleware: Chain) -> Group<'_> {
        Group::new(&mut self.router, prefix, middleware)
    }

    /// Replaces the catcher that turns failures into responses.
    pub fn set_catch<F>(&mut self, catcher: F) -> &mut Self
    where
        F: Fn(&mut Context, Failure) + Send + Sync + 'static,
    {
        self.catcher = Arc::new(catcher);
        self
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.router.routes()
    }

    pub fn access_counter(&self) -> &Arc<AccessCounter> {
        &self.counter
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Handles one request end to end and always produces a response.
    ///
    /// Synchronous: runs every handler on the calling thread. The network
    /// path calls this from tokio's blocking pool.
    pub fn serve_request(
        &self,
        request: http::Request<Bytes>,
        remote: Option<SocketAddr>,
    ) -> HttpResponse {
        let run = || {
            let started = Instant::now();
            let method = request.method().clone();
            let path = request.uri().path().to_owned();
            let _in_flight = self.counter.enter(&path);

            let mut ctx = Context::new(
                Request::from_http(request, remote),
                Arc::clone(&self.config.translator),
                Arc::clone(&self.counter),
            );
            let outcome = catch::guarded(self.config.mode, || self.dispatch(&mut ctx));
            if let Err(failure) = outcome.and_then(|r| r) {
                catch::recover(&self.catcher, &mut ctx, failure);
            }

            let response = ctx.into_response();
            if self.config.access_log {
                info!(
                    %method,
                    %path,
                    status = response.status().unwrap_or(StatusCode::OK).as_u16(),
                    cost_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "request",
                );
            }
            response.into_http()
        };

        match &self.config.logger {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, run),
            None => run(),
        }
    }

    fn dispatch(&self, ctx: &mut Context) -> Result<(), Failure> {
        if !self.middleware.run(ctx)? {
            return Ok(());
        }

        let route = self.router.lookup(ctx.request().method(), ctx.request().path());
        let Some(chain) = route else {
            ctx.write(StatusCode::NOT_FOUND, NOT_FOUND_BODY)?;
            return Ok(());
        };
        chain.run(ctx)?;
        Ok(())
    }

    // ── Transport ─────────────────────────────────────────────────────────────

    /// Binds `addr`, logs the route table and serves until SIGTERM / Ctrl-C.
    pub async fn run(self, addr: &str) -> Result<(), crate::ServeError> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| crate::ServeError::Addr(addr.to_owned()))?;
        let listener = TcpListener::bind(addr).await?;

        for route in self.routes() {
            info!("{:<6} {} -> {}", format!("[{}]", route.method), route.path, route.handler);
        }
        info!(%addr, mode = %self.config.mode, "kite listening");

        self.serve(listener, shutdown_signal()).await
    }

    /// Serves connections from `listener` until `shutdown` resolves, then
    /// drains in-flight connections.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), crate::ServeError> {
        let reset = self.counter.spawn_reset(self.config.reset_interval);

        // Shared read-only by every connection task; nothing mutates it now.
        let server = Arc::new(self);

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(
                        in_flight = tasks.len(),
                        "shutdown signal received, draining connections"
                    );
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let server = Arc::clone(&server);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let server = Arc::clone(&server);
                            async move { handle(server, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}
        reset.abort();

        info!("kite stopped");
        Ok(())
    }
}

/// Collects the body, then runs the synchronous dispatcher on the blocking
/// pool. Every failure becomes a response, so hyper never sees an error.
async fn handle(
    server: Arc<Server>,
    req: hyper::Request<hyper::body::Incoming>,
    remote: SocketAddr,
) -> Result<HttpResponse, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote, "failed to read request body: {e}");
            return Ok(status_only(StatusCode::BAD_REQUEST));
        }
    };
    let request = http::Request::from_parts(parts, body);

    match tokio::task::spawn_blocking(move || server.serve_request(request, Some(remote))).await {
        Ok(response) => Ok(response),
        Err(e) => {
            error!(peer = %remote, "dispatch task failed: {e}");
            Ok(status_only(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

fn status_only(status: StatusCode) -> HttpResponse {
    let mut res = http::Response::new(Full::new(Bytes::new()));
    *res.status_mut() = status;
    res
}

/// Resolves on the first SIGTERM (Unix) or Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;

    use super::*;
    use crate::bind::{Bind, Field, Lang};
    use crate::config::RunMode;
    use crate::error::{Error, throw};
    use crate::handler::Flow;
    use crate::chain;

    fn body_of(res: HttpResponse) -> Vec<u8> {
        // `Full` resolves on the first poll; a throwaway runtime is enough.
        let collected = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(res.into_body().collect())
            .unwrap();
        collected.to_bytes().to_vec()
    }

    fn get(path: &str) -> http::Request<Bytes> {
        http::Request::get(path).body(Bytes::new()).unwrap()
    }

    fn mark(tag: &'static str) -> impl Fn(&mut Context) + Send + Sync + 'static {
        move |ctx: &mut Context| {
            let seen = ctx.storage().get_str("seen").unwrap_or_default().to_owned();
            ctx.storage_mut().set("seen", seen + tag);
        }
    }

    fn echo_seen(ctx: &mut Context) -> std::io::Result<()> {
        let seen = ctx.storage().get_str("seen").unwrap_or_default().to_owned();
        ctx.write(StatusCode::OK, seen.as_bytes())
    }

    #[test]
    fn missing_route_is_404_after_global_middleware() {
        let mut server = Server::new(Config::new());
        server.use_middleware(chain![mark("g"), echo_seen]);

        let res = server.serve_request(get("/nowhere"), None);
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_of(res), b"ghandler not exist");

        let mut plain = Server::new(Config::new());
        plain.get("/x", chain![echo_seen]);
        let res = plain.serve_request(get("/nowhere"), None);
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(res), b"handler not exist");
    }

    #[test]
    fn global_abort_skips_routes() {
        let mut server = Server::new(Config::new());
        let gate = |ctx: &mut Context| -> std::io::Result<()> {
            ctx.write(StatusCode::FORBIDDEN, b"no")?;
            ctx.abort();
            Ok(())
        };
        server.use_middleware(chain![gate]).get("/x", chain![echo_seen]);

        let res = server.serve_request(get("/x"), None);
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_of(res), b"no");
    }

    #[test]
    fn route_abort_keeps_written_bytes() {
        let mut server = Server::new(Config::new());
        let partial = |ctx: &mut Context| -> std::io::Result<()> {
            ctx.write(StatusCode::ACCEPTED, b"partial")?;
            ctx.abort();
            Ok(())
        };
        server.get("/x", chain![mark("a"), partial, echo_seen]);

        let res = server.serve_request(get("/x"), None);
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert_eq!(body_of(res), b"partial");
    }

    #[test]
    fn route_chain_runs_in_order() {
        let mut server = Server::new(Config::new());
        server.use_middleware(chain![mark("g")]);
        server.get("/x", chain![mark("1"), mark("2"), echo_seen]);
        server.any("/x", chain![mark("any"), echo_seen]);

        assert_eq!(body_of(server.serve_request(get("/x"), None)), b"g12");

        let post = http::Request::post("/x").body(Bytes::new()).unwrap();
        assert_eq!(body_of(server.serve_request(post, None)), b"gany");
    }

    #[test]
    fn domain_error_is_400_json() {
        let mut server = Server::new(Config::new());
        let fail = |_: &mut Context| -> Result<(), Error> { Err(Error::new(42, "bad")) };
        server.get("/r", chain![fail]);
        server.get("/t", chain![|_: &mut Context| -> Flow { throw(Error::new(42, "bad")) }]);

        for path in ["/r", "/t"] {
            let res = server.serve_request(get(path), None);
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(res.headers()["content-type"], "application/json");
            assert_eq!(body_of(res), br#"{"code":42,"msg":"bad"}"#);
        }
    }

    #[test]
    fn panic_is_generic_500_in_both_modes() {
        for mode in [RunMode::Debug, RunMode::Release] {
            let mut server = Server::new(Config::new().mode(mode));
            server.get("/boom", chain![|_: &mut Context| -> Flow { panic!("secret detail") }]);

            let res = server.serve_request(get("/boom"), None);
            assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body = body_of(res);
            assert_eq!(body, b"internal server error");
        }
    }

    #[test]
    fn catcher_runs_once_and_can_be_replaced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut server = Server::new(Config::new());
        let counted = Arc::clone(&calls);
        server.set_catch(move |ctx, failure| {
            counted.fetch_add(1, Ordering::SeqCst);
            let _ = ctx.write(StatusCode::IM_A_TEAPOT, failure.to_string().as_bytes());
        });
        let fail = |_: &mut Context| Flow::Fail(Failure::unexpected("nope"));
        server.get("/f", chain![fail, echo_seen]);
        server.get("/ok", chain![echo_seen]);

        let res = server.serve_request(get("/f"), None);
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_of(res), b"unexpected failure: nope");
        server.serve_request(get("/ok"), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_catcher_still_answers() {
        let mut server = Server::new(Config::new());
        server.set_catch(|_, _| panic!("catcher bug"));
        server.get("/f", chain![|_: &mut Context| Flow::Fail(Failure::unexpected("x"))]);

        let res = server.serve_request(get("/f"), None);
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn counter_is_released_after_failure() {
        let mut server = Server::new(Config::new());
        let observe = |ctx: &mut Context| -> std::io::Result<()> {
            let n = ctx.access_counter().get("/c");
            ctx.write(StatusCode::OK, n.to_string().as_bytes())?;
            panic!("after write");
        };
        server.get("/c", chain![observe]);

        let res = server.serve_request(get("/c"), None);
        assert_eq!(body_of(res), b"1internal server error");
        assert_eq!(server.access_counter().get("/c"), 0);
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Query {
        name: String,
        age: i64,
    }

    impl Bind for Query {
        fn fields(&mut self) -> Vec<Field<'_>> {
            vec![
                Field::new("name", &mut self.name).rule(crate::bind::Rule::Required),
                Field::new("age", &mut self.age),
            ]
        }
    }

    fn greet(ctx: &mut Context) -> Result<(), Failure> {
        let mut q = Query::default();
        ctx.bind(&mut q)?;
        ctx.write(StatusCode::OK, format!("{} {}", q.name, q.age).as_bytes())?;
        Ok(())
    }

    #[test]
    fn bind_through_dispatch() {
        let mut server = Server::new(Config::new().lang(Lang::English));
        server.get("/greet", chain![greet]).post("/greet", chain![greet]);

        let res = server.serve_request(get("/greet?name=Alice&age=30"), None);
        assert_eq!(body_of(res), b"Alice 30");

        let form = http::Request::post("/greet")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Bytes::from_static(b"name=Bob&age=7"))
            .unwrap();
        assert_eq!(body_of(server.serve_request(form, None)), b"Bob 7");

        let res = server.serve_request(get("/greet?age=1"), None);
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(res), br#"{"code":400,"msg":"name is a required field"}"#);
    }

    #[test]
    fn limit_admits_overlapping_requests() {
        use std::sync::atomic::AtomicI64;
        use std::time::Duration;

        let inside = Arc::new(AtomicI64::new(0));
        let peak = Arc::new(AtomicI64::new(0));
        let auth = |_: &mut Context| std::thread::sleep(Duration::from_millis(20));
        let endpoint = {
            let (inside, peak) = (Arc::clone(&inside), Arc::clone(&peak));
            move |ctx: &mut Context| -> std::io::Result<()> {
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                inside.fetch_sub(1, Ordering::SeqCst);
                ctx.write(StatusCode::OK, b"done")
            }
        };
        let mut server = Server::new(Config::new());
        server.get("/slow", chain![auth, crate::middleware::limit(2), endpoint]);

        let completed = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..5 {
                s.spawn(|| {
                    let res = server.serve_request(get("/slow"), None);
                    assert_eq!(body_of(res), b"done");
                    completed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        assert_eq!(completed.load(Ordering::SeqCst), 5);
        assert!((1..=2).contains(&peak.load(Ordering::SeqCst)));
        assert_eq!(server.access_counter().get("/slow"), 0);
    }

    #[test]
    fn groups_register_through_server() {
        let mut server = Server::new(Config::new());
        server.group("/api", chain![mark("auth")]).get("/me", chain![echo_seen]);

        assert_eq!(body_of(server.serve_request(get("/api/me"), None)), b"auth");
        let routes = server.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/api/me");
    }
}
