//! End-to-end tests over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use http::StatusCode;
use kite::bind::{Bind, Field, Lang, Rule};
use kite::{Config, Context, Error, Failure, Flow, RunMode, Server, chain, middleware, throw};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Signup {
    name: String,
    age: i64,
    newsletter: bool,
}

impl Bind for Signup {
    fn fields(&mut self) -> Vec<Field<'_>> {
        vec![
            Field::new("name", &mut self.name).rule(Rule::Required),
            Field::new("age", &mut self.age).default("18"),
            Field::new("newsletter", &mut self.newsletter).default("true"),
        ]
    }
}

fn signup(ctx: &mut Context) -> Result<(), Failure> {
    let mut form = Signup::default();
    ctx.bind(&mut form)?;
    let body = format!("{} {} {}", form.name, form.age, form.newsletter);
    ctx.write(StatusCode::OK, body.as_bytes())?;
    Ok(())
}

fn fail(_: &mut Context) -> Flow {
    throw(Error::new(42, "bad"))
}

fn crash(_: &mut Context) -> Flow {
    panic!("database password is hunter2")
}

fn slow(ctx: &mut Context) -> std::io::Result<()> {
    std::thread::sleep(Duration::from_millis(30));
    let in_flight = ctx.access_counter().get("/slow");
    ctx.write(StatusCode::OK, in_flight.to_string().as_bytes())
}

fn authenticate(_: &mut Context) {
    std::thread::sleep(Duration::from_millis(20));
}

static INSIDE: AtomicI64 = AtomicI64::new(0);
static PEAK: AtomicI64 = AtomicI64::new(0);

fn throttled(ctx: &mut Context) -> std::io::Result<()> {
    let now = INSIDE.fetch_add(1, Ordering::SeqCst) + 1;
    PEAK.fetch_max(now, Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    INSIDE.fetch_sub(1, Ordering::SeqCst);
    ctx.write(StatusCode::OK, b"ok")
}

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<Result<(), kite::ServeError>>,
}

async fn start(mode: RunMode) -> Running {
    let mut server = Server::new(Config::new().mode(mode).lang(Lang::English));
    server.use_middleware(chain![middleware::cors(Default::default())]);
    server
        .get("/signup", chain![signup])
        .post("/signup", chain![signup])
        .get("/fail", chain![fail])
        .get("/crash", chain![crash])
        .get("/throttled", chain![authenticate, middleware::limit(2), throttled]);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve(listener, async move {
        let _ = stopped.await;
    }));
    Running { addr, stop, task }
}

impl Running {
    async fn shutdown(self) {
        let _ = self.stop.send(());
        self.task.await.unwrap().unwrap();
    }
}

/// Sends one HTTP/1.1 request and returns (status, raw headers, body).
async fn send(addr: SocketAddr, raw: &str) -> (u16, String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let text = String::from_utf8(buf).unwrap();

    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let status = head.split(' ').nth(1).unwrap().parse().unwrap();
    (status, head.to_ascii_lowercase(), body.to_owned())
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n")
}

fn post(path: &str, content_type: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\
         content-type: {content_type}\r\ncontent-length: {}\r\n\r\n{body}",
        body.len()
    )
}

#[tokio::test]
async fn binds_query_form_and_json() {
    let app = start(RunMode::Release).await;

    let (status, _, body) = send(app.addr, &get("/signup?name=Alice&age=30")).await;
    assert_eq!(status, 200);
    assert_eq!(body, "Alice 30 true");

    // Explicit zero is indistinguishable from absent: the default wins.
    let (_, _, body) = send(
        app.addr,
        &post("/signup", "application/x-www-form-urlencoded", "name=Bob&age=0&newsletter=false"),
    )
    .await;
    assert_eq!(body, "Bob 18 true");

    let json = post("/signup", "application/json; charset=utf-8", r#"{"name":"Eve","age":0}"#);
    let (_, _, body) = send(app.addr, &json).await;
    assert_eq!(body, "Eve 18 true");

    let (status, _, body) = send(app.addr, &post("/signup", "text/plain", "name=x")).await;
    assert_eq!(status, 400);
    assert!(body.starts_with(r#"{"code":400,"msg":"unsupported request"#), "{body}");

    app.shutdown().await;
}

#[tokio::test]
async fn errors_map_to_400_and_500() {
    for mode in [RunMode::Debug, RunMode::Release] {
        let app = start(mode).await;

        let (status, head, body) = send(app.addr, &get("/fail")).await;
        assert_eq!(status, 400);
        assert!(head.contains("content-type: application/json"));
        assert_eq!(body, r#"{"code":42,"msg":"bad"}"#);

        let (status, _, body) = send(app.addr, &get("/crash")).await;
        assert_eq!(status, 500);
        assert_eq!(body, "internal server error");
        assert!(!body.contains("hunter2"));

        let (status, _, body) = send(app.addr, &get("/signup")).await;
        assert_eq!(status, 400);
        assert_eq!(body, r#"{"code":400,"msg":"name is a required field"}"#);

        app.shutdown().await;
    }
}

#[tokio::test]
async fn unknown_route_is_404_with_cors_header() {
    let app = start(RunMode::Release).await;

    let (status, head, body) = send(app.addr, &get("/missing")).await;
    assert_eq!(status, 404);
    assert_eq!(body, "handler not exist");
    assert!(head.contains("access-control-allow-origin: *"));

    let preflight = "OPTIONS /signup HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n";
    let (status, head, _) = send(app.addr, preflight).await;
    assert_eq!(status, 204);
    assert!(head.contains("access-control-allow-methods: get,post"));

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_count_returns_to_zero() {
    let mut server = Server::new(Config::new());
    server.get("/slow", chain![slow]);
    let counter = Arc::clone(server.access_counter());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve(listener, async move {
        let _ = stopped.await;
    }));

    let requests: Vec<_> = (0..8)
        .map(|_| tokio::spawn(async move { send(addr, &get("/slow")).await }))
        .collect();
    for request in requests {
        let (status, _, body) = request.await.unwrap();
        assert_eq!(status, 200);
        let seen: i64 = body.parse().unwrap();
        assert!((1..=8).contains(&seen), "{seen}");
    }
    assert_eq!(counter.get("/slow"), 0);

    let _ = stop.send(());
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn limit_lets_every_request_of_a_burst_through() {
    let app = start(RunMode::Release).await;
    let addr = app.addr;

    let requests: Vec<_> = (0..6)
        .map(|_| tokio::spawn(async move { send(addr, &get("/throttled")).await }))
        .collect();
    for request in requests {
        let (status, _, body) = tokio::time::timeout(Duration::from_secs(5), request)
            .await
            .expect("request stalled behind the limiter")
            .unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, "ok");
    }
    let peak = PEAK.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak {peak}");

    app.shutdown().await;
}
