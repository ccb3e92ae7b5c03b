//! Minimal kite example: bound query/form/JSON input, grouped routes,
//! domain errors and CORS.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl 'http://localhost:3000/users?name=alice&age=30'
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"bob","tags":["a","b"]}'
//!   curl -X POST http://localhost:3000/users \
//!        -d 'name=carol&tags[]=x&tags[]=y'
//!   curl http://localhost:3000/admin/stats -H 'x-token: secret'
//!   curl http://localhost:3000/users/none

use http::StatusCode;
use kite::bind::{Bind, Field, Rule};
use kite::middleware::{CorsOptions, cors, limit};
use kite::{Config, Context, Error, Failure, Server, chain, throw};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct User {
    name: String,
    age: i64,
    tags: Vec<String>,
    active: bool,
}

impl Bind for User {
    fn fields(&mut self) -> Vec<Field<'_>> {
        vec![
            Field::new("name", &mut self.name).rule(Rule::Required).rule(Rule::Max(32.0)),
            Field::new("age", &mut self.age).default("18").rule(Rule::Min(0.0)),
            Field::list("tags", &mut self.tags).rule(Rule::Max(8.0)),
            Field::new("active", &mut self.active).default("true"),
        ]
    }
}

const UNAUTHORIZED: Error = Error { code: 1001, msg: String::new() };

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut server = Server::new(Config::from_env().access_log(true));
    server.use_middleware(chain![cors(CorsOptions::default())]);

    server
        .get("/users", chain![limit(64), show_user])
        .post("/users", chain![show_user])
        .any("/users/none", chain![missing_user]);

    server
        .group("/admin", chain![require_token])
        .get("/stats", chain![stats]);

    if let Err(e) = server.run("0.0.0.0:3000").await {
        eprintln!("server error: {e}");
    }
}

// GET /users?name=..  |  POST /users (json or form)
fn show_user(ctx: &mut Context) -> Result<(), Failure> {
    let mut user = User::default();
    ctx.bind(&mut user)?;
    ctx.write_json(StatusCode::OK, &user)?;
    Ok(())
}

// Raised from "deep" code: the catcher answers 400 {"code":1004,...}.
fn missing_user(_ctx: &mut Context) {
    throw(Error::new(1004, "user not found"));
}

fn require_token(ctx: &mut Context) -> Result<(), Error> {
    match ctx.request().header("x-token") {
        Some("secret") => Ok(()),
        _ => Err(UNAUTHORIZED.wrap("missing or invalid token")),
    }
}

fn stats(ctx: &mut Context) -> std::io::Result<()> {
    let in_flight = ctx.access_counter().get("/users");
    let ip = ctx.client_ip();
    ctx.write(StatusCode::OK, format!("client {ip}, /users in flight: {in_flight}\n").as_bytes())
}
