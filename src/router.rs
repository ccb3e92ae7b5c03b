//! Exact-match route tables.
//!
//! Three tables: `GET`, `POST`, and a catch-all `ANY` consulted when the
//! method-specific table has no entry. Paths are matched literally, with no
//! parameters or wildcards. Tables are filled before serving starts and only
//! read afterwards, so lookups take no lock.

use std::collections::HashMap;

use http::Method;

use crate::handler::Chain;

/// The application's route tables.
#[derive(Clone, Default)]
pub struct Router {
    get: HashMap<String, Chain>,
    post: HashMap<String, Chain>,
    any: HashMap<String, Chain>,
}

/// One line of the route table printout.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteInfo {
    pub method: &'static str,
    pub path: String,
    pub handler: &'static str,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering the same path twice replaces the earlier chain.
    pub fn get(&mut self, path: &str, chain: Chain) -> &mut Self {
        self.get.insert(path.to_owned(), chain);
        self
    }

    pub fn post(&mut self, path: &str, chain: Chain) -> &mut Self {
        self.post.insert(path.to_owned(), chain);
        self
    }

    /// Matches every method, after the `GET`/`POST` tables.
    pub fn any(&mut self, path: &str, chain: Chain) -> &mut Self {
        self.any.insert(path.to_owned(), chain);
        self
    }

    /// Resolves `path` (surrounding whitespace trimmed) for `method`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<&Chain> {
        let path = path.trim();
        let table = if method == Method::GET {
            Some(&self.get)
        } else if method == Method::POST {
            Some(&self.post)
        } else {
            None
        };
        table
            .and_then(|t| t.get(path))
            .or_else(|| self.any.get(path))
    }

    /// Every non-empty route, sorted by path then method. `ANY` routes are
    /// listed once for `GET` and once for `POST`.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let tables: [(&'static str, &HashMap<String, Chain>); 4] = [
            ("GET", &self.get),
            ("POST", &self.post),
            ("GET", &self.any),
            ("POST", &self.any),
        ];
        let mut routes: Vec<RouteInfo> = tables
            .into_iter()
            .flat_map(|(method, table)| {
                table.iter().filter_map(move |(path, chain)| {
                    Some(RouteInfo {
                        method,
                        path: path.clone(),
                        handler: chain.endpoint_name()?,
                    })
                })
            })
            .collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path).then(a.method.cmp(b.method)));
        routes
    }
}

/// A path prefix plus leading middleware, applied to every route
/// registered through it. Setup-time sugar over [`Router`].
///
/// ```rust
/// use kite::{Config, Context, Server, chain};
///
/// fn auth(_: &mut Context) {}
/// fn list(_: &mut Context) {}
/// fn index(_: &mut Context) {}
///
/// let mut server = Server::new(Config::new());
/// let mut api = server.group("/api", chain![auth]);
/// api.get("/users", chain![list]);  // GET /api/users → auth, list
/// api.get("/", chain![index]);      // GET /api       → auth, index
/// ```
pub struct Group<'a> {
    router: &'a mut Router,
    prefix: String,
    middleware: Chain,
}

impl<'a> Group<'a> {
    pub(crate) fn new(router: &'a mut Router, prefix: &str, middleware: Chain) -> Self {
        Self { router, prefix: prefix.to_owned(), middleware }
    }

    fn prepare(&self, path: &str, chain: &Chain) -> (String, Chain) {
        let path = if path == "/" { "" } else { path };
        (format!("{}{path}", self.prefix), self.middleware.join(chain))
    }

    pub fn get(&mut self, path: &str, chain: Chain) -> &mut Self {
        let (path, chain) = self.prepare(path, &chain);
        self.router.get(&path, chain);
        self
    }

    pub fn post(&mut self, path: &str, chain: Chain) -> &mut Self {
        let (path, chain) = self.prepare(path, &chain);
        self.router.post(&path, chain);
        self
    }

    pub fn any(&mut self, path: &str, chain: Chain) -> &mut Self {
        let (path, chain) = self.prepare(path, &chain);
        self.router.any(&path, chain);
        self
    }
}
