use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use http::{Method, StatusCode};

use crate::context::Context;

/// Cross-origin settings. Empty fields fall back to the defaults.
#[derive(Clone, Debug)]
pub struct CorsOptions {
    pub allow_origin: String,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub max_age: u32,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_owned(),
            allow_methods: vec!["GET".to_owned(), "POST".to_owned()],
            allow_headers: Vec::new(),
            max_age: 3600,
        }
    }
}

/// `OPTIONS` preflights get the full set of `Access-Control-*` headers, a
/// `204` and an aborted chain. Every other request gets
/// `Access-Control-Allow-Origin` and continues.
pub fn cors(options: CorsOptions) -> impl Fn(&mut Context) + Send + Sync + 'static {
    let defaults = CorsOptions::default();
    let origin = if options.allow_origin.is_empty() {
        defaults.allow_origin
    } else {
        options.allow_origin
    };
    let methods = if options.allow_methods.is_empty() {
        defaults.allow_methods
    } else {
        options.allow_methods
    };
    let max_age = if options.max_age == 0 { defaults.max_age } else { options.max_age };
    let methods = methods.join(",");
    let headers = options.allow_headers.join(",");
    let max_age = max_age.to_string();

    move |ctx: &mut Context| {
        let preflight = ctx.request().method() == Method::OPTIONS;
        let res = ctx.response_mut();
        res.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, &origin);
        if preflight {
            res.set_header(ACCESS_CONTROL_ALLOW_METHODS, &methods);
            res.set_header(ACCESS_CONTROL_ALLOW_HEADERS, &headers);
            res.set_header(ACCESS_CONTROL_MAX_AGE, &max_age);
            res.write_header(StatusCode::NO_CONTENT);
            ctx.abort();
        } else {
            ctx.next();
        }
    }
}
