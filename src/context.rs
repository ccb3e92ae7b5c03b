//! Per-request state threaded through every handler.

use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::access::AccessCounter;
use crate::bind::{self, Bind, BindError, Translator, Values};
use crate::error::ServeError;
use crate::request::Request;
use crate::response::{ContentType, ResponseWriter};
use crate::storage::{BODY_KEY, Storage};

/// Everything one request owns while it moves through the chains.
///
/// Built by the dispatcher with the continuation flag set, handed by `&mut`
/// to each handler in turn and dropped once the response is sent. Never
/// shared between requests.
pub struct Context {
    request: Request,
    response: ResponseWriter,
    storage: Storage,
    content_type: String,
    proceed: bool,
    translator: Arc<dyn Translator>,
    counter: Arc<AccessCounter>,
}

impl Context {
    pub(crate) fn new(
        request: Request,
        translator: Arc<dyn Translator>,
        counter: Arc<AccessCounter>,
    ) -> Self {
        Self {
            request,
            response: ResponseWriter::new(),
            storage: Storage::new(),
            content_type: String::new(),
            proceed: true,
            translator,
            counter,
        }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub(crate) fn request_mut(&mut self) -> &mut Request { &mut self.request }
    pub fn response(&self) -> &ResponseWriter { &self.response }
    pub fn response_mut(&mut self) -> &mut ResponseWriter { &mut self.response }
    pub fn storage(&self) -> &Storage { &self.storage }
    pub fn storage_mut(&mut self) -> &mut Storage { &mut self.storage }
    pub fn access_counter(&self) -> &AccessCounter { &self.counter }

    /// Media type resolved by the body parser, empty if none was sent.
    pub fn content_type(&self) -> &str { &self.content_type }

    pub(crate) fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    /// Lets the rest of the current chain run.
    pub fn next(&mut self) {
        self.proceed = true;
    }

    /// Stops the current chain after this handler. Bytes already written stay.
    pub fn abort(&mut self) {
        self.proceed = false;
    }

    pub fn is_continuing(&self) -> bool {
        self.proceed
    }

    /// Sets the status (if not already set) and appends `body`.
    pub fn write(&mut self, status: StatusCode, body: &[u8]) -> io::Result<()> {
        self.response.write_header(status);
        self.response.write_all(body)
    }

    /// Serialises `value`, sets `Content-Type: application/json` and writes it.
    pub fn write_json<T: Serialize + ?Sized>(
        &mut self,
        status: StatusCode,
        value: &T,
    ) -> Result<(), ServeError> {
        let body = serde_json::to_vec(value)?;
        self.response.set_content_type(ContentType::Json);
        self.write(status, &body)?;
        Ok(())
    }

    /// Body bytes cached by the body parser. Empty if there were none.
    pub fn body(&self) -> &[u8] {
        self.storage.get::<Bytes>(BODY_KEY).map(|b| &b[..]).unwrap_or_default()
    }

    /// `X-Real-Ip` if present, else the peer host (`::1` reported as
    /// `127.0.0.1`), else empty.
    pub fn client_ip(&self) -> String {
        if let Some(ip) = self.request.header("x-real-ip").filter(|ip| !ip.is_empty()) {
            return ip.to_owned();
        }
        match self.request.remote_addr() {
            Some(addr) if addr.ip().is_loopback() && addr.is_ipv6() => "127.0.0.1".to_owned(),
            Some(addr) => addr.ip().to_string(),
            None => String::new(),
        }
    }

    /// Fills `target` from the request, applies defaults and validates.
    ///
    /// - `POST` + `application/json`: the cached body is decoded wholesale
    ///   with serde, replacing `target`. Values set on `target` before the
    ///   call do not survive: keys missing from the body get the type's
    ///   serde default.
    /// - `POST` + `application/x-www-form-urlencoded`: fields are read one by
    ///   one from the form body, then from the query string. A key present
    ///   in both binds the body's value.
    /// - `GET`: fields are read from the query string, whatever the
    ///   content type.
    ///
    /// Anything else is [`BindError::Unsupported`].
    pub fn bind<T: Bind + DeserializeOwned>(&self, target: &mut T) -> Result<(), BindError> {
        let method = self.request.method();
        if method == http::Method::GET {
            return self.bind_query(target);
        }
        if method == http::Method::POST {
            if self.content_type == ContentType::Json.as_str() {
                *target = serde_json::from_slice(self.body())?;
                bind::apply_defaults(target);
                return bind::validate(target, &*self.translator);
            }
            if self.content_type == ContentType::Form.as_str() {
                let mut values = Values::parse(self.body())?;
                values.extend(self.query_values()?);
                return bind::bind_values(target, &values, &*self.translator);
            }
        }
        Err(BindError::Unsupported {
            method: method.to_string(),
            content_type: self.content_type.clone(),
        })
    }

    /// Binds from the query string regardless of method or body.
    pub fn bind_query<T: Bind>(&self, target: &mut T) -> Result<(), BindError> {
        let values = self.query_values()?;
        bind::bind_values(target, &values, &*self.translator)
    }

    fn query_values(&self) -> Result<Values, BindError> {
        Ok(Values::parse(self.request.query().unwrap_or_default().as_bytes())?)
    }

    pub(crate) fn into_response(self) -> ResponseWriter {
        self.response
    }
}
