use bytes::Bytes;
use http::header::CONTENT_TYPE;

use crate::context::Context;
use crate::storage::BODY_KEY;

/// Takes the request body once and caches it under [`BODY_KEY`].
///
/// The `Content-Type` essence (lower-cased, parameters dropped) becomes
/// [`Context::content_type`]. A missing or unparsable `Content-Type` leaves
/// the content type empty and caches an empty body.
pub fn body_parser() -> impl Fn(&mut Context) + Send + Sync + 'static {
    |ctx: &mut Context| {
        let body = ctx.request_mut().take_body();
        let media = ctx
            .request()
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok());

        match media {
            Some(media) => {
                ctx.set_content_type(media.essence_str());
                ctx.storage_mut().set(BODY_KEY, body);
            }
            None => ctx.storage_mut().set(BODY_KEY, Bytes::new()),
        }
    }
}
