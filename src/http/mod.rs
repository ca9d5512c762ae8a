//! Wires a [`CodecRegistry`](crate::CodecRegistry) into `http` crate requests and responses.

use http::{HeaderMap, header::HeaderName};

mod request;
mod response;

pub use request::HttpRequest;

/// Values of header `name` that are valid UTF-8, in order.
fn header_values(headers: &HeaderMap, name: HeaderName) -> impl Iterator<Item = &str> {
    headers.get_all(name).into_iter().filter_map(|value| match value.to_str() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::trace!(?value, "skip non utf-8 header value");
            None
        }
    })
}
