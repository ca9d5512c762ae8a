use std::sync::Arc;

use http::{StatusCode, header};

use super::{HttpRequest, header_values};
use crate::{
    codec::{Marshaler, Payload},
    error::CodecError,
    registry::CodecRegistry,
};

impl CodecRegistry {
    /// Encodes `value` with the marshaler negotiated from the request's
    /// `Accept` headers.
    pub fn render<R>(
        &self,
        request: &R,
        value: &dyn Payload,
    ) -> Result<http::Response<Vec<u8>>, CodecError>
    where
        R: HttpRequest + ?Sized,
    {
        let marshaler = self.outbound_for_request(request);
        let data = marshaler.marshal(value)?;
        let response = http::Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, &*marshaler.content_type(value))
            .body(data)?;
        Ok(response)
    }

    /// The marshaler for a response body received from another service.
    pub fn inbound_for_response<B>(&self, response: &http::Response<B>) -> &Arc<dyn Marshaler> {
        let (_, marshaler) = self.resolve_inbound(header_values(response.headers(), header::CONTENT_TYPE));
        marshaler
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;
    use crate::{codec::HttpBody, media_type};

    #[derive(Serialize)]
    struct Hello {
        id: &'static str,
    }

    fn accept(value: &str) -> http::Request<Vec<u8>> {
        http::Request::builder()
            .header(header::ACCEPT, value)
            .body(Vec::new())
            .unwrap()
    }

    #[test]
    fn test_render() {
        let registry = CodecRegistry::new();
        let response = registry
            .render(&accept("application/json"), &Hello { id: "foo" })
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        assert_eq!(response.body(), br#"{"id":"foo"}"#);
    }

    #[test]
    fn test_render_form() {
        let registry = CodecRegistry::new();
        let response = registry
            .render(&accept("application/x-www-form-urlencoded"), &Hello { id: "a b" })
            .unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/x-www-form-urlencoded; charset=utf-8"
        );
        assert_eq!(response.body(), b"id=a+b");
    }

    #[test]
    fn test_render_raw_body_through_wildcard() {
        let registry = CodecRegistry::new();
        let body = HttpBody::new("text/csv", "a,b\n1,2\n");
        let response = registry.render(&accept("*/*"), &body).unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(response.body(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_render_error() {
        let registry = CodecRegistry::new();
        let err = registry
            .render(&accept("application/x-protobuf"), &Hello { id: "foo" })
            .unwrap_err();
        assert!(matches!(err, CodecError::Unsupported { .. }));
    }

    #[test]
    fn test_inbound_for_response() {
        let registry = CodecRegistry::new();
        let response = http::Response::builder()
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(())
            .unwrap();
        assert!(Arc::ptr_eq(
            registry.inbound_for_response(&response),
            registry.get(media_type::JSON)
        ));

        let response = http::Response::new(());
        assert!(Arc::ptr_eq(registry.inbound_for_response(&response), registry.wildcard()));
    }
}
