use std::sync::Arc;

use http::{HeaderMap, Method, Uri, header};

use super::header_values;
use crate::{
    codec::{Marshaler, PayloadMut},
    error::CodecError,
    form::ValuesMap,
    media_type,
    registry::CodecRegistry,
};

pub trait HttpRequest {
    fn method(&self) -> &Method;

    fn uri(&self) -> &Uri;

    fn headers(&self) -> &HeaderMap;

    fn body(&self) -> &[u8];

    /// Multipart form fields already parsed by the server framework.
    fn multipart_values(&self) -> Option<&ValuesMap> {
        None
    }
}

/// Multipart form values are read from the request extensions, where the
/// server puts them after parsing the body.
impl<B: AsRef<[u8]>> HttpRequest for http::Request<B> {
    fn method(&self) -> &Method {
        http::Request::method(self)
    }

    fn uri(&self) -> &Uri {
        http::Request::uri(self)
    }

    fn headers(&self) -> &HeaderMap {
        http::Request::headers(self)
    }

    fn body(&self) -> &[u8] {
        http::Request::body(self).as_ref()
    }

    fn multipart_values(&self) -> Option<&ValuesMap> {
        self.extensions().get::<ValuesMap>()
    }
}

impl CodecRegistry {
    /// The marshaler for the request body, chosen from its `Content-Type` headers.
    pub fn inbound_for_request<R>(&self, request: &R) -> (String, &Arc<dyn Marshaler>)
    where
        R: HttpRequest + ?Sized,
    {
        self.resolve_inbound(header_values(request.headers(), header::CONTENT_TYPE))
    }

    /// The marshaler for the response, chosen from the request's `Accept` headers.
    pub fn outbound_for_request<R>(&self, request: &R) -> &Arc<dyn Marshaler>
    where
        R: HttpRequest + ?Sized,
    {
        self.resolve_outbound(header_values(request.headers(), header::ACCEPT))
    }

    /// Decodes `request` into `target`.
    ///
    /// `GET` requests read the query string. Multipart requests read the
    /// already parsed form values. Everything else decodes the body with the
    /// inbound marshaler.
    pub fn bind<R>(&self, request: &R, target: &mut dyn PayloadMut) -> Result<(), CodecError>
    where
        R: HttpRequest + ?Sized,
    {
        if request.method() == Method::GET {
            return self.bind_query(request, target);
        }

        let (content_type, marshaler) = self.inbound_for_request(request);
        if content_type == media_type::MULTIPART_POST_FORM {
            let Some(form) = marshaler.clone().into_form() else {
                return Err(CodecError::Unsupported {
                    codec: "multipart",
                    reason: "registered marshaler is not a form marshaler",
                });
            };
            let Some(values) = request.multipart_values() else {
                tracing::warn!(uri = %request.uri(), "multipart request without parsed form values");
                return Err(CodecError::Unsupported {
                    codec: "multipart",
                    reason: "request carries no parsed form values",
                });
            };
            return form.decode(values, target);
        }

        let mut body = request.body();
        marshaler.new_decoder(&mut body).decode(target)?;

        if let Some(raw) = target.as_http_body_mut() {
            if let Some(value) = header_values(request.headers(), header::CONTENT_TYPE).next() {
                raw.content_type = value.to_string();
            }
        }
        Ok(())
    }

    /// Decodes the query string of `request` with the query marshaler.
    pub fn bind_query<R>(&self, request: &R, target: &mut dyn PayloadMut) -> Result<(), CodecError>
    where
        R: HttpRequest + ?Sized,
    {
        let values = ValuesMap::parse_query(request.uri().query().unwrap_or_default())?;
        self.query().decode(&values, target)
    }
}
