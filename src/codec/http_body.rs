use std::{borrow::Cow, sync::Arc};

use super::{JsonCodec, Marshaler, Payload, PayloadMut};
use crate::error::CodecError;

/// Passes [`HttpBody`](super::HttpBody) payloads through verbatim and hands
/// everything else to `inner`.
#[derive(Clone)]
pub struct HttpBodyCodec {
    inner: Arc<dyn Marshaler>,
}

impl HttpBodyCodec {
    pub fn new(inner: Arc<dyn Marshaler>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<dyn Marshaler> {
        &self.inner
    }
}

impl Default for HttpBodyCodec {
    fn default() -> Self {
        Self::new(Arc::new(JsonCodec::default()))
    }
}

impl std::fmt::Debug for HttpBodyCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBodyCodec").finish_non_exhaustive()
    }
}

impl Marshaler for HttpBodyCodec {
    fn content_type(&self, value: &dyn Payload) -> Cow<'static, str> {
        match value.as_http_body() {
            Some(body) => Cow::Owned(body.content_type.clone()),
            None => self.inner.content_type(value),
        }
    }

    fn marshal(&self, value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
        match value.as_http_body() {
            Some(body) => Ok(body.data.clone()),
            None => self.inner.marshal(value),
        }
    }

    fn unmarshal(&self, data: &[u8], target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        if let Some(body) = target.as_http_body_mut() {
            body.data = data.to_vec();
            return Ok(());
        }
        self.inner.unmarshal(data, target)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::codec::HttpBody;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Hello {
        id: String,
    }

    #[test]
    fn test_raw_body_passes_through() {
        let codec = HttpBodyCodec::default();
        let body = HttpBody::new("image/png", vec![0x89, b'P', b'N', b'G']);
        assert_eq!(codec.content_type(&body), "image/png");
        assert_eq!(codec.marshal(&body).unwrap(), body.data);

        let mut got = HttpBody::default();
        codec.unmarshal(b"raw bytes", &mut got).unwrap();
        assert_eq!(got.data, b"raw bytes");
    }

    #[test]
    fn test_other_values_use_inner() {
        let codec = HttpBodyCodec::default();
        let value = Hello { id: "foo".into() };
        assert_eq!(codec.content_type(&value), "application/json; charset=utf-8");
        assert_eq!(codec.marshal(&value).unwrap(), br#"{"id":"foo"}"#);

        let mut got = Hello::default();
        codec.unmarshal(br#"{"id":"bar"}"#, &mut got).unwrap();
        assert_eq!(got.id, "bar");
    }
}
