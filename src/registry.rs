//! MIME type → [`Marshaler`] registry and content negotiation.
//!
//! Configure the registry at startup, then share it immutably. Use
//! [`SharedRegistry`](crate::SharedRegistry) if marshalers must change while
//! requests are being served.

use std::{collections::HashMap, sync::Arc};

use crate::{
    codec::{
        FormMarshaler, HttpBodyCodec, JsonCodec, Marshaler, Payload, PayloadMut, ProtoCodec,
        UriMarshaler,
    },
    config::EncodingConfig,
    error::{CodecError, RegistryError},
    form::{FormCodec, FormOptions, MultipartCodec, QueryCodec, UriCodec, ValuesMap},
    media_type::{self, parse_media_type},
    message::MessageOptions,
};

#[derive(Clone)]
struct FormSlot {
    marshaler: Arc<dyn Marshaler>,
    form: Arc<dyn FormMarshaler>,
}

#[derive(Clone)]
struct UriSlot {
    marshaler: Arc<dyn Marshaler>,
    uri: Arc<dyn UriMarshaler>,
}

#[derive(Clone)]
pub struct CodecRegistry {
    mime_map: HashMap<String, Arc<dyn Marshaler>>,
    query: FormSlot,
    uri: UriSlot,
    wildcard: Arc<dyn Marshaler>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut mimes: Vec<_> = self.mime_map.keys().collect();
        mimes.sort();
        f.debug_struct("CodecRegistry")
            .field("mimes", &mimes)
            .finish_non_exhaustive()
    }
}

impl CodecRegistry {
    /// A registry with the built-in marshalers.
    pub fn new() -> Self {
        Self::with_config(&EncodingConfig::default())
    }

    pub fn with_config(config: &EncodingConfig) -> Self {
        let form_options = FormOptions::from(&config.form);
        let form = || FormCodec::with_options(form_options.clone());
        let json = JsonCodec {
            pretty: config.json.pretty,
            message: MessageOptions {
                use_proto_names: config.json.use_proto_names,
                use_enum_numbers: config.json.use_enum_numbers,
            },
        };
        let query = Arc::new(QueryCodec(form()));
        let uri = Arc::new(UriCodec(form()));

        let mut mime_map: HashMap<String, Arc<dyn Marshaler>> = HashMap::new();
        mime_map.insert(media_type::POST_FORM.into(), Arc::new(form()));
        mime_map.insert(
            media_type::MULTIPART_POST_FORM.into(),
            Arc::new(MultipartCodec(form())),
        );
        mime_map.insert(media_type::JSON.into(), Arc::new(json.clone()));
        mime_map.insert(media_type::PROTOBUF.into(), Arc::new(ProtoCodec));
        #[cfg(feature = "xml")]
        {
            let xml: Arc<dyn Marshaler> = Arc::new(crate::codec::XmlCodec);
            mime_map.insert(media_type::XML.into(), xml.clone());
            mime_map.insert(media_type::XML2.into(), xml);
        }
        #[cfg(feature = "msgpack")]
        {
            let msgpack: Arc<dyn Marshaler> = Arc::new(crate::codec::MsgpackCodec);
            mime_map.insert(media_type::MSGPACK.into(), msgpack.clone());
            mime_map.insert(media_type::MSGPACK2.into(), msgpack);
        }
        #[cfg(feature = "yaml")]
        mime_map.insert(media_type::YAML.into(), Arc::new(crate::codec::YamlCodec));
        #[cfg(feature = "toml")]
        mime_map.insert(media_type::TOML.into(), Arc::new(crate::codec::TomlCodec));

        Self {
            mime_map,
            query: FormSlot {
                marshaler: query.clone(),
                form: query,
            },
            uri: UriSlot {
                marshaler: uri.clone(),
                uri,
            },
            wildcard: Arc::new(HttpBodyCodec::new(Arc::new(json))),
        }
    }

    /// Registers `marshaler` for `mime`, overriding any earlier one.
    ///
    /// [`QUERY`](media_type::QUERY) needs a form marshaler and
    /// [`URI`](media_type::URI) a URI marshaler. [`WILDCARD`](media_type::WILDCARD)
    /// accepts anything.
    pub fn register(
        &mut self,
        mime: &str,
        marshaler: Arc<dyn Marshaler>,
    ) -> Result<(), RegistryError> {
        if mime.is_empty() {
            return Err(RegistryError::EmptyMime);
        }

        match mime {
            media_type::QUERY => {
                let Some(form) = marshaler.clone().into_form() else {
                    return Err(RegistryError::CapabilityMismatch {
                        mime: mime.to_string(),
                        capability: "FormMarshaler",
                    });
                };
                self.query = FormSlot { marshaler, form };
            }
            media_type::URI => {
                let Some(uri) = marshaler.clone().into_uri() else {
                    return Err(RegistryError::CapabilityMismatch {
                        mime: mime.to_string(),
                        capability: "UriMarshaler",
                    });
                };
                self.uri = UriSlot { marshaler, uri };
            }
            media_type::WILDCARD => {
                self.wildcard = marshaler;
            }
            _ => {
                if self.mime_map.insert(mime.to_string(), marshaler).is_some() {
                    tracing::debug!(mime, "marshaler overridden");
                    return Ok(());
                }
            }
        }
        tracing::debug!(mime, "marshaler registered");
        Ok(())
    }

    /// The marshaler for `mime`, or the wildcard one.
    pub fn get(&self, mime: &str) -> &Arc<dyn Marshaler> {
        match mime {
            media_type::QUERY => &self.query.marshaler,
            media_type::URI => &self.uri.marshaler,
            media_type::WILDCARD => &self.wildcard,
            _ => self.mime_map.get(mime).unwrap_or(&self.wildcard),
        }
    }

    pub fn contains(&self, mime: &str) -> bool {
        media_type::is_reserved(mime) || self.mime_map.contains_key(mime)
    }

    /// Removes `mime`. The reserved slots can only be overridden.
    pub fn delete(&mut self, mime: &str) -> Result<(), RegistryError> {
        if media_type::is_reserved(mime) {
            return Err(RegistryError::ReservedMime {
                mime: mime.to_string(),
            });
        }
        if self.mime_map.remove(mime).is_some() {
            tracing::debug!(mime, "marshaler removed");
        }
        Ok(())
    }

    pub fn query(&self) -> &Arc<dyn FormMarshaler> {
        &self.query.form
    }

    pub fn uri(&self) -> &Arc<dyn UriMarshaler> {
        &self.uri.uri
    }

    pub fn wildcard(&self) -> &Arc<dyn Marshaler> {
        &self.wildcard
    }

    /// Picks the marshaler for a body described by `Content-Type` values.
    ///
    /// The first value, in order, whose media type is registered wins.
    /// Unparsable values are skipped. Falls back to `("*", wildcard)`.
    pub fn resolve_inbound<I>(&self, header_values: I) -> (String, &Arc<dyn Marshaler>)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for value in header_values {
            let value = value.as_ref();
            let Some(essence) = parse_media_type(value) else {
                tracing::trace!(value, "skip unparsable content type");
                continue;
            };
            if let Some(marshaler) = self.mime_map.get(&essence) {
                return (essence, marshaler);
            }
        }
        tracing::trace!("no registered content type, use wildcard");
        (media_type::WILDCARD.to_string(), &self.wildcard)
    }

    /// Picks the marshaler for a response from `Accept` values.
    ///
    /// Each value is split on `,`. The first entry that is registered verbatim
    /// wins; quality parameters are not ranked.
    pub fn resolve_outbound<I>(&self, header_values: I) -> &Arc<dyn Marshaler>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for value in header_values {
            for entry in media_type::accept_entries(value.as_ref()) {
                if let Some(marshaler) = self.mime_map.get(entry) {
                    return marshaler;
                }
            }
        }
        tracing::trace!("no registered accept entry, use wildcard");
        &self.wildcard
    }

    pub fn encode(&self, content_type: &str, value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
        self.get(content_type).marshal(value)
    }

    pub fn encode_query(&self, value: &dyn Payload) -> Result<ValuesMap, CodecError> {
        self.query.form.encode(value)
    }

    /// Expands a path template such as `/v1/{name}/sub/{sub.name}` from the fields of `value`.
    pub fn encode_url(
        &self,
        template: &str,
        value: &dyn Payload,
        include_query: bool,
    ) -> Result<String, CodecError> {
        self.uri.uri.encode_url(template, value, include_query)
    }

    /// Decodes path parameters the router extracted.
    pub fn bind_uri(&self, values: &ValuesMap, target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        self.uri.uri.decode(values, target)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use serde::{Deserialize, Serialize};
    use tracing_test::traced_test;

    use super::*;

    struct Plain;

    impl Marshaler for Plain {
        fn content_type(&self, _value: &dyn Payload) -> Cow<'static, str> {
            Cow::Borrowed("text/plain")
        }

        fn marshal(&self, _value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
            Ok(b"plain".to_vec())
        }

        fn unmarshal(&self, _data: &[u8], _target: &mut dyn PayloadMut) -> Result<(), CodecError> {
            Ok(())
        }
    }

    fn plain() -> Arc<dyn Marshaler> {
        Arc::new(Plain)
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Hello {
        id: String,
    }

    #[cfg(all(feature = "xml", feature = "yaml", feature = "toml", feature = "msgpack"))]
    #[test]
    fn test_defaults() {
        let registry = CodecRegistry::new();
        let value = Hello::default();
        let cases = [
            (media_type::JSON, "application/json; charset=utf-8"),
            (media_type::XML, "application/xml; charset=utf-8"),
            (media_type::XML2, "application/xml; charset=utf-8"),
            (media_type::YAML, "application/x-yaml; charset=utf-8"),
            (media_type::TOML, "application/toml; charset=utf-8"),
            (media_type::MSGPACK, "application/x-msgpack"),
            (media_type::MSGPACK2, "application/x-msgpack"),
            (media_type::PROTOBUF, "application/x-protobuf"),
            (media_type::POST_FORM, "application/x-www-form-urlencoded; charset=utf-8"),
            (media_type::MULTIPART_POST_FORM, "multipart/form-data"),
            (media_type::QUERY, "__MIME__/Query"),
            (media_type::URI, "__MIME__/URI"),
            (media_type::WILDCARD, "application/json; charset=utf-8"),
        ];
        for (mime, content_type) in cases {
            assert!(registry.contains(mime), "{mime}");
            assert_eq!(registry.get(mime).content_type(&value), content_type, "{mime}");
        }
    }

    #[test]
    fn test_register_then_get() {
        let mut registry = CodecRegistry::new();
        let marshaler = plain();
        registry.register("application/x-custom", marshaler.clone()).unwrap();
        assert!(Arc::ptr_eq(registry.get("application/x-custom"), &marshaler));

        // override
        let other = plain();
        registry.register(media_type::JSON, other.clone()).unwrap();
        assert!(Arc::ptr_eq(registry.get(media_type::JSON), &other));
    }

    #[test]
    fn test_register_empty_mime() {
        let mut registry = CodecRegistry::new();
        assert_eq!(
            registry.register("", plain()).unwrap_err(),
            RegistryError::EmptyMime
        );
    }

    #[test]
    fn test_register_reserved_slots() {
        let mut registry = CodecRegistry::new();
        let before = registry.get(media_type::QUERY).clone();
        let err = registry.register(media_type::QUERY, plain()).unwrap_err();
        assert!(matches!(err, RegistryError::CapabilityMismatch { .. }));
        assert!(Arc::ptr_eq(registry.get(media_type::QUERY), &before));

        let err = registry.register(media_type::URI, plain()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "encoding: marshaler for __MIME__/URI must implement UriMarshaler"
        );

        // a form codec is a valid query codec, but not a URI codec
        let form: Arc<dyn Marshaler> = Arc::new(FormCodec::new());
        registry.register(media_type::QUERY, form.clone()).unwrap();
        assert!(Arc::ptr_eq(registry.get(media_type::QUERY), &form));
        assert!(registry.register(media_type::URI, form).is_err());

        let uri: Arc<dyn Marshaler> = Arc::new(UriCodec::default());
        registry.register(media_type::URI, uri.clone()).unwrap();
        assert!(Arc::ptr_eq(registry.get(media_type::URI), &uri));

        let wildcard = plain();
        registry.register(media_type::WILDCARD, wildcard.clone()).unwrap();
        assert!(Arc::ptr_eq(registry.get(media_type::WILDCARD), &wildcard));
        assert!(Arc::ptr_eq(registry.get("application/unknown"), &wildcard));
    }

    #[test]
    fn test_delete() {
        let mut registry = CodecRegistry::new();
        for mime in [media_type::QUERY, media_type::URI, media_type::WILDCARD] {
            let err = registry.delete(mime).unwrap_err();
            assert_eq!(
                err,
                RegistryError::ReservedMime {
                    mime: mime.to_string()
                }
            );
            assert!(registry.contains(mime));
        }

        registry.delete(media_type::JSON).unwrap();
        assert!(!registry.contains(media_type::JSON));
        assert!(Arc::ptr_eq(registry.get(media_type::JSON), registry.wildcard()));
        // absent key
        registry.delete(media_type::JSON).unwrap();
    }

    #[cfg(all(feature = "xml", feature = "yaml", feature = "toml", feature = "msgpack"))]
    #[test]
    fn test_resolve_inbound() {
        let registry = CodecRegistry::new();

        let (mime, marshaler) = registry.resolve_inbound(["application/json; charset=utf-8"]);
        assert_eq!(mime, media_type::JSON);
        assert!(Arc::ptr_eq(marshaler, registry.get(media_type::JSON)));

        let (mime, _) = registry.resolve_inbound(["Application/XML"]);
        assert_eq!(mime, media_type::XML);

        // first match in order, unparsable skipped
        let (mime, _) = registry.resolve_inbound(["???", "text/unknown", "application/x-yaml", "application/json"]);
        assert_eq!(mime, media_type::YAML);

        let (mime, marshaler) = registry.resolve_inbound(Vec::<String>::new());
        assert_eq!(mime, media_type::WILDCARD);
        assert!(Arc::ptr_eq(marshaler, registry.wildcard()));

        let (mime, _) = registry.resolve_inbound(["garbage/not-a-mime;;;", "text/unknown"]);
        assert_eq!(mime, media_type::WILDCARD);
    }

    #[cfg(all(feature = "xml", feature = "yaml", feature = "toml", feature = "msgpack"))]
    #[test]
    fn test_resolve_outbound() {
        let registry = CodecRegistry::new();

        let marshaler = registry.resolve_outbound(["text/html, application/xml;q=0.9, application/json"]);
        assert!(Arc::ptr_eq(marshaler, registry.get(media_type::JSON)));

        let marshaler = registry.resolve_outbound(["application/x-yaml", "application/json"]);
        assert!(Arc::ptr_eq(marshaler, registry.get(media_type::YAML)));

        let marshaler = registry.resolve_outbound(["text/html", " application/toml "]);
        assert!(Arc::ptr_eq(marshaler, registry.get(media_type::TOML)));

        let marshaler = registry.resolve_outbound(["*/*"]);
        assert!(Arc::ptr_eq(marshaler, registry.wildcard()));

        let marshaler = registry.resolve_outbound(Vec::<&str>::new());
        assert!(Arc::ptr_eq(marshaler, registry.wildcard()));
    }

    #[test]
    fn test_encode_helpers() {
        let registry = CodecRegistry::new();
        let value = Hello { id: "foo".into() };

        assert_eq!(registry.encode(media_type::JSON, &value).unwrap(), br#"{"id":"foo"}"#);
        let values = registry.encode_query(&value).unwrap();
        assert_eq!(values.first("id"), Some("foo"));
        assert_eq!(
            registry.encode_url("/hello/{id}", &value, false).unwrap(),
            "/hello/foo"
        );

        let mut got = Hello::default();
        registry.bind_uri(&values, &mut got).unwrap();
        assert_eq!(got, value);
    }

    #[test]
    fn test_with_config() {
        let mut config = EncodingConfig::default();
        config.form.comma_separated = true;
        config.json.pretty = true;
        let registry = CodecRegistry::with_config(&config);

        #[derive(Serialize)]
        struct Ids {
            ids: Vec<u8>,
        }

        let values = registry.encode_query(&Ids { ids: vec![1, 2] }).unwrap();
        assert_eq!(values.get("ids").unwrap(), &["1,2"]);
        let data = registry.encode(media_type::JSON, &Hello { id: "a".into() }).unwrap();
        assert_eq!(String::from_utf8(data).unwrap(), "{\n  \"id\": \"a\"\n}");
    }

    #[traced_test]
    #[test]
    fn test_override_is_logged() {
        let mut registry = CodecRegistry::new();
        registry.register(media_type::JSON, plain()).unwrap();
        assert!(logs_contain("marshaler overridden"));
    }
}
