//! Form codec: records to and from [`ValuesMap`], nested fields keyed as `a.b`.

use std::{borrow::Cow, cell::RefCell, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    codec::{FormMarshaler, Marshaler, Payload, PayloadMut, UriMarshaler},
    config::FormConfig,
    error::CodecError,
    media_type,
    message::MessageOptions,
};

mod de;
pub mod error;
pub mod scalar;
mod ser;
pub mod uri;
pub mod values;

pub use error::FormError;
pub use scalar::{KindSet, ScalarKind};
pub use values::ValuesMap;

#[derive(Debug, Clone, Default)]
pub struct FormOptions {
    /// sequences of these kinds are written as one comma-joined value
    pub encode_comma: KindSet,
    /// values of sequences of these kinds are split on `,`
    pub decode_comma: KindSet,
    pub message: MessageOptions,
}

impl From<&FormConfig> for FormOptions {
    fn from(config: &FormConfig) -> Self {
        let kinds = if config.comma_separated {
            KindSet::all()
        } else {
            KindSet::EMPTY
        };
        FormOptions {
            encode_comma: kinds,
            decode_comma: kinds,
            message: MessageOptions {
                use_proto_names: config.use_proto_names,
                use_enum_numbers: config.use_enum_numbers,
            },
        }
    }
}

pub(crate) fn child_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Encodes `value` into form values. Keys with no values are dropped.
pub fn to_values<T: ?Sized + Serialize>(
    value: &T,
    options: &FormOptions,
) -> Result<ValuesMap, FormError> {
    let mut out = ValuesMap::new();
    value.serialize(ser::ValueSerializer::root(&mut out, options))?;
    out.prune_empty();
    Ok(out)
}

pub fn from_values<T: DeserializeOwned>(
    values: &ValuesMap,
    options: &FormOptions,
) -> Result<T, FormError> {
    let root = de::Node::build(values);
    T::deserialize(de::NodeDeserializer::root(&root, de::Context::new(options)))
}

/// `application/x-www-form-urlencoded` codec, also the engine behind the other form variants.
#[derive(Debug, Clone, Default)]
pub struct FormCodec {
    options: FormOptions,
}

impl FormCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FormOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn disable_use_proto_names(mut self) -> Self {
        self.options.message.use_proto_names = false;
        self
    }

    pub fn disable_use_enum_numbers(mut self) -> Self {
        self.options.message.use_enum_numbers = false;
        self
    }

    pub fn register_encoder_comma_kind(mut self, kind: ScalarKind) -> Self {
        self.options.encode_comma.insert(kind);
        self
    }

    pub fn register_decoder_comma_kind(mut self, kind: ScalarKind) -> Self {
        self.options.decode_comma.insert(kind);
        self
    }

    /// Every scalar kind, both directions.
    pub fn register_builtin_comma_kinds(mut self) -> Self {
        self.options.encode_comma = KindSet::all();
        self.options.decode_comma = KindSet::all();
        self
    }

    fn encode_values(&self, value: &dyn Payload) -> Result<ValuesMap, CodecError> {
        let mut out = if let Some(message) = value.as_message() {
            message.encode_fields(&self.options.message)?
        } else if let Some(value) = value.as_serialize() {
            let mut out = ValuesMap::new();
            value.serialize(ser::ValueSerializer::root(&mut out, &self.options))?;
            out
        } else {
            return Err(CodecError::Unsupported {
                codec: "form",
                reason: "value is neither serializable nor a structured message",
            });
        };
        out.prune_empty();
        Ok(out)
    }

    fn decode_values(&self, values: &ValuesMap, target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        if let Some(message) = target.as_message_mut() {
            return message.decode_fields(values);
        }
        let Some(target) = target.as_deserialize() else {
            return Err(CodecError::Unsupported {
                codec: "form",
                reason: "target is neither deserializable nor a structured message",
            });
        };

        let root = de::Node::build(values);
        let failure = RefCell::new(None);
        let cx = de::Context::keep_failure(&self.options, &failure);
        let mut erased =
            <dyn erased_serde::Deserializer>::erase(de::NodeDeserializer::root(&root, cx));
        target.erased_deserialize(&mut erased).map_err(|e| match failure.take() {
            // the erased error only carries our message, recover the typed one
            Some(form) if form.to_string() == e.to_string() => CodecError::Form(form),
            _ => CodecError::format("form", e),
        })
    }
}

macro_rules! form_wrapper {
    ($($(#[$meta:meta])* $codec:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Default)]
            pub struct $codec(pub FormCodec);

            impl $codec {
                fn codec(&self) -> &FormCodec {
                    &self.0
                }
            }

            impl From<FormCodec> for $codec {
                fn from(codec: FormCodec) -> Self {
                    Self(codec)
                }
            }
        )*
    };
}

form_wrapper! {
    /// Decodes values the host framework already parsed out of a `multipart/form-data` body.
    MultipartCodec,
    QueryCodec,
    /// Path parameters, plus [`UriMarshaler::encode_url`].
    UriCodec,
}

impl FormCodec {
    fn codec(&self) -> &FormCodec {
        self
    }
}

macro_rules! form_marshaler {
    ($($codec:ty => $content_type:expr; [$($extra:tt)*]),* $(,)?) => {
        $(
            impl Marshaler for $codec {
                fn content_type(&self, _value: &dyn Payload) -> Cow<'static, str> {
                    Cow::Borrowed($content_type)
                }

                fn marshal(&self, value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
                    let values = self.codec().encode_values(value)?;
                    Ok(values.to_query_string()?.into_bytes())
                }

                fn unmarshal(&self, data: &[u8], target: &mut dyn PayloadMut) -> Result<(), CodecError> {
                    let input = std::str::from_utf8(data).map_err(|e| CodecError::format("form", e))?;
                    let values = ValuesMap::parse_query(input)?;
                    self.codec().decode_values(&values, target)
                }

                fn into_form(self: Arc<Self>) -> Option<Arc<dyn FormMarshaler>> {
                    Some(self)
                }

                $($extra)*
            }

            impl FormMarshaler for $codec {
                fn encode(&self, value: &dyn Payload) -> Result<ValuesMap, CodecError> {
                    self.codec().encode_values(value)
                }

                fn decode(&self, values: &ValuesMap, target: &mut dyn PayloadMut) -> Result<(), CodecError> {
                    self.codec().decode_values(values, target)
                }
            }
        )*
    };
}

form_marshaler! {
    FormCodec => "application/x-www-form-urlencoded; charset=utf-8"; [],
    MultipartCodec => media_type::MULTIPART_POST_FORM; [],
    QueryCodec => "__MIME__/Query"; [],
    UriCodec => media_type::URI; [
        fn into_uri(self: Arc<Self>) -> Option<Arc<dyn UriMarshaler>> {
            Some(self)
        }
    ],
}

impl UriMarshaler for UriCodec {
    fn encode_url(
        &self,
        template: &str,
        value: &dyn Payload,
        include_query: bool,
    ) -> Result<String, CodecError> {
        let values = self.0.encode_values(value)?;
        Ok(uri::encode_url(template, &values, include_query)?)
    }
}
