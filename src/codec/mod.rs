use std::{
    borrow::Cow,
    io::{Read, Write},
    sync::Arc,
};

use crate::{error::CodecError, form::ValuesMap};

mod http_body;
mod json;
#[cfg(feature = "msgpack")]
mod msgpack;
mod payload;
mod proto;
#[cfg(feature = "toml")]
mod toml;
#[cfg(feature = "xml")]
mod xml;
#[cfg(feature = "yaml")]
mod yaml;

pub use http_body::HttpBodyCodec;
pub use json::JsonCodec;
#[cfg(feature = "msgpack")]
pub use msgpack::MsgpackCodec;
pub use payload::{ErasedDeserialize, HttpBody, Payload, PayloadMut};
pub(crate) use payload::{deserialize_into, serializable};
pub use proto::ProtoCodec;
#[cfg(feature = "toml")]
pub use self::toml::TomlCodec;
#[cfg(feature = "xml")]
pub use xml::XmlCodec;
#[cfg(feature = "yaml")]
pub use yaml::YamlCodec;

pub trait Encoder {
    fn encode(&mut self, value: &dyn Payload) -> Result<(), CodecError>;
}

pub trait Decoder {
    fn decode(&mut self, target: &mut dyn PayloadMut) -> Result<(), CodecError>;
}

/// Converts payloads to and from one wire format.
pub trait Marshaler: Send + Sync + 'static {
    fn content_type(&self, value: &dyn Payload) -> Cow<'static, str>;

    fn marshal(&self, value: &dyn Payload) -> Result<Vec<u8>, CodecError>;

    fn unmarshal(&self, data: &[u8], target: &mut dyn PayloadMut) -> Result<(), CodecError>;

    fn new_encoder<'a>(&'a self, sink: &'a mut dyn Write) -> Box<dyn Encoder + 'a> {
        Box::new(MarshalEncoder {
            marshaler: self,
            sink,
        })
    }

    fn new_decoder<'a>(&'a self, source: &'a mut dyn Read) -> Box<dyn Decoder + 'a> {
        Box::new(MarshalDecoder {
            marshaler: self,
            source,
        })
    }

    /// `Some` if this marshaler also works on form values.
    fn into_form(self: Arc<Self>) -> Option<Arc<dyn FormMarshaler>> {
        None
    }

    /// `Some` if this marshaler can also expand URL templates.
    fn into_uri(self: Arc<Self>) -> Option<Arc<dyn UriMarshaler>> {
        None
    }
}

pub trait FormMarshaler: Marshaler {
    fn encode(&self, value: &dyn Payload) -> Result<ValuesMap, CodecError>;

    fn decode(&self, values: &ValuesMap, target: &mut dyn PayloadMut) -> Result<(), CodecError>;
}

pub trait UriMarshaler: FormMarshaler {
    /// Expands `{field}` placeholders in `template` with the encoded fields of `value`.
    fn encode_url(
        &self,
        template: &str,
        value: &dyn Payload,
        include_query: bool,
    ) -> Result<String, CodecError>;
}

/// Buffers one whole value through [`Marshaler::marshal`].
struct MarshalEncoder<'a, M: ?Sized> {
    marshaler: &'a M,
    sink: &'a mut dyn Write,
}

impl<M: Marshaler + ?Sized> Encoder for MarshalEncoder<'_, M> {
    fn encode(&mut self, value: &dyn Payload) -> Result<(), CodecError> {
        let data = self.marshaler.marshal(value)?;
        self.sink.write_all(&data)?;
        Ok(())
    }
}

/// Reads the source to the end, then [`Marshaler::unmarshal`].
struct MarshalDecoder<'a, M: ?Sized> {
    marshaler: &'a M,
    source: &'a mut dyn Read,
}

impl<M: Marshaler + ?Sized> Decoder for MarshalDecoder<'_, M> {
    fn decode(&mut self, target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        let mut data = Vec::new();
        self.source.read_to_end(&mut data)?;
        self.marshaler.unmarshal(&data, target)
    }
}
