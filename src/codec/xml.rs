use std::borrow::Cow;

use super::{Marshaler, Payload, PayloadMut, deserialize_into, serializable};
use crate::error::CodecError;

const CODEC: &str = "xml";

/// The root element is named after the serialized type.
#[derive(Debug, Clone, Default)]
pub struct XmlCodec;

impl Marshaler for XmlCodec {
    fn content_type(&self, _value: &dyn Payload) -> Cow<'static, str> {
        Cow::Borrowed("application/xml; charset=utf-8")
    }

    fn marshal(&self, value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
        let value = serializable(CODEC, value)?;
        let text = quick_xml::se::to_string(value).map_err(|e| CodecError::format(CODEC, e))?;
        Ok(text.into_bytes())
    }

    fn unmarshal(&self, data: &[u8], target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        let text = std::str::from_utf8(data).map_err(|e| CodecError::format(CODEC, e))?;
        let mut de = quick_xml::de::Deserializer::from_str(text);
        deserialize_into(CODEC, target, &mut de)
    }
}
