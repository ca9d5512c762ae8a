use std::borrow::Cow;

use super::{Marshaler, Payload, PayloadMut, deserialize_into, serializable};
use crate::error::CodecError;

const CODEC: &str = "toml";

#[derive(Debug, Clone, Default)]
pub struct TomlCodec;

impl Marshaler for TomlCodec {
    fn content_type(&self, _value: &dyn Payload) -> Cow<'static, str> {
        Cow::Borrowed("application/toml; charset=utf-8")
    }

    fn marshal(&self, value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
        let value = serializable(CODEC, value)?;
        let text = toml::to_string(value).map_err(|e| CodecError::format(CODEC, e))?;
        Ok(text.into_bytes())
    }

    fn unmarshal(&self, data: &[u8], target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        let text = std::str::from_utf8(data).map_err(|e| CodecError::format(CODEC, e))?;
        deserialize_into(CODEC, target, toml::Deserializer::new(text))
    }
}
