use std::borrow::Cow;

use super::{Marshaler, Payload, PayloadMut, deserialize_into, serializable};
use crate::error::CodecError;

const CODEC: &str = "yaml";

#[derive(Debug, Clone, Default)]
pub struct YamlCodec;

impl Marshaler for YamlCodec {
    fn content_type(&self, _value: &dyn Payload) -> Cow<'static, str> {
        Cow::Borrowed("application/x-yaml; charset=utf-8")
    }

    fn marshal(&self, value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
        let value = serializable(CODEC, value)?;
        let text = serde_yaml::to_string(value).map_err(|e| CodecError::format(CODEC, e))?;
        Ok(text.into_bytes())
    }

    fn unmarshal(&self, data: &[u8], target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        deserialize_into(CODEC, target, serde_yaml::Deserializer::from_slice(data))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Hello {
        id: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_round_trip() {
        let value = Hello {
            id: "foo".to_string(),
            tags: vec!["a".to_string()],
        };
        let data = YamlCodec.marshal(&value).unwrap();
        assert_eq!(String::from_utf8(data.clone()).unwrap(), "id: foo\ntags:\n- a\n");

        let mut got = Hello::default();
        YamlCodec.unmarshal(&data, &mut got).unwrap();
        assert_eq!(got, value);
    }
}
