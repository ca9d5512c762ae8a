use std::borrow::Cow;

use super::{Marshaler, Payload, PayloadMut, deserialize_into, serializable};
use crate::error::CodecError;

const CODEC: &str = "msgpack";

/// Structs are written as maps keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct MsgpackCodec;

impl Marshaler for MsgpackCodec {
    fn content_type(&self, _value: &dyn Payload) -> Cow<'static, str> {
        Cow::Borrowed("application/x-msgpack")
    }

    fn marshal(&self, value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
        let value = serializable(CODEC, value)?;
        rmp_serde::to_vec_named(value).map_err(|e| CodecError::format(CODEC, e))
    }

    fn unmarshal(&self, data: &[u8], target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        let mut de = rmp_serde::Deserializer::new(data);
        deserialize_into(CODEC, target, &mut de)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Hello {
        id: String,
        ids: Vec<u64>,
    }

    #[test]
    fn test_round_trip() {
        let value = Hello {
            id: "foo".to_string(),
            ids: vec![1, u64::MAX],
        };
        let data = MsgpackCodec.marshal(&value).unwrap();

        let mut got = Hello::default();
        MsgpackCodec.unmarshal(&data, &mut got).unwrap();
        assert_eq!(got, value);
    }

    #[test]
    fn test_truncated() {
        let data = MsgpackCodec
            .marshal(&Hello {
                id: "foo".to_string(),
                ids: vec![],
            })
            .unwrap();
        let mut got = Hello::default();
        assert!(MsgpackCodec.unmarshal(&data[..data.len() - 2], &mut got).is_err());
    }
}
