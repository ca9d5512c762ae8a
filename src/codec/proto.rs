use std::borrow::Cow;

use super::{Marshaler, Payload, PayloadMut};
use crate::error::CodecError;

const CODEC: &str = "protobuf";

/// Binary protocol buffers. Only payloads exposing
/// [`StructuredMessage`](crate::message::StructuredMessage) are accepted.
#[derive(Debug, Clone, Default)]
pub struct ProtoCodec;

impl Marshaler for ProtoCodec {
    fn content_type(&self, _value: &dyn Payload) -> Cow<'static, str> {
        Cow::Borrowed("application/x-protobuf")
    }

    fn marshal(&self, value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
        let Some(message) = value.as_message() else {
            return Err(CodecError::Unsupported {
                codec: CODEC,
                reason: "value is not a structured message",
            });
        };
        message.encode_message()
    }

    fn unmarshal(&self, data: &[u8], target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        let Some(message) = target.as_message_mut() else {
            return Err(CodecError::Unsupported {
                codec: CODEC,
                reason: "target is not a structured message",
            });
        };
        message.decode_message(data)
    }
}
