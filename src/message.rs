//! Structured (protocol-buffer style) messages.
//!
//! A payload that exposes [`StructuredMessage`] is handed to it as a whole by
//! the protobuf, JSON and form codecs, instead of going through serde.

use crate::{error::CodecError, form::ValuesMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageOptions {
    /// proto field names instead of lowerCamelCase names
    pub use_proto_names: bool,
    /// enum values as numbers instead of names
    pub use_enum_numbers: bool,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            use_proto_names: true,
            use_enum_numbers: true,
        }
    }
}

pub trait StructuredMessage {
    fn encode_message(&self) -> Result<Vec<u8>, CodecError>;

    fn decode_message(&mut self, data: &[u8]) -> Result<(), CodecError>;

    fn encode_fields(&self, options: &MessageOptions) -> Result<ValuesMap, CodecError>;

    fn decode_fields(&mut self, values: &ValuesMap) -> Result<(), CodecError>;

    /// The message's JSON mapping, shaped by `options`.
    fn encode_json(&self, options: &MessageOptions) -> Result<serde_json::Value, CodecError>;

    fn decode_json(&mut self, value: serde_json::Value) -> Result<(), CodecError>;
}

#[cfg(feature = "protobuf")]
pub use impl_prost::{MessageFields, Proto};

#[cfg(feature = "protobuf")]
mod impl_prost {
    use super::*;
    use crate::codec::{Payload, PayloadMut};

    /// Field-level mapping of a message to form values and to JSON.
    pub trait MessageFields {
        fn to_fields(&self, options: &MessageOptions) -> Result<ValuesMap, CodecError>;

        fn from_fields(&mut self, values: &ValuesMap) -> Result<(), CodecError>;

        fn to_json(&self, options: &MessageOptions) -> Result<serde_json::Value, CodecError>;

        fn from_json(&mut self, value: serde_json::Value) -> Result<(), CodecError>;
    }

    /// Wraps a [`prost::Message`] so it can be passed to the registry.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Proto<M>(pub M);

    impl<M> StructuredMessage for Proto<M>
    where
        M: prost::Message + Default + MessageFields,
    {
        fn encode_message(&self) -> Result<Vec<u8>, CodecError> {
            Ok(self.0.encode_to_vec())
        }

        fn decode_message(&mut self, data: &[u8]) -> Result<(), CodecError> {
            self.0 = M::decode(data).map_err(|e| CodecError::format("protobuf", e))?;
            Ok(())
        }

        fn encode_fields(&self, options: &MessageOptions) -> Result<ValuesMap, CodecError> {
            self.0.to_fields(options)
        }

        fn decode_fields(&mut self, values: &ValuesMap) -> Result<(), CodecError> {
            self.0.from_fields(values)
        }

        fn encode_json(&self, options: &MessageOptions) -> Result<serde_json::Value, CodecError> {
            self.0.to_json(options)
        }

        fn decode_json(&mut self, value: serde_json::Value) -> Result<(), CodecError> {
            self.0.from_json(value)
        }
    }

    impl<M> Payload for Proto<M>
    where
        M: prost::Message + Default + MessageFields,
    {
        fn as_message(&self) -> Option<&dyn StructuredMessage> {
            Some(self)
        }
    }

    impl<M> PayloadMut for Proto<M>
    where
        M: prost::Message + Default + MessageFields,
    {
        fn as_message_mut(&mut self) -> Option<&mut dyn StructuredMessage> {
            Some(self)
        }
    }
}
