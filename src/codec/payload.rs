use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::CodecError,
    message::StructuredMessage,
};

/// A value handed to a [`Marshaler`](super::Marshaler).
///
/// Every `Serialize` type is a payload. Codecs probe the capabilities they need.
pub trait Payload {
    fn as_serialize(&self) -> Option<&dyn erased_serde::Serialize> {
        None
    }

    fn as_message(&self) -> Option<&dyn StructuredMessage> {
        None
    }

    fn as_http_body(&self) -> Option<&HttpBody> {
        None
    }
}

impl<T: Serialize> Payload for T {
    fn as_serialize(&self) -> Option<&dyn erased_serde::Serialize> {
        Some(self)
    }
}

/// Object-safe `Deserialize` that overwrites `self`.
pub trait ErasedDeserialize {
    fn erased_deserialize(
        &mut self,
        deserializer: &mut dyn erased_serde::Deserializer<'_>,
    ) -> Result<(), erased_serde::Error>;
}

impl<T: DeserializeOwned> ErasedDeserialize for T {
    fn erased_deserialize(
        &mut self,
        deserializer: &mut dyn erased_serde::Deserializer<'_>,
    ) -> Result<(), erased_serde::Error> {
        *self = erased_serde::deserialize(deserializer)?;
        Ok(())
    }
}

/// A decode target. Every `DeserializeOwned` type is one.
pub trait PayloadMut {
    fn as_deserialize(&mut self) -> Option<&mut dyn ErasedDeserialize> {
        None
    }

    fn as_message_mut(&mut self) -> Option<&mut dyn StructuredMessage> {
        None
    }

    fn as_http_body_mut(&mut self) -> Option<&mut HttpBody> {
        None
    }
}

impl<T: DeserializeOwned> PayloadMut for T {
    fn as_deserialize(&mut self) -> Option<&mut dyn ErasedDeserialize> {
        Some(self)
    }
}

/// A raw body with its own content type, passed through untouched by
/// [`HttpBodyCodec`](super::HttpBodyCodec).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpBody {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl HttpBody {
    pub fn new(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

impl Payload for HttpBody {
    fn as_http_body(&self) -> Option<&HttpBody> {
        Some(self)
    }
}

impl PayloadMut for HttpBody {
    fn as_http_body_mut(&mut self) -> Option<&mut HttpBody> {
        Some(self)
    }
}

pub(crate) fn serializable<'a>(
    codec: &'static str,
    value: &'a dyn Payload,
) -> Result<&'a dyn erased_serde::Serialize, CodecError> {
    value.as_serialize().ok_or(CodecError::Unsupported {
        codec,
        reason: "value is not serializable",
    })
}

/// Runs `deserializer` into `target` through the erased bridge.
pub(crate) fn deserialize_into<'de, D>(
    codec: &'static str,
    target: &mut dyn PayloadMut,
    deserializer: D,
) -> Result<(), CodecError>
where
    D: serde::Deserializer<'de>,
{
    let Some(target) = target.as_deserialize() else {
        return Err(CodecError::Unsupported {
            codec,
            reason: "target is not deserializable",
        });
    };
    let mut erased = <dyn erased_serde::Deserializer>::erase(deserializer);
    target
        .erased_deserialize(&mut erased)
        .map_err(|e| CodecError::format(codec, e))
}
