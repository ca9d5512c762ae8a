use std::{
    borrow::Cow,
    cell::RefCell,
    io::{self, Read, Write},
    rc::Rc,
};

use serde::Deserialize;
use serde_json::de::IoRead;

use super::{Decoder, Encoder, Marshaler, Payload, PayloadMut, deserialize_into, serializable};
use crate::{error::CodecError, message::MessageOptions};

const CODEC: &str = "json";

fn json_error(e: serde_json::Error) -> CodecError {
    if e.is_io() {
        CodecError::Io(e.into())
    } else {
        CodecError::format(CODEC, e)
    }
}

/// JSON through serde. Structured messages use their own JSON mapping,
/// shaped by `message`.
#[derive(Debug, Clone, Default)]
pub struct JsonCodec {
    pub pretty: bool,
    pub message: MessageOptions,
}

impl JsonCodec {
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Self::default()
        }
    }

    fn write(&self, sink: &mut dyn Write, value: &dyn Payload) -> Result<(), CodecError> {
        let mapped;
        let value: &dyn erased_serde::Serialize = match value.as_message() {
            Some(message) => {
                mapped = message.encode_json(&self.message)?;
                &mapped
            }
            None => serializable(CODEC, value)?,
        };
        let written = if self.pretty {
            serde_json::to_writer_pretty(sink, value)
        } else {
            serde_json::to_writer(sink, value)
        };
        written.map_err(json_error)
    }
}

impl Marshaler for JsonCodec {
    fn content_type(&self, _value: &dyn Payload) -> Cow<'static, str> {
        Cow::Borrowed("application/json; charset=utf-8")
    }

    fn marshal(&self, value: &dyn Payload) -> Result<Vec<u8>, CodecError> {
        let mut data = Vec::new();
        self.write(&mut data, value)?;
        Ok(data)
    }

    fn unmarshal(&self, data: &[u8], target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        if let Some(message) = target.as_message_mut() {
            let value: serde_json::Value = serde_json::from_slice(data).map_err(json_error)?;
            return message.decode_json(value);
        }
        let mut de = serde_json::Deserializer::from_slice(data);
        deserialize_into(CODEC, target, &mut de)?;
        de.end().map_err(json_error)
    }

    fn new_encoder<'a>(&'a self, sink: &'a mut dyn Write) -> Box<dyn Encoder + 'a> {
        Box::new(JsonEncoder { codec: self, sink })
    }

    fn new_decoder<'a>(&'a self, source: &'a mut dyn Read) -> Box<dyn Decoder + 'a> {
        let failure = Rc::new(RefCell::new(None));
        let source = TrackedRead {
            inner: source,
            failure: failure.clone(),
        };
        Box::new(JsonDecoder {
            de: serde_json::Deserializer::from_reader(source),
            failure,
        })
    }
}

/// Writes one value per line.
struct JsonEncoder<'a> {
    codec: &'a JsonCodec,
    sink: &'a mut dyn Write,
}

impl Encoder for JsonEncoder<'_> {
    fn encode(&mut self, value: &dyn Payload) -> Result<(), CodecError> {
        self.codec.write(&mut *self.sink, value)?;
        self.sink.write_all(b"\n")?;
        Ok(())
    }
}

/// Keeps the last read error, which the erased deserializer reduces to a message.
struct TrackedRead<'a> {
    inner: &'a mut dyn Read,
    failure: Rc<RefCell<Option<io::Error>>>,
}

impl Read for TrackedRead<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            // retried by the reader
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                let surfaced = io::Error::new(e.kind(), e.to_string());
                *self.failure.borrow_mut() = Some(e);
                Err(surfaced)
            }
            read => read,
        }
    }
}

/// Reads consecutive values from one stream.
struct JsonDecoder<'a> {
    de: serde_json::Deserializer<IoRead<TrackedRead<'a>>>,
    failure: Rc<RefCell<Option<io::Error>>>,
}

impl Decoder for JsonDecoder<'_> {
    fn decode(&mut self, target: &mut dyn PayloadMut) -> Result<(), CodecError> {
        let decoded = if let Some(message) = target.as_message_mut() {
            serde_json::Value::deserialize(&mut self.de)
                .map_err(json_error)
                .and_then(|value| message.decode_json(value))
        } else {
            deserialize_into(CODEC, target, &mut self.de)
        };
        decoded.map_err(|e| match self.failure.borrow_mut().take() {
            Some(io) => CodecError::Io(io),
            None => e,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::codec::HttpBody;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Hello {
        id: String,
        count: u32,
    }

    #[test]
    fn test_marshal_unmarshal() {
        let codec = JsonCodec::default();
        let value = Hello {
            id: "foo".to_string(),
            count: 2,
        };
        let data = codec.marshal(&value).unwrap();
        assert_eq!(data, br#"{"id":"foo","count":2}"#);

        let mut got = Hello::default();
        codec.unmarshal(&data, &mut got).unwrap();
        assert_eq!(got, value);
    }

    #[test]
    fn test_unmarshal_trailing_data() {
        let mut got = Hello::default();
        let err = JsonCodec::default()
            .unmarshal(br#"{"id":"foo","count":2} x"#, &mut got)
            .unwrap_err();
        assert!(matches!(err, CodecError::Format { codec: "json", .. }));
    }

    #[test]
    fn test_not_serializable() {
        let err = JsonCodec::default()
            .marshal(&HttpBody::new("text/plain", "hi"))
            .unwrap_err();
        assert!(matches!(err, CodecError::Unsupported { .. }));
    }

    #[test]
    fn test_stream_keeps_read_error() {
        struct Reset<'a>(&'a [u8]);

        impl Read for Reset<'_> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"));
                }
                self.0.read(buf)
            }
        }

        let codec = JsonCodec::default();
        let mut source = Reset(br#"{"id":"a","count":1}
{"id":"b","#);
        let mut decoder = codec.new_decoder(&mut source);
        let mut first = Hello::default();
        decoder.decode(&mut first).unwrap();
        assert_eq!(first.id, "a");

        let mut second = Hello::default();
        let err = decoder.decode(&mut second).unwrap_err();
        match err {
            CodecError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stream_bad_data_is_format_error() {
        let codec = JsonCodec::default();
        let mut source: &[u8] = br#"{"id":1}"#;
        let mut decoder = codec.new_decoder(&mut source);
        let mut got = Hello::default();
        let err = decoder.decode(&mut got).unwrap_err();
        assert!(matches!(err, CodecError::Format { codec: "json", .. }));
    }

    #[test]
    fn test_stream() {
        let codec = JsonCodec::default();
        let mut sink = Vec::new();
        {
            let mut encoder = codec.new_encoder(&mut sink);
            encoder.encode(&Hello { id: "a".into(), count: 1 }).unwrap();
            encoder.encode(&Hello { id: "b".into(), count: 2 }).unwrap();
        }
        assert_eq!(
            String::from_utf8(sink.clone()).unwrap(),
            "{\"id\":\"a\",\"count\":1}\n{\"id\":\"b\",\"count\":2}\n"
        );

        let mut source = sink.as_slice();
        let mut decoder = codec.new_decoder(&mut source);
        let mut first = Hello::default();
        let mut second = Hello::default();
        decoder.decode(&mut first).unwrap();
        decoder.decode(&mut second).unwrap();
        assert_eq!(first.id, "a");
        assert_eq!(second.count, 2);
    }
}
