use crate::form::{FormError, scalar::ScalarError};

/// Misconfiguration reported by [`CodecRegistry::register`](crate::CodecRegistry::register)
/// and [`CodecRegistry::delete`](crate::CodecRegistry::delete).
#[derive(Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum RegistryError {
    #[display("encoding: empty MIME type")]
    EmptyMime,
    #[display("encoding: marshaler for {mime} must implement {capability}")]
    CapabilityMismatch {
        mime: String,
        capability: &'static str,
    },
    #[display("encoding: MIME({mime}) can't delete, but you can override it")]
    ReservedMime { mime: String },
}

#[derive(Debug, derive_more::Display)]
pub enum CodecError {
    #[display("{codec}: {source}")]
    Format {
        codec: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    Form(FormError),
    #[display("io: {_0}")]
    Io(std::io::Error),
    #[display("{codec}: {reason}")]
    Unsupported {
        codec: &'static str,
        reason: &'static str,
    },
    #[display("http: {_0}")]
    Http(http::Error),
}

impl CodecError {
    pub fn format<E>(codec: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CodecError::Format {
            codec,
            source: source.into(),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Format { source, .. } => Some(source.as_ref()),
            CodecError::Form(e) => Some(e),
            CodecError::Io(e) => Some(e),
            CodecError::Http(e) => Some(e),
            CodecError::Unsupported { .. } => None,
        }
    }
}

impl From<FormError> for CodecError {
    fn from(e: FormError) -> Self {
        CodecError::Form(e)
    }
}

impl From<ScalarError> for CodecError {
    fn from(e: ScalarError) -> Self {
        CodecError::Form(FormError::Scalar {
            key: String::new(),
            source: e,
        })
    }
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        CodecError::Io(e)
    }
}

impl From<http::Error> for CodecError {
    fn from(e: http::Error) -> Self {
        CodecError::Http(e)
    }
}
