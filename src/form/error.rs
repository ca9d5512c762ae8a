use std::fmt::Display;

use super::scalar::ScalarError;

#[derive(Debug, derive_more::Display)]
pub enum FormError {
    #[display("form field `{key}`: {source}")]
    Scalar { key: String, source: ScalarError },
    #[display("form values cannot hold {found} at {position}")]
    Unsupported {
        found: &'static str,
        position: String,
    },
    #[display("form field `{key}` has no value")]
    MissingValue { key: String },
    #[display("{message}")]
    Custom { message: String },
    #[display("encode query string: {source}")]
    Urlencoded { source: serde_urlencoded::ser::Error },
    #[display("parse query string: {source}")]
    UrlDecoded { source: serde_urlencoded::de::Error },
}

impl FormError {
    pub(crate) fn unsupported(found: &'static str, key: &str) -> Self {
        let position = if key.is_empty() {
            "the top level".to_string()
        } else {
            format!("field `{key}`")
        };
        FormError::Unsupported { found, position }
    }

    pub(crate) fn scalar(key: &str, source: ScalarError) -> Self {
        FormError::Scalar {
            key: key.to_string(),
            source,
        }
    }
}

impl std::error::Error for FormError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormError::Scalar { source, .. } => Some(source),
            FormError::Urlencoded { source } => Some(source),
            FormError::UrlDecoded { source } => Some(source),
            _ => None,
        }
    }
}

impl serde::ser::Error for FormError {
    fn custom<T: Display>(msg: T) -> Self {
        FormError::Custom {
            message: msg.to_string(),
        }
    }
}

impl serde::de::Error for FormError {
    fn custom<T: Display>(msg: T) -> Self {
        FormError::Custom {
            message: msg.to_string(),
        }
    }
}
