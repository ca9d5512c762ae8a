//! A MIME-negotiated codec registry.
//!
//! A [`CodecRegistry`] maps media types to [`Marshaler`]s, picks one from
//! `Content-Type` / `Accept` headers and binds requests or renders responses
//! through it. The [`form`] module turns records into url-encoded form values
//! and back.

pub mod codec;
pub mod config;
pub mod error;
pub mod form;
pub mod http;
pub mod media_type;
pub mod message;
pub mod registry;
pub mod shared;

pub use codec::{FormMarshaler, Marshaler, Payload, PayloadMut, UriMarshaler};
pub use config::EncodingConfig;
pub use error::{CodecError, RegistryError};
pub use form::{FormError, ValuesMap};
pub use registry::CodecRegistry;
pub use shared::SharedRegistry;

pub use derive_more;
