use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::{codec::Marshaler, error::RegistryError, registry::CodecRegistry};

/// A [`CodecRegistry`] that can be reconfigured while it is being read.
///
/// Readers hold the lock only for the duration of a lookup or a guard.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<CodecRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: CodecRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, CodecRegistry> {
        self.inner.read()
    }

    pub fn register(&self, mime: &str, marshaler: Arc<dyn Marshaler>) -> Result<(), RegistryError> {
        self.inner.write().register(mime, marshaler)
    }

    pub fn delete(&self, mime: &str) -> Result<(), RegistryError> {
        self.inner.write().delete(mime)
    }

    /// The marshaler registered for `mime` right now.
    pub fn get(&self, mime: &str) -> Arc<dyn Marshaler> {
        self.inner.read().get(mime).clone()
    }

    pub fn resolve_inbound<I>(&self, header_values: I) -> (String, Arc<dyn Marshaler>)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let registry = self.inner.read();
        let (mime, marshaler) = registry.resolve_inbound(header_values);
        (mime, marshaler.clone())
    }

    pub fn resolve_outbound<I>(&self, header_values: I) -> Arc<dyn Marshaler>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.inner.read().resolve_outbound(header_values).clone()
    }
}

impl From<CodecRegistry> for SharedRegistry {
    fn from(registry: CodecRegistry) -> Self {
        Self::new(registry)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{codec::JsonCodec, media_type};

    #[test]
    fn test_reconfigure_while_reading() {
        let shared = SharedRegistry::default();
        let before = shared.get(media_type::JSON);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let (mime, _) = shared.resolve_inbound(["application/json"]);
                        assert_eq!(mime, media_type::JSON);
                    }
                })
            })
            .collect();

        let replacement: Arc<dyn Marshaler> = Arc::new(JsonCodec::pretty());
        shared.register(media_type::JSON, replacement.clone()).unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert!(!Arc::ptr_eq(&before, &shared.get(media_type::JSON)));
        assert!(Arc::ptr_eq(&replacement, &shared.resolve_outbound(["application/json"])));
        assert!(shared.delete(media_type::WILDCARD).is_err());
        assert!(shared.read().contains(media_type::QUERY));
    }
}
