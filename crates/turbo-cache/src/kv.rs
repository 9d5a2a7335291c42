//! Key-Value store wrapper with automatic serialization.

use crate::CacheError;
use serde::{de::DeserializeOwned, Serialize};

/// Namespace-addressed byte storage.
///
/// This is the seam the cart engine persists guest carts through. A
/// namespace is an opaque string key such as `cart:guest`.
pub trait LocalStore: Send + Sync {
    /// Read the raw bytes stored under `namespace`.
    fn get_raw(&self, namespace: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Replace the bytes stored under `namespace`.
    fn set_raw(&self, namespace: &str, bytes: &[u8]) -> Result<(), CacheError>;

    /// Remove `namespace`. Removing a missing namespace is not an error.
    fn remove(&self, namespace: &str) -> Result<(), CacheError>;
}

/// Typed JSON access over any [`LocalStore`].
pub trait LocalStoreExt: LocalStore {
    /// Read and deserialize the value under `namespace`.
    ///
    /// Returns `None` if the namespace is empty.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let cart: Option<GuestCart> = store.get_json("cart:guest")?;
    /// ```
    fn get_json<T: DeserializeOwned>(&self, namespace: &str) -> Result<Option<T>, CacheError> {
        match self.get_raw(namespace)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Serialize `value` and store it under `namespace`.
    fn set_json<T: Serialize>(&self, namespace: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.set_raw(namespace, &bytes)
    }

    /// Check if anything is stored under `namespace`.
    fn exists(&self, namespace: &str) -> Result<bool, CacheError> {
        Ok(self.get_raw(namespace)?.is_some())
    }
}

impl<S: LocalStore + ?Sized> LocalStoreExt for S {}

/// Durable Key-Value store.
///
/// On `wasm32` the cache is backed by Spin's Key-Value Store. Native builds
/// use a process-local map, which is what hosts and tests run against.
pub struct Cache {
    #[cfg(target_arch = "wasm32")]
    store: spin_sdk::key_value::Store,
    #[cfg(not(target_arch = "wasm32"))]
    entries: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl Cache {
    /// Open Spin's default Key-Value store; this is how Spin hosts build
    /// the guest cart storage.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let cache = Cache::open_default()?;
    /// ```
    #[cfg(target_arch = "wasm32")]
    pub fn open_default() -> Result<Self, CacheError> {
        let store = spin_sdk::key_value::Store::open_default()
            .map_err(|e| CacheError::OpenError(e.to_string()))?;
        Ok(Self { store })
    }

    /// Create an empty in-memory cache.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn in_memory() -> Self {
        Self {
            entries: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl LocalStore for Cache {
    fn get_raw(&self, namespace: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.store
            .get(namespace)
            .map_err(|e| CacheError::StoreError(e.to_string()))
    }

    fn set_raw(&self, namespace: &str, bytes: &[u8]) -> Result<(), CacheError> {
        self.store
            .set(namespace, bytes)
            .map_err(|e| CacheError::StoreError(e.to_string()))
    }

    fn remove(&self, namespace: &str) -> Result<(), CacheError> {
        self.store
            .delete(namespace)
            .map_err(|e| CacheError::StoreError(e.to_string()))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl LocalStore for Cache {
    fn get_raw(&self, namespace: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::StoreError(e.to_string()))?;
        Ok(entries.get(namespace).cloned())
    }

    fn set_raw(&self, namespace: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::StoreError(e.to_string()))?;
        entries.insert(namespace.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, namespace: &str) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::StoreError(e.to_string()))?;
        entries.remove(namespace);
        Ok(())
    }
}
