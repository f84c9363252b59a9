//! Backend adapter abstraction
//!
//! The document store persists one opaque byte string per key through this
//! trait. Implementations must be safe to call concurrently from multiple
//! threads; each `put` must be atomic (a reader sees the old bytes or the new
//! bytes, never a mix).
//!
//! Not-found is not an error: `get` returns `Ok(None)`.

use docstore_core::Result;

/// Entries yielded by [`Backend::scan`]
///
/// Finite and single-pass. Ordered by key.
pub type ScanIter = Box<dyn Iterator<Item = Result<(String, Vec<u8>)>> + Send>;

/// Ordered key-value backend
///
/// # Examples
///
/// ```
/// use docstore_storage::{Backend, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// backend.put("a", b"1".to_vec()).unwrap();
/// assert_eq!(backend.get("a").unwrap(), Some(b"1".to_vec()));
/// assert_eq!(backend.get("b").unwrap(), None);
/// ```
pub trait Backend: Send + Sync {
    /// Current bytes for key, `None` if the key was never written or was deleted
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store bytes for key, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. On error the previous
    /// value remains visible.
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove key, returning whether it existed
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Iterate every entry in key order
    ///
    /// The iterator reflects a point-in-time view taken when `scan` is
    /// called; later writes do not affect it.
    ///
    /// # Errors
    ///
    /// Returns an error if the view cannot be taken. Per-entry failures are
    /// reported through the iterator items.
    fn scan(&self) -> Result<ScanIter>;
}
