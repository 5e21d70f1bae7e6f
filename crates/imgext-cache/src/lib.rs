//! Build-state cache for imgext.
//!
//! The host engine remembers, between two build invocations, which files each
//! document depended on and what their modification stamps were. That state is
//! kept behind two small traits so the engine does not care where it lives:
//!
//! - [`Cache`]: hands out named buckets
//! - [`CacheBucket`]: byte values stored under a key and validated by an etag
//!
//! # Implementations
//!
//! - [`NullCache`]: keeps nothing, so every document is rebuilt every time
//! - [`FileCache`]: one file per entry under a versioned directory
//!
//! # Example
//!
//! ```
//! use imgext_cache::{Cache, NullCache};
//!
//! let bucket = NullCache.bucket("environment");
//! bucket.set("index", "stamp-1", b"{}");
//! assert_eq!(bucket.get("index", "stamp-1"), None);
//! ```

mod ext;
mod file;

pub use ext::CacheBucketExt;
pub use file::FileCache;

/// A named partition of a [`Cache`].
///
/// A lookup only hits when the stored etag equals the requested one. Callers
/// pick whatever etag describes freshness for them; the environment uses a
/// digest of source and dependency modification times.
pub trait CacheBucket: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// An empty `etag` skips validation and returns whatever is stored.
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, etag: &str, value: &[u8]);

    /// Drop the entry stored under `key`, if any.
    fn remove(&self, key: &str);
}

/// Factory for isolated [`CacheBucket`]s.
pub trait Cache: Send + Sync {
    /// Open (or lazily create) the bucket called `name`.
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// Bucket that forgets everything; see [`NullCache`].
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str, _etag: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _etag: &str, _value: &[u8]) {}

    fn remove(&self, _key: &str) {}
}

/// [`Cache`] used when incremental builds are disabled.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cache_never_hits() {
        let bucket = NullCache.bucket("environment");

        bucket.set("index", "etag", b"record");
        assert_eq!(bucket.get("index", "etag"), None);
        assert_eq!(bucket.get("index", ""), None);
    }

    #[test]
    fn test_null_cache_remove_is_noop() {
        let bucket = NullCache.bucket("environment");
        bucket.remove("missing");
        assert_eq!(bucket.get("missing", ""), None);
    }
}
