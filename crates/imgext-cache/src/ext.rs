//! Typed access on top of raw [`CacheBucket`] bytes.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheBucket;

/// JSON helpers for any [`CacheBucket`].
///
/// Kept as a blanket extension trait so the bucket trait itself stays object
/// safe and free of serde.
///
/// ```
/// use imgext_cache::{Cache, CacheBucketExt, NullCache};
///
/// let bucket = NullCache.bucket("environment");
/// bucket.set_json("index", "v1", &vec!["diagram.dot".to_owned()]);
/// let deps: Option<Vec<String>> = bucket.get_json("index", "v1");
/// assert!(deps.is_none());
/// ```
pub trait CacheBucketExt: CacheBucket {
    /// Fetch and deserialize a JSON value.
    ///
    /// Malformed entries are reported as a miss.
    fn get_json<T: DeserializeOwned>(&self, key: &str, etag: &str) -> Option<T> {
        let bytes = self.get(key, etag)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("discarding malformed cache entry {key}: {e}");
                None
            }
        }
    }

    /// Serialize `value` as JSON and store it.
    fn set_json<T: Serialize>(&self, key: &str, etag: &str, value: &T) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.set(key, etag, &bytes);
        }
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketExt for B {}
