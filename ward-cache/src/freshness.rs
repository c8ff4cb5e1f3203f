//! Cache reads that carry their own freshness metadata.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Result of a resolved query, carrying staleness metadata.
///
/// Callers can tell whether the payload came straight from the store or
/// from a fetch that just completed, and how old it is.
#[derive(Debug)]
pub struct CacheRead<T> {
    /// The cached payload, shared with the store.
    value: Arc<T>,
    /// When the payload was fetched.
    fetched_at: DateTime<Utc>,
    /// Whether this was a cache hit or miss.
    was_cache_hit: bool,
}

impl<T> Clone for CacheRead<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> CacheRead<T> {
    /// Create a read served from a fresh store entry.
    pub fn from_cache(value: Arc<T>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: true,
        }
    }

    /// Create a read produced by a fetch.
    pub fn from_fetch(value: Arc<T>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: false,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Shared handle to the payload.
    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.value)
    }

    pub fn into_value(self) -> Arc<T> {
        self.value
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// How old the payload is at `now`. Zero if `now` precedes the fetch.
    pub fn staleness(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_read_from_cache() {
        let fetched_at = Utc::now();
        let read = CacheRead::from_cache(Arc::new("value".to_string()), fetched_at);

        assert!(read.was_cache_hit());
        assert!(!read.was_cache_miss());
        assert_eq!(read.value(), "value");
        assert_eq!(read.fetched_at(), fetched_at);
    }

    #[test]
    fn test_cache_read_from_fetch() {
        let read = CacheRead::from_fetch(Arc::new(42i32), Utc::now());
        assert!(read.was_cache_miss());
        assert_eq!(*read.into_value(), 42);
    }

    #[test]
    fn test_cache_read_staleness() {
        let fetched_at = Utc::now();
        let read = CacheRead::from_cache(Arc::new(1u8), fetched_at);

        let later = fetched_at + chrono::Duration::seconds(5);
        assert_eq!(read.staleness(later), Duration::from_secs(5));

        let earlier = fetched_at - chrono::Duration::seconds(5);
        assert_eq!(read.staleness(earlier), Duration::ZERO);
    }
}
