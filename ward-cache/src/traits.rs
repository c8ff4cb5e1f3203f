//! Transport seam and cache statistics.
//!
//! The engine never performs I/O itself. A [`Transport`] is supplied by the
//! application (HTTP in the terminal client, scripted responses in tests),
//! and [`json_fetcher`] adapts it into the fetch function the coordinator
//! drives.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use ward_core::FetchError;

use crate::key::Query;

/// Performs one request and yields parsed JSON.
///
/// Implementations must classify failures: anything that may succeed on a
/// later attempt is `FetchError::Transient`, everything else is
/// `FetchError::Permanent`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, FetchError>;
}

/// Build a fetch function for `query` that decodes the response into `T`.
///
/// A payload that does not decode is a permanent failure.
pub fn json_fetcher<Q, T>(
    transport: Arc<dyn Transport>,
    query: &Q,
) -> impl Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync + 'static
where
    Q: Query + ?Sized,
    T: DeserializeOwned + Send + 'static,
{
    let path: Arc<str> = Arc::from(query.path());
    let params: Arc<[(String, String)]> = Arc::from(query.query_pairs());
    move || {
        let transport = Arc::clone(&transport);
        let path = Arc::clone(&path);
        let params = Arc::clone(&params);
        async move {
            let value = transport.get_json(&path, &params).await?;
            serde_json::from_value(value)
                .map_err(|e| FetchError::permanent(format!("Malformed payload from {}: {}", path, e)))
        }
        .boxed()
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Reads served from a fresh entry.
    pub hits: u64,
    /// Reads that had to start or join a fetch.
    pub misses: u64,
    /// Fetches started (each may span several attempts).
    pub fetches: u64,
    /// Reads that attached to an already running fetch.
    pub deduplicated: u64,
    pub entry_count: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate, 0.0 with no reads.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ParamValue;
    use std::sync::Mutex;

    struct Echo {
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
        reply: serde_json::Value,
    }

    #[async_trait]
    impl Transport for Echo {
        async fn get_json(
            &self,
            path: &str,
            params: &[(String, String)],
        ) -> Result<serde_json::Value, FetchError> {
            self.calls.lock().unwrap().push((path.to_string(), params.to_vec()));
            Ok(self.reply.clone())
        }
    }

    struct Search;

    impl Query for Search {
        fn resource(&self) -> &'static str {
            "patients"
        }

        fn params(&self) -> Vec<(&'static str, Option<ParamValue>)> {
            vec![("name", Some(ParamValue::from("Jane"))), ("limit", Some(ParamValue::from(10u32)))]
        }

        fn path(&self) -> String {
            "/patients/".to_string()
        }
    }

    #[tokio::test]
    async fn test_json_fetcher_passes_path_and_params() {
        let echo = Arc::new(Echo {
            calls: Mutex::new(Vec::new()),
            reply: serde_json::json!([1, 2, 3]),
        });
        let fetch = json_fetcher::<_, Vec<u32>>(echo.clone(), &Search);

        assert_eq!(fetch().await.unwrap(), vec![1, 2, 3]);
        let calls = echo.calls.lock().unwrap();
        assert_eq!(calls[0].0, "/patients/");
        assert_eq!(
            calls[0].1,
            vec![
                ("limit".to_string(), "10".to_string()),
                ("name".to_string(), "Jane".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_json_fetcher_decode_failure_is_permanent() {
        let echo = Arc::new(Echo {
            calls: Mutex::new(Vec::new()),
            reply: serde_json::json!({"not": "a list"}),
        });
        let fetch = json_fetcher::<_, Vec<u32>>(echo, &Search);
        let err = fetch().await.unwrap_err();
        assert!(err.is_permanent());
        assert!(err.message().contains("Malformed payload"));
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
