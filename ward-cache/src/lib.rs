//! WARD Cache - keyed async query cache.
//!
//! Every screen of the registry browser reads remote records through a
//! [`QueryClient`]. The client owns one store of [`CacheEntry`] values keyed
//! by canonical [`QueryKey`]s and guarantees:
//!
//! - at most one fetch in flight per key; concurrent `ensure` calls share it
//! - transient failures are retried with capped exponential backoff, permanent
//!   ones surface immediately
//! - every transition is written through the store and broadcast to the
//!   key's subscribers
//!
//! Presentation never inspects entries directly. It folds an entry and an
//! optional [`LocalFilter`] into a [`ViewState`] with [`derive_view_state`].
//!
//! # Example
//!
//! ```ignore
//! let client = QueryClient::<Vec<PatientSummary>>::new(CacheConfig::default());
//! let search = PatientSearch::new(Some("Jane"), Some(10));
//! let key = search.key()?;
//!
//! let _watch = client.subscribe(key.clone(), |key, entry| {
//!     tracing::debug!(key = %key, status = ?entry.status(), "updated");
//! });
//! let read = client.ensure(&key, json_fetcher(transport, &search)).resolve().await?;
//!
//! let state = derive_view_state(client.entry(&key).as_ref(), None);
//! ```

pub mod broadcast;
pub mod clock;
pub mod coordinator;
pub mod entry;
pub mod freshness;
pub mod key;
pub mod retry;
pub mod store;
pub mod traits;
pub mod view_state;

pub use broadcast::{Broadcaster, Subscription};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CacheConfig, Ensure, FetchHandle, QueryClient};
pub use entry::{CacheEntry, QueryStatus};
pub use freshness::CacheRead;
pub use key::{canonicalize, ParamValue, Query, QueryKey};
pub use retry::RetryPolicy;
pub use store::{is_stale, CacheStore};
pub use traits::{json_fetcher, CacheStats, Transport};
pub use view_state::{derive_view_state, derive_view_state_with, LocalFilter, ViewState};
