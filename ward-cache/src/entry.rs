//! Per-key cache entries.
//!
//! An entry is a value: the store replaces it wholesale on every transition,
//! and consumers only ever see snapshots.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, Shared};
use ward_core::FetchError;

use crate::freshness::CacheRead;

/// The shared future every waiter on one fetch polls.
pub(crate) type SharedFetch<T> = Shared<BoxFuture<'static, Result<CacheRead<T>, FetchError>>>;

/// Lifecycle status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    Empty,
    Pending,
    Success,
    Failure,
}

enum EntryState<T> {
    Empty,
    Pending,
    Success(Arc<T>),
    Failure(FetchError),
}

impl<T> Clone for EntryState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Pending => Self::Pending,
            Self::Success(payload) => Self::Success(Arc::clone(payload)),
            Self::Failure(err) => Self::Failure(err.clone()),
        }
    }
}

/// The one fetch operation currently running for a key.
pub(crate) struct InFlight<T> {
    pub(crate) id: u64,
    pub(crate) generation: u64,
    pub(crate) future: SharedFetch<T>,
}

impl<T> Clone for InFlight<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            generation: self.generation,
            future: self.future.clone(),
        }
    }
}

impl<T> fmt::Debug for InFlight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Snapshot of the cached state for one query key.
///
/// The payload is present only in `Success`, the error only in `Failure`.
pub struct CacheEntry<T> {
    state: EntryState<T>,
    fetched_at: Option<DateTime<Utc>>,
    stale_after: Option<DateTime<Utc>>,
    retry_count: u32,
    in_flight: Option<InFlight<T>>,
    generation: u64,
    invalidated: bool,
    last_accessed: DateTime<Utc>,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            fetched_at: self.fetched_at,
            stale_after: self.stale_after,
            retry_count: self.retry_count,
            in_flight: self.in_flight.clone(),
            generation: self.generation,
            invalidated: self.invalidated,
            last_accessed: self.last_accessed,
        }
    }
}

impl<T> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("status", &self.status())
            .field("error", &self.error())
            .field("fetched_at", &self.fetched_at)
            .field("stale_after", &self.stale_after)
            .field("retry_count", &self.retry_count)
            .field("in_flight", &self.in_flight)
            .field("generation", &self.generation)
            .field("invalidated", &self.invalidated)
            .finish_non_exhaustive()
    }
}

impl<T> CacheEntry<T> {
    /// A fresh entry that has never been fetched.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: EntryState::Empty,
            fetched_at: None,
            stale_after: None,
            retry_count: 0,
            in_flight: None,
            generation: 0,
            invalidated: false,
            last_accessed: now,
        }
    }

    pub fn status(&self) -> QueryStatus {
        match self.state {
            EntryState::Empty => QueryStatus::Empty,
            EntryState::Pending => QueryStatus::Pending,
            EntryState::Success(_) => QueryStatus::Success,
            EntryState::Failure(_) => QueryStatus::Failure,
        }
    }

    pub fn payload(&self) -> Option<&Arc<T>> {
        match &self.state {
            EntryState::Success(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.state {
            EntryState::Failure(err) => Some(err),
            _ => None,
        }
    }

    /// Time of the last successful fetch.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn stale_after(&self) -> Option<DateTime<Utc>> {
        self.stale_after
    }

    /// Retries performed by the current or most recent fetch.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Bumped by every invalidation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        self.last_accessed
    }

    pub(crate) fn in_flight(&self) -> Option<&InFlight<T>> {
        self.in_flight.as_ref()
    }

    /// Enter `Pending` with `flight` as the only running fetch.
    pub(crate) fn into_pending(mut self, flight: InFlight<T>, now: DateTime<Utc>) -> Self {
        self.state = EntryState::Pending;
        self.retry_count = 0;
        self.in_flight = Some(flight);
        self.last_accessed = now;
        self
    }

    /// Record the payload of the fetch that started at `flight_generation`.
    ///
    /// An invalidation that happened while the fetch ran keeps the entry
    /// marked stale.
    pub(crate) fn into_success(
        mut self,
        payload: Arc<T>,
        flight_generation: u64,
        now: DateTime<Utc>,
        stale_time: Duration,
    ) -> Self {
        let window = chrono::Duration::from_std(stale_time).unwrap_or_else(|_| chrono::Duration::zero());
        self.state = EntryState::Success(payload);
        self.fetched_at = Some(now);
        self.stale_after = now.checked_add_signed(window);
        self.retry_count = 0;
        self.in_flight = None;
        self.invalidated = self.generation != flight_generation;
        self
    }

    pub(crate) fn into_failure(mut self, error: FetchError) -> Self {
        self.state = EntryState::Failure(error);
        self.in_flight = None;
        self
    }

    pub(crate) fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub(crate) fn invalidated(mut self) -> Self {
        self.invalidated = true;
        self.generation += 1;
        self
    }

    pub(crate) fn touched(mut self, now: DateTime<Utc>) -> Self {
        if now > self.last_accessed {
            self.last_accessed = now;
        }
        self
    }
}
