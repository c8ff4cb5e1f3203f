//! View-state derivation.
//!
//! Screens never branch on raw cache entries. They fold an entry and an
//! optional local filter into exactly one [`ViewState`], on every render.
//! Derivation is pure: the same entry and filter always give the same state.

use crate::entry::{CacheEntry, QueryStatus};

/// The single presentation state of a cached collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState<R> {
    /// Nothing cached yet, or a fetch is running.
    Loading,
    /// The last fetch failed.
    Error { message: String },
    /// The fetch succeeded with no records and no filter is active.
    EmptyInitial,
    /// A filter is active and excludes every record.
    NoMatch { filter_text: String },
    /// Records to show, with the unfiltered count.
    Ready { records: Vec<R>, total_count: usize },
}

impl<R> ViewState<R> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Short tag for logs and status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Error { .. } => "error",
            Self::EmptyInitial => "empty",
            Self::NoMatch { .. } => "no-match",
            Self::Ready { .. } => "ready",
        }
    }
}

/// A local, last-mile filter over already fetched records.
///
/// The filter is active only when its text is non-blank. The predicate
/// receives the trimmed, lowercased text.
pub struct LocalFilter<'a, R> {
    text: &'a str,
    needle: String,
    predicate: fn(&R, &str) -> bool,
}

impl<'a, R> LocalFilter<'a, R> {
    pub fn new(text: &'a str, predicate: fn(&R, &str) -> bool) -> Self {
        Self {
            text,
            needle: text.trim().to_lowercase(),
            predicate,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.needle.is_empty()
    }

    /// The text as typed.
    pub fn text(&self) -> &str {
        self.text
    }

    pub fn matches(&self, record: &R) -> bool {
        !self.is_active() || (self.predicate)(record, &self.needle)
    }
}

/// Derive the view state of a cached list.
pub fn derive_view_state<R: Clone>(
    entry: Option<&CacheEntry<Vec<R>>>,
    filter: Option<&LocalFilter<'_, R>>,
) -> ViewState<R> {
    derive_view_state_with(entry, filter, Vec::as_slice)
}

/// Derive the view state of a collection nested in a cached payload.
///
/// `project` selects the records from the payload, so several views can
/// share one entry (a patient record and its encounters, for example).
pub fn derive_view_state_with<T, R, P>(
    entry: Option<&CacheEntry<T>>,
    filter: Option<&LocalFilter<'_, R>>,
    project: P,
) -> ViewState<R>
where
    R: Clone,
    P: Fn(&T) -> &[R],
{
    let Some(entry) = entry else {
        return ViewState::Loading;
    };

    match entry.status() {
        QueryStatus::Empty | QueryStatus::Pending => ViewState::Loading,
        QueryStatus::Failure => ViewState::Error {
            message: entry
                .error()
                .map(|e| e.message().to_string())
                .unwrap_or_else(|| "Request failed".to_string()),
        },
        QueryStatus::Success => {
            let all: &[R] = match entry.payload() {
                Some(payload) => project(payload.as_ref()),
                None => &[],
            };
            let active = filter.filter(|f| f.is_active());

            match active {
                None if all.is_empty() => ViewState::EmptyInitial,
                None => ViewState::Ready {
                    records: all.to_vec(),
                    total_count: all.len(),
                },
                Some(filter) => {
                    let records: Vec<R> = all.iter().filter(|r| filter.matches(r)).cloned().collect();
                    if records.is_empty() {
                        ViewState::NoMatch {
                            filter_text: filter.text().to_string(),
                        }
                    } else {
                        ViewState::Ready {
                            records,
                            total_count: all.len(),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use ward_core::FetchError;

    fn by_substring(record: &String, needle: &str) -> bool {
        record.to_lowercase().contains(needle)
    }

    fn success(records: &[&str]) -> CacheEntry<Vec<String>> {
        let now = Utc::now();
        let records: Vec<String> = records.iter().map(|s| s.to_string()).collect();
        CacheEntry::new(now).into_success(Arc::new(records), 0, now, Duration::from_secs(30))
    }

    #[test]
    fn test_absent_entry_is_loading() {
        let state = derive_view_state::<String>(None, None);
        assert_eq!(state, ViewState::Loading);
    }

    #[test]
    fn test_failure_is_error_with_message() {
        let entry = CacheEntry::new(Utc::now()).into_failure(FetchError::permanent("404 Not Found"));
        let state = derive_view_state::<String>(Some(&entry), None);
        assert_eq!(
            state,
            ViewState::Error {
                message: "404 Not Found".to_string()
            }
        );
    }

    #[test]
    fn test_empty_success_without_filter_is_empty_initial() {
        let entry = success(&[]);
        assert_eq!(derive_view_state(Some(&entry), None), ViewState::EmptyInitial);

        let blank = LocalFilter::new("   ", by_substring);
        assert_eq!(derive_view_state(Some(&entry), Some(&blank)), ViewState::EmptyInitial);
    }

    #[test]
    fn test_filter_matching_nothing_is_no_match() {
        let entry = success(&["Jane Doe", "John Roe", "Ann Lee"]);
        let filter = LocalFilter::new("zzz", by_substring);
        assert_eq!(
            derive_view_state(Some(&entry), Some(&filter)),
            ViewState::NoMatch {
                filter_text: "zzz".to_string()
            }
        );
    }

    #[test]
    fn test_filter_matching_one_is_ready_with_total() {
        let entry = success(&["Jane Doe", "John Roe", "Ann Lee"]);
        let filter = LocalFilter::new("JANE", by_substring);
        assert_eq!(
            derive_view_state(Some(&entry), Some(&filter)),
            ViewState::Ready {
                records: vec!["Jane Doe".to_string()],
                total_count: 3
            }
        );
    }

    #[test]
    fn test_empty_success_with_active_filter_is_no_match() {
        let entry = success(&[]);
        let filter = LocalFilter::new("jane", by_substring);
        assert!(matches!(
            derive_view_state(Some(&entry), Some(&filter)),
            ViewState::NoMatch { .. }
        ));
    }

    #[test]
    fn test_projection_over_nested_collection() {
        let now = Utc::now();
        let entry = CacheEntry::new(now).into_success(
            Arc::new(("patient".to_string(), vec![1u32, 2])),
            0,
            now,
            Duration::from_secs(30),
        );
        let state = derive_view_state_with(Some(&entry), None, |payload| payload.1.as_slice());
        assert_eq!(
            state,
            ViewState::Ready {
                records: vec![1, 2],
                total_count: 2
            }
        );
    }

    #[test]
    fn test_derivation_is_repeatable() {
        let entry = success(&["Jane Doe"]);
        let filter = LocalFilter::new("doe", by_substring);
        let first = derive_view_state(Some(&entry), Some(&filter));
        let second = derive_view_state(Some(&entry), Some(&filter));
        assert_eq!(first, second);
        assert_eq!(first.label(), "ready");
    }
}
