//! Application state for the registry browser.
//!
//! The app never stores fetched records itself. Each render reads the
//! current cache entry for the active query and derives a view state from
//! it; cache subscriptions only wake the event loop.

use crate::config::TuiConfig;
use crate::events::TuiEvent;
use crate::nav::{ActiveTab, InputMode, Screen};
use crate::notifications::{Notification, NotificationAction, NotificationLevel};
use crate::queries::{PatientDetail, PatientSearch};
use crate::theme::WardTheme;
use std::sync::Arc;
use tokio::sync::mpsc;
use ward_cache::{
    derive_view_state, derive_view_state_with, json_fetcher, CacheEntry, CacheStats, LocalFilter,
    Query, QueryClient, QueryKey, Subscription, Transport, ViewState,
};
use ward_core::{
    CanonicalizationError, Encounter, FetchError, MedicationRequest, PatientRecord,
    PatientSummary,
};

const MAX_NOTIFICATIONS: usize = 50;

/// A watched key and the subscription that forwards its transitions.
struct Watch {
    key: QueryKey,
    _subscription: Subscription,
}

pub struct App {
    pub config: TuiConfig,
    pub theme: WardTheme,
    pub screen: Screen,
    pub active_tab: ActiveTab,
    pub input_mode: InputMode,
    /// Text in the search box, also applied as a local filter.
    pub search_input: String,
    /// Name last submitted to the server search.
    pub submitted_search: Option<String>,
    pub selected: usize,
    pub notifications: Vec<Notification>,
    patients: QueryClient<Vec<PatientSummary>>,
    records: QueryClient<PatientRecord>,
    transport: Arc<dyn Transport>,
    events: mpsc::Sender<TuiEvent>,
    list_watch: Option<Watch>,
    detail_watch: Option<Watch>,
}

impl App {
    pub fn new(
        config: TuiConfig,
        transport: Arc<dyn Transport>,
        events: mpsc::Sender<TuiEvent>,
    ) -> Self {
        let cache = config.cache_config();
        let patients = QueryClient::new(cache.clone());
        let records = QueryClient::new(cache);
        Self::with_clients(config, transport, events, patients, records)
    }

    /// Build the app around existing clients (a shared clock in tests).
    pub fn with_clients(
        config: TuiConfig,
        transport: Arc<dyn Transport>,
        events: mpsc::Sender<TuiEvent>,
        patients: QueryClient<Vec<PatientSummary>>,
        records: QueryClient<PatientRecord>,
    ) -> Self {
        Self {
            config,
            theme: WardTheme::default(),
            screen: Screen::PatientList,
            active_tab: ActiveTab::default(),
            input_mode: InputMode::default(),
            search_input: String::new(),
            submitted_search: None,
            selected: 0,
            notifications: Vec::new(),
            patients,
            records,
            transport,
            events,
            list_watch: None,
            detail_watch: None,
        }
    }

    pub fn patients(&self) -> &QueryClient<Vec<PatientSummary>> {
        &self.patients
    }

    pub fn records(&self) -> &QueryClient<PatientRecord> {
        &self.records
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// `{name, limit}` once a search is submitted, the plain listing before.
    pub fn list_query(&self) -> PatientSearch {
        match self.submitted_search.as_deref() {
            Some(name) => PatientSearch::by_name(name, self.config.search_limit),
            None => PatientSearch::all(),
        }
    }

    pub fn detail_query(&self) -> Option<PatientDetail> {
        match &self.screen {
            Screen::PatientDetail { id } => Some(PatientDetail::new(id.clone())),
            Screen::PatientList => None,
        }
    }

    /// Watch the list key and make sure its payload is cached or loading.
    pub fn load_list(&mut self) -> Result<(), CanonicalizationError> {
        let query = self.list_query();
        let key = query.key()?;
        let current = self.list_watch.take();
        self.list_watch = Some(rewatch(&self.patients, &self.events, key.clone(), current));

        let fetcher = json_fetcher::<_, Vec<PatientSummary>>(Arc::clone(&self.transport), &query);
        if self.patients.ensure(&key, fetcher).is_cached() {
            tracing::trace!(key = %key, "List served from cache");
        }
        Ok(())
    }

    /// Watch the detail key and make sure its payload is cached or loading.
    pub fn load_detail(&mut self) -> Result<(), CanonicalizationError> {
        let Some(query) = self.detail_query() else {
            return Ok(());
        };
        let key = query.key()?;
        let current = self.detail_watch.take();
        self.detail_watch = Some(rewatch(&self.records, &self.events, key.clone(), current));

        let fetcher = json_fetcher::<_, PatientRecord>(Arc::clone(&self.transport), &query);
        if self.records.ensure(&key, fetcher).is_cached() {
            tracing::trace!(key = %key, "Record served from cache");
        }
        Ok(())
    }

    /// Refetch the query on screen, whatever its freshness.
    pub fn retry_active(&mut self) -> Result<(), CanonicalizationError> {
        self.notifications
            .retain(|n| n.action != Some(NotificationAction::Retry));

        match self.detail_query() {
            Some(query) => {
                let key = query.key()?;
                let fetcher = json_fetcher::<_, PatientRecord>(Arc::clone(&self.transport), &query);
                let _ = self.records.retry(&key, fetcher);
            }
            None => {
                let query = self.list_query();
                let key = query.key()?;
                let fetcher =
                    json_fetcher::<_, Vec<PatientSummary>>(Arc::clone(&self.transport), &query);
                let _ = self.patients.retry(&key, fetcher);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Edit the search box. The visible rows follow the submitted search only.
    pub fn push_search_char(&mut self, c: char) {
        self.search_input.push(c);
    }

    pub fn pop_search_char(&mut self) {
        self.search_input.pop();
    }

    /// Send the search box to the server. A blank box lists everyone.
    pub fn submit_search(&mut self) -> Result<(), CanonicalizationError> {
        let text = self.search_input.trim();
        self.submitted_search = (!text.is_empty()).then(|| text.to_string());
        self.input_mode = InputMode::Normal;
        self.selected = 0;
        tracing::debug!(search = ?self.submitted_search, "Search submitted");
        self.load_list()
    }

    /// Clear the search box and the submitted search.
    ///
    /// Returns `false` when both were already empty.
    pub fn clear_search(&mut self) -> Result<bool, CanonicalizationError> {
        self.input_mode = InputMode::Normal;
        if self.search_input.is_empty() && self.submitted_search.is_none() {
            return Ok(false);
        }
        self.search_input.clear();
        self.submitted_search = None;
        self.selected = 0;
        self.load_list()?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    pub fn list_entry(&self) -> Option<CacheEntry<Vec<PatientSummary>>> {
        let key = self.list_query().key().ok()?;
        self.patients.entry(&key)
    }

    pub fn detail_entry(&self) -> Option<CacheEntry<PatientRecord>> {
        let key = self.detail_query()?.key().ok()?;
        self.records.entry(&key)
    }

    pub fn list_view_state(&self) -> ViewState<PatientSummary> {
        let entry = self.list_entry();
        let submitted = self.submitted_search.as_deref().unwrap_or("");
        let filter = LocalFilter::new(submitted, PatientSummary::matches_name);
        derive_view_state(entry.as_ref(), Some(&filter))
    }

    /// The open patient as a one-record view state.
    pub fn record_view_state(&self) -> ViewState<PatientRecord> {
        derive_view_state_with(self.detail_entry().as_ref(), None, std::slice::from_ref)
    }

    pub fn encounters_view_state(&self) -> ViewState<Encounter> {
        derive_view_state_with(self.detail_entry().as_ref(), None, |record| {
            record.encounters.as_slice()
        })
    }

    pub fn medications_view_state(&self) -> ViewState<MedicationRequest> {
        derive_view_state_with(self.detail_entry().as_ref(), None, |record| {
            record.medications.as_slice()
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        let list = self.patients.stats();
        let detail = self.records.stats();
        CacheStats {
            hits: list.hits + detail.hits,
            misses: list.misses + detail.misses,
            fetches: list.fetches + detail.fetches,
            deduplicated: list.deduplicated + detail.deduplicated,
            entry_count: list.entry_count + detail.entry_count,
            evictions: list.evictions + detail.evictions,
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn select_next(&mut self) {
        let len = self.visible_len();
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Open the selected patient. Returns `false` when nothing is selectable.
    pub fn open_selected(&mut self) -> Result<bool, CanonicalizationError> {
        let ViewState::Ready { records, .. } = self.list_view_state() else {
            return Ok(false);
        };
        let Some(patient) = records.get(self.selected) else {
            return Ok(false);
        };
        self.screen = Screen::PatientDetail {
            id: patient.id.clone(),
        };
        self.active_tab = ActiveTab::default();
        self.load_detail()?;
        Ok(true)
    }

    /// Return to the list with its search intact.
    pub fn back_to_list(&mut self) -> Result<(), CanonicalizationError> {
        self.screen = Screen::PatientList;
        self.detail_watch = None;
        self.load_list()
    }

    pub fn next_tab(&mut self) {
        self.active_tab = self.active_tab.next();
    }

    pub fn previous_tab(&mut self) {
        self.active_tab = self.active_tab.previous();
    }

    pub fn switch_tab(&mut self, index: usize) {
        if let Some(tab) = ActiveTab::from_index(index) {
            self.active_tab = tab;
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// React to a transition of a watched entry.
    pub fn on_cache_updated(&mut self, key: &QueryKey) {
        let failure: Option<FetchError> = if is_watching(&self.list_watch, key) {
            self.clamp_selection();
            self.list_entry().and_then(|e| e.error().cloned())
        } else if is_watching(&self.detail_watch, key) {
            self.detail_entry().and_then(|e| e.error().cloned())
        } else {
            None
        };

        if let Some(err) = failure {
            let repeated = self
                .notifications
                .last()
                .is_some_and(|n| n.message == err.message());
            if !repeated {
                tracing::warn!(key = %key, error = %err, "Query failed");
                self.push_notification(
                    Notification::new(NotificationLevel::Error, err.message())
                        .with_action(NotificationAction::Retry),
                );
            }
        }
    }

    pub fn on_tick(&mut self) {
        self.patients.evict_idle();
        self.records.evict_idle();
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.push_notification(Notification::new(level, message));
    }

    pub fn dismiss_notification(&mut self) -> bool {
        self.notifications.pop().is_some()
    }

    fn push_notification(&mut self, notification: Notification) {
        self.notifications.push(notification);
        if self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.remove(0);
        }
    }

    fn visible_len(&self) -> usize {
        match self.list_view_state() {
            ViewState::Ready { records, .. } => records.len(),
            _ => 0,
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}

fn is_watching(watch: &Option<Watch>, key: &QueryKey) -> bool {
    watch.as_ref().is_some_and(|w| &w.key == key)
}

/// Keep `current` if it already watches `key`, otherwise subscribe anew.
///
/// Dropping the old watch unsubscribes it.
fn rewatch<T: Send + Sync + 'static>(
    client: &QueryClient<T>,
    events: &mpsc::Sender<TuiEvent>,
    key: QueryKey,
    current: Option<Watch>,
) -> Watch {
    if let Some(watch) = current.filter(|w| w.key == key) {
        return watch;
    }
    let sender = events.clone();
    let subscription = client.subscribe(key.clone(), move |key, _entry| {
        if sender.try_send(TuiEvent::CacheUpdated(key.clone())).is_err() {
            tracing::warn!(key = %key, "Event channel full, cache update dropped");
        }
    });
    Watch {
        key,
        _subscription: subscription,
    }
}
