//! WARD Test Utilities
//!
//! Shared test infrastructure for the WARD workspace:
//! - A scripted transport standing in for the registry API
//! - Proptest generators for registry records
//! - Fixtures for common screens and cache scenarios
//! - Assertions over cache entries and view states

pub use ward_cache::{
    CacheConfig, CacheEntry, ManualClock, QueryClient, QueryKey, QueryStatus, RetryPolicy,
    Transport, ViewState,
};
pub use ward_core::{
    CodeableConcept, Coding, Dosage, Encounter, FetchError, MedicationRequest, PatientRecord,
    PatientSummary, Period,
};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

// ============================================================================
// SCRIPTED TRANSPORT
// ============================================================================

/// Transport that replays queued responses per path.
///
/// Each path keeps a queue of outcomes; the last one repeats once the queue
/// is down to a single item. Unknown paths fail permanently with a 404-style
/// message, like the registry API does.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Result<serde_json::Value, FetchError>>>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for `path`.
    pub fn respond(self, path: impl Into<String>, outcome: Result<serde_json::Value, FetchError>) -> Self {
        self.push(path, outcome);
        self
    }

    pub fn push(&self, path: impl Into<String>, outcome: Result<serde_json::Value, FetchError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.into())
            .or_default()
            .push_back(outcome);
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_string(), params.to_vec()));

        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(queue) = script.get_mut(path) else {
            return Err(FetchError::permanent(format!(
                "API request failed: 404 Not Found ({})",
                path
            )));
        };
        match queue.len() {
            0 => Err(FetchError::permanent(format!("No scripted response for {}", path))),
            1 => queue.front().cloned().unwrap_or_else(|| Err(FetchError::permanent("empty script"))),
            _ => queue
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::permanent("empty script"))),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for registry records.

    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    /// Generate a patient id like the registry's `p-<n>`.
    pub fn arb_patient_id() -> impl Strategy<Value = String> {
        (1u32..100_000).prop_map(|n| format!("p-{}", n))
    }

    /// Generate a plausible full name.
    pub fn arb_full_name() -> impl Strategy<Value = String> {
        ("[A-Z][a-z]{2,8}", "[A-Z][a-z]{2,10}").prop_map(|(first, last)| format!("{} {}", first, last))
    }

    /// Generate a birth date between 1920 and 2020.
    pub fn arb_birth_date() -> impl Strategy<Value = NaiveDate> {
        (1920i32..2020, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| {
            NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
        })
    }

    pub fn arb_gender() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("female".to_string())),
            Just(Some("male".to_string())),
            Just(Some("other".to_string())),
        ]
    }

    /// Generate a patient summary.
    pub fn arb_patient_summary() -> impl Strategy<Value = PatientSummary> {
        (
            arb_patient_id(),
            arb_full_name(),
            arb_birth_date(),
            arb_gender(),
            proptest::option::of("[0-9]{1,4} [A-Z][a-z]{3,8} St"),
            proptest::option::of("555-[0-9]{4}"),
        )
            .prop_map(|(id, full_name, birth_date, gender, address, phone)| {
                let email = Some(format!("{}@example.com", id));
                PatientSummary {
                    resource_type: "Patient".to_string(),
                    id,
                    full_name,
                    birth_date,
                    gender,
                    address,
                    phone,
                    email,
                }
            })
    }

    /// Generate a search result page of up to `max` patients.
    pub fn arb_patient_page(max: usize) -> impl Strategy<Value = Vec<PatientSummary>> {
        prop::collection::vec(arb_patient_summary(), 0..=max)
    }

    /// Generate a FHIR encounter status, including unexpected ones.
    pub fn arb_encounter_status() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("finished".to_string()),
            Just("in-progress".to_string()),
            Just("planned".to_string()),
            Just("cancelled".to_string()),
        ]
    }

    pub fn arb_medication_status() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("active".to_string()),
            Just("stopped".to_string()),
            Just("on-hold".to_string()),
        ]
    }

    /// Generate a transient or permanent fetch error.
    pub fn arb_fetch_error() -> impl Strategy<Value = FetchError> {
        prop_oneof![
            "[a-z ]{1,20}".prop_map(|m| FetchError::transient(m)),
            "[a-z ]{1,20}".prop_map(|m| FetchError::permanent(m)),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records matching the registry's sample data.

    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
    }

    pub fn patient(id: &str, full_name: &str) -> PatientSummary {
        PatientSummary {
            resource_type: "Patient".to_string(),
            id: id.to_string(),
            full_name: full_name.to_string(),
            birth_date: date(1985, 3, 14),
            gender: Some("female".to_string()),
            address: Some("12 Harbor St".to_string()),
            phone: Some("555-0101".to_string()),
            email: None,
        }
    }

    /// Three patients, exactly one of whom matches "jane".
    pub fn patient_page() -> Vec<PatientSummary> {
        vec![
            patient("p-1", "Jane Doe"),
            patient("p-2", "John Roe"),
            patient("p-3", "Ann Lee"),
        ]
    }

    pub fn finished_encounter(id: &str) -> Encounter {
        Encounter {
            resource_type: "Encounter".to_string(),
            id: id.to_string(),
            status: "finished".to_string(),
            period: Period {
                start: Some("2023-01-05T10:00:00Z".to_string()),
                end: Some("2023-01-05T11:00:00Z".to_string()),
            },
            reason_code: vec![CodeableConcept {
                text: Some("Annual checkup".to_string()),
                coding: Vec::new(),
            }],
        }
    }

    pub fn active_medication(id: &str) -> MedicationRequest {
        MedicationRequest {
            resource_type: "MedicationRequest".to_string(),
            id: id.to_string(),
            status: "active".to_string(),
            medication_codeable_concept: CodeableConcept {
                text: None,
                coding: vec![Coding {
                    system: Some("http://www.nlm.nih.gov/research/umls/rxnorm".to_string()),
                    code: Some("197361".to_string()),
                    display: Some("Amlodipine 5 MG".to_string()),
                }],
            },
            authored_on: "2023-02-01".to_string(),
            intent: "order".to_string(),
            dosage_instruction: vec![Dosage {
                text: Some("Take one tablet daily".to_string()),
                route: None,
            }],
        }
    }

    /// A patient with one encounter and one medication.
    pub fn patient_record(id: &str, full_name: &str) -> PatientRecord {
        PatientRecord {
            summary: patient(id, full_name),
            encounters: vec![finished_encounter("e-1")],
            medications: vec![active_medication("m-1")],
        }
    }

    /// A patient with no sub-resources.
    pub fn bare_record(id: &str, full_name: &str) -> PatientRecord {
        PatientRecord {
            summary: patient(id, full_name),
            encounters: Vec::new(),
            medications: Vec::new(),
        }
    }

    /// JSON body of the search endpoint for `patients`.
    pub fn search_body(patients: &[PatientSummary]) -> serde_json::Value {
        serde_json::to_value(patients).unwrap_or_else(|_| json!([]))
    }

    /// JSON body of the detail endpoint for `record`.
    pub fn detail_body(record: &PatientRecord) -> serde_json::Value {
        serde_json::to_value(record).unwrap_or_else(|_| json!({}))
    }

    /// Cache config with millisecond backoff, for retry scenarios.
    pub fn fast_cache_config() -> CacheConfig {
        CacheConfig::default().with_retry(
            RetryPolicy::default().with_backoff(
                std::time::Duration::from_millis(1),
                std::time::Duration::from_millis(4),
            ),
        )
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over cache entries and view states.

    use super::*;

    #[track_caller]
    pub fn assert_status<T>(entry: Option<&CacheEntry<T>>, expected: QueryStatus) {
        match entry {
            Some(entry) => assert_eq!(entry.status(), expected, "unexpected entry status: {:?}", entry),
            None => panic!("Expected entry with status {:?}, found none", expected),
        }
    }

    #[track_caller]
    pub fn assert_ready_count<R: std::fmt::Debug>(state: &ViewState<R>, shown: usize, total: usize) {
        match state {
            ViewState::Ready {
                records,
                total_count,
            } => {
                assert_eq!(records.len(), shown, "wrong number of shown records");
                assert_eq!(*total_count, total, "wrong total count");
            }
            other => panic!("Expected Ready, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_error_message<R: std::fmt::Debug>(state: &ViewState<R>, needle: &str) {
        match state {
            ViewState::Error { message } => {
                assert!(message.contains(needle), "message {:?} lacks {:?}", message, needle)
            }
            other => panic!("Expected Error, got: {:?}", other),
        }
    }
}
