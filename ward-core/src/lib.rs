//! WARD Core - Registry Types
//!
//! Data types and the error taxonomy shared by the cache engine and the
//! terminal client. No I/O lives here.

pub mod config;
pub mod error;
pub mod patient;

pub use config::{CacheSettings, RetryConfig};
pub use error::{CanonicalizationError, ConfigError, FetchError, WardError, WardResult};
pub use patient::{
    display_status, format_fhir_date, CodeableConcept, Coding, Dosage, Encounter,
    EncounterStatus, MedicationRequest, MedicationStatus, PatientRecord, PatientSummary, Period,
    NOT_AVAILABLE,
};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
