//! Patient registry records as served by the registry API.
//!
//! Field names on the wire follow the backend's JSON (`resourceType`,
//! `full_name`, `reasonCode`, ...). Optional collections that the server
//! sends as `null` decode as empty.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder shown for missing demographic values.
pub const NOT_AVAILABLE: &str = "N/A";

/// One row of the patient search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummary {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub full_name: String,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl PatientSummary {
    /// Case-insensitive substring match on the full name.
    ///
    /// `needle` must already be lowercased.
    pub fn matches_name(&self, needle: &str) -> bool {
        self.full_name.to_lowercase().contains(needle)
    }
}

/// A patient with its nested sub-resources, fetched as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(flatten)]
    pub summary: PatientSummary,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub encounters: Vec<Encounter>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub medications: Vec<MedicationRequest>,
}

impl PatientRecord {
    /// Label/value pairs for the demographics panel, "N/A" for gaps.
    pub fn demographics(&self) -> Vec<(&'static str, String)> {
        let s = &self.summary;
        vec![
            ("Full Name", s.full_name.clone()),
            ("Birth Date", s.birth_date.format("%Y-%m-%d").to_string()),
            ("Gender", or_not_available(s.gender.as_deref())),
            ("Address", or_not_available(s.address.as_deref())),
            ("Phone", or_not_available(s.phone.as_deref())),
            ("Email", or_not_available(s.email.as_deref())),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub coding: Vec<Coding>,
}

impl CodeableConcept {
    /// Text, falling back to the first coding's display.
    pub fn label(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or_else(|| self.coding.first().and_then(|c| c.display.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl Period {
    pub fn describe(&self) -> String {
        let start = format_fhir_date(self.start.as_deref());
        match self.end.as_deref() {
            Some(end) => format!("{} to {}", start, format_fhir_date(Some(end))),
            None => start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub period: Period,
    #[serde(rename = "reasonCode", default, deserialize_with = "null_as_empty")]
    pub reason_code: Vec<CodeableConcept>,
}

impl Encounter {
    pub fn reason_text(&self) -> &str {
        self.reason_code
            .first()
            .and_then(CodeableConcept::label)
            .unwrap_or("No reason provided")
    }

    pub fn status_kind(&self) -> EncounterStatus {
        match self.status.as_str() {
            "finished" => EncounterStatus::Finished,
            "in-progress" => EncounterStatus::InProgress,
            _ => EncounterStatus::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterStatus {
    Finished,
    InProgress,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dosage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub route: Option<CodeableConcept>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationRequest {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    pub status: String,
    #[serde(rename = "medicationCodeableConcept", default)]
    pub medication_codeable_concept: CodeableConcept,
    #[serde(rename = "authoredOn")]
    pub authored_on: String,
    pub intent: String,
    #[serde(
        rename = "dosageInstruction",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub dosage_instruction: Vec<Dosage>,
}

impl MedicationRequest {
    pub fn medication_name(&self) -> &str {
        self.medication_codeable_concept
            .label()
            .unwrap_or("Unknown medication")
    }

    pub fn dosage_text(&self) -> &str {
        self.dosage_instruction
            .first()
            .and_then(|d| d.text.as_deref())
            .unwrap_or("No dosage instructions provided")
    }

    pub fn status_kind(&self) -> MedicationStatus {
        match self.status.as_str() {
            "active" => MedicationStatus::Active,
            "stopped" => MedicationStatus::Stopped,
            _ => MedicationStatus::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedicationStatus {
    Active,
    Stopped,
    Other,
}

/// Capitalize the first letter of a FHIR status code for display.
pub fn display_status(status: &str) -> String {
    let mut chars = status.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render a FHIR date or dateTime as `YYYY-MM-DD`, "N/A" when missing.
pub fn format_fhir_date(value: Option<&str>) -> String {
    let Some(raw) = value.filter(|v| !v.trim().is_empty()) else {
        return NOT_AVAILABLE.to_string();
    };
    match raw.get(..10) {
        Some(day) if NaiveDate::parse_from_str(day, "%Y-%m-%d").is_ok() => day.to_string(),
        _ => raw.to_string(),
    }
}

fn or_not_available(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail_json() -> serde_json::Value {
        json!({
            "resourceType": "Patient",
            "id": "p-1",
            "full_name": "Jane Doe",
            "birth_date": "1980-04-02",
            "gender": "female",
            "address": null,
            "encounters": [{
                "resourceType": "Encounter",
                "id": "e-1",
                "status": "finished",
                "period": {"start": "2023-01-05T10:00:00Z", "end": "2023-01-05T11:00:00Z"},
                "reasonCode": [{"coding": [{"display": "Checkup"}]}]
            }],
            "medications": null
        })
    }

    #[test]
    fn test_patient_record_decodes_nested_collections() {
        let record: PatientRecord = serde_json::from_value(detail_json()).unwrap();
        assert_eq!(record.summary.full_name, "Jane Doe");
        assert_eq!(record.encounters.len(), 1);
        assert!(record.medications.is_empty());
        assert_eq!(record.encounters[0].reason_text(), "Checkup");
        assert_eq!(record.encounters[0].status_kind(), EncounterStatus::Finished);
    }

    #[test]
    fn test_demographics_fill_missing_values() {
        let record: PatientRecord = serde_json::from_value(detail_json()).unwrap();
        let fields = record.demographics();
        let address = fields.iter().find(|(label, _)| *label == "Address").unwrap();
        assert_eq!(address.1, NOT_AVAILABLE);
        let gender = fields.iter().find(|(label, _)| *label == "Gender").unwrap();
        assert_eq!(gender.1, "female");
    }

    #[test]
    fn test_medication_fallbacks() {
        let med: MedicationRequest = serde_json::from_value(json!({
            "resourceType": "MedicationRequest",
            "id": "m-1",
            "status": "stopped",
            "medicationCodeableConcept": {},
            "authoredOn": "2022-11-01",
            "intent": "order"
        }))
        .unwrap();
        assert_eq!(med.medication_name(), "Unknown medication");
        assert_eq!(med.dosage_text(), "No dosage instructions provided");
        assert_eq!(med.status_kind(), MedicationStatus::Stopped);
    }

    #[test]
    fn test_period_describe() {
        let period = Period {
            start: Some("2023-01-05T10:00:00Z".to_string()),
            end: None,
        };
        assert_eq!(period.describe(), "2023-01-05");
        assert_eq!(Period::default().describe(), NOT_AVAILABLE);
    }

    #[test]
    fn test_display_status_capitalizes() {
        assert_eq!(display_status("in-progress"), "In-progress");
        assert_eq!(display_status(""), "");
    }

    #[test]
    fn test_matches_name_is_case_insensitive() {
        let record: PatientRecord = serde_json::from_value(detail_json()).unwrap();
        assert!(record.summary.matches_name("jane"));
        assert!(!record.summary.matches_name("zzz"));
    }
}
