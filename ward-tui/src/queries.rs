//! Query kinds issued by the terminal client.

use ward_cache::{ParamValue, Query};
use ward_core::CanonicalizationError;

/// Patient search: `GET /patients/?name=&limit=`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientSearch {
    pub name: Option<String>,
    pub limit: Option<u32>,
}

impl PatientSearch {
    /// The unfiltered listing.
    pub fn all() -> Self {
        Self::default()
    }

    /// A submitted name search. A blank name counts as no name.
    pub fn by_name(name: &str, limit: u32) -> Self {
        let name = name.trim();
        Self {
            name: (!name.is_empty()).then(|| name.to_string()),
            limit: Some(limit),
        }
    }
}

impl Query for PatientSearch {
    fn resource(&self) -> &'static str {
        "patients"
    }

    fn params(&self) -> Vec<(&'static str, Option<ParamValue>)> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ParamValue::from);
        vec![("name", name), ("limit", self.limit.map(ParamValue::from))]
    }

    fn path(&self) -> String {
        "/patients/".to_string()
    }
}

/// One patient with encounters and medications: `GET /patients/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientDetail {
    pub id: String,
}

impl PatientDetail {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Query for PatientDetail {
    fn resource(&self) -> &'static str {
        "patient"
    }

    fn params(&self) -> Vec<(&'static str, Option<ParamValue>)> {
        vec![("id", Some(ParamValue::from(self.id.as_str())))]
    }

    fn path(&self) -> String {
        format!("/patients/{}", urlencoding::encode(&self.id))
    }

    fn validate(&self) -> Result<(), CanonicalizationError> {
        if self.id.trim().is_empty() {
            return Err(CanonicalizationError::BlankRequiredParameter {
                resource: self.resource().to_string(),
                name: "id".to_string(),
            });
        }
        Ok(())
    }
}
