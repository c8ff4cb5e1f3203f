//! Canonical query keys.
//!
//! A `QueryKey` can only be produced by [`canonicalize`], so every key held
//! by the store has gone through the same ordering and escaping rules.
//! Two parameter sets that differ only in insertion order, or in whether an
//! absent field was mentioned at all, produce the same key.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ward_core::CanonicalizationError;

/// A scalar query parameter value.
///
/// Values carry a type tag in the canonical form, so the string `"10"` and
/// the integer `10` never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ParamValue {
    /// Tagged, escaped form used inside a canonical key.
    fn encode(&self) -> String {
        match self {
            Self::Str(s) => format!("s:{}", urlencoding::encode(s)),
            Self::Int(i) => format!("i:{}", i),
            Self::Bool(b) => format!("b:{}", b),
        }
    }

    /// Plain form used on the wire by a transport.
    pub fn to_query_value(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Canonical identifier for a cacheable query.
///
/// Format: `<resource>[?<name>=<tagged value>(&<name>=<tagged value>)*]`
/// with the resource, names, and string values percent-encoded and the
/// parameters sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct KeyInner {
    canonical: Arc<str>,
    resource: Arc<str>,
}

impl QueryKey {
    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.inner.canonical
    }

    /// The resource name this key was built for.
    pub fn resource(&self) -> &str {
        &self.inner.resource
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the canonical key for `resource` and `params`.
///
/// Parameters whose value is `None` are dropped before ordering. Empty
/// resource or parameter names and repeated parameter names are rejected:
/// they indicate a defect in the caller, not a runtime condition.
pub fn canonicalize<I, K>(resource: &str, params: I) -> Result<QueryKey, CanonicalizationError>
where
    I: IntoIterator<Item = (K, Option<ParamValue>)>,
    K: AsRef<str>,
{
    if resource.trim().is_empty() {
        return Err(CanonicalizationError::EmptyResource);
    }

    let mut ordered: BTreeMap<String, Option<ParamValue>> = BTreeMap::new();
    for (name, value) in params {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(CanonicalizationError::EmptyParameterName {
                resource: resource.to_string(),
            });
        }
        if ordered.insert(name.to_string(), value).is_some() {
            return Err(CanonicalizationError::DuplicateParameter {
                resource: resource.to_string(),
                name: name.to_string(),
            });
        }
    }

    let mut canonical = urlencoding::encode(resource).into_owned();
    let mut separator = '?';
    for (name, value) in ordered.iter().filter_map(|(n, v)| v.as_ref().map(|v| (n, v))) {
        canonical.push(separator);
        canonical.push_str(&urlencoding::encode(name));
        canonical.push('=');
        canonical.push_str(&value.encode());
        separator = '&';
    }

    Ok(QueryKey {
        inner: KeyInner {
            canonical: Arc::from(canonical),
            resource: Arc::from(resource),
        },
    })
}

/// A typed, closed parameter record for one kind of query.
///
/// Implementors describe their resource name, their parameters, and the
/// transport path; the key is always derived through [`canonicalize`].
pub trait Query {
    /// Logical resource name used in the cache key.
    fn resource(&self) -> &'static str;

    /// Named parameters; `None` marks an absent value.
    fn params(&self) -> Vec<(&'static str, Option<ParamValue>)>;

    /// Path passed to the transport, relative to its base URL.
    fn path(&self) -> String;

    /// Reject parameter records that cannot form a meaningful key.
    fn validate(&self) -> Result<(), CanonicalizationError> {
        Ok(())
    }

    fn key(&self) -> Result<QueryKey, CanonicalizationError> {
        self.validate()?;
        canonicalize(self.resource(), self.params())
    }

    /// Present parameters as wire pairs, in name order.
    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .params()
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v.to_query_value())))
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(name: Option<&str>, limit: Option<u32>) -> Vec<(&'static str, Option<ParamValue>)> {
        vec![
            ("name", name.map(ParamValue::from)),
            ("limit", limit.map(ParamValue::from)),
        ]
    }

    #[test]
    fn test_key_is_order_independent() {
        let a = canonicalize("patients", search(Some("Jane"), Some(10))).unwrap();
        let b = canonicalize(
            "patients",
            vec![
                ("limit", Some(ParamValue::from(10u32))),
                ("name", Some(ParamValue::from("Jane"))),
            ],
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "patients?limit=i:10&name=s:Jane");
    }

    #[test]
    fn test_absent_values_are_omitted() {
        let with_none = canonicalize("patients", search(None, Some(10))).unwrap();
        let without = canonicalize("patients", vec![("limit", Some(ParamValue::from(10u32)))]).unwrap();
        assert_eq!(with_none, without);
    }

    #[test]
    fn test_no_params_is_bare_resource() {
        let key = canonicalize("patients", search(None, None)).unwrap();
        assert_eq!(key.as_str(), "patients");
        assert_eq!(key.resource(), "patients");
    }

    #[test]
    fn test_string_and_int_values_do_not_collide() {
        let as_int = canonicalize("patients", vec![("limit", Some(ParamValue::from(10u32)))]).unwrap();
        let as_str = canonicalize("patients", vec![("limit", Some(ParamValue::from("10")))]).unwrap();
        assert_ne!(as_int, as_str);
    }

    #[test]
    fn test_reserved_characters_are_escaped() {
        let injected = canonicalize("patients", vec![("name", Some(ParamValue::from("a&limit=i:5")))]).unwrap();
        let split = canonicalize(
            "patients",
            vec![
                ("name", Some(ParamValue::from("a"))),
                ("limit", Some(ParamValue::from(5u32))),
            ],
        )
        .unwrap();
        assert_ne!(injected, split);
    }

    #[test]
    fn test_resource_with_separator_does_not_collide() {
        let a = canonicalize("patients?name=s:x", Vec::<(&str, Option<ParamValue>)>::new()).unwrap();
        let b = canonicalize("patients", vec![("name", Some(ParamValue::from("x")))]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_resource_rejected() {
        let err = canonicalize("  ", search(None, None)).unwrap_err();
        assert_eq!(err, CanonicalizationError::EmptyResource);
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let err = canonicalize(
            "patients",
            vec![("name", Some(ParamValue::from("a"))), ("name", None)],
        )
        .unwrap_err();
        assert!(matches!(err, CanonicalizationError::DuplicateParameter { .. }));
    }

    #[test]
    fn test_empty_parameter_name_rejected() {
        let err = canonicalize("patients", vec![("", Some(ParamValue::from(true)))]).unwrap_err();
        assert!(matches!(err, CanonicalizationError::EmptyParameterName { .. }));
    }

    struct ById(&'static str);

    impl Query for ById {
        fn resource(&self) -> &'static str {
            "patient"
        }

        fn params(&self) -> Vec<(&'static str, Option<ParamValue>)> {
            vec![("id", Some(ParamValue::from(self.0)))]
        }

        fn path(&self) -> String {
            format!("/patients/{}", self.0)
        }

        fn validate(&self) -> Result<(), CanonicalizationError> {
            if self.0.trim().is_empty() {
                return Err(CanonicalizationError::BlankRequiredParameter {
                    resource: "patient".to_string(),
                    name: "id".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_query_trait_key_and_pairs() {
        let query = ById("p-1");
        assert_eq!(query.key().unwrap().as_str(), "patient?id=s:p-1");
        assert_eq!(query.query_pairs(), vec![("id".to_string(), "p-1".to_string())]);
        assert!(ById(" ").key().is_err());
    }
}
