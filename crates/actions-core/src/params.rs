use crate::error::{ActionError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// One `{name, type, value}` entry of an invocation's parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "value_as_string")]
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            value: value.into(),
        }
    }
}

/// Agents always send strings, but hand-written events often carry numbers.
fn value_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// The flat parameter list of an invocation.
///
/// Names are not guaranteed unique; the last occurrence wins. Blank values
/// count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Vec<Parameter>);

impl Parameters {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self(params)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| Parameter::new(k, v))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| ActionError::MissingParameter(name.to_string()))
    }

    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|v| v.parse::<T>().map_err(|e| ActionError::invalid(name, e.to_string())))
            .transpose()
    }

    pub fn extend(&mut self, more: impl IntoIterator<Item = Parameter>) {
        self.0.extend(more);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Parameter> for Parameters {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_occurrence_wins() {
        let params = Parameters::from_pairs([("query", "first"), ("query", "second")]);
        assert_eq!(params.get("query"), Some("second"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let params = Parameters::from_pairs([("patient_id", "   ")]);
        assert_eq!(params.get("patient_id"), None);
        let err = params.require("patient_id").unwrap_err();
        assert!(matches!(err, ActionError::MissingParameter(ref n) if n == "patient_id"));
    }

    #[test]
    fn parse_reports_invalid_values() {
        let params = Parameters::from_pairs([("days", "seven")]);
        let err = params.parse::<u32>("days").unwrap_err();
        assert!(matches!(err, ActionError::InvalidParameter { ref name, .. } if name == "days"));
        assert_eq!(params.parse::<u32>("missing").unwrap(), None);
    }

    #[test]
    fn numeric_json_values_become_strings() {
        let params: Parameters = serde_json::from_str(
            r#"[{"name":"days","type":"integer","value":7},{"name":"topic","value":"news"}]"#,
        )
        .unwrap();
        assert_eq!(params.parse::<u32>("days").unwrap(), Some(7));
        assert_eq!(params.get("topic"), Some("news"));
        assert_eq!(params.iter().next().unwrap().kind.as_deref(), Some("integer"));
    }
}
