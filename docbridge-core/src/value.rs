//! Loosely typed search values and their conversion to stored BSON.

use bson::{Bson, Uuid};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    schema::FieldKind,
};

/// A filter operand as supplied by callers.
///
/// Values arrive loosely typed (most often as strings from a UI or an API payload) and are
/// converted to the stored representation of the field they are compared against by
/// [`FilterValue::to_bson`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FilterValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<String>),
    #[serde(skip_deserializing)]
    DateTime(DateTime<Utc>),
}

impl FilterValue {
    /// Empty strings, empty lists and null carry no filter.
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::Null => true,
            FilterValue::String(value) => value.is_empty(),
            FilterValue::List(values) => values.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Converts the value to the BSON stored for a field of `kind`.
    ///
    /// Lists convert element by element to the field's element kind. A value that cannot
    /// represent the field's kind is an [`DocumentStoreError::InvalidQuery`].
    pub fn to_bson(&self, kind: FieldKind) -> DocumentStoreResult<Bson> {
        match self {
            FilterValue::Null => Ok(Bson::Null),
            FilterValue::List(values) => Ok(Bson::Array(
                values
                    .iter()
                    .map(|value| convert_str(value, kind.element_kind()))
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            )),
            FilterValue::String(value) => convert_str(value, kind.element_kind()),
            FilterValue::Number(value) => match kind.element_kind() {
                FieldKind::Integer if value.fract() == 0.0 => Ok(Bson::Int64(*value as i64)),
                FieldKind::Float => Ok(Bson::Double(*value)),
                FieldKind::String => Ok(Bson::String(format_number(*value))),
                other => Err(mismatch(self, other)),
            },
            FilterValue::Bool(value) => match kind.element_kind() {
                FieldKind::Bool => Ok(Bson::Boolean(*value)),
                FieldKind::String => Ok(Bson::String(value.to_string())),
                other => Err(mismatch(self, other)),
            },
            FilterValue::DateTime(value) => match kind.element_kind() {
                FieldKind::DateTime => Ok(Bson::DateTime(bson::DateTime::from_chrono(*value))),
                other => Err(mismatch(self, other)),
            },
        }
    }

    /// Converts every element of a value collection, flattening nested lists.
    pub fn collection_to_bson(values: &[FilterValue], kind: FieldKind) -> DocumentStoreResult<Vec<Bson>> {
        let mut converted = Vec::with_capacity(values.len());

        for value in values {
            match value.to_bson(kind)? {
                Bson::Array(items) => converted.extend(items),
                item => converted.push(item),
            }
        }

        Ok(converted)
    }
}

fn convert_str(value: &str, kind: FieldKind) -> DocumentStoreResult<Bson> {
    let value = value.trim();

    match kind {
        FieldKind::Integer => value
            .parse::<i64>()
            .map(Bson::Int64)
            .map_err(|_| invalid(value, kind)),
        FieldKind::Float => value
            .parse::<f64>()
            .map(Bson::Double)
            .map_err(|_| invalid(value, kind)),
        FieldKind::Bool => match value.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Bson::Boolean(true)),
            "false" | "0" => Ok(Bson::Boolean(false)),
            _ => Err(invalid(value, kind)),
        },
        FieldKind::DateTime => parse_datetime(value)
            .map(|parsed| Bson::DateTime(bson::DateTime::from_chrono(parsed)))
            .ok_or_else(|| invalid(value, kind)),
        FieldKind::Id | FieldKind::IdList => Uuid::parse_str(value)
            .map(Bson::from)
            .map_err(|_| invalid(value, kind)),
        _ => Ok(Bson::String(value.to_string())),
    }
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::<FixedOffset>::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn invalid(value: &str, kind: FieldKind) -> DocumentStoreError {
    DocumentStoreError::InvalidQuery(format!("'{value}' is not a valid {kind:?} value"))
}

fn mismatch(value: &FilterValue, kind: FieldKind) -> DocumentStoreError {
    DocumentStoreError::InvalidQuery(format!("{value:?} cannot be compared with a {kind:?} field"))
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value as f64)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Number(value as f64)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::DateTime(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        FilterValue::List(values)
    }
}

impl From<Vec<Uuid>> for FilterValue {
    fn from(values: Vec<Uuid>) -> Self {
        FilterValue::List(values.iter().map(Uuid::to_string).collect())
    }
}
