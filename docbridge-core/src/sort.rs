//! Sort resolution and ordering of stored values.
//!
//! A [`SortPlan`] is resolved from the caller's `sort_by` / `sort_ascending` pair against
//! the entity's schema:
//!
//! - no `sort_by`: the schema's default sort (e.g. last name then first name),
//! - a sort alias: the referenced entity's field (e.g. the manager's last name),
//! - anything else: the named field.
//!
//! Every plan ends with an ascending `id` key so pages never overlap.

use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Sort, SortDirection},
    schema::{EntitySchema, FieldRole},
};

/// What a sort term orders by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// A stored field of the entity.
    Field(String),
    /// A field of the entity referenced by `id_field`.
    Reference {
        id_field: &'static str,
        target: &'static str,
        target_field: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTerm {
    pub key: SortKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPlan {
    pub terms: Vec<SortTerm>,
}

impl SortPlan {
    pub fn resolve(
        schema: &'static EntitySchema,
        sort_by: Option<&str>,
        ascending: Option<bool>,
    ) -> DocumentStoreResult<Self> {
        let direction = SortDirection::from_ascending(ascending.unwrap_or(true));
        let mut terms = Vec::new();

        match sort_by.map(str::trim).filter(|s| !s.is_empty()) {
            None => terms.extend(schema.default_sort.iter().map(|field| SortTerm {
                key: SortKey::Field(field.to_string()),
                direction: SortDirection::Asc,
            })),
            Some(name) => {
                let key = match schema.sort_alias(name) {
                    Some(alias) => SortKey::Reference {
                        id_field: alias.field,
                        target: alias.target,
                        target_field: alias.target_field,
                    },
                    None => {
                        let resolved = schema
                            .resolve_path(name)
                            .filter(|resolved| resolved.root.role != FieldRole::Navigation)
                            .ok_or_else(|| {
                                DocumentStoreError::InvalidQuery(format!(
                                    "Cannot sort {} by unknown field '{name}'",
                                    schema.collection
                                ))
                            })?;
                        SortKey::Field(resolved.path)
                    }
                };

                terms.push(SortTerm { key, direction });
            }
        }

        if !terms.iter().any(|term| term.key == SortKey::Field("id".to_string())) {
            terms.push(SortTerm {
                key: SortKey::Field("id".to_string()),
                direction: SortDirection::Asc,
            });
        }

        Ok(Self { terms })
    }

    /// Whether the store can order results by itself.
    pub fn is_native(&self) -> bool {
        self.terms
            .iter()
            .all(|term| matches!(term.key, SortKey::Field(_)))
    }

    /// Store-level sort keys. Only meaningful for native plans.
    pub fn native_sorts(&self) -> Vec<Sort> {
        self.terms
            .iter()
            .filter_map(|term| match &term.key {
                SortKey::Field(field) => Some(Sort::new(field.clone(), term.direction)),
                SortKey::Reference { .. } => None,
            })
            .collect()
    }
}

/// Orders two documents by a list of sort keys on dotted paths.
pub fn compare_documents(left: &Document, right: &Document, sorts: &[Sort]) -> Ordering {
    for sort in sorts {
        let ordering = compare_values(
            lookup_path(left, &sort.field).unwrap_or(&Bson::Null),
            lookup_path(right, &sort.field).unwrap_or(&Bson::Null),
        );
        let ordering = match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Follows a dotted path through embedded documents. Arrays yield their first element's value.
pub fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items
                .iter()
                .find_map(|item| item.as_document().and_then(|inner| inner.get(segment)))?,
            _ => return None,
        };
    }

    Some(current)
}

/// A total order over BSON values: values of different types order by type
/// (null, numbers, strings, documents, arrays, binary, booleans, dates), values
/// of the same type by value.
pub fn compare_values(left: &Bson, right: &Bson) -> Ordering {
    let by_rank = type_rank(left).cmp(&type_rank(right));

    if by_rank != Ordering::Equal {
        return by_rank;
    }

    match (left, right) {
        (Bson::String(a), Bson::String(b)) => a.cmp(b),
        (Bson::Boolean(a), Bson::Boolean(b)) => a.cmp(b),
        (Bson::DateTime(a), Bson::DateTime(b)) => a.cmp(b),
        (Bson::Binary(a), Bson::Binary(b)) => a.bytes.cmp(&b.bytes),
        (Bson::Array(a), Bson::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Bson::Document(a), Bson::Document(b)) => a
            .iter()
            .zip(b.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| compare_values(va, vb)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

/// Numeric value of any BSON number.
pub fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::Null | Bson::Undefined => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 1,
        Bson::String(_) | Bson::Symbol(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::ObjectId(_) => 6,
        Bson::Boolean(_) => 7,
        Bson::DateTime(_) => 8,
        Bson::Timestamp(_) => 9,
        _ => 10,
    }
}
