//! Typed search parameters of the phone book entities.
//!
//! Both types wrap the generic [`SearchParameters`] and add the filters callers of the phone
//! book use most. Converting them yields plain search parameters, with the id filters
//! expressed as reference filters.

use bson::Uuid;
use serde::{Deserialize, Serialize};

use docbridge_core::search::{ComparisonOperator, ReferenceFilter, SearchParameter, SearchParameters};

/// Search over contacts.
///
/// ```ignore
/// let params: SearchParameters = ContactSearch::new()
///     .query("%meier")
///     .location("Bern")
///     .manager_ids([manager.id])
///     .into();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSearch {
    #[serde(flatten)]
    pub search: SearchParameters,
    pub location: Option<String>,
    pub category_ids: Vec<Uuid>,
    pub manager_ids: Vec<Uuid>,
    pub secretary_ids: Vec<Uuid>,
    pub phone_book_ids: Vec<Uuid>,
}

impl ContactSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(mut self, search: SearchParameters) -> Self {
        self.search = search;
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.search.query = Some(query.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn category_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.category_ids.extend(ids);
        self
    }

    pub fn manager_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.manager_ids.extend(ids);
        self
    }

    pub fn secretary_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.secretary_ids.extend(ids);
        self
    }

    pub fn phone_book_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.phone_book_ids.extend(ids);
        self
    }
}

impl From<ContactSearch> for SearchParameters {
    fn from(typed: ContactSearch) -> Self {
        let mut params = typed.search;

        if let Some(location) = typed.location.filter(|location| !location.trim().is_empty()) {
            params
                .parameters
                .push(SearchParameter::new("location", ComparisonOperator::EqualTo, location));
        }

        for (field, ids) in [
            ("category_ids", typed.category_ids),
            ("manager_id", typed.manager_ids),
            ("secretary_ids", typed.secretary_ids),
            ("phone_book_ids", typed.phone_book_ids),
        ] {
            if !ids.is_empty() {
                params.references.push(ReferenceFilter { field: field.to_string(), ids });
            }
        }

        params
    }
}

/// Search over categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySearch {
    #[serde(flatten)]
    pub search: SearchParameters,
    pub phone_book_ids: Vec<Uuid>,
}

impl CategorySearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(mut self, search: SearchParameters) -> Self {
        self.search = search;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.search.name = Some(name.into());
        self
    }

    pub fn phone_book_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.phone_book_ids.extend(ids);
        self
    }
}

impl From<CategorySearch> for SearchParameters {
    fn from(typed: CategorySearch) -> Self {
        let mut params = typed.search;

        if !typed.phone_book_ids.is_empty() {
            params.references.push(ReferenceFilter {
                field: "phone_book_ids".to_string(),
                ids: typed.phone_book_ids,
            });
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use docbridge_core::search::BooleanOperator;

    use super::*;

    #[test]
    fn contact_filters_become_references() {
        let manager = Uuid::new();
        let params = SearchParameters::from(
            ContactSearch::new()
                .location("Bern")
                .manager_ids([manager])
                .secretary_ids([]),
        );

        assert_eq!(params.parameters, vec![SearchParameter::new("location", ComparisonOperator::EqualTo, "Bern")]);
        assert_eq!(params.references, vec![ReferenceFilter { field: "manager_id".to_string(), ids: vec![manager] }]);
    }

    #[test]
    fn typed_searches_read_flat_payloads() {
        let typed: CategorySearch = serde_json::from_str(r#"{"name": "%ateg", "page_size": 5, "operator": "Or"}"#).unwrap();

        assert_eq!(typed.search.name.as_deref(), Some("%ateg"));
        assert_eq!(typed.search.page_size, 5);
        assert_eq!(typed.search.page, 1);
        assert_eq!(typed.search.operator, BooleanOperator::Or);
        assert!(typed.phone_book_ids.is_empty());
    }
}
