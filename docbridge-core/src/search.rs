//! Store-agnostic search parameters.
//!
//! [`SearchParameters`] is what callers hand to a search: a page window, an optional sort,
//! a free-text query and a list of field descriptors combined with a boolean operator.

use bson::Uuid;
use serde::{Deserialize, Serialize};

use crate::value::FilterValue;

/// Comparison applied by a single [`SearchParameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[default]
    EqualTo,
    NotEqualTo,
    MoreThan,
    LessThan,
    MoreThanOrEqualTo,
    LessThanOrEqualTo,
    StartsWith,
    EndsWith,
    Contains,
    IsEmpty,
    IsNotEmpty,
}

impl ComparisonOperator {
    /// Operators that still apply when the descriptor carries no value.
    pub fn accepts_empty_value(self) -> bool {
        matches!(
            self,
            ComparisonOperator::EqualTo
                | ComparisonOperator::NotEqualTo
                | ComparisonOperator::IsEmpty
                | ComparisonOperator::IsNotEmpty
        )
    }

    /// Substring and prefix operators, which only apply to textual fields.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            ComparisonOperator::StartsWith | ComparisonOperator::EndsWith | ComparisonOperator::Contains
        )
    }
}

/// How the compiled descriptors are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BooleanOperator {
    #[default]
    And,
    Or,
}

/// One field condition of a search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParameter {
    pub field_name: String,
    pub operator: ComparisonOperator,
    pub value: FilterValue,
    /// When not empty, the field must match one of these values and `operator` is ignored.
    pub values: Vec<FilterValue>,
}

impl SearchParameter {
    pub fn new(field_name: impl Into<String>, operator: ComparisonOperator, value: impl Into<FilterValue>) -> Self {
        Self {
            field_name: field_name.into(),
            operator,
            value: value.into(),
            values: Vec::new(),
        }
    }

    /// A condition without an operand, e.g. [`ComparisonOperator::IsEmpty`].
    pub fn unary(field_name: impl Into<String>, operator: ComparisonOperator) -> Self {
        Self::new(field_name, operator, FilterValue::Null)
    }

    /// A membership condition: the field matches any of `values`.
    pub fn one_of<V: Into<FilterValue>>(field_name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            field_name: field_name.into(),
            operator: ComparisonOperator::EqualTo,
            value: FilterValue::Null,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Restricts results to entities referencing at least one of `ids` through `field`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferenceFilter {
    pub field: String,
    pub ids: Vec<Uuid>,
}

/// Parameters of a search.
///
/// # Example
///
/// ```ignore
/// use docbridge::search::{SearchParameters, SearchParameter, ComparisonOperator};
///
/// let params = SearchParameters::builder()
///     .query("%contact")
///     .parameter(SearchParameter::new("Location", ComparisonOperator::EqualTo, "Bern"))
///     .sort_by("first_name")
///     .ascending(false)
///     .page(1)
///     .page_size(10)
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParameters {
    /// 1-based page number.
    pub page: i64,
    /// Page size; zero or less returns every match.
    pub page_size: i64,
    pub sort_by: Option<String>,
    pub sort_ascending: Option<bool>,
    /// Free-text query matched against the entity's name fields.
    pub query: Option<String>,
    /// Name filter, matched the same way as `query`.
    pub name: Option<String>,
    pub operator: BooleanOperator,
    pub parameters: Vec<SearchParameter>,
    pub references: Vec<ReferenceFilter>,
    /// Hydrate navigation fields of every returned entity.
    pub include_dependent_elements: bool,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 0,
            sort_by: None,
            sort_ascending: None,
            query: None,
            name: None,
            operator: BooleanOperator::And,
            parameters: Vec::new(),
            references: Vec::new(),
            include_dependent_elements: false,
        }
    }
}

impl SearchParameters {
    pub fn builder() -> SearchParametersBuilder {
        SearchParametersBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchParametersBuilder {
    params: SearchParameters,
}

impl SearchParametersBuilder {
    pub fn page(mut self, page: i64) -> Self {
        self.params.page = page;
        self
    }

    pub fn page_size(mut self, page_size: i64) -> Self {
        self.params.page_size = page_size;
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.params.sort_by = Some(field.into());
        self
    }

    pub fn ascending(mut self, ascending: bool) -> Self {
        self.params.sort_ascending = Some(ascending);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.params.query = Some(query.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.params.name = Some(name.into());
        self
    }

    pub fn operator(mut self, operator: BooleanOperator) -> Self {
        self.params.operator = operator;
        self
    }

    pub fn parameter(mut self, parameter: SearchParameter) -> Self {
        self.params.parameters.push(parameter);
        self
    }

    /// Adds a reference filter; an empty id list is ignored at compile time.
    pub fn references(mut self, field: impl Into<String>, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.params.references.push(ReferenceFilter {
            field: field.into(),
            ids: ids.into_iter().collect(),
        });
        self
    }

    pub fn include_dependent_elements(mut self, include: bool) -> Self {
        self.params.include_dependent_elements = include;
        self
    }

    pub fn build(self) -> SearchParameters {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_an_unfiltered_first_page() {
        let params: SearchParameters = serde_json::from_str("{}").unwrap();

        assert_eq!(params, SearchParameters::default());
        assert_eq!(params.page, 1);
        assert_eq!(params.operator, BooleanOperator::And);
    }

    #[test]
    fn descriptors_default_to_equality() {
        let parameter: SearchParameter = serde_json::from_str(r#"{"field_name": "location", "value": "Bern"}"#).unwrap();

        assert_eq!(parameter.operator, ComparisonOperator::EqualTo);
        assert_eq!(parameter.value, FilterValue::from("Bern"));
    }

    #[test]
    fn empty_value_operators() {
        assert!(ComparisonOperator::IsEmpty.accepts_empty_value());
        assert!(ComparisonOperator::NotEqualTo.accepts_empty_value());
        assert!(!ComparisonOperator::Contains.accepts_empty_value());
        assert!(!ComparisonOperator::MoreThan.accepts_empty_value());
    }
}
