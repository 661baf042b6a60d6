//! Compiles [`SearchParameters`] into a store-agnostic [`Expr`].
//!
//! Three independent parts make up a search filter and are ANDed together:
//!
//! - the field descriptors, combined with the declared [`BooleanOperator`],
//! - the free-text `query` / `name` filter against the entity's name fields,
//! - the reference filters (e.g. "contacts managed by one of these ids").
//!
//! Descriptors are checked against the entity's [`EntitySchema`]: an unknown field or an
//! unconvertible value fails the compilation, while a text operator applied to a numeric,
//! date or boolean field is skipped with a warning.

use bson::Bson;
use tracing::{debug, warn};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter},
    schema::{EntitySchema, FieldKind, FieldRole, NameSearch},
    search::{BooleanOperator, ComparisonOperator, ReferenceFilter, SearchParameter, SearchParameters},
    value::FilterValue,
};

/// Matches everything when used as a free-text query.
const MATCH_ALL: &str = "*";
/// Prefix switching a free-text query from prefix to substring matching.
const SUBSTRING_MARKER: char = '%';

#[derive(Debug, Clone, Copy)]
pub struct PredicateCompiler {
    schema: &'static EntitySchema,
}

impl PredicateCompiler {
    pub fn new(schema: &'static EntitySchema) -> Self {
        Self { schema }
    }

    /// Compiles the complete filter of a search. `None` matches every document.
    pub fn compile(&self, params: &SearchParameters) -> DocumentStoreResult<Option<Expr>> {
        let mut parts = Vec::new();

        if let Some(expr) = self.compile_parameters(&params.parameters, params.operator)? {
            parts.push(expr);
        }

        for text in [&params.query, &params.name].into_iter().flatten() {
            if let Some(expr) = self.compile_text(text) {
                parts.push(expr);
            }
        }

        if let Some(expr) = self.compile_references(&params.references)? {
            parts.push(expr);
        }

        let filter = Expr::all(parts);
        debug!(collection = self.schema.collection, ?filter, "compiled search filter");

        Ok(filter)
    }

    /// Compiles the field descriptors and combines them with `operator`.
    pub fn compile_parameters(
        &self,
        parameters: &[SearchParameter],
        operator: BooleanOperator,
    ) -> DocumentStoreResult<Option<Expr>> {
        let mut exprs = Vec::with_capacity(parameters.len());

        for parameter in parameters.iter().filter(|p| !p.field_name.trim().is_empty()) {
            if let Some(expr) = self.compile_parameter(parameter)? {
                exprs.push(expr);
            }
        }

        Ok(match operator {
            BooleanOperator::And => Expr::all(exprs),
            BooleanOperator::Or => Expr::any(exprs),
        })
    }

    /// Compiles one descriptor. `Ok(None)` means the descriptor does not constrain the result.
    pub fn compile_parameter(&self, parameter: &SearchParameter) -> DocumentStoreResult<Option<Expr>> {
        let resolved = self
            .schema
            .resolve_path(parameter.field_name.trim())
            .filter(|resolved| resolved.root.role != FieldRole::Navigation)
            .ok_or_else(|| {
                DocumentStoreError::InvalidQuery(format!(
                    "Unknown search field '{}' for {}",
                    parameter.field_name, self.schema.collection
                ))
            })?;
        let (field, kind) = (resolved.path, resolved.kind);

        if !parameter.values.is_empty() {
            let values = FilterValue::collection_to_bson(&parameter.values, kind)?;
            return Ok(Some(Filter::any_of(field, values)));
        }

        let operator = parameter.operator;

        if parameter.value.is_empty() && !operator.accepts_empty_value() {
            return Ok(None);
        }

        if operator.is_textual() && !kind.accepts_text_operators() {
            warn!(
                field = %field,
                ?operator,
                ?kind,
                "skipping text operator on a non-textual field"
            );
            return Ok(None);
        }

        let value = match operator {
            ComparisonOperator::IsEmpty | ComparisonOperator::IsNotEmpty => Bson::Null,
            _ => parameter.value.to_bson(kind)?,
        };

        Ok(Some(match (operator, value) {
            (ComparisonOperator::IsEmpty, _) => empty_expr(&field, kind),
            (ComparisonOperator::IsNotEmpty, _) => empty_expr(&field, kind).not(),
            (ComparisonOperator::EqualTo, Bson::Null) => empty_expr(&field, kind),
            (ComparisonOperator::NotEqualTo, Bson::Null) => empty_expr(&field, kind).not(),
            (ComparisonOperator::EqualTo, Bson::Array(values)) => Filter::any_of(field, values),
            (ComparisonOperator::NotEqualTo, Bson::Array(values)) => Filter::none_of(field, values),
            (ComparisonOperator::Contains, Bson::Array(values)) => Filter::any_of(field, values),
            (ComparisonOperator::Contains, value) if kind.is_list() => Filter::any_of(field, vec![value]),
            (_, Bson::Array(_)) => {
                return Err(DocumentStoreError::InvalidQuery(format!(
                    "{operator:?} on '{field}' does not accept a list of values"
                )));
            }
            (ComparisonOperator::EqualTo, value) => Filter::eq(field, value),
            (ComparisonOperator::NotEqualTo, value) => Filter::ne(field, value),
            (ComparisonOperator::MoreThan, value) => Filter::gt(field, value),
            (ComparisonOperator::MoreThanOrEqualTo, value) => Filter::gte(field, value),
            (ComparisonOperator::LessThan, value) => Filter::lt(field, value),
            (ComparisonOperator::LessThanOrEqualTo, value) => Filter::lte(field, value),
            (ComparisonOperator::StartsWith, value) => Filter::starts_with(field, value),
            (ComparisonOperator::EndsWith, value) => Filter::ends_with(field, value),
            (ComparisonOperator::Contains, value) => Filter::contains(field, value),
        }))
    }

    /// Compiles a free-text query against the entity's name fields.
    ///
    /// Matches by prefix, or by substring when the query starts with `%`. A bare `*`
    /// matches everything. Matching ignores case.
    pub fn compile_text(&self, text: &str) -> Option<Expr> {
        let text = text.trim();

        if text.is_empty() || text == MATCH_ALL {
            return None;
        }

        let (substring, term) = match text.strip_prefix(SUBSTRING_MARKER) {
            Some(rest) => (true, rest.trim()),
            None => (false, text),
        };

        if term.is_empty() {
            return None;
        }

        let matcher = |field: &str| {
            if substring {
                Filter::contains(field, term)
            } else {
                Filter::starts_with(field, term)
            }
        };

        match self.schema.name_search {
            NameSearch::None => None,
            NameSearch::Field(field) => Some(matcher(field)),
            NameSearch::Fields(fields) => Expr::any(fields.iter().map(|field| matcher(field))),
        }
    }

    /// Compiles reference filters; each one restricts to entities referencing any of its ids.
    pub fn compile_references(&self, references: &[ReferenceFilter]) -> DocumentStoreResult<Option<Expr>> {
        let mut exprs = Vec::new();

        for reference in references.iter().filter(|r| !r.ids.is_empty()) {
            let field = self
                .schema
                .field(&reference.field)
                .filter(|field| matches!(field.kind, FieldKind::Id | FieldKind::IdList))
                .ok_or_else(|| {
                    DocumentStoreError::InvalidQuery(format!(
                        "'{}' is not a reference field of {}",
                        reference.field, self.schema.collection
                    ))
                })?;

            exprs.push(Filter::any_of(
                field.name,
                reference.ids.iter().copied().map(Bson::from).collect::<Vec<_>>(),
            ));
        }

        Ok(Expr::all(exprs))
    }
}

/// Missing, null, or the kind's empty value.
fn empty_expr(field: &str, kind: FieldKind) -> Expr {
    let mut alternatives = vec![Filter::not_exists(field), Filter::eq(field, Bson::Null)];

    if let Some(empty) = kind.empty_value() {
        alternatives.push(Filter::eq(field, empty));
    }

    Filter::or(alternatives)
}
