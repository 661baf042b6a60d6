//! Query expression evaluation for in-memory document filtering.
//!
//! Evaluation follows document-store semantics:
//!
//! - dotted paths descend into embedded documents and into every document of an array,
//! - a comparison matches when the field value, or any element of an array value, matches,
//! - a missing field compares equal to null,
//! - string operators ignore case.

use std::cmp::Ordering;

use bson::{Bson, Document, datetime::DateTime};

use docbridge_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Comparable representation of BSON values.
///
/// All numbers are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Binary(&'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
    Other,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            _ => Comparable::Other,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter()
                            .any(|(other_key, other_value)| key == other_key && value == other_value)
                    })
            }
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Binary(a), Comparable::Binary(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Comparable<'_> {
    fn as_str(&self) -> Option<&str> {
        match self {
            Comparable::String(value) => Some(value),
            _ => None,
        }
    }
}

/// Collects the values a dotted path reaches, following every document of an array.
fn collect_path<'a>(value: &'a Bson, segments: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(inner) = doc.get(*head) {
                collect_path(inner, rest, out);
            }
        }
        Bson::Array(items) => {
            for item in items {
                if let Bson::Document(_) = item {
                    collect_path(item, segments, out);
                }
            }
        }
        _ => {}
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(expr)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    /// The stored values reached by `field`. Empty when the field is missing.
    fn values(&self, field: &str) -> Vec<&'a Bson> {
        let segments = field.split('.').collect::<Vec<_>>();
        let mut reached = Vec::new();

        if let Some((head, rest)) = segments.split_first() {
            if let Some(value) = self.document.get(*head) {
                collect_path(value, rest, &mut reached);
            }
        }

        reached
    }

    /// Candidates of a comparison: each reached value, plus the elements of array values.
    fn candidates(&self, field: &str) -> Vec<Comparable<'a>> {
        let mut candidates = Vec::new();

        for value in self.values(field) {
            if let Bson::Array(items) = value {
                candidates.extend(items.iter().map(Comparable::from));
            }
            candidates.push(Comparable::from(value));
        }

        if candidates.is_empty() {
            candidates.push(Comparable::Null);
        }

        candidates
    }

    fn any_candidate(&self, field: &str, predicate: impl Fn(&Comparable<'a>) -> bool) -> bool {
        self.candidates(field).iter().any(predicate)
    }
}

fn operands(value: &Bson) -> Vec<Comparable<'_>> {
    match value {
        Bson::Array(items) => items.iter().map(Comparable::from).collect(),
        single => vec![Comparable::from(single)],
    }
}

fn text_matches(candidate: &Comparable<'_>, needle: &str, op: FieldOp) -> bool {
    let Some(haystack) = candidate.as_str() else {
        return false;
    };
    let (haystack, needle) = (haystack.to_lowercase(), needle.to_lowercase());

    match op {
        FieldOp::StartsWith => haystack.starts_with(&needle),
        FieldOp::EndsWith => haystack.ends_with(&needle),
        FieldOp::EqIgnoreCase => haystack == needle,
        _ => haystack.contains(&needle),
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(!self.values(field).is_empty() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let operand = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => self.any_candidate(field, |candidate| *candidate == operand),
            FieldOp::Ne => !self.any_candidate(field, |candidate| *candidate == operand),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => self.any_candidate(field, |candidate| {
                match candidate.partial_cmp(&operand) {
                    Some(Ordering::Greater) => matches!(op, FieldOp::Gt | FieldOp::Gte),
                    Some(Ordering::Equal) => matches!(op, FieldOp::Gte | FieldOp::Lte),
                    Some(Ordering::Less) => matches!(op, FieldOp::Lt | FieldOp::Lte),
                    None => false,
                }
            }),
            FieldOp::EqIgnoreCase | FieldOp::StartsWith | FieldOp::EndsWith => match operand.as_str() {
                Some(needle) => self.any_candidate(field, |candidate| text_matches(candidate, needle, *op)),
                None => self.any_candidate(field, |candidate| *candidate == operand),
            },
            FieldOp::Contains | FieldOp::NotContains => {
                let contained = match operand.as_str() {
                    Some(needle) => self.any_candidate(field, |candidate| text_matches(candidate, needle, FieldOp::Contains)),
                    None => self.any_candidate(field, |candidate| *candidate == operand),
                };

                if *op == FieldOp::Contains { contained } else { !contained }
            }
            FieldOp::AnyOf | FieldOp::NoneOf => {
                let options = operands(value);
                let any = self.any_candidate(field, |candidate| options.iter().any(|option| option == candidate));

                if *op == FieldOp::AnyOf { any } else { !any }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use bson::{Uuid, doc};
    use docbridge_core::query::Filter;

    use super::*;

    fn matches(document: &Document, expr: Expr) -> bool {
        DocumentEvaluator::new(document).evaluate(&expr).unwrap()
    }

    fn contact() -> Document {
        doc! {
            "first_name": "Anna",
            "last_name": "Meier",
            "location": "Bern",
            "manager_id": Bson::Null,
            "number_of_telephone_numbers": 2,
            "numbers": [{ "number": "+41 31 000 00 00" }, { "number": "+49 30 111" }],
            "category_ids": [Uuid::parse_str("6f0b8e4e-6e1c-4d7e-9d47-2c1e0b0f7a11").unwrap()],
            "settings": { "priority": 3 },
        }
    }

    #[test]
    fn string_operators_ignore_case() {
        let document = contact();

        assert!(matches(&document, Filter::starts_with("last_name", "mei")));
        assert!(matches(&document, Filter::contains("first_name", "NN")));
        assert!(matches(&document, Filter::ends_with("location", "ERN")));
        assert!(matches(&document, Filter::eq_ignore_case("location", "bern")));
        assert!(!matches(&document, Filter::eq("location", "bern")));
    }

    #[test]
    fn dotted_paths_reach_into_arrays_of_documents() {
        let document = contact();

        assert!(matches(&document, Filter::starts_with("numbers.number", "+49")));
        assert!(matches(&document, Filter::gte("settings.priority", 3)));
        assert!(!matches(&document, Filter::contains("numbers.number", "+33")));
    }

    #[test]
    fn missing_fields_equal_null() {
        let document = contact();

        assert!(matches(&document, Filter::eq("secretary_ids", Bson::Null)));
        assert!(matches(&document, Filter::eq("manager_id", Bson::Null)));
        assert!(matches(&document, Filter::exists("manager_id")));
        assert!(matches(&document, Filter::not_exists("secretary_ids")));
        assert!(matches(&document, Filter::ne("secretary_ids", "x")));
    }

    #[test]
    fn membership_matches_array_elements_and_uuids() {
        let document = contact();
        let category = Uuid::parse_str("6f0b8e4e-6e1c-4d7e-9d47-2c1e0b0f7a11").unwrap();

        assert!(matches(&document, Filter::any_of("category_ids", vec![Bson::from(Uuid::new()), Bson::from(category)])));
        assert!(!matches(&document, Filter::none_of("category_ids", vec![Bson::from(category)])));
        assert!(matches(&document, Filter::any_of("location", vec!["Zurich", "Bern"])));
        assert!(!matches(&document, Filter::any_of("location", Vec::<Bson>::new())));
    }

    #[test]
    fn numbers_compare_across_widths() {
        let document = contact();

        assert!(matches(&document, Filter::lt("number_of_telephone_numbers", 3_i64)));
        assert!(matches(&document, Filter::eq("number_of_telephone_numbers", 2.0)));
        assert!(!matches(&document, Filter::gt("number_of_telephone_numbers", 2)));
    }

    #[test]
    fn empty_arrays_only_equal_empty_arrays() {
        let document = doc! { "category_ids": [] };

        assert!(matches(&document, Filter::eq("category_ids", Vec::<Bson>::new())));
        assert!(!matches(&document, Filter::eq("category_ids", Bson::Null)));
    }
}
