//! Query translation from the docbridge AST to MongoDB query syntax.
//!
//! String operators become anchored, escaped, case-insensitive regular expressions.
//! Negation uses `$nor`, since MongoDB only accepts `$not` below a field.

use bson::{Bson, Document, doc};

use docbridge_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

use crate::sanitizer::ValueSanitizer;

/// Translates docbridge query expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    pub(crate) fn translate(expr: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    /// Case-insensitive `$regex` condition for a string operand.
    fn pattern(value: &Bson, op: &FieldOp) -> Option<Document> {
        let Bson::String(text) = value else {
            return None;
        };
        let escaped = regex::escape(text);

        let pattern = match op {
            FieldOp::StartsWith => format!("^{escaped}"),
            FieldOp::EndsWith => format!("{escaped}$"),
            FieldOp::EqIgnoreCase => format!("^{escaped}$"),
            _ => escaped,
        };

        Some(doc! { "$regex": pattern, "$options": "i" })
    }

    fn list(value: &Bson) -> Bson {
        match value {
            Bson::Array(_) => value.clone(),
            single => Bson::Array(vec![single.clone()]),
        }
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! { "_id": { "$exists": false } });
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        let path = ValueSanitizer::sanitize_path(field);

        Ok(doc! {
            path: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let condition = match op {
            FieldOp::Eq => doc! { "$eq": value },
            FieldOp::Ne => doc! { "$ne": value },
            FieldOp::Gt => doc! { "$gt": value },
            FieldOp::Gte => doc! { "$gte": value },
            FieldOp::Lt => doc! { "$lt": value },
            FieldOp::Lte => doc! { "$lte": value },
            FieldOp::EqIgnoreCase | FieldOp::StartsWith | FieldOp::EndsWith | FieldOp::Contains => {
                match Self::pattern(value, op) {
                    Some(pattern) => pattern,
                    None if *op == FieldOp::Contains || *op == FieldOp::EqIgnoreCase => doc! { "$eq": value },
                    None => {
                        return Err(DocumentStoreError::InvalidQuery(format!(
                            "{op:?} on '{field}' requires a string value"
                        )));
                    }
                }
            }
            FieldOp::NotContains => match Self::pattern(value, op) {
                Some(pattern) => doc! { "$not": pattern },
                None => doc! { "$ne": value },
            },
            FieldOp::AnyOf => doc! { "$in": Self::list(value) },
            FieldOp::NoneOf => doc! { "$nin": Self::list(value) },
        };

        let path = ValueSanitizer::sanitize_path(field);

        Ok(doc! {
            path: condition,
        })
    }
}

#[cfg(test)]
mod tests {
    use bson::Uuid;
    use docbridge_core::query::Filter;

    use super::*;

    fn translate(expr: Expr) -> Document {
        MongoQueryTranslator::translate(Some(&expr)).unwrap()
    }

    #[test]
    fn text_operators_escape_and_ignore_case() {
        let translated = translate(Filter::starts_with("numbers.number", "+41 (0)"));

        assert_eq!(
            translated,
            doc! { "numbers.number": { "$regex": r"^\+41 \(0\)", "$options": "i" } },
        );
        assert_eq!(
            translate(Filter::eq_ignore_case("name", "a.b")),
            doc! { "name": { "$regex": r"^a\.b$", "$options": "i" } },
        );
    }

    #[test]
    fn negation_uses_nor() {
        let translated = translate(Filter::eq("location", "Bern").not());

        assert_eq!(translated, doc! { "$nor": [{ "location": { "$eq": "Bern" } }] });
    }

    #[test]
    fn membership_wraps_single_values() {
        let id = Uuid::new();

        assert_eq!(translate(Filter::any_of("manager_id", id)), doc! { "manager_id": { "$in": [id] } });
        assert_eq!(
            translate(Filter::none_of("location", vec!["Bern", "Basel"])),
            doc! { "location": { "$nin": ["Bern", "Basel"] } },
        );
    }

    #[test]
    fn empty_filters_match_everything() {
        assert_eq!(MongoQueryTranslator::translate(None).unwrap(), doc! {});
        assert_eq!(translate(Filter::and(vec![])), doc! {});
    }
}
