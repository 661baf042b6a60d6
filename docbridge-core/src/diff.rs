//! Field-level comparison of two versions of an entity.
//!
//! The diff walks the schema's field table rather than the documents themselves, so only
//! declared fields are ever written. The id, navigation fields, engine stamps and the
//! version counter are never part of a diff; dependency fields only when asked for.

use bson::{Bson, Document};

use crate::{
    schema::{EntitySchema, FieldRole},
    sort::as_number,
};

/// Ordered `field -> new value` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<(String, Bson)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Records a change; a second change to the same field replaces the first.
    pub fn insert(&mut self, field: impl Into<String>, value: Bson) {
        let field = field.into();

        match self.changes.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = value,
            None => self.changes.push((field, value)),
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.iter().any(|(name, _)| name == field)
    }

    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.changes
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> Vec<String> {
        self.changes
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bson)> {
        self.changes
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn into_inner(self) -> Vec<(String, Bson)> {
        self.changes
    }
}

/// Compares two serialized versions of an entity field by field.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    schema: &'static EntitySchema,
    include_dependency_fields: bool,
}

impl DiffEngine {
    pub fn new(schema: &'static EntitySchema) -> Self {
        Self { schema, include_dependency_fields: false }
    }

    /// Also diff dependency fields (denormalized ids and id-lists).
    pub fn with_dependency_fields(mut self, include: bool) -> Self {
        self.include_dependency_fields = include;
        self
    }

    fn is_diffable(&self, role: FieldRole) -> bool {
        match role {
            FieldRole::Data | FieldRole::Derived { .. } => true,
            FieldRole::Dependency => self.include_dependency_fields,
            FieldRole::Id
            | FieldRole::Navigation
            | FieldRole::UpdatedAt
            | FieldRole::UpdatedBy
            | FieldRole::Version => false,
        }
    }

    /// Returns every diffable field whose value in `proposed` differs from `existing`.
    pub fn diff(&self, existing: &Document, proposed: &Document) -> ChangeSet {
        let mut changes = ChangeSet::new();

        for field in self.schema.fields.iter().filter(|f| self.is_diffable(f.role)) {
            let old = existing.get(field.name).unwrap_or(&Bson::Null);
            let new = proposed.get(field.name).unwrap_or(&Bson::Null);

            if !values_equal(old, new) {
                changes.insert(field.name, new.clone());
            }
        }

        changes
    }
}

/// Deep equality that treats numbers by value and a missing document key as null.
pub fn values_equal(left: &Bson, right: &Bson) -> bool {
    match (left, right) {
        (Bson::Array(a), Bson::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Bson::Document(a), Bson::Document(b)) => {
            a.iter().all(|(key, value)| values_equal(value, b.get(key).unwrap_or(&Bson::Null)))
                && b.iter().all(|(key, value)| values_equal(value, a.get(key).unwrap_or(&Bson::Null)))
        }
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => a == b,
            _ => left == right,
        },
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, Uuid};

    use super::*;
    use crate::schema::{FieldDescriptor, FieldKind};

    static FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::id(),
        FieldDescriptor::data("name", FieldKind::String),
        FieldDescriptor::data("settings", FieldKind::Object),
        FieldDescriptor::data("numbers", FieldKind::List),
        FieldDescriptor::derived("number_count", FieldKind::Integer, "numbers"),
        FieldDescriptor::dependency("category_ids", FieldKind::IdList),
        FieldDescriptor::navigation("categories"),
        FieldDescriptor::updated_at("last_update"),
        FieldDescriptor::version("version"),
    ];

    static SCHEMA: EntitySchema = EntitySchema::new("things", FIELDS);

    fn sample() -> Document {
        doc! {
            "id": Uuid::new(),
            "name": "Category1",
            "settings": { "priority": 1, "color": "red" },
            "numbers": [{ "number": "+41" }],
            "number_count": 1,
            "category_ids": [Uuid::new()],
            "version": 3_i64,
        }
    }

    #[test]
    fn identical_documents_have_no_changes() {
        let document = sample();

        assert!(DiffEngine::new(&SCHEMA).diff(&document, &document.clone()).is_empty());
    }

    #[test]
    fn changed_fields_carry_new_values() {
        let existing = sample();
        let mut proposed = existing.clone();
        proposed.insert("name", "Renamed");
        proposed.insert("settings", doc! { "priority": 2, "color": "red" });

        let changes = DiffEngine::new(&SCHEMA).diff(&existing, &proposed);

        assert_eq!(changes.fields(), vec!["name", "settings"]);
        assert_eq!(changes.get("name"), Some(&Bson::String("Renamed".into())));
    }

    #[test]
    fn engine_owned_fields_are_ignored() {
        let existing = sample();
        let mut proposed = existing.clone();
        proposed.insert("id", Uuid::new());
        proposed.insert("version", 9_i64);
        proposed.insert("last_update", bson::DateTime::now());
        proposed.insert("categories", vec![doc! { "name": "x" }]);

        assert!(DiffEngine::new(&SCHEMA).diff(&existing, &proposed).is_empty());
    }

    #[test]
    fn dependency_fields_only_when_requested() {
        let existing = sample();
        let mut proposed = existing.clone();
        proposed.insert("category_ids", Vec::<Bson>::new());

        assert!(DiffEngine::new(&SCHEMA).diff(&existing, &proposed).is_empty());
        assert_eq!(
            DiffEngine::new(&SCHEMA)
                .with_dependency_fields(true)
                .diff(&existing, &proposed)
                .fields(),
            vec!["category_ids"],
        );
    }

    #[test]
    fn missing_equals_null_and_numbers_compare_by_value() {
        assert!(values_equal(&Bson::Int32(1), &Bson::Int64(1)));
        assert!(values_equal(&Bson::Int32(1), &Bson::Double(1.0)));
        assert!(values_equal(
            &Bson::Document(doc! { "a": 1, "b": Bson::Null }),
            &Bson::Document(doc! { "a": 1_i64 }),
        ));
        assert!(!values_equal(&Bson::Array(vec![Bson::Int32(1)]), &Bson::Array(vec![])));

        let existing = doc! { "name": Bson::Null };
        let proposed = doc! {};
        assert!(DiffEngine::new(&SCHEMA).diff(&existing, &proposed).is_empty());
    }
}
