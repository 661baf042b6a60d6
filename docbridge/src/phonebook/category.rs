use bson::Uuid;
use serde::{Deserialize, Serialize};

use docbridge_core::{
    document::{Entity, UNASSIGNED_ID},
    schema::{EntitySchema, FieldDescriptor, FieldKind, NameSearch, Relation},
};

use super::PhoneBook;

static SETTINGS_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::data("priority", FieldKind::Integer),
    FieldDescriptor::data("color", FieldKind::String),
];

static CATEGORY_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::id(),
    FieldDescriptor::data("name", FieldKind::String),
    FieldDescriptor::data("description", FieldKind::String),
    FieldDescriptor::data("settings", FieldKind::Object).with_children(SETTINGS_FIELDS),
    FieldDescriptor::dependency("phone_book_ids", FieldKind::IdList),
    FieldDescriptor::navigation("phone_books"),
    FieldDescriptor::updated_at("last_update"),
    FieldDescriptor::updated_by("last_update_by"),
    FieldDescriptor::version("version"),
];

static CATEGORY_RELATIONS: &[Relation] = &[Relation::many("phone_book_ids", "phone_books", "phone_books")];

pub static CATEGORY_SCHEMA: EntitySchema = EntitySchema::new("categories", CATEGORY_FIELDS)
    .with_relations(CATEGORY_RELATIONS)
    .with_default_sort(&["name"])
    .with_name_search(NameSearch::Field("name"))
    .with_unique_name("name");

/// Display settings of a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySettings {
    pub priority: i32,
    pub color: Option<String>,
}

/// A grouping of contacts, e.g. "Suppliers", available in some phone books.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneBookCategory {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: Option<CategorySettings>,
    #[serde(default)]
    pub phone_book_ids: Vec<Uuid>,
    #[serde(default, skip_serializing)]
    pub phone_books: Vec<PhoneBook>,
    #[serde(default)]
    pub last_update: Option<bson::DateTime>,
    #[serde(default)]
    pub last_update_by: Option<String>,
    #[serde(default)]
    pub version: i64,
}

impl PhoneBookCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            description: None,
            settings: None,
            phone_book_ids: Vec::new(),
            phone_books: Vec::new(),
            last_update: None,
            last_update_by: None,
            version: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_settings(mut self, settings: CategorySettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn in_phone_book(mut self, phone_book: Uuid) -> Self {
        if !self.phone_book_ids.contains(&phone_book) {
            self.phone_book_ids.push(phone_book);
        }
        self
    }
}

impl Entity for PhoneBookCategory {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn schema() -> &'static EntitySchema {
        &CATEGORY_SCHEMA
    }

    fn display_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
    }
}
