use bson::Uuid;
use serde::{Deserialize, Serialize};

use docbridge_core::{
    document::{Entity, UNASSIGNED_ID},
    schema::{EntitySchema, FieldDescriptor, FieldKind, NameSearch},
};

static PHONE_BOOK_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::id(),
    FieldDescriptor::data("name", FieldKind::String),
    FieldDescriptor::data("description", FieldKind::String),
    FieldDescriptor::updated_at("last_update"),
    FieldDescriptor::updated_by("last_update_by"),
    FieldDescriptor::version("version"),
];

pub static PHONE_BOOK_SCHEMA: EntitySchema = EntitySchema::new("phone_books", PHONE_BOOK_FIELDS)
    .with_default_sort(&["name"])
    .with_name_search(NameSearch::Field("name"))
    .with_unique_name("name");

/// A named directory contacts and categories are filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneBook {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub last_update: Option<bson::DateTime>,
    #[serde(default)]
    pub last_update_by: Option<String>,
    #[serde(default)]
    pub version: i64,
}

impl PhoneBook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            description: None,
            last_update: None,
            last_update_by: None,
            version: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Entity for PhoneBook {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn schema() -> &'static EntitySchema {
        &PHONE_BOOK_SCHEMA
    }

    fn display_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
    }
}
