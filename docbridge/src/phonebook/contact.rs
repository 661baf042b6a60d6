use std::collections::BTreeMap;

use bson::Uuid;
use serde::{Deserialize, Serialize};

use docbridge_core::{
    document::{Entity, UNASSIGNED_ID},
    schema::{EntitySchema, FieldDescriptor, FieldKind, NameSearch, Relation, SortAlias},
};

use super::{PhoneBook, PhoneBookCategory};

static NUMBER_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::data("id", FieldKind::Id),
    FieldDescriptor::data("number", FieldKind::String),
    FieldDescriptor::data("kind", FieldKind::String),
];

static CONTACT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::id(),
    FieldDescriptor::data("first_name", FieldKind::String),
    FieldDescriptor::data("last_name", FieldKind::String),
    FieldDescriptor::data("location", FieldKind::String),
    FieldDescriptor::data("numbers", FieldKind::List).with_children(NUMBER_FIELDS),
    FieldDescriptor::derived("number_of_telephone_numbers", FieldKind::Integer, "numbers"),
    FieldDescriptor::dependency("secretary_ids", FieldKind::IdList),
    FieldDescriptor::navigation("secretaries"),
    FieldDescriptor::dependency("manager_id", FieldKind::Id),
    FieldDescriptor::navigation("manager"),
    FieldDescriptor::dependency("category_ids", FieldKind::IdList),
    FieldDescriptor::navigation("categories"),
    FieldDescriptor::dependency("phone_book_ids", FieldKind::IdList),
    FieldDescriptor::navigation("phone_books"),
    FieldDescriptor::data("attributes", FieldKind::Map),
    FieldDescriptor::updated_at("last_update"),
    FieldDescriptor::updated_by("last_update_by"),
    FieldDescriptor::version("version"),
];

static CONTACT_RELATIONS: &[Relation] = &[
    Relation::many("secretary_ids", "secretaries", "contacts"),
    Relation::one("manager_id", "manager", "contacts"),
    Relation::many("category_ids", "categories", "categories"),
    Relation::many("phone_book_ids", "phone_books", "phone_books"),
];

static CONTACT_SORT_ALIASES: &[SortAlias] = &[SortAlias::new("manager_id", "contacts", "last_name")];

pub static CONTACT_SCHEMA: EntitySchema = EntitySchema::new("contacts", CONTACT_FIELDS)
    .with_relations(CONTACT_RELATIONS)
    .with_sort_aliases(CONTACT_SORT_ALIASES)
    .with_default_sort(&["last_name", "first_name"])
    .with_name_search(NameSearch::Fields(&["first_name", "last_name", "numbers.number"]));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberType {
    #[default]
    Office,
    Mobile,
    Home,
    Fax,
}

/// One telephone number of a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactNumber {
    pub id: Uuid,
    pub number: String,
    #[serde(default)]
    pub kind: NumberType,
}

impl ContactNumber {
    pub fn new(number: impl Into<String>, kind: NumberType) -> Self {
        Self {
            id: UNASSIGNED_ID,
            number: number.into(),
            kind,
        }
    }
}

/// A person in the phone book.
///
/// Relations to other entities are stored as ids (`manager_id`, `secretary_ids`,
/// `category_ids`, `phone_book_ids`); the matching navigation fields are only filled
/// when the contact is read with lookup enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneBookContact {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub numbers: Vec<ContactNumber>,
    #[serde(default)]
    pub number_of_telephone_numbers: i32,
    #[serde(default)]
    pub secretary_ids: Vec<Uuid>,
    #[serde(default, skip_serializing)]
    pub secretaries: Vec<PhoneBookContact>,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
    #[serde(default, skip_serializing)]
    pub manager: Option<Box<PhoneBookContact>>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    #[serde(default, skip_serializing)]
    pub categories: Vec<PhoneBookCategory>,
    #[serde(default)]
    pub phone_book_ids: Vec<Uuid>,
    #[serde(default, skip_serializing)]
    pub phone_books: Vec<PhoneBook>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub last_update: Option<bson::DateTime>,
    #[serde(default)]
    pub last_update_by: Option<String>,
    #[serde(default)]
    pub version: i64,
}

impl PhoneBookContact {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            first_name: first_name.into(),
            last_name: last_name.into(),
            location: None,
            numbers: Vec::new(),
            number_of_telephone_numbers: 0,
            secretary_ids: Vec::new(),
            secretaries: Vec::new(),
            manager_id: None,
            manager: None,
            category_ids: Vec::new(),
            categories: Vec::new(),
            phone_book_ids: Vec::new(),
            phone_books: Vec::new(),
            attributes: BTreeMap::new(),
            last_update: None,
            last_update_by: None,
            version: 0,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_number(mut self, number: impl Into<String>, kind: NumberType) -> Self {
        self.numbers.push(ContactNumber::new(number, kind));
        self
    }

    pub fn with_manager(mut self, manager: Uuid) -> Self {
        self.manager_id = Some(manager);
        self
    }

    pub fn with_secretary(mut self, secretary: Uuid) -> Self {
        if !self.secretary_ids.contains(&secretary) {
            self.secretary_ids.push(secretary);
        }
        self
    }

    pub fn in_category(mut self, category: Uuid) -> Self {
        if !self.category_ids.contains(&category) {
            self.category_ids.push(category);
        }
        self
    }

    pub fn in_phone_book(mut self, phone_book: Uuid) -> Self {
        if !self.phone_book_ids.contains(&phone_book) {
            self.phone_book_ids.push(phone_book);
        }
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// "Last, First", or whichever of the two is set.
    pub fn full_name(&self) -> String {
        match (self.last_name.trim(), self.first_name.trim()) {
            ("", first) => first.to_string(),
            (last, "") => last.to_string(),
            (last, first) => format!("{last}, {first}"),
        }
    }
}

impl Entity for PhoneBookContact {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn schema() -> &'static EntitySchema {
        &CONTACT_SCHEMA
    }

    fn normalize(&mut self) {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();

        for number in &mut self.numbers {
            if number.id == UNASSIGNED_ID {
                number.id = Uuid::new();
            }
        }

        self.number_of_telephone_numbers = self.numbers.len() as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizing_counts_numbers_and_assigns_their_ids() {
        let mut contact = PhoneBookContact::new(" Anna ", "Meier")
            .with_number("+41 31 000 00 01", NumberType::Office)
            .with_number("+41 79 000 00 02", NumberType::Mobile);

        contact.normalize();

        assert_eq!(contact.first_name, "Anna");
        assert_eq!(contact.number_of_telephone_numbers, 2);
        assert!(contact.numbers.iter().all(|number| number.id != UNASSIGNED_ID));

        let ids = contact.numbers.iter().map(|number| number.id).collect::<Vec<_>>();
        contact.normalize();
        assert_eq!(contact.numbers.iter().map(|number| number.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn full_name_skips_missing_parts() {
        assert_eq!(PhoneBookContact::new("Anna", "Meier").full_name(), "Meier, Anna");
        assert_eq!(PhoneBookContact::new("", "Meier").full_name(), "Meier");
    }

    #[test]
    fn contact_schema_declares_its_relations() {
        assert_eq!(CONTACT_SCHEMA.relation("Manager").map(|r| r.id_field), Some("manager_id"));
        assert_eq!(CONTACT_SCHEMA.relation("secretaries").map(|r| r.target), Some("contacts"));
        assert_eq!(CONTACT_SCHEMA.sort_alias("ManagerId").map(|a| a.target_field), Some("last_name"));
        assert!(CONTACT_SCHEMA.unique_name.is_none());
    }
}
