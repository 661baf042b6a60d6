//! Static per-entity field tables.
//!
//! Every entity type describes its persisted shape once, in a `static` [`EntitySchema`].
//! The planning stages (predicate compiler, sort planner, diff engine, delta applier and
//! dependency resolver) consult these tables instead of inspecting values at runtime, so
//! field eligibility and relation handling are fixed when the program is compiled.
//!
//! Field names are resolved leniently: lookups ignore ASCII case and underscores, so a
//! caller passing `"ManagerId"` reaches the field declared as `"manager_id"`.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::schema::*;
//!
//! static TAG_FIELDS: &[FieldDescriptor] = &[
//!     FieldDescriptor::id(),
//!     FieldDescriptor::data("name", FieldKind::String),
//!     FieldDescriptor::dependency("owner_ids", FieldKind::IdList),
//!     FieldDescriptor::navigation("owners"),
//! ];
//!
//! static TAG_RELATIONS: &[Relation] = &[Relation::many("owner_ids", "owners", "users")];
//!
//! pub static TAG_SCHEMA: EntitySchema = EntitySchema::new("tags", TAG_FIELDS)
//!     .with_relations(TAG_RELATIONS)
//!     .with_name_search(NameSearch::Field("name"))
//!     .with_unique_name("name");
//! ```

use bson::Bson;

/// The stored shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Bool,
    DateTime,
    /// A single entity id.
    Id,
    /// A list of entity ids.
    IdList,
    /// A list of scalars or embedded objects.
    List,
    /// A string-keyed map.
    Map,
    /// An embedded object.
    Object,
}

impl FieldKind {
    /// Collections and maps are always replaced as a whole by partial updates.
    pub fn is_collection(self) -> bool {
        matches!(self, FieldKind::IdList | FieldKind::List | FieldKind::Map)
    }

    /// Whether the kind holds several values a membership predicate can match against.
    pub fn is_list(self) -> bool {
        matches!(self, FieldKind::IdList | FieldKind::List)
    }

    /// Substring and prefix operators make no sense on numbers, dates and booleans.
    pub fn accepts_text_operators(self) -> bool {
        !matches!(
            self,
            FieldKind::Integer | FieldKind::Float | FieldKind::Bool | FieldKind::DateTime
        )
    }

    /// Kind of the individual values stored in a list.
    pub fn element_kind(self) -> FieldKind {
        match self {
            FieldKind::IdList => FieldKind::Id,
            FieldKind::List => FieldKind::String,
            other => other,
        }
    }

    /// The value an unset field of this kind compares equal to, besides null.
    pub fn empty_value(self) -> Option<Bson> {
        match self {
            FieldKind::String => Some(Bson::String(String::new())),
            FieldKind::Integer => Some(Bson::Int32(0)),
            FieldKind::Float => Some(Bson::Double(0.0)),
            FieldKind::Bool => Some(Bson::Boolean(false)),
            FieldKind::IdList | FieldKind::List => Some(Bson::Array(Vec::new())),
            FieldKind::Map | FieldKind::Object => Some(Bson::Document(Default::default())),
            FieldKind::DateTime | FieldKind::Id => None,
        }
    }
}

/// How the engine treats a field during writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// The entity id. Immutable, never diffed.
    Id,
    /// Plain data, diffed and patched.
    Data,
    /// A denormalized id or id-list owned by a [`Relation`]. Maintained by the dependency resolver.
    Dependency,
    /// A hydrated copy of referenced entities. Never persisted.
    Navigation,
    /// Stamped with the time of the last write.
    UpdatedAt,
    /// Stamped with the caller of the last write.
    UpdatedBy,
    /// Optimistic concurrency counter.
    Version,
    /// Recomputed from another field by the entity itself.
    Derived { from: &'static str },
}

/// Declaration of one persisted field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub role: FieldRole,
    /// Fields of embedded objects, or of the objects stored in a list.
    pub children: &'static [FieldDescriptor],
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, kind: FieldKind, role: FieldRole) -> Self {
        Self { name, kind, role, children: &[] }
    }

    pub const fn id() -> Self {
        Self::new("id", FieldKind::Id, FieldRole::Id)
    }

    pub const fn data(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldRole::Data)
    }

    pub const fn dependency(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldRole::Dependency)
    }

    pub const fn navigation(name: &'static str) -> Self {
        Self::new(name, FieldKind::Object, FieldRole::Navigation)
    }

    pub const fn derived(name: &'static str, kind: FieldKind, from: &'static str) -> Self {
        Self::new(name, kind, FieldRole::Derived { from })
    }

    pub const fn updated_at(name: &'static str) -> Self {
        Self::new(name, FieldKind::DateTime, FieldRole::UpdatedAt)
    }

    pub const fn updated_by(name: &'static str) -> Self {
        Self::new(name, FieldKind::String, FieldRole::UpdatedBy)
    }

    pub const fn version(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer, FieldRole::Version)
    }

    pub const fn with_children(mut self, children: &'static [FieldDescriptor]) -> Self {
        self.children = children;
        self
    }

    /// Whether the engine, not the caller, owns the value of this field.
    pub fn is_internal(&self) -> bool {
        matches!(
            self.role,
            FieldRole::Id
                | FieldRole::Navigation
                | FieldRole::UpdatedAt
                | FieldRole::UpdatedBy
                | FieldRole::Version
        )
    }

    pub fn child(&self, name: &str) -> Option<&'static FieldDescriptor> {
        find_field(self.children, name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A denormalized reference from one entity type to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Persisted id (`One`) or id-list (`Many`) field.
    pub id_field: &'static str,
    /// Field receiving the referenced entities on hydration.
    pub navigation: &'static str,
    /// Collection of the referenced entity type.
    pub target: &'static str,
    pub cardinality: Cardinality,
}

impl Relation {
    pub const fn one(id_field: &'static str, navigation: &'static str, target: &'static str) -> Self {
        Self { id_field, navigation, target, cardinality: Cardinality::One }
    }

    pub const fn many(id_field: &'static str, navigation: &'static str, target: &'static str) -> Self {
        Self { id_field, navigation, target, cardinality: Cardinality::Many }
    }
}

/// Sorting by a reference field orders by a field of the referenced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortAlias {
    pub field: &'static str,
    pub target: &'static str,
    pub target_field: &'static str,
}

impl SortAlias {
    pub const fn new(field: &'static str, target: &'static str, target_field: &'static str) -> Self {
        Self { field, target, target_field }
    }
}

/// Fields a free-text query is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSearch {
    None,
    Field(&'static str),
    /// Any of the fields may match, e.g. first name, last name or a phone number.
    Fields(&'static [&'static str]),
}

/// The complete static description of an entity type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntitySchema {
    pub collection: &'static str,
    pub fields: &'static [FieldDescriptor],
    pub relations: &'static [Relation],
    pub sort_aliases: &'static [SortAlias],
    /// Ascending sort applied when the caller names none.
    pub default_sort: &'static [&'static str],
    pub name_search: NameSearch,
    /// Field whose value must be unique (case-insensitively) within the collection.
    pub unique_name: Option<&'static str>,
}

impl EntitySchema {
    pub const fn new(collection: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self {
            collection,
            fields,
            relations: &[],
            sort_aliases: &[],
            default_sort: &[],
            name_search: NameSearch::None,
            unique_name: None,
        }
    }

    pub const fn with_relations(mut self, relations: &'static [Relation]) -> Self {
        self.relations = relations;
        self
    }

    pub const fn with_sort_aliases(mut self, aliases: &'static [SortAlias]) -> Self {
        self.sort_aliases = aliases;
        self
    }

    pub const fn with_default_sort(mut self, fields: &'static [&'static str]) -> Self {
        self.default_sort = fields;
        self
    }

    pub const fn with_name_search(mut self, name_search: NameSearch) -> Self {
        self.name_search = name_search;
        self
    }

    pub const fn with_unique_name(mut self, field: &'static str) -> Self {
        self.unique_name = Some(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        find_field(self.fields, name)
    }

    /// Resolves a possibly dotted path to its canonical spelling and the descriptor of its last segment.
    ///
    /// Segments below a field without declared children are kept as given.
    pub fn resolve_path(&self, path: &str) -> Option<ResolvedPath> {
        let mut segments = path.split('.');
        let root = self.field(segments.next()?)?;

        let mut canonical = root.name.to_string();
        let mut leaf = root;
        let mut leaf_kind = root.kind;

        for segment in segments {
            if segment.is_empty() {
                return None;
            }

            match leaf.child(segment) {
                Some(child) => {
                    canonical.push('.');
                    canonical.push_str(child.name);
                    leaf = child;
                    leaf_kind = child.kind;
                }
                None if leaf.children.is_empty() => {
                    canonical.push('.');
                    canonical.push_str(segment);
                    leaf_kind = FieldKind::String;
                }
                None => return None,
            }
        }

        Some(ResolvedPath {
            path: canonical,
            root,
            kind: leaf_kind,
        })
    }

    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        let key = normalize_name(name);

        self.relations.iter().find(|relation| {
            normalize_name(relation.id_field) == key || normalize_name(relation.navigation) == key
        })
    }

    pub fn sort_alias(&self, name: &str) -> Option<&'static SortAlias> {
        let key = normalize_name(name);

        self.sort_aliases
            .iter()
            .find(|alias| normalize_name(alias.field) == key)
    }

    pub fn fields_with_role(&self, role: FieldRole) -> impl Iterator<Item = &'static FieldDescriptor> {
        self.fields.iter().filter(move |field| field.role == role)
    }

    pub fn version_field(&self) -> Option<&'static str> {
        self.fields_with_role(FieldRole::Version)
            .next()
            .map(|field| field.name)
    }

    /// Fields recomputed whenever `source` changes.
    pub fn derived_from(&self, source: &str) -> impl Iterator<Item = &'static FieldDescriptor> {
        let source = source.to_string();

        self.fields.iter().filter(move |field| {
            matches!(field.role, FieldRole::Derived { from } if from == source)
        })
    }
}

/// Result of [`EntitySchema::resolve_path`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub path: String,
    pub root: &'static FieldDescriptor,
    pub kind: FieldKind,
}

fn find_field(fields: &'static [FieldDescriptor], name: &str) -> Option<&'static FieldDescriptor> {
    let key = normalize_name(name);

    fields
        .iter()
        .find(|field| normalize_name(field.name) == key)
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
