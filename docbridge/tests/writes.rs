mod common;

use bson::Uuid;
use common::{ctx, empty_store, seeded_store};
use docbridge::{
    document::UNASSIGNED_ID,
    memory::InMemoryStore,
    phonebook::{CategorySettings, ContactNumber, NumberType, PhoneBook, PhoneBookCategory, PhoneBookContact},
    prelude::*,
};

#[tokio::test]
async fn add_assigns_id_and_engine_fields() {
    let store = empty_store().await;

    let added = store
        .collection::<PhoneBookContact>()
        .add(
            &ctx(),
            PhoneBookContact::new("Anna", "Meier")
                .with_number("+41 31 000 00 00", NumberType::Office)
                .with_number("+41 79 000 00 00", NumberType::Mobile),
        )
        .await;

    assert!(added.success);
    let added = added.payload.unwrap();
    assert_ne!(added.id, UNASSIGNED_ID);
    assert_eq!(added.version, 0);
    assert_eq!(added.number_of_telephone_numbers, 2);
    assert_eq!(added.last_update_by.as_deref(), Some("jdoe"));
    assert!(added.last_update.is_some());
    assert!(added.numbers.iter().all(|number| number.id != UNASSIGNED_ID));
    assert!(added.secretary_ids.is_empty());
}

#[tokio::test]
async fn add_rejects_duplicate_ids_and_names() {
    let (store, seed) = seeded_store().await;
    let categories = store.collection::<PhoneBookCategory>();

    let mut same_id = PhoneBookCategory::new("Another");
    same_id.id = seed.category1;
    let result = categories.add(&ctx(), same_id).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::DuplicateObject));

    let result = categories.add(&ctx(), PhoneBookCategory::new("  category1 ")).await;
    assert_eq!(result.error_kind, Some(ErrorKind::DuplicateName));
    assert!(result.error_message.unwrap().contains("category1"));
}

#[tokio::test]
async fn name_validation_can_be_disabled() {
    let backend = InMemoryStore::builder().build().await.unwrap();
    let store = EntityStore::builder(backend)
        .with_config(EngineConfig::default().with_unique_names(false))
        .build();
    let books = store.collection::<PhoneBook>();

    assert!(books.add(&ctx(), PhoneBook::new("Twice")).await.success);
    assert!(books.add(&ctx(), PhoneBook::new("twice")).await.success);
}

#[tokio::test]
async fn updating_an_unmodified_copy_is_a_no_op() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let stored = contacts.get(&ctx(), seed.a, GetOptions::default()).await.payload.unwrap().entity;
    let summary = contacts
        .update(&ctx(), stored.clone(), UpdateOptions::default())
        .await
        .payload
        .unwrap();

    assert!(summary.is_noop());

    let reread = contacts.get(&ctx(), seed.a, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(reread.version, stored.version);
    assert_eq!(reread.last_update, stored.last_update);
}

#[tokio::test]
async fn full_update_writes_changed_fields_only() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();
    let editor = OperationContext::new(Caller::user("editor"));

    let mut contact = contacts.get(&ctx(), seed.b, GetOptions::default()).await.payload.unwrap().entity;
    contact.location = Some("Basel".to_string());
    contact.numbers.push(ContactNumber::new("+41 61 555 55 55", NumberType::Home));

    let summary = contacts
        .update(&editor, contact, UpdateOptions::default())
        .await
        .payload
        .unwrap();

    assert_eq!(summary.changed_fields, vec!["location", "numbers", "number_of_telephone_numbers"]);

    let stored = contacts.get(&ctx(), seed.b, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(stored.location.as_deref(), Some("Basel"));
    assert_eq!(stored.number_of_telephone_numbers, 2);
    assert_eq!(stored.version, 1);
    assert_eq!(stored.last_update_by.as_deref(), Some("editor"));
    assert_eq!(stored.first_name, "Contact2");
}

#[tokio::test]
async fn full_updates_leave_references_alone_unless_asked() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let mut contact = contacts.get(&ctx(), seed.b, GetOptions::default()).await.payload.unwrap().entity;
    contact.manager_id = Some(seed.m);

    let ignored = contacts
        .update(&ctx(), contact.clone(), UpdateOptions::default())
        .await
        .payload
        .unwrap();
    assert!(ignored.is_noop());

    contact.category_ids = vec![seed.category1, Uuid::new()];
    let applied = contacts
        .update(&ctx(), contact, UpdateOptions::with_dependency_fields())
        .await
        .payload
        .unwrap();
    assert_eq!(applied.changed_fields, vec!["manager_id", "category_ids"]);

    let stored = contacts.get(&ctx(), seed.b, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(stored.manager_id, Some(seed.m));
    assert_eq!(stored.category_ids, vec![seed.category1]);
}

#[tokio::test]
async fn delta_writes_only_the_named_property() {
    let (store, seed) = seeded_store().await;
    let categories = store.collection::<PhoneBookCategory>();

    let before = categories.get(&ctx(), seed.category1, GetOptions::default()).await.payload.unwrap().entity;

    let patch = PhoneBookCategory::new("Category One")
        .with_description("ignored")
        .with_settings(CategorySettings { priority: 7, color: None });
    let summary = categories
        .update_delta(&ctx(), Delta::new(seed.category1, patch).property("Name"))
        .await
        .payload
        .unwrap();
    assert_eq!(summary.changed_fields, vec!["name"]);

    let after = categories.get(&ctx(), seed.category1, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(after.name, "Category One");
    assert_eq!(after.description, before.description);
    assert_eq!(after.settings, before.settings);
    assert_eq!(after.phone_book_ids, before.phone_book_ids);
    assert_eq!(after.version, before.version + 1);
}

#[tokio::test]
async fn delta_paths_set_a_single_nested_field() {
    let (store, seed) = seeded_store().await;
    let categories = store.collection::<PhoneBookCategory>();

    let settings = CategorySettings { priority: 1, color: Some("red".to_string()) };
    let seeded = Delta::new(seed.suppliers, PhoneBookCategory::new("Suppliers").with_settings(settings)).property("settings");
    assert!(categories.update_delta(&ctx(), seeded).await.success);

    let patch = PhoneBookCategory::new("ignored").with_settings(CategorySettings { priority: 5, color: None });
    let summary = categories
        .update_delta(&ctx(), Delta::new(seed.suppliers, patch).path("settings.priority"))
        .await
        .payload
        .unwrap();
    assert_eq!(summary.changed_fields, vec!["settings.priority"]);

    let after = categories.get(&ctx(), seed.suppliers, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(after.name, "Suppliers");
    assert_eq!(
        after.settings,
        Some(CategorySettings { priority: 5, color: Some("red".to_string()) })
    );
}

#[tokio::test]
async fn delta_paths_into_an_unset_object_write_the_whole_object() {
    let (store, seed) = seeded_store().await;
    let categories = store.collection::<PhoneBookCategory>();

    let before = categories.get(&ctx(), seed.category1, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(before.settings, None);

    let patch = PhoneBookCategory::new("ignored").with_settings(CategorySettings { priority: 3, color: None });
    let summary = categories
        .update_delta(&ctx(), Delta::new(seed.category1, patch).path("settings.priority"))
        .await
        .payload
        .unwrap();
    assert_eq!(summary.changed_fields, vec!["settings"]);

    let after = categories.get(&ctx(), seed.category1, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(after.settings, Some(CategorySettings { priority: 3, color: None }));
    assert_eq!(after.name, "Category1");
}

#[tokio::test]
async fn delta_on_a_collection_replaces_it_and_its_derived_count() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let patch = PhoneBookContact::new("", "").with_number("+41 31 999 99 99", NumberType::Fax);
    let summary = contacts
        .update_delta(
            &ctx(),
            Delta::new(seed.a, patch)
                .path("numbers.0.number")
                .path("numbers.1.kind"),
        )
        .await
        .payload
        .unwrap();
    assert_eq!(summary.changed_fields, vec!["numbers", "number_of_telephone_numbers"]);

    let stored = contacts.get(&ctx(), seed.a, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(stored.numbers.len(), 1);
    assert_eq!(stored.numbers[0].number, "+41 31 999 99 99");
    assert_eq!(stored.number_of_telephone_numbers, 1);
    assert_eq!(stored.first_name, "Contact1");
}

#[tokio::test]
async fn empty_delta_is_a_no_op() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let summary = contacts
        .update_delta(&ctx(), Delta::new(seed.b, PhoneBookContact::new("x", "y")))
        .await
        .payload
        .unwrap();
    assert!(summary.is_noop());

    let missing = contacts
        .update_delta(&ctx(), Delta::new(Uuid::new(), PhoneBookContact::new("x", "y")).property("first_name"))
        .await;
    assert_eq!(missing.error_kind, Some(ErrorKind::ObjectNotFound));
}

#[tokio::test]
async fn renaming_into_a_taken_name_fails() {
    let (store, seed) = seeded_store().await;
    let categories = store.collection::<PhoneBookCategory>();

    let result = categories
        .update_delta(&ctx(), Delta::new(seed.suppliers, PhoneBookCategory::new("CATEGORY1")).property("name"))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::DuplicateName));
}

#[tokio::test]
async fn bulk_update_applies_the_template() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let template = PhoneBookContact::new("ignored", "ignored").with_location("Lausanne");
    let matched = contacts
        .bulk_update(
            &ctx(),
            BulkUpdate::new([seed.a, seed.b, seed.s, Uuid::new()], template).property("location"),
        )
        .await
        .payload
        .unwrap();
    assert_eq!(matched, 3);

    let moved = contacts
        .search(
            &ctx(),
            SearchParameters::builder()
                .parameter(SearchParameter::new("location", ComparisonOperator::EqualTo, "Lausanne"))
                .build(),
        )
        .await
        .payload
        .unwrap();
    assert_eq!(moved.item_count, 3);

    let untouched = contacts.get(&ctx(), seed.m, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(untouched.location.as_deref(), Some("Bern"));

    let renamed = contacts.get(&ctx(), seed.a, GetOptions::default()).await.payload.unwrap().entity;
    assert_eq!(renamed.first_name, "Contact1");
    assert_eq!(renamed.version, 1);
}

#[tokio::test]
async fn bulk_update_drops_references_to_missing_entities() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let template = PhoneBookContact::new("ignored", "ignored")
        .with_manager(Uuid::new())
        .in_category(seed.suppliers)
        .in_category(Uuid::new());
    let matched = contacts
        .bulk_update(
            &ctx(),
            BulkUpdate::new([seed.b, seed.s], template)
                .property("category_ids")
                .property("manager_id"),
        )
        .await
        .payload
        .unwrap();
    assert_eq!(matched, 2);

    for id in [seed.b, seed.s] {
        let stored = contacts.get(&ctx(), id, GetOptions::default()).await.payload.unwrap().entity;
        assert_eq!(stored.category_ids, vec![seed.suppliers]);
        assert_eq!(stored.manager_id, None);
    }
}

#[tokio::test]
async fn bulk_update_refuses_to_share_a_unique_name() {
    let (store, seed) = seeded_store().await;

    let result = store
        .collection::<PhoneBookCategory>()
        .bulk_update(
            &ctx(),
            BulkUpdate::new([seed.category1, seed.suppliers], PhoneBookCategory::new("Same")).property("name"),
        )
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::InvalidArgument));
}

#[tokio::test]
async fn bulk_delete_and_delete() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let deleted = contacts
        .bulk_delete(&ctx(), vec![seed.b, seed.s, Uuid::new()])
        .await
        .payload
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(store.backend().len("contacts").await, 2);

    assert!(contacts.delete(&ctx(), seed.a).await.success);

    let gone = contacts.get(&ctx(), seed.a, GetOptions::default()).await;
    assert!(!gone.success);
    assert_eq!(gone.error_kind, Some(ErrorKind::ObjectNotFound));
    assert!(gone.payload.is_none());

    let again = contacts.delete(&ctx(), seed.a).await;
    assert_eq!(again.error_kind, Some(ErrorKind::ObjectNotFound));
}
