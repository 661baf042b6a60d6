#![allow(dead_code)]

use bson::Uuid;
use docbridge::{
    memory::InMemoryStore,
    phonebook::{self, NumberType, PhoneBook, PhoneBookCategory, PhoneBookContact},
    prelude::*,
};

pub fn ctx() -> OperationContext {
    OperationContext::new(Caller::user("jdoe"))
}

pub async fn empty_store() -> EntityStore<InMemoryStore> {
    let store = EntityStore::new(InMemoryStore::builder().build().await.unwrap());
    phonebook::create_collections(&store).await.unwrap();
    store
}

/// Ids of the seeded phone book.
///
/// | contact | first name | last name | location | numbers | manager | secretaries |
/// |---|---|---|---|---|---|---|
/// | a | Contact1 | Aebi | Bern | 2 | m | s |
/// | b | Contact2 | Brunner | Zurich | 1 | | |
/// | m | Manager | Marti | Bern | 0 | | |
/// | s | Contact3 | Steiner | Bern | 1 | | |
///
/// `a` is in `category1` and `pb1`; `category1` is linked to `pb1`.
#[derive(Debug, Clone, Copy)]
pub struct Seed {
    pub pb1: Uuid,
    pub category1: Uuid,
    pub suppliers: Uuid,
    pub a: Uuid,
    pub b: Uuid,
    pub m: Uuid,
    pub s: Uuid,
}

pub async fn seeded_store() -> (EntityStore<InMemoryStore>, Seed) {
    let store = empty_store().await;
    let ctx = ctx();

    let pb1 = store
        .collection::<PhoneBook>()
        .add(&ctx, PhoneBook::new("Internal"))
        .await
        .payload
        .unwrap()
        .id;

    let categories = store.collection::<PhoneBookCategory>();
    let category1 = categories
        .add(&ctx, PhoneBookCategory::new("Category1").in_phone_book(pb1))
        .await
        .payload
        .unwrap()
        .id;
    let suppliers = categories
        .add(&ctx, PhoneBookCategory::new("Suppliers"))
        .await
        .payload
        .unwrap()
        .id;

    let contacts = store.collection::<PhoneBookContact>();

    let m = add_contact(&contacts, &ctx, PhoneBookContact::new("Manager", "Marti").with_location("Bern")).await;
    let s = add_contact(
        &contacts,
        &ctx,
        PhoneBookContact::new("Contact3", "Steiner")
            .with_location("Bern")
            .with_number("+41 31 444 44 44", NumberType::Office),
    )
    .await;
    let a = add_contact(
        &contacts,
        &ctx,
        PhoneBookContact::new("Contact1", "Aebi")
            .with_location("Bern")
            .with_number("+41 31 111 11 11", NumberType::Office)
            .with_number("+41 79 222 22 22", NumberType::Mobile)
            .with_manager(m)
            .with_secretary(s)
            .in_category(category1)
            .in_phone_book(pb1),
    )
    .await;
    let b = add_contact(
        &contacts,
        &ctx,
        PhoneBookContact::new("Contact2", "Brunner")
            .with_location("Zurich")
            .with_number("+41 44 333 33 33", NumberType::Office),
    )
    .await;

    (store, Seed { pb1, category1, suppliers, a, b, m, s })
}

pub async fn add_contact(
    contacts: &EntityCollection<'_, InMemoryStore, AllowAll, PhoneBookContact>,
    ctx: &OperationContext,
    contact: PhoneBookContact,
) -> Uuid {
    contacts.add(ctx, contact).await.payload.unwrap().id
}

pub fn ids<E: Entity>(results: &SearchResults<E>) -> Vec<Uuid> {
    results.results.iter().map(|entity| *entity.id()).collect()
}

pub fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}
