mod common;

use std::collections::HashSet;

use common::{ctx, ids, seeded_store, sorted};
use docbridge::{
    phonebook::{CategorySearch, ContactSearch, PhoneBookCategory, PhoneBookContact},
    prelude::*,
};

#[tokio::test]
async fn prefix_query_sorted_by_first_name_descending() {
    let (store, seed) = seeded_store().await;

    let params = SearchParameters::builder()
        .query("contact")
        .sort_by("FirstName")
        .ascending(false)
        .build();
    let page = store.collection::<PhoneBookContact>().search(&ctx(), params).await;

    assert!(page.success);
    let page = page.payload.unwrap();
    assert_eq!(ids(&page), vec![seed.s, seed.b, seed.a]);
    assert_eq!(page.item_count, 3);
    assert!(!page.more);
}

#[tokio::test]
async fn substring_query_combined_with_location() {
    let (store, seed) = seeded_store().await;

    let params = ContactSearch::new().query("%ONTACT").location("Bern");
    let page = store
        .collection::<PhoneBookContact>()
        .search(&ctx(), params.into())
        .await
        .payload
        .unwrap();

    assert_eq!(sorted(ids(&page)), sorted(vec![seed.a, seed.s]));
}

#[tokio::test]
async fn substring_queries_find_a_superset_of_prefix_queries() {
    let (store, _) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    for term in ["ma", "co", "st", "+41 3", "rt"] {
        let prefix = contacts
            .search(&ctx(), SearchParameters::builder().query(term).build())
            .await
            .payload
            .unwrap();
        let substring = contacts
            .search(&ctx(), SearchParameters::builder().query(format!("%{term}")).build())
            .await
            .payload
            .unwrap();

        let prefix = ids(&prefix).into_iter().collect::<HashSet<_>>();
        let substring = ids(&substring).into_iter().collect::<HashSet<_>>();
        assert!(prefix.is_subset(&substring), "'%{term}' lost matches of '{term}'");
    }
}

#[tokio::test]
async fn match_all_query_and_default_sort() {
    let (store, seed) = seeded_store().await;

    let page = store
        .collection::<PhoneBookContact>()
        .search(&ctx(), SearchParameters::builder().query("*").build())
        .await
        .payload
        .unwrap();

    // last name, then first name
    assert_eq!(ids(&page), vec![seed.a, seed.b, seed.m, seed.s]);
}

#[tokio::test]
async fn numeric_comparisons_on_the_derived_number_count() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let fewer = SearchParameters::builder()
        .parameter(SearchParameter::new(
            "NumberOfTelephoneNumbers",
            ComparisonOperator::LessThan,
            "2",
        ))
        .build();
    let fewer = contacts.search(&ctx(), fewer).await.payload.unwrap();
    assert_eq!(sorted(ids(&fewer)), sorted(vec![seed.b, seed.m, seed.s]));

    let more = SearchParameters::builder()
        .parameter(SearchParameter::new(
            "number_of_telephone_numbers",
            ComparisonOperator::MoreThanOrEqualTo,
            2.0,
        ))
        .build();
    let more = contacts.search(&ctx(), more).await.payload.unwrap();
    assert_eq!(ids(&more), vec![seed.a]);
}

#[tokio::test]
async fn text_operators_on_numbers_are_ignored() {
    let (store, _) = seeded_store().await;

    let params = SearchParameters::builder()
        .parameter(SearchParameter::new(
            "number_of_telephone_numbers",
            ComparisonOperator::Contains,
            "1",
        ))
        .build();
    let page = store
        .collection::<PhoneBookContact>()
        .search(&ctx(), params)
        .await
        .payload
        .unwrap();

    assert_eq!(page.item_count, 4);
}

#[tokio::test]
async fn free_text_matches_phone_numbers() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let bern = contacts
        .search(&ctx(), SearchParameters::builder().query("+41 31").build())
        .await
        .payload
        .unwrap();
    assert_eq!(sorted(ids(&bern)), sorted(vec![seed.a, seed.s]));

    let mobile = contacts
        .search(&ctx(), SearchParameters::builder().query("%222 22").build())
        .await
        .payload
        .unwrap();
    assert_eq!(ids(&mobile), vec![seed.a]);
}

#[tokio::test]
async fn manager_and_secretary_filters() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let managed = contacts
        .search(&ctx(), ContactSearch::new().manager_ids([seed.m]).into())
        .await
        .payload
        .unwrap();
    assert_eq!(ids(&managed), vec![seed.a]);

    let both = contacts
        .search(
            &ctx(),
            ContactSearch::new()
                .secretary_ids([seed.s])
                .manager_ids([seed.m])
                .into(),
        )
        .await
        .payload
        .unwrap();
    assert_eq!(ids(&both), vec![seed.a]);

    let nobody = contacts
        .search(&ctx(), ContactSearch::new().secretary_ids([seed.b]).into())
        .await
        .payload
        .unwrap();
    assert!(nobody.results.is_empty());
}

#[tokio::test]
async fn empty_and_not_empty_references() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let with_manager = SearchParameters::builder()
        .parameter(SearchParameter::unary("ManagerId", ComparisonOperator::IsNotEmpty))
        .build();
    let with_manager = contacts.search(&ctx(), with_manager).await.payload.unwrap();
    assert_eq!(ids(&with_manager), vec![seed.a]);

    let without_manager = SearchParameters::builder()
        .parameter(SearchParameter::unary("ManagerId", ComparisonOperator::IsEmpty))
        .build();
    let without_manager = contacts.search(&ctx(), without_manager).await.payload.unwrap();
    assert_eq!(without_manager.item_count, 3);
}

#[tokio::test]
async fn membership_and_or_combination() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let either = SearchParameters::builder()
        .operator(BooleanOperator::Or)
        .parameter(SearchParameter::new("location", ComparisonOperator::EqualTo, "Zurich"))
        .parameter(SearchParameter::one_of("first_name", ["Manager", "Nobody"]))
        .build();
    let either = contacts.search(&ctx(), either).await.payload.unwrap();

    assert_eq!(sorted(ids(&either)), sorted(vec![seed.b, seed.m]));
}

#[tokio::test]
async fn sorting_by_manager_orders_by_the_managers_name() {
    let (store, seed) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let ascending = contacts
        .search(&ctx(), SearchParameters::builder().sort_by("ManagerId").build())
        .await
        .payload
        .unwrap();
    assert_eq!(ids(&ascending).last(), Some(&seed.a));

    let descending = SearchParameters::builder()
        .sort_by("manager_id")
        .ascending(false)
        .page(1)
        .page_size(1)
        .build();
    let descending = contacts.search(&ctx(), descending).await.payload.unwrap();
    assert_eq!(ids(&descending), vec![seed.a]);
    assert_eq!(descending.item_count, 4);
    assert!(descending.more);
}

#[tokio::test]
async fn pages_reconstruct_the_full_result_set() {
    let (store, _) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let all = contacts
        .search(&ctx(), SearchParameters::default())
        .await
        .payload
        .unwrap();
    assert_eq!(all.item_count, 4);
    assert!(!all.more);

    let mut collected = Vec::new();
    let mut page = 1;

    loop {
        let params = SearchParameters::builder().page(page).page_size(3).build();
        let results = contacts.search(&ctx(), params).await.payload.unwrap();

        assert_eq!(results.item_count, 4);
        collected.extend(ids(&results));

        if !results.more {
            break;
        }
        page += 1;
    }

    assert_eq!(page, 2);
    assert_eq!(collected, ids(&all));
}

#[tokio::test]
async fn hydrated_search_results() {
    let (store, seed) = seeded_store().await;

    let params = SearchParameters::builder()
        .query("contact1")
        .include_dependent_elements(true)
        .build();
    let page = store
        .collection::<PhoneBookContact>()
        .search(&ctx(), params)
        .await
        .payload
        .unwrap();

    let contact = &page.results[0];
    assert_eq!(contact.id, seed.a);
    assert_eq!(contact.manager.as_ref().map(|manager| manager.id), Some(seed.m));
    assert_eq!(contact.secretaries.len(), 1);
    assert_eq!(contact.categories[0].name, "Category1");
    assert_eq!(contact.phone_books[0].name, "Internal");
}

#[tokio::test]
async fn category_name_search() {
    let (store, seed) = seeded_store().await;
    let categories = store.collection::<PhoneBookCategory>();

    let found = categories
        .search(&ctx(), CategorySearch::new().name("%ateg").into())
        .await
        .payload
        .unwrap();
    assert_eq!(ids(&found), vec![seed.category1]);

    let linked = categories
        .search(&ctx(), CategorySearch::new().phone_book_ids([seed.pb1]).into())
        .await
        .payload
        .unwrap();
    assert_eq!(ids(&linked), vec![seed.category1]);

    let none = categories
        .search(&ctx(), CategorySearch::new().name("Zilch").into())
        .await;
    assert!(none.success);
    let none = none.payload.unwrap();
    assert!(none.results.is_empty());
    assert_eq!(none.item_count, 0);
    assert!(!none.more);
}

#[tokio::test]
async fn malformed_searches_fail_only_the_search() {
    let (store, _) = seeded_store().await;
    let contacts = store.collection::<PhoneBookContact>();

    let unknown_field = SearchParameters::builder()
        .parameter(SearchParameter::new("shoe_size", ComparisonOperator::EqualTo, "42"))
        .build();
    let result = contacts.search(&ctx(), unknown_field).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidSearch));

    let bad_number = SearchParameters::builder()
        .parameter(SearchParameter::new(
            "number_of_telephone_numbers",
            ComparisonOperator::MoreThan,
            "many",
        ))
        .build();
    let result = contacts.search(&ctx(), bad_number).await;
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidSearch));

    let unknown_sort = SearchParameters::builder().sort_by("shoe_size").build();
    assert_eq!(contacts.search(&ctx(), unknown_sort).await.error_kind, Some(ErrorKind::InvalidSearch));

    assert!(contacts.search(&ctx(), SearchParameters::default()).await.success);
}
