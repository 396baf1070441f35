use bson::{Bson, doc};

use bucketlayer::prelude::*;

async fn movie_store() -> DocumentStore {
    let store = bucketlayer::open(&ConnectionOptions::new("127.0.0.1", "movies"), true)
        .await
        .unwrap();

    let movies = [
        ("heat", "Heat", 1995),
        ("alien", "Alien", 1979),
        ("ronin", "Ronin", 1998),
        ("casino", "Casino", 1995),
    ];
    for (key, title, year) in movies {
        store
            .insert(key, Bson::Document(doc! { "title": title, "year": year }), WriteOptions::default())
            .await
            .unwrap();
    }

    store
        .define_view("movies", "by_year", ViewDefinition::by_field("year").emit_value("title"))
        .await
        .unwrap();

    store
}

fn ids(rows: &[ViewRow]) -> Vec<&str> {
    rows.iter().map(|row| row.id.as_str()).collect()
}

#[tokio::test]
async fn test_commit_returns_rows_in_key_order() {
    let store = movie_store().await;

    let rows = store.commit(store.query("movies", "by_year")).await.unwrap();

    assert_eq!(ids(&rows), vec!["alien", "casino", "heat", "ronin"]);
    assert_eq!(rows[0].key, Bson::Int32(1979));
    assert_eq!(rows[0].value, Bson::String("Alien".to_string()));
}

#[tokio::test]
async fn test_query_filters_and_pages() {
    let store = movie_store().await;

    let by_key = store.commit(store.query("movies", "by_year").key(1995)).await.unwrap();
    let ranged = store
        .commit(
            store
                .query("movies", "by_year")
                .range(1980, 1998, true)
                .order(ViewOrder::Descending)
                .limit(2),
        )
        .await
        .unwrap();

    assert_eq!(ids(&by_key), vec!["casino", "heat"]);
    assert_eq!(ids(&ranged), vec!["ronin", "heat"]);
}

#[tokio::test]
async fn test_view_sees_later_writes() {
    let store = movie_store().await;
    store.remove("alien", WriteOptions::default()).await.unwrap();
    store.update("ronin", doc! { "year": 1970 }, true).await.unwrap();

    let rows = store.commit(store.query("movies", "by_year").limit(1)).await.unwrap();

    assert_eq!(ids(&rows), vec!["ronin"]);
}

#[tokio::test]
async fn test_unknown_view_fails() {
    let store = movie_store().await;

    let err = store.commit(store.query("movies", "by_title")).await.unwrap_err();
    let err = err.as_operation().unwrap();

    assert_eq!(err.operation(), Operation::Query);
    assert_eq!(err.message(), "View movies/by_title not found");
}
