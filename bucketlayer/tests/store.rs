use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use bson::{Bson, doc};
use serde::{Deserialize, Serialize};

use bucketlayer::{
    error::BucketResult,
    memory::InMemoryBucket,
    prelude::*,
};

async fn mock_store(name: &str) -> DocumentStore {
    bucketlayer::open(&ConnectionOptions::new("127.0.0.1", name), true)
        .await
        .unwrap()
}

fn operation_error(err: StoreError) -> OperationError {
    match err {
        StoreError::Operation(err) => err,
        other => panic!("expected operation error, got {other:?}"),
    }
}

/// Bucket that lets another writer touch a key right after every read.
#[derive(Debug)]
struct RacingBucket {
    inner: InMemoryBucket,
    interfere: AtomicBool,
}

#[async_trait]
impl BucketBackend for RacingBucket {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn insert(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult> {
        self.inner.insert(key, value, options).await
    }

    async fn get(&self, key: &str) -> BucketResult<GetResult> {
        let read = self.inner.get(key).await?;

        if self.interfere.load(Ordering::SeqCst) {
            self.inner.upsert(key, Bson::String("intruder".to_string()), WriteOptions::default()).await?;
        }

        Ok(read)
    }

    async fn get_multi(&self, keys: &[String]) -> BucketResult<MultiGetResult> {
        self.inner.get_multi(keys).await
    }

    async fn replace(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult> {
        self.inner.replace(key, value, options).await
    }

    async fn upsert(&self, key: &str, value: Bson, options: WriteOptions) -> BucketResult<MutationResult> {
        self.inner.upsert(key, value, options).await
    }

    async fn remove(&self, key: &str, options: WriteOptions) -> BucketResult<MutationResult> {
        self.inner.remove(key, options).await
    }

    async fn counter(&self, key: &str, delta: i64, options: CounterOptions) -> BucketResult<CounterResult> {
        self.inner.counter(key, delta, options).await
    }

    async fn query(&self, query: ViewQuery) -> BucketResult<Vec<ViewRow>> {
        self.inner.query(query).await
    }

    async fn define_view(&self, design: &str, view: &str, definition: ViewDefinition) -> BucketResult<()> {
        self.inner.define_view(design, view, definition).await
    }
}

fn racing_store() -> (DocumentStore, Arc<RacingBucket>) {
    let bucket = Arc::new(RacingBucket {
        inner: InMemoryBucket::new("racing"),
        interfere: AtomicBool::new(false),
    });

    (DocumentStore::new(bucket.clone()), bucket)
}

#[tokio::test]
async fn test_insert_then_get() {
    let store = mock_store("default").await;
    let doc = Bson::Document(doc! { "color": "red", "size": 3 });

    store.insert("doc1", doc.clone(), WriteOptions::default()).await.unwrap();

    assert_eq!(store.get("doc1").await.unwrap(), doc);
}

#[tokio::test]
async fn test_insert_existing_key_fails_and_keeps_document() {
    let store = mock_store("default").await;
    store.insert("doc1", Bson::Int32(1), WriteOptions::default()).await.unwrap();

    let err = operation_error(
        store.insert("doc1", Bson::Int32(2), WriteOptions::default()).await.unwrap_err()
    );

    assert_eq!(err.operation(), Operation::Insert);
    assert_eq!(err.category(), ErrorCategory::ServiceUnavailable);
    assert_eq!(err.to_string(), "Service Unavailable: Key doc1 already exists");
    assert_eq!(store.get("doc1").await.unwrap(), Bson::Int32(1));
}

#[tokio::test]
async fn test_upsert_creates_and_overwrites() {
    let store = mock_store("default").await;

    store.upsert("doc1", Bson::Int32(1), WriteOptions::default()).await.unwrap();
    store.upsert("doc1", Bson::Int32(2), WriteOptions::default()).await.unwrap();

    assert_eq!(store.get("doc1").await.unwrap(), Bson::Int32(2));
}

#[tokio::test]
async fn test_raw_get_returns_cas_of_last_write() {
    let store = mock_store("default").await;

    let first = store.upsert("doc1", Bson::Int32(1), WriteOptions::default()).await.unwrap();
    let second = store.upsert("doc1", Bson::Int32(2), WriteOptions::default()).await.unwrap();
    let read = store.get_raw("doc1").await.unwrap();

    assert_ne!(first.cas, second.cas);
    assert_eq!(read.cas, second.cas);
    assert_eq!(read.value, Bson::Int32(2));
}

#[tokio::test]
async fn test_get_missing_key_fails() {
    let store = mock_store("default").await;

    let err = operation_error(store.get("nope").await.unwrap_err());

    assert_eq!(err.operation(), Operation::Get);
    assert_eq!(err.message(), "Key nope not found");
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn test_get_multi_preserves_order() {
    let store = mock_store("default").await;
    store.upsert("a", Bson::Int32(1), WriteOptions::default()).await.unwrap();
    store.upsert("b", Bson::Int32(2), WriteOptions::default()).await.unwrap();

    let values = store.get_multi(&["b", "missing", "a"]).await.unwrap();
    let raw = store.get_multi_raw(&["b", "missing", "a"]).await.unwrap();

    assert_eq!(values, vec![Some(Bson::Int32(2)), None, Some(Bson::Int32(1))]);
    assert_eq!(raw.missing(), vec!["missing"]);
    assert_eq!(raw.get("a").flatten().map(|r| &r.value), Some(&Bson::Int32(1)));
}

#[tokio::test]
async fn test_replace_requires_existing_key() {
    let store = mock_store("default").await;

    let err = operation_error(
        store.replace("doc1", Bson::Int32(1), WriteOptions::default()).await.unwrap_err()
    );

    assert_eq!(err.operation(), Operation::Replace);
    assert_eq!(err.message(), "Key doc1 not found");
}

#[tokio::test]
async fn test_replace_with_current_cas_round_trip() {
    let store = mock_store("default").await;
    store.insert("doc1", Bson::Document(doc! { "v": 1 }), WriteOptions::default()).await.unwrap();

    let first = store.get_raw("doc1").await.unwrap();
    let replaced = store
        .replace("doc1", Bson::Document(doc! { "v": 2 }), WriteOptions::with_cas(first.cas))
        .await
        .unwrap();
    let second = store.get_raw("doc1").await.unwrap();

    assert_eq!(second.value, Bson::Document(doc! { "v": 2 }));
    assert_eq!(second.cas, replaced.cas);
    assert_ne!(second.cas, first.cas);
}

#[tokio::test]
async fn test_replace_with_stale_cas_fails() {
    let store = mock_store("default").await;
    let stale = store.insert("doc1", Bson::Int32(1), WriteOptions::default()).await.unwrap().cas;
    store.upsert("doc1", Bson::Int32(2), WriteOptions::default()).await.unwrap();

    let err = operation_error(
        store.replace("doc1", Bson::Int32(3), WriteOptions::with_cas(stale)).await.unwrap_err()
    );

    assert_eq!(err.message(), "CAS mismatch for key doc1");
    assert_eq!(store.get("doc1").await.unwrap(), Bson::Int32(2));
}

#[tokio::test]
async fn test_remove() {
    let store = mock_store("default").await;
    store.insert("doc1", Bson::Int32(1), WriteOptions::default()).await.unwrap();

    store.remove("doc1", WriteOptions::default()).await.unwrap();

    assert!(store.get("doc1").await.is_err());
    assert_eq!(
        operation_error(store.remove("doc1", WriteOptions::default()).await.unwrap_err()).operation(),
        Operation::Remove
    );
}

#[tokio::test]
async fn test_update_merges_partial_document() {
    let store = mock_store("default").await;
    store.insert("doc1", Bson::Document(doc! { "a": 0, "b": 2 }), WriteOptions::default()).await.unwrap();

    let updated = store.update("doc1", doc! { "a": 1 }, true).await.unwrap();

    assert_eq!(updated, Bson::Document(doc! { "a": 1, "b": 2 }));
    assert_eq!(store.get("doc1").await.unwrap(), updated);
}

#[tokio::test]
async fn test_update_with_function() {
    let store = mock_store("default").await;
    store.insert("doc1", Bson::Document(doc! { "a": 0, "b": 2 }), WriteOptions::default()).await.unwrap();

    let updated = store
        .update(
            "doc1",
            Mutation::apply(|current| {
                let mut doc = current.as_document().cloned().unwrap_or_default();
                doc.insert("c", 3);
                Bson::Document(doc)
            }),
            false,
        )
        .await
        .unwrap();

    assert_eq!(updated, Bson::Document(doc! { "a": 0, "b": 2, "c": 3 }));
}

#[tokio::test]
async fn test_update_missing_key_fails() {
    let store = mock_store("default").await;

    let err = operation_error(store.update("nope", doc! { "a": 1 }, true).await.unwrap_err());

    assert_eq!(err.operation(), Operation::Get);
}

#[tokio::test]
async fn test_update_with_cas_loses_to_concurrent_write() {
    let (store, bucket) = racing_store();
    store.insert("doc1", Bson::Document(doc! { "a": 0 }), WriteOptions::default()).await.unwrap();
    bucket.interfere.store(true, Ordering::SeqCst);

    let err = operation_error(store.update("doc1", doc! { "a": 1 }, true).await.unwrap_err());

    assert_eq!(err.operation(), Operation::Replace);
    assert_eq!(err.message(), "CAS mismatch for key doc1");
    assert_eq!(store.get("doc1").await.unwrap(), Bson::String("intruder".to_string()));
}

#[tokio::test]
async fn test_update_without_cas_overwrites_concurrent_write() {
    let (store, bucket) = racing_store();
    store.insert("doc1", Bson::Document(doc! { "a": 0 }), WriteOptions::default()).await.unwrap();
    bucket.interfere.store(true, Ordering::SeqCst);

    store.update("doc1", doc! { "a": 1 }, false).await.unwrap();
    bucket.interfere.store(false, Ordering::SeqCst);

    assert_eq!(store.get("doc1").await.unwrap(), Bson::Document(doc! { "a": 1 }));
}

#[tokio::test]
async fn test_update_merge_into_scalar_fails() {
    let store = mock_store("default").await;
    store.insert("doc1", Bson::Int32(1), WriteOptions::default()).await.unwrap();

    let err = operation_error(store.update("doc1", doc! { "a": 1 }, true).await.unwrap_err());

    assert_eq!(err.operation(), Operation::Replace);
    assert_eq!(store.get("doc1").await.unwrap(), Bson::Int32(1));
}

#[tokio::test]
async fn test_counter_with_initial_on_absent_key() {
    let store = mock_store("default").await;

    let created = store.counter("hits", 1, CounterOptions::with_initial(5)).await.unwrap();
    let bumped = store.counter("hits", 2, CounterOptions::default()).await.unwrap();
    let lowered = store.counter("hits", -100, CounterOptions::default()).await.unwrap();

    assert_eq!(created.value, 5);
    assert_eq!(bumped.value, 7);
    assert_eq!(lowered.value, 0);
    assert_eq!(store.get("hits").await.unwrap(), Bson::Int64(0));
}

#[tokio::test]
async fn test_counter_on_absent_key_without_initial_fails() {
    let store = mock_store("default").await;

    let err = operation_error(store.counter("hits", 1, CounterOptions::default()).await.unwrap_err());

    assert_eq!(err.operation(), Operation::Counter);
    assert!(store.get("hits").await.is_err());
}

#[tokio::test]
async fn test_error_category_is_configurable() {
    let store = mock_store("default").await.with_error_category(ErrorCategory::Timeout);

    let err = operation_error(store.get("nope").await.unwrap_err());

    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert_eq!(err.status_code(), 504);
    assert_eq!(err.to_string(), "Gateway Time-out: Key nope not found");
}

#[tokio::test]
async fn test_typed_documents() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Movie {
        title: String,
        year: i32,
    }

    let store = mock_store("default").await;
    let heat = Movie { title: "Heat".to_string(), year: 1995 };

    store.insert_as("heat", &heat).await.unwrap();

    assert_eq!(store.get_as::<Movie>("heat").await.unwrap(), heat);
    assert!(matches!(
        store.get_as::<Movie>("nope").await,
        Err(StoreError::Operation(_))
    ));
}

#[tokio::test]
async fn test_open_reports_to_on_ready() {
    let ready = Arc::new(AtomicBool::new(false));
    let flag = ready.clone();
    let options = ConnectionOptions::new("127.0.0.1", "default")
        .on_ready(move |outcome| flag.store(outcome.is_ok(), Ordering::SeqCst));

    bucketlayer::open(&options, true).await.unwrap();

    assert!(ready.load(Ordering::SeqCst));
}

#[cfg(not(feature = "mongodb"))]
#[tokio::test]
async fn test_real_connection_without_backend_fails() {
    let failed = Arc::new(AtomicBool::new(false));
    let flag = failed.clone();
    let options = ConnectionOptions::new("127.0.0.1", "default")
        .on_ready(move |outcome| flag.store(outcome.is_err(), Ordering::SeqCst));

    let result = bucketlayer::open(&options, false).await;

    assert!(matches!(result, Err(StoreError::Connection(BucketError::Connection(_)))));
    assert!(failed.load(Ordering::SeqCst));
}
