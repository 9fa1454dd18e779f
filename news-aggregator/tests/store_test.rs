mod common;

use common::{init_tracing, item, memory_store, ts};
use news_aggregator::{AggregatorError, NewsStore};

#[tokio::test]
async fn test_upsert_counts_only_new_rows() {
    init_tracing();
    let store = memory_store().await;

    let batch = vec![
        item("https://a.example/1", "one", ts(2024, 1, 1, 0), ts(2024, 1, 2, 0)),
        item("https://a.example/2", "two", ts(2024, 1, 1, 1), ts(2024, 1, 2, 0)),
        item("https://a.example/3", "three", ts(2024, 1, 1, 2), ts(2024, 1, 2, 0)),
    ];

    assert_eq!(store.upsert(&batch).await.unwrap(), 3);
    assert_eq!(store.upsert(&batch).await.unwrap(), 0);
    assert_eq!(store.count().await.unwrap(), 3);

    let mut extended = batch.clone();
    extended.push(item("https://a.example/4", "four", ts(2024, 1, 1, 3), ts(2024, 1, 3, 0)));
    assert_eq!(store.upsert(&extended).await.unwrap(), 1);
    assert_eq!(store.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_duplicate_urls_in_one_batch_insert_once() {
    let store = memory_store().await;

    let batch = vec![
        item("https://dup.example/x", "first", ts(2024, 1, 1, 0), ts(2024, 1, 2, 0)),
        item("https://dup.example/x", "second", ts(2024, 1, 5, 0), ts(2024, 1, 2, 1)),
    ];

    assert_eq!(store.upsert(&batch).await.unwrap(), 1);

    let stored = store.get_by_url("https://dup.example/x").await.unwrap().unwrap();
    assert_eq!(stored.item.summary, "second");
    assert_eq!(stored.item.published_at, ts(2024, 1, 1, 0));
    assert_eq!(stored.item.fetched_at, ts(2024, 1, 2, 1));
}

#[tokio::test]
async fn test_merge_keeps_first_values_and_latest_nonempty_summary() {
    init_tracing();
    let store = memory_store().await;
    let url = "https://merge.example/story";

    let mut first = item(url, "", ts(2024, 1, 1, 0), ts(2024, 1, 1, 1));
    first.title = "Original title".to_string();
    first.source_name = "First Source".to_string();
    assert_eq!(store.upsert(&[first]).await.unwrap(), 1);

    // A later non-empty summary fills in the blank one.
    let mut second = item(url, "Now with a summary", ts(2024, 6, 1, 0), ts(2024, 1, 2, 0));
    second.title = "Rewritten title".to_string();
    second.source_name = "Second Source".to_string();
    assert_eq!(store.upsert(&[second]).await.unwrap(), 0);

    let stored = store.get_by_url(url).await.unwrap().unwrap();
    assert_eq!(stored.item.title, "Original title");
    assert_eq!(stored.item.source_name, "First Source");
    assert_eq!(stored.item.published_at, ts(2024, 1, 1, 0));
    assert_eq!(stored.item.summary, "Now with a summary");
    assert_eq!(stored.item.fetched_at, ts(2024, 1, 2, 0));

    // An empty summary never clobbers a stored one, but fetched_at still moves.
    let third = item(url, "", ts(2024, 7, 1, 0), ts(2024, 1, 3, 0));
    assert_eq!(store.upsert(&[third]).await.unwrap(), 0);

    let stored = store.get_by_url(url).await.unwrap().unwrap();
    assert_eq!(stored.item.summary, "Now with a summary");
    assert_eq!(stored.item.fetched_at, ts(2024, 1, 3, 0));
}

#[tokio::test]
async fn test_list_is_newest_first_with_paging() {
    let store = memory_store().await;

    let batch: Vec<_> = (1..=5)
        .map(|day| {
            item(
                &format!("https://list.example/{}", day),
                "",
                ts(2024, 1, day, 0),
                ts(2024, 2, 1, 0),
            )
        })
        .collect();
    store.upsert(&batch).await.unwrap();

    let first_page = store.list_items(2, 0).await.unwrap();
    let urls: Vec<&str> = first_page.iter().map(|r| r.item.url.as_str()).collect();
    assert_eq!(urls, vec!["https://list.example/5", "https://list.example/4"]);

    let page = store.page(2, 4).await.unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.limit, 2);
    assert_eq!(page.offset, 4);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].item.url, "https://list.example/1");
}

#[tokio::test]
async fn test_equal_published_orders_by_fetched_desc() {
    let store = memory_store().await;
    let published = ts(2024, 1, 1, 0);

    store
        .upsert(&[
            item("https://tie.example/early", "", published, ts(2024, 1, 2, 0)),
            item("https://tie.example/late", "", published, ts(2024, 1, 3, 0)),
        ])
        .await
        .unwrap();

    let items = store.list_items(10, 0).await.unwrap();
    assert_eq!(items[0].item.url, "https://tie.example/late");
    assert_eq!(items[1].item.url, "https://tie.example/early");
}

#[tokio::test]
async fn test_bad_item_is_skipped_and_rest_are_stored() {
    init_tracing();
    let store = memory_store().await;

    let batch = vec![
        item("https://ok.example/1", "", ts(2024, 1, 1, 0), ts(2024, 1, 1, 0)),
        item("", "violates the url check", ts(2024, 1, 1, 0), ts(2024, 1, 1, 0)),
        item("https://ok.example/2", "", ts(2024, 1, 1, 0), ts(2024, 1, 1, 0)),
    ];

    assert_eq!(store.upsert(&batch).await.unwrap(), 2);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_closed_store_is_unavailable() {
    let store = memory_store().await;
    store.close().await;

    let batch = vec![item("https://closed.example/1", "", ts(2024, 1, 1, 0), ts(2024, 1, 1, 0))];
    let err = store.upsert(&batch).await.unwrap_err();
    assert!(matches!(err, AggregatorError::StorageUnavailable(_)));

    // Nothing to write means nothing to fail.
    assert_eq!(store.upsert(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_file_database_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("news.db").display());

    {
        let store = NewsStore::connect(&url).await.unwrap();
        store.ensure_schema().await.unwrap();
        store
            .upsert(&[item("https://disk.example/1", "kept", ts(2024, 1, 1, 0), ts(2024, 1, 1, 0))])
            .await
            .unwrap();
        store.close().await;
    }

    let store = NewsStore::connect(&url).await.unwrap();
    store.ensure_schema().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
    let stored = store.get_by_url("https://disk.example/1").await.unwrap().unwrap();
    assert_eq!(stored.item.summary, "kept");
}

async fn shared_memory_pool() -> sqlx::SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

#[tokio::test]
async fn test_every_write_failing_is_unavailable() {
    init_tracing();
    let pool = shared_memory_pool().await;
    let store = NewsStore::from_pool(pool.clone());
    store.ensure_schema().await.unwrap();

    sqlx::query("DROP TABLE news_items").execute(&pool).await.unwrap();

    let batch = vec![
        item("https://gone.example/1", "", ts(2024, 1, 1, 0), ts(2024, 1, 1, 0)),
        item("https://gone.example/2", "", ts(2024, 1, 1, 0), ts(2024, 1, 1, 0)),
    ];
    let err = store.upsert(&batch).await.unwrap_err();
    assert!(matches!(err, AggregatorError::StorageUnavailable(_)));
}

#[tokio::test]
async fn test_rejected_rows_alone_are_not_an_outage() {
    let store = memory_store().await;

    let batch = vec![item("", "empty url", ts(2024, 1, 1, 0), ts(2024, 1, 1, 0))];
    assert_eq!(store.upsert(&batch).await.unwrap(), 0);
    assert_eq!(store.count().await.unwrap(), 0);
}
