use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use sqlx::SqlitePool;
use uuid::Uuid;

use customer_stats::StoreError;
use customer_stats::config::StoreConfig;
use customer_stats::features::counters::{CounterStore, HourBucketing, SqliteCounterStore};
use customer_stats::startup::connect_sqlite;

// 1500000000 = 2017-07-14T02:40:00Z
const TS: i64 = 1_500_000_000;
const HOUR: i64 = 1_499_997_600;

async fn new_pool() -> SqlitePool {
    let path = std::env::temp_dir().join(format!(
        "customer_stats_{}.db",
        Uuid::new_v4().simple()
    ));
    let cfg = StoreConfig {
        sqlite_path: path.to_string_lossy().into_owned(),
        ..StoreConfig::default()
    };
    connect_sqlite(&cfg).await.expect("connect sqlite")
}

async fn new_store() -> SqliteCounterStore {
    let store = SqliteCounterStore::new(new_pool().await, HourBucketing::default())
        .with_retry_policy(10, Duration::from_millis(10));
    store.init_schema().await.expect("init_schema");
    store
}

async fn counts(store: &SqliteCounterStore, customer_id: i64, hour_start: i64) -> (i64, i64) {
    let row: Option<(i64, i64)> = sqlx::query_as(
        "SELECT valid_count, invalid_count FROM hourly_stats WHERE customer_id = ? AND hour_start = ?",
    )
    .bind(customer_id)
    .bind(hour_start)
    .fetch_optional(store.pool())
    .await
    .expect("select counts");
    row.unwrap_or((0, 0))
}

#[tokio::test]
async fn first_record_creates_bucket() {
    let store = new_store().await;

    store.record_outcome(1, TS, true).await.expect("record");

    assert_eq!(counts(&store, 1, HOUR).await, (1, 0));
}

#[tokio::test]
async fn events_in_same_hour_share_one_bucket() {
    let store = new_store().await;

    store.record_outcome(1, HOUR, true).await.expect("record");
    store.record_outcome(1, HOUR + 1799, false).await.expect("record");
    store.record_outcome(1, HOUR + 3599, true).await.expect("record");
    // 下一小时的第一秒落入新桶
    store.record_outcome(1, HOUR + 3600, false).await.expect("record");

    assert_eq!(counts(&store, 1, HOUR).await, (2, 1));
    assert_eq!(counts(&store, 1, HOUR + 3600).await, (0, 1));

    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hourly_stats")
        .fetch_one(store.pool())
        .await
        .expect("count rows");
    assert_eq!(n, 2);
}

#[tokio::test]
async fn customers_do_not_share_buckets() {
    let store = new_store().await;

    store.record_outcome(1, TS, true).await.expect("record");
    store.record_outcome(2, TS, false).await.expect("record");

    assert_eq!(counts(&store, 1, HOUR).await, (1, 0));
    assert_eq!(counts(&store, 2, HOUR).await, (0, 1));
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
    let store = Arc::new(new_store().await);

    // 全部落在同一个小时内，且包含“首次插入”的竞争
    let tasks = (0..100_i64).map(|i| {
        let store = store.clone();
        tokio::spawn(async move { store.record_outcome(42, HOUR + (i % 60), true).await })
    });
    for res in join_all(tasks).await {
        res.expect("join").expect("record_outcome");
    }

    assert_eq!(counts(&store, 42, HOUR).await, (100, 0));
}

#[tokio::test]
async fn concurrent_mixed_outcomes_keep_both_counters() {
    let store = Arc::new(new_store().await);

    let mut tasks = Vec::new();
    for i in 0..60_i64 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.record_outcome(7, TS, i % 3 != 0).await
        }));
    }
    for t in tasks {
        t.await.expect("join").expect("record_outcome");
    }

    assert_eq!(counts(&store, 7, HOUR).await, (40, 20));
}

#[tokio::test]
async fn range_read_returns_only_buckets_inside_bounds() {
    let store = new_store().await;
    let day = HourBucketing::default().day_bounds(TS).expect("day_bounds");
    assert_eq!(day.start, 1_499_990_400);
    assert_eq!(day.end, 1_500_076_799);

    store.record_outcome(1, day.start, true).await.expect("record");
    store.record_outcome(1, day.end, false).await.expect("record");
    store.record_outcome(1, day.start - 1, true).await.expect("record");
    store.record_outcome(1, day.end + 1, true).await.expect("record");
    store.record_outcome(2, TS, true).await.expect("record");

    let mut buckets = store
        .range_read(1, day.start, day.end)
        .await
        .expect("range_read");
    buckets.sort_by_key(|b| b.hour_start);

    let hours: Vec<i64> = buckets.iter().map(|b| b.hour_start).collect();
    assert_eq!(hours, vec![day.start, day.end + 1 - 3600]);
    assert_eq!(buckets[0].valid_count, 1);
    assert_eq!(buckets[1].invalid_count, 1);
    assert!(buckets.iter().all(|b| b.customer_id == 1));
}

#[tokio::test]
async fn range_read_on_empty_day_is_empty() {
    let store = new_store().await;
    let day = HourBucketing::default().day_bounds(TS).expect("day_bounds");

    let buckets = store
        .range_read(1, day.start, day.end)
        .await
        .expect("range_read");
    assert!(buckets.is_empty());
}

#[tokio::test]
async fn non_utc_reference_zone_buckets_by_local_hour() {
    let tz = HourBucketing::from_timezone_name("Asia/Kolkata").expect("tz");
    let store = SqliteCounterStore::new(new_pool().await, tz);
    store.init_schema().await.expect("init_schema");

    // 02:40Z = 08:10 IST，本地整点 08:00 IST = 02:30Z
    store.record_outcome(1, TS, true).await.expect("record");

    assert_eq!(counts(&store, 1, TS - 600).await, (1, 0));
}

/// 表缺少主键时同一键可能有两行：更新必须整体回滚并报致命错误，不得多计。
#[tokio::test]
async fn duplicate_rows_for_one_key_abort_the_update() {
    let pool = new_pool().await;
    sqlx::query(
        "CREATE TABLE hourly_stats (
            customer_id INTEGER NOT NULL,
            hour_start INTEGER NOT NULL,
            valid_count INTEGER NOT NULL DEFAULT 0,
            invalid_count INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(&pool)
    .await
    .expect("create table without primary key");
    for _ in 0..2 {
        sqlx::query(
            "INSERT INTO hourly_stats (customer_id, hour_start, valid_count, invalid_count) VALUES (1, ?, 1, 0)",
        )
        .bind(HOUR)
        .execute(&pool)
        .await
        .expect("insert duplicate row");
    }

    let store = SqliteCounterStore::new(pool, HourBucketing::default());
    let err = store
        .record_outcome(1, TS, true)
        .await
        .expect_err("duplicate key must fail");

    assert!(matches!(err, StoreError::InvariantViolation(_)));
    assert!(err.is_fatal());

    let (rows, valid): (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), SUM(valid_count) FROM hourly_stats")
            .fetch_one(store.pool())
            .await
            .expect("sum counts");
    assert_eq!((rows, valid), (2, 2));
}
