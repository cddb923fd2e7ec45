use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

use super::{CounterStore, bucket::HourBucketing, models::HourBucket};

/// SQLite 主错误码：SQLITE_BUSY / SQLITE_LOCKED（扩展码的低 8 位）
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// 单次事务尝试的失败原因
enum TxError {
    Sql(sqlx::Error),
    /// 单键 UPDATE 影响的行数不是 0/1
    TooManyRows(u64),
}

impl From<sqlx::Error> for TxError {
    fn from(err: sqlx::Error) -> Self {
        TxError::Sql(err)
    }
}

/// 基于 SQLite 的小时计数存储
#[derive(Clone)]
pub struct SqliteCounterStore {
    pool: SqlitePool,
    bucketing: HourBucketing,
    max_retries: u32,
    retry_backoff: Duration,
}

impl SqliteCounterStore {
    pub fn new(pool: SqlitePool, bucketing: HourBucketing) -> Self {
        Self {
            pool,
            bucketing,
            max_retries: 3,
            retry_backoff: Duration::from_millis(20),
        }
    }

    /// 设置瞬时冲突的重试策略
    pub fn with_retry_policy(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    pub fn bucketing(&self) -> HourBucketing {
        self.bucketing
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let ddl = r#"
        CREATE TABLE IF NOT EXISTS hourly_stats (
            customer_id INTEGER NOT NULL,
            hour_start INTEGER NOT NULL,
            valid_count INTEGER NOT NULL DEFAULT 0 CHECK (valid_count >= 0),
            invalid_count INTEGER NOT NULL DEFAULT 0 CHECK (invalid_count >= 0),
            PRIMARY KEY (customer_id, hour_start)
        );
        "#;
        sqlx::query(ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("init hourly_stats schema: {e}")))?;
        Ok(())
    }

    /// 一次完整的“加锁-递增或创建-提交”事务。
    ///
    /// 事务以写语句开头，SQLite 在第一条 UPDATE 上取得写锁并持有到提交，
    /// 因此“不存在则插入”分支与其它写者之间不存在竞态。
    async fn increment_once(
        &self,
        customer_id: i64,
        hour_start: i64,
        accepted: bool,
    ) -> Result<(), TxError> {
        let (valid_inc, invalid_inc): (i64, i64) = if accepted { (1, 0) } else { (0, 1) };

        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE hourly_stats
             SET valid_count = valid_count + ?, invalid_count = invalid_count + ?
             WHERE customer_id = ? AND hour_start = ?",
        )
        .bind(valid_inc)
        .bind(invalid_inc)
        .bind(customer_id)
        .bind(hour_start)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        match affected {
            0 => {
                sqlx::query(
                    "INSERT INTO hourly_stats(customer_id, hour_start, valid_count, invalid_count)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(customer_id)
                .bind(hour_start)
                .bind(valid_inc)
                .bind(invalid_inc)
                .execute(&mut *tx)
                .await?;
            }
            1 => {}
            n => {
                if let Err(e) = tx.rollback().await {
                    tracing::warn!("rollback after invariant violation failed: {}", e);
                }
                return Err(TxError::TooManyRows(n));
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

/// 判断 SQLite 错误码是否为可重试的瞬时冲突
fn is_transient_code(code: &str) -> bool {
    code.parse::<i64>()
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().is_some_and(|c| is_transient_code(&c)),
        _ => false,
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn record_outcome(
        &self,
        customer_id: i64,
        timestamp: i64,
        accepted: bool,
    ) -> Result<(), StoreError> {
        let hour_start = self.bucketing.hour_start(timestamp)?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.increment_once(customer_id, hour_start, accepted).await {
                Ok(()) => {
                    tracing::debug!(customer_id, hour_start, accepted, attempt, "计数已写入");
                    return Ok(());
                }
                Err(TxError::TooManyRows(n)) => {
                    tracing::error!(
                        customer_id,
                        hour_start,
                        rows = n,
                        "单键更新影响了多行，hourly_stats 唯一性已被破坏"
                    );
                    return Err(StoreError::InvariantViolation(format!(
                        "update of ({customer_id}, {hour_start}) affected {n} rows"
                    )));
                }
                Err(TxError::Sql(e)) if is_transient(&e) => {
                    if attempt > self.max_retries {
                        return Err(StoreError::Conflict {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    tracing::warn!(
                        customer_id,
                        hour_start,
                        attempt,
                        "计数事务遇到瞬时冲突，准备重试: {}",
                        e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(TxError::Sql(e)) => {
                    return Err(StoreError::Database(format!("record outcome: {e}")));
                }
            }
        }
    }

    async fn range_read(
        &self,
        customer_id: i64,
        day_start: i64,
        day_end: i64,
    ) -> Result<Vec<HourBucket>, StoreError> {
        let rows = sqlx::query(
            "SELECT customer_id, hour_start, valid_count, invalid_count
             FROM hourly_stats
             WHERE customer_id = ? AND hour_start >= ? AND hour_start <= ?",
        )
        .bind(customer_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("range read: {e}")))?;

        rows.into_iter()
            .map(|r| {
                Ok(HourBucket {
                    customer_id: r.try_get("customer_id")?,
                    hour_start: r.try_get("hour_start")?,
                    valid_count: r.try_get("valid_count")?,
                    invalid_count: r.try_get("invalid_count")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| StoreError::Database(format!("decode hourly_stats row: {e}")))
    }
}
