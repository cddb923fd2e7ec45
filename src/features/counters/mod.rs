pub mod bucket;
pub mod models;
pub mod storage;

use async_trait::async_trait;

use crate::error::StoreError;
use models::HourBucket;

pub use bucket::{DayBounds, HourBucketing};
pub use storage::SqliteCounterStore;

/// 小时计数存储：所有计数变更都必须经过 `record_outcome` 的事务。
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// 把一次处理结果计入 `timestamp` 所在小时的桶：`accepted` 为真时 valid+1，否则 invalid+1。
    ///
    /// 同一 `(customer_id, hour_start)` 上的并发调用被存储事务线性化，不丢更新。
    async fn record_outcome(
        &self,
        customer_id: i64,
        timestamp: i64,
        accepted: bool,
    ) -> Result<(), StoreError>;

    /// 读取 `hour_start` 落在 `[day_start, day_end]` 闭区间内的全部桶，不保证顺序。
    async fn range_read(
        &self,
        customer_id: i64,
        day_start: i64,
        day_end: i64,
    ) -> Result<Vec<HourBucket>, StoreError>;
}
