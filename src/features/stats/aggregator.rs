use std::sync::Arc;

use crate::error::AppError;
use crate::features::counters::{CounterStore, HourBucketing};
use crate::features::eligibility::{CustomerStatus, EligibilityStore};

use super::models::DaySummary;

/// 按日聚合：读取一天内的小时桶并折叠为 DaySummary
#[derive(Clone)]
pub struct DayAggregator {
    eligibility: Arc<dyn EligibilityStore>,
    counters: Arc<dyn CounterStore>,
    bucketing: HourBucketing,
}

impl DayAggregator {
    pub fn new(
        eligibility: Arc<dyn EligibilityStore>,
        counters: Arc<dyn CounterStore>,
        bucketing: HourBucketing,
    ) -> Self {
        Self {
            eligibility,
            counters,
            bucketing,
        }
    }

    /// `day_timestamp` 可以是目标自然日（参考时区）内的任意时刻。
    ///
    /// 没有任何活动的日子返回空列表与 0，不视为错误。
    pub async fn get_day_statistics(
        &self,
        customer_id: i64,
        day_timestamp: i64,
    ) -> Result<DaySummary, AppError> {
        if self.eligibility.customer_status(customer_id).await? == CustomerStatus::NotFound {
            return Err(AppError::CustomerNotFound(customer_id));
        }

        let day = self
            .bucketing
            .day_bounds(day_timestamp)
            .map_err(|e| AppError::Validation(format!("day 无效: {e}")))?;
        let buckets = self
            .counters
            .range_read(customer_id, day.start, day.end)
            .await?;

        tracing::debug!(
            customer_id,
            day_start = day.start,
            buckets = buckets.len(),
            "按日聚合完成"
        );
        Ok(DaySummary::from_buckets(customer_id, day, buckets))
    }
}
