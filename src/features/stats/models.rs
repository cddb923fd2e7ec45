use serde::{Deserialize, Serialize};

use crate::features::counters::{DayBounds, models::HourBucket};

/// 某客户某自然日的汇总（派生数据，每次查询重新计算）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub customer_id: i64,
    pub day: DayBounds,
    /// 按 hour_start 升序
    pub hour_buckets: Vec<HourBucket>,
    pub total_requests: i64,
}

impl DaySummary {
    /// 由存储返回的无序桶构造：排序并累加 valid+invalid
    pub fn from_buckets(customer_id: i64, day: DayBounds, mut buckets: Vec<HourBucket>) -> Self {
        buckets.sort_by_key(|b| b.hour_start);
        let total_requests = buckets.iter().map(HourBucket::total).sum();
        Self {
            customer_id,
            day,
            hour_buckets: buckets,
            total_requests,
        }
    }
}

/// 单小时统计（对外 JSON）
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CustomerHourStatistics {
    /// 有效请求数
    #[schema(example = 3)]
    pub request_count: i64,
    /// 无效请求数
    #[schema(example = 1)]
    pub invalid_count: i64,
    /// 小时起点（epoch 秒）
    #[schema(example = 1499997600)]
    pub time: i64,
}

/// `GET /customer/stats/{customerID}/day/{day}` 响应
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CustomerDayStatistics {
    pub customer_hour_statistics: Vec<CustomerHourStatistics>,
    #[schema(example = 4)]
    pub total_requests_per_day: i64,
}

impl From<DaySummary> for CustomerDayStatistics {
    fn from(summary: DaySummary) -> Self {
        Self {
            customer_hour_statistics: summary
                .hour_buckets
                .into_iter()
                .map(|b| CustomerHourStatistics {
                    request_count: b.valid_count,
                    invalid_count: b.invalid_count,
                    time: b.hour_start,
                })
                .collect(),
            total_requests_per_day: summary.total_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(hour_start: i64, valid: i64, invalid: i64) -> HourBucket {
        HourBucket {
            customer_id: 7,
            hour_start,
            valid_count: valid,
            invalid_count: invalid,
        }
    }

    #[test]
    fn buckets_are_sorted_and_totalled() {
        let day = DayBounds {
            start: 0,
            end: 86_399,
        };
        let summary =
            DaySummary::from_buckets(7, day, vec![bucket(7200, 0, 2), bucket(3600, 3, 1)]);
        assert_eq!(summary.total_requests, 6);
        assert_eq!(
            summary
                .hour_buckets
                .iter()
                .map(|b| b.hour_start)
                .collect::<Vec<_>>(),
            vec![3600, 7200]
        );
    }

    #[test]
    fn empty_day_serializes_as_empty_list() {
        let day = DayBounds {
            start: 0,
            end: 86_399,
        };
        let wire: CustomerDayStatistics = DaySummary::from_buckets(7, day, Vec::new()).into();
        let v = serde_json::to_value(wire).expect("serialize");
        assert_eq!(v["customer_hour_statistics"], serde_json::json!([]));
        assert_eq!(v["total_requests_per_day"], 0);
    }
}
