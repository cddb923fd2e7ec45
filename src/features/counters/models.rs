use serde::{Deserialize, Serialize};

/// 单个客户单个小时的计数记录，键为 `(customer_id, hour_start)`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBucket {
    pub customer_id: i64,
    /// 参考时区下的整点（epoch 秒）
    pub hour_start: i64,
    pub valid_count: i64,
    pub invalid_count: i64,
}

impl HourBucket {
    /// 该小时内处理过的事件总数
    pub fn total(&self) -> i64 {
        self.valid_count + self.invalid_count
    }
}
