use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;

use crate::error::StoreError;

const SECS_PER_HOUR: i64 = 3600;

/// 固定参考时区下的小时分桶与按日切分。
///
/// 所有边界都只依赖配置的时区，与宿主机本地时区无关。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourBucketing {
    tz: Tz,
}

/// 某个自然日在参考时区下的闭区间 `[start, end]`（epoch 秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub start: i64,
    pub end: i64,
}

impl Default for HourBucketing {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl HourBucketing {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// 按 IANA 名称构造（如 "UTC"、"Asia/Shanghai"）
    pub fn from_timezone_name(name: &str) -> Result<Self, String> {
        Tz::from_str(name.trim())
            .map(Self::new)
            .map_err(|e| format!("无效的时区 {name:?}: {e}"))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    fn localize(&self, timestamp: i64) -> Result<DateTime<Tz>, StoreError> {
        DateTime::from_timestamp(timestamp, 0)
            .map(|utc| utc.with_timezone(&self.tz))
            .ok_or(StoreError::TimestampOutOfRange(timestamp))
    }

    /// 把时间戳向下取整到参考时区的整点。
    ///
    /// 使用该瞬间自身的 UTC 偏移，因此半小时偏移时区与夏令时切换附近同样得到本地整点。
    pub fn hour_start(&self, timestamp: i64) -> Result<i64, StoreError> {
        let local = self.localize(timestamp)?;
        let offset = i64::from(local.offset().fix().local_minus_utc());
        let local_secs = timestamp + offset;
        Ok(local_secs - local_secs.rem_euclid(SECS_PER_HOUR) - offset)
    }

    /// 时间戳所在自然日（参考时区）的 00:00:00 与 23:59:59。
    pub fn day_bounds(&self, timestamp: i64) -> Result<DayBounds, StoreError> {
        let date = self.localize(timestamp)?.date_naive();
        let start = self
            .resolve_local(date, NaiveTime::MIN, true)
            .ok_or(StoreError::TimestampOutOfRange(timestamp))?;
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        let end = self
            .resolve_local(date, last_second, false)
            .ok_or(StoreError::TimestampOutOfRange(timestamp))?;
        Ok(DayBounds { start, end })
    }

    /// 把本地时刻解析为 epoch 秒；重叠时取最早/最晚，落入夏令时缺口时向区间内侧逐小时挪动。
    fn resolve_local(&self, date: NaiveDate, time: NaiveTime, earliest: bool) -> Option<i64> {
        let step = if earliest {
            Duration::hours(1)
        } else {
            Duration::hours(-1)
        };
        let mut naive = NaiveDateTime::new(date, time);
        for _ in 0..3 {
            let mapped = self.tz.from_local_datetime(&naive);
            let resolved = if earliest {
                mapped.earliest()
            } else {
                mapped.latest()
            };
            if let Some(dt) = resolved {
                return Some(dt.timestamp());
            }
            naive = naive.checked_add_signed(step)?;
        }
        None
    }
}
