pub mod storage;

use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use storage::SqliteEligibilityStore;

/// 客户资格状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Inactive,
    NotFound,
}

/// 只读资格查询。本子系统不写这些表，查询无需加锁。
///
/// “未找到”属于正常结果（`CustomerStatus::NotFound` / `false`），只有基础设施故障才返回 `Err`。
#[async_trait]
pub trait EligibilityStore: Send + Sync {
    async fn customer_status(&self, customer_id: i64) -> Result<CustomerStatus, StoreError>;

    async fn is_user_agent_blacklisted(&self, user_agent: &str) -> Result<bool, StoreError>;

    async fn is_ip_blacklisted(&self, remote_ip: &str) -> Result<bool, StoreError>;
}

/// IP 黑名单的比对键：去掉首尾空白；能解析为 IP 地址时使用规范文本形式。
pub fn normalize_ip(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::normalize_ip;

    #[test]
    fn ip_is_trimmed_and_canonicalized() {
        assert_eq!(normalize_ip(" 123.234.56.78 "), "123.234.56.78");
        assert_eq!(normalize_ip("2001:DB8:0:0::1"), "2001:db8::1");
    }

    #[test]
    fn unparsable_ip_is_kept_verbatim() {
        assert_eq!(normalize_ip("213.070.64.33"), "213.070.64.33");
    }
}
