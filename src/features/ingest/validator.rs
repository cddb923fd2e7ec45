use chrono::DateTime;

use crate::features::eligibility::{CustomerStatus, EligibilityStore};

use super::models::{Event, RejectReason, ValidationOutcome};

/// 单个检查步骤的结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Reject(RejectReason),
}

/// 校验步骤。`PIPELINE` 中的顺序即多条件同时成立时的优先级。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStep {
    Structure,
    Customer,
    UserAgentPresent,
    UserAgentBlacklist,
    IpBlacklist,
}

pub const PIPELINE: [CheckStep; 5] = [
    CheckStep::Structure,
    CheckStep::Customer,
    CheckStep::UserAgentPresent,
    CheckStep::UserAgentBlacklist,
    CheckStep::IpBlacklist,
];

impl CheckStep {
    pub async fn check(self, event: &Event, store: &dyn EligibilityStore) -> Flow {
        match self {
            CheckStep::Structure => check_structure(event),
            CheckStep::Customer => match store.customer_status(event.customer_id).await {
                Ok(CustomerStatus::Active) => Flow::Continue,
                Ok(CustomerStatus::Inactive) => Flow::Reject(RejectReason::CustomerInactive),
                Ok(CustomerStatus::NotFound) => Flow::Reject(RejectReason::CustomerNotFound),
                Err(e) => Flow::Reject(RejectReason::LookupFailed(e)),
            },
            CheckStep::UserAgentPresent => match present_user_agent(event) {
                Some(_) => Flow::Continue,
                None => Flow::Reject(RejectReason::UserAgentMissing),
            },
            CheckStep::UserAgentBlacklist => {
                let Some(ua) = present_user_agent(event) else {
                    return Flow::Reject(RejectReason::UserAgentMissing);
                };
                match store.is_user_agent_blacklisted(ua).await {
                    Ok(false) => Flow::Continue,
                    Ok(true) => Flow::Reject(RejectReason::BlacklistedUserAgent),
                    Err(e) => Flow::Reject(RejectReason::LookupFailed(e)),
                }
            }
            CheckStep::IpBlacklist => match store.is_ip_blacklisted(&event.remote_ip).await {
                Ok(false) => Flow::Continue,
                Ok(true) => Flow::Reject(RejectReason::BlacklistedIp),
                Err(e) => Flow::Reject(RejectReason::LookupFailed(e)),
            },
        }
    }
}

/// 结构校验：除 user_agent 外的字段都必须非零/非空，且时间戳能落到日历上。
pub fn check_structure(event: &Event) -> Flow {
    let missing: Vec<&'static str> = [
        ("customerID", event.customer_id > 0),
        ("tagID", event.tag_id > 0),
        ("userID", !event.user_id.trim().is_empty()),
        ("remoteIP", !event.remote_ip.trim().is_empty()),
        ("timestamp", event.timestamp != 0),
    ]
    .into_iter()
    .filter_map(|(name, present)| (!present).then_some(name))
    .collect();

    if !missing.is_empty() {
        return Flow::Reject(RejectReason::MissingFields(missing));
    }
    // 与 HourBucketing::hour_start 使用同一个可表示范围
    if DateTime::from_timestamp(event.timestamp, 0).is_none() {
        return Flow::Reject(RejectReason::TimestampOutOfRange);
    }
    Flow::Continue
}

fn present_user_agent(event: &Event) -> Option<&str> {
    event
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
}

/// 按顺序执行全部检查，第一个拒绝即为结论
pub async fn validate(event: &Event, store: &dyn EligibilityStore) -> ValidationOutcome {
    for step in PIPELINE {
        if let Flow::Reject(reason) = step.check(event, store).await {
            return ValidationOutcome::Rejected(reason);
        }
    }
    ValidationOutcome::Accepted
}
