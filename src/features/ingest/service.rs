use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::features::counters::CounterStore;
use crate::features::eligibility::EligibilityStore;

use super::models::{Event, IngestOutcome, ValidationOutcome};
use super::validator;

/// 事件被接受后的扩展点（计数已写入之后调用）
#[async_trait]
pub trait AcceptedEventHook: Send + Sync {
    async fn on_accepted(&self, event: &Event) -> Result<(), AppError>;
}

/// 默认钩子：什么都不做
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

#[async_trait]
impl AcceptedEventHook for NoopHook {
    async fn on_accepted(&self, _event: &Event) -> Result<(), AppError> {
        Ok(())
    }
}

/// 入站编排：校验 -> 必定计数 -> （接受时）钩子
#[derive(Clone)]
pub struct IngestionService {
    eligibility: Arc<dyn EligibilityStore>,
    counters: Arc<dyn CounterStore>,
    hook: Arc<dyn AcceptedEventHook>,
}

impl IngestionService {
    pub fn new(eligibility: Arc<dyn EligibilityStore>, counters: Arc<dyn CounterStore>) -> Self {
        Self {
            eligibility,
            counters,
            hook: Arc::new(NoopHook),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn AcceptedEventHook>) -> Self {
        self.hook = hook;
        self
    }

    /// 处理一个事件。无论结论如何都恰好写一次计数；计数失败只记录日志并随结果返回。
    pub async fn ingest(&self, event: &Event) -> IngestOutcome {
        let outcome = validator::validate(event, self.eligibility.as_ref()).await;
        let accepted = outcome.is_accepted();

        if let ValidationOutcome::Rejected(reason) = &outcome {
            if reason.status_hint().is_server_error() {
                tracing::error!(
                    customer_id = event.customer_id,
                    "资格查询失败，事件按无效计数: {:?}",
                    reason
                );
            } else {
                tracing::info!(
                    customer_id = event.customer_id,
                    reason = %reason.detail(),
                    "事件被拒绝"
                );
            }
        }

        let record_error = match self
            .counters
            .record_outcome(event.customer_id, event.timestamp, accepted)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(
                    customer_id = event.customer_id,
                    timestamp = event.timestamp,
                    accepted,
                    fatal = e.is_fatal(),
                    "计数写入失败: {}",
                    e
                );
                Some(e)
            }
        };

        let hook_error = if accepted {
            match self.hook.on_accepted(event).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!(customer_id = event.customer_id, "事件后处理失败: {}", e);
                    Some(e)
                }
            }
        } else {
            None
        };

        IngestOutcome {
            outcome,
            record_error,
            hook_error,
        }
    }
}
