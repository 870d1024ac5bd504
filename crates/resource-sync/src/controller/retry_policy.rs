use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// 重试策略配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 最大重试次数（超过后放弃，等待下一次变更事件）
    pub max_retries: u32,
    /// 基础延迟时间（毫秒）
    pub base_delay_ms: u64,
    /// 最大延迟时间（毫秒）
    pub max_delay_ms: u64,
    /// 指数退避因子
    pub backoff_factor: f64,
    /// 随机抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 60_000, // 1分钟
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// 计算下次重试的延迟；不应重试时返回 None
    pub fn next_delay(&self, retry_count: u32, error: &SyncError) -> Option<Duration> {
        if !self.should_retry(retry_count, error) {
            return None;
        }

        // 基础延迟 = base_delay * (backoff_factor ^ retry_count)
        let base_delay = self.base_delay_ms as f64 * self.backoff_factor.powf(retry_count as f64);

        // 限制最大延迟
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        // 添加随机抖动
        let jitter = capped_delay * self.jitter_factor * (rand::random::<f64>() - 0.5);
        let final_delay = (capped_delay + jitter).max(0.0);

        Some(Duration::from_millis(final_delay as u64))
    }

    /// 检查是否应该重试
    pub fn should_retry(&self, retry_count: u32, error: &SyncError) -> bool {
        retry_count < self.max_retries && error.is_retryable()
    }

    pub fn validate(&self) -> Result<()> {
        if self.backoff_factor < 1.0 {
            return Err(SyncError::Config("retry.backoff_factor 不能小于 1.0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(SyncError::Config("retry.jitter_factor 必须在 0.0-1.0 之间".to_string()));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(SyncError::Config("retry.base_delay_ms 不能大于 max_delay_ms".to_string()));
        }
        Ok(())
    }
}
