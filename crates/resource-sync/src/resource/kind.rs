//! 资源类型枚举 - 受控枚举
//!
//! 新增类型需同时为其提供源端客户端与 Store 方法对。

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::SyncError;

/// 被同步的资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    TestWorkflow,
    TestWorkflowTemplate,
    TestTrigger,
    Webhook,
    WebhookTemplate,
}

impl ResourceKind {
    /// 全部类型（按依赖顺序：模板先于引用它们的资源）
    pub const ALL: &'static [ResourceKind] = &[
        ResourceKind::TestWorkflowTemplate,
        ResourceKind::TestWorkflow,
        ResourceKind::TestTrigger,
        ResourceKind::WebhookTemplate,
        ResourceKind::Webhook,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TestWorkflow => "test_workflow",
            Self::TestWorkflowTemplate => "test_workflow_template",
            Self::TestTrigger => "test_trigger",
            Self::Webhook => "webhook",
            Self::WebhookTemplate => "webhook_template",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test_workflow" => Ok(Self::TestWorkflow),
            "test_workflow_template" => Ok(Self::TestWorkflowTemplate),
            "test_trigger" => Ok(Self::TestTrigger),
            "webhook" => Ok(Self::Webhook),
            "webhook_template" => Ok(Self::WebhookTemplate),
            other => Err(SyncError::InvalidData(format!("未知资源类型: {}", other))),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
