//! 同步配置
//!
//! 所有字段都有默认值，JSON 中缺省的字段使用默认值。

use serde::{Deserialize, Serialize};

use crate::controller::RetryPolicy;
use crate::error::{Result, SyncError};
use crate::resource::ResourceKind;
use crate::source::ListScope;
use crate::sync::{SkipMarker, DEFAULT_SKIP_ANNOTATION};

/// 同步引擎配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 监听的命名空间；None 表示全部
    pub namespace: Option<String>,
    /// 跳过标记配置
    pub skip_marker: SkipMarkerConfig,
    /// watch 配置
    pub watch: WatchConfig,
    /// 调度器配置
    pub controller: ControllerConfig,
    /// 失败重试策略
    pub retry: RetryPolicy,
}

/// 跳过标记配置
///
/// 默认对所有资源类型生效；确需关闭的类型放入 `disabled_kinds`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipMarkerConfig {
    /// 注解键
    pub annotation: String,
    /// 不检查跳过标记的资源类型
    pub disabled_kinds: Vec<ResourceKind>,
}

impl Default for SkipMarkerConfig {
    fn default() -> Self {
        Self {
            annotation: DEFAULT_SKIP_ANNOTATION.to_string(),
            disabled_kinds: Vec::new(),
        }
    }
}

impl SkipMarkerConfig {
    /// 某类型适用的跳过标记；该类型关闭检查时返回 None
    pub fn marker_for(&self, kind: ResourceKind) -> Option<SkipMarker> {
        if self.disabled_kinds.contains(&kind) {
            None
        } else {
            Some(SkipMarker::new(self.annotation.clone()))
        }
    }
}

/// watch 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// 订阅时是否先发送 list 快照
    pub include_bootstrap: bool,
    /// 是否根据 deletion_timestamp 推断删除（源端删除事件完全可靠时可关闭）
    pub infer_deletes: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            include_bootstrap: true,
            infer_deletes: true,
        }
    }
}

/// 调度器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// 并发工作协程数量（不同键之间并发，同一键串行）
    pub worker_count: usize,
    /// 变更流关闭后重新订阅前的等待（毫秒）
    pub resubscribe_delay_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            resubscribe_delay_ms: 1000,
        }
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// 从 JSON 读取配置并校验
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(json)
            .map_err(|e| SyncError::Config(format!("配置解析失败: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn scope(&self) -> ListScope {
        ListScope {
            namespace: self.namespace.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.skip_marker.annotation.is_empty() {
            return Err(SyncError::Config("skip_marker.annotation 不能为空".to_string()));
        }
        if self.controller.worker_count == 0 {
            return Err(SyncError::Config("controller.worker_count 必须大于 0".to_string()));
        }
        self.retry.validate()
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.config.namespace = Some(namespace.into());
        self
    }

    pub fn skip_annotation<S: Into<String>>(mut self, annotation: S) -> Self {
        self.config.skip_marker.annotation = annotation.into();
        self
    }

    /// 对某类型关闭跳过标记检查
    pub fn disable_skip_marker_for(mut self, kind: ResourceKind) -> Self {
        if !self.config.skip_marker.disabled_kinds.contains(&kind) {
            self.config.skip_marker.disabled_kinds.push(kind);
        }
        self
    }

    pub fn include_bootstrap(mut self, include: bool) -> Self {
        self.config.watch.include_bootstrap = include;
        self
    }

    pub fn infer_deletes(mut self, infer: bool) -> Self {
        self.config.watch.infer_deletes = infer;
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.controller.worker_count = count;
        self
    }

    pub fn resubscribe_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.controller.resubscribe_delay_ms = delay_ms;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn build(self) -> Result<SyncConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
