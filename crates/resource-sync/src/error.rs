/// 同步引擎错误
///
/// 实现 `Clone`：流的终止错误需要交给所有读取方，见 [`crate::stream::ChangeStream::err`]。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// 源端不存在该对象（同步时映射为删除，不作为失败上报）
    #[error("Not found: {0}")]
    NotFound(String),

    /// 源端（get / list / watch）调用失败
    #[error("Source error: {0}")]
    Source(String),

    /// 目标存储写入失败
    #[error("Store error: {0}")]
    Store(String),

    /// watch 流异常结束
    #[error("Watch error: {0}")]
    Watch(String),

    /// 订阅被取消（流的终止原因）
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// 流已关闭或消费者已离开
    #[error("Stream closed")]
    StreamClosed,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl SyncError {
    /// 是否为「对象不存在」
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }

    /// 调度层是否应当退避重试
    ///
    /// 配置错误与数据错误重试也不会成功；取消 / 流关闭属于生命周期事件，不重试。
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Source(_) | SyncError::Store(_) | SyncError::Watch(_) => true,
            SyncError::Other(_) => true, // 保守策略：未知错误可重试
            SyncError::NotFound(_)
            | SyncError::Cancelled(_)
            | SyncError::StreamClosed
            | SyncError::Config(_)
            | SyncError::InvalidData(_) => false,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        SyncError::InvalidData(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
