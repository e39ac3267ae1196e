use thiserror::Error;

/// PULSE 统一错误类型
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transient persistence error: {0}")]
    Transient(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Cooldown skip: {0}")]
    CooldownSkip(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误分类
///
/// 调用方根据分类区分"策略性跳过"与"真正的失败"。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Transient,
    Evaluation,
    CooldownSkip,
    Internal,
}

impl PulseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PulseError::NotFound(_) => ErrorKind::NotFound,
            PulseError::Validation(_) => ErrorKind::Validation,
            PulseError::Transient(_) => ErrorKind::Transient,
            PulseError::Evaluation(_) => ErrorKind::Evaluation,
            PulseError::CooldownSkip(_) => ErrorKind::CooldownSkip,
            _ => ErrorKind::Internal,
        }
    }

    /// 是否属于在批处理边界吞掉的错误（记日志，不中断批次）
    pub fn is_swallowed_at_batch_boundary(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transient | ErrorKind::Evaluation | ErrorKind::CooldownSkip
        )
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, PulseError>;

impl From<anyhow::Error> for PulseError {
    fn from(err: anyhow::Error) -> Self {
        PulseError::Internal(err.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for PulseError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        PulseError::ChannelSend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        let err = PulseError::NotFound("rule abc".to_string());
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = PulseError::CooldownSkip("rule abc".to_string());
        assert_eq!(err.kind(), ErrorKind::CooldownSkip);
        assert!(err.is_swallowed_at_batch_boundary());
    }

    #[test]
    fn test_validation_surfaces() {
        let err = PulseError::Validation("missing metric name".to_string());
        assert!(!err.is_swallowed_at_batch_boundary());
    }
}
