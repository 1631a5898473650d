//! 审核模块统一错误处理
//!
//! 错误按四类划分：传输错误（回退到本地分析）、DOM 状态错误（静默丢弃）、
//! 结构错误（退化为最小修改）、消息通道错误（只记录一次）。
//! 任何错误都不允许中断整个管道。

use std::fmt;

use thiserror::Error;

/// 审核错误类型
#[derive(Error, Debug, Clone)]
pub enum ModerationError {
    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 分析服务返回非成功状态
    #[error("分析服务错误 (HTTP {status}): {message}")]
    ServiceError { status: u16, message: String },

    /// 分析结果无法识别
    #[error("无效的分析结果: {0}")]
    InvalidVerdict(String),

    /// 元素在处理完成前已被移出文档
    #[error("元素已脱离文档: {0}")]
    ElementDetached(String),

    /// 修改DOM结构失败
    #[error("DOM结构错误: {0}")]
    StructuralError(String),

    /// 扩展消息通道已关闭
    #[error("消息通道已关闭: {0}")]
    ChannelClosed(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 存储错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ModerationError {
    /// 是否应当回退到本地启发式分析
    pub fn is_transport(&self) -> bool {
        matches!(self.category(), ErrorCategory::Transport)
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ModerationError::NetworkError(_) => ErrorSeverity::Warning,
            ModerationError::TimeoutError(_) => ErrorSeverity::Warning,
            ModerationError::ServiceError { .. } => ErrorSeverity::Warning,
            ModerationError::InvalidVerdict(_) => ErrorSeverity::Warning,
            ModerationError::ElementDetached(_) => ErrorSeverity::Info,
            ModerationError::StructuralError(_) => ErrorSeverity::Error,
            ModerationError::ChannelClosed(_) => ErrorSeverity::Warning,
            ModerationError::ConfigError(_) => ErrorSeverity::Critical,
            ModerationError::ParseError(_) => ErrorSeverity::Error,
            ModerationError::SerializationError(_) => ErrorSeverity::Error,
            ModerationError::StorageError(_) => ErrorSeverity::Warning,
            ModerationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            ModerationError::NetworkError(_)
            | ModerationError::TimeoutError(_)
            | ModerationError::ServiceError { .. }
            | ModerationError::InvalidVerdict(_) => ErrorCategory::Transport,
            ModerationError::ElementDetached(_) => ErrorCategory::DomState,
            ModerationError::StructuralError(_) => ErrorCategory::Structural,
            ModerationError::ChannelClosed(_) | ModerationError::StorageError(_) => {
                ErrorCategory::Messaging
            }
            ModerationError::ConfigError(_) => ErrorCategory::Configuration,
            ModerationError::ParseError(_) | ModerationError::SerializationError(_) => {
                ErrorCategory::Parsing
            }
            ModerationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let append = |msg: &mut String| *msg = format!("{} (上下文: {})", msg, context);

        match &mut self {
            ModerationError::NetworkError(msg)
            | ModerationError::TimeoutError(msg)
            | ModerationError::InvalidVerdict(msg)
            | ModerationError::ElementDetached(msg)
            | ModerationError::StructuralError(msg)
            | ModerationError::ChannelClosed(msg)
            | ModerationError::ConfigError(msg)
            | ModerationError::ParseError(msg)
            | ModerationError::SerializationError(msg)
            | ModerationError::StorageError(msg)
            | ModerationError::InternalError(msg) => append(msg),
            ModerationError::ServiceError { message, .. } => append(message),
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 与分析服务通信失败
    Transport,
    /// 元素已被移除或替换
    DomState,
    /// 应用视觉效果时结构修改失败
    Structural,
    /// 扩展消息通道或外部存储不可用
    Messaging,
    Configuration,
    Parsing,
    Internal,
}

impl From<reqwest::Error> for ModerationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ModerationError::TimeoutError(error.to_string())
        } else if let Some(status) = error.status() {
            ModerationError::ServiceError {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else if error.is_decode() {
            ModerationError::InvalidVerdict(error.to_string())
        } else {
            ModerationError::NetworkError(error.to_string())
        }
    }
}

impl From<std::io::Error> for ModerationError {
    fn from(error: std::io::Error) -> Self {
        ModerationError::StorageError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for ModerationError {
    fn from(error: serde_json::Error) -> Self {
        ModerationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for ModerationError {
    fn from(error: toml::de::Error) -> Self {
        ModerationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for ModerationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        ModerationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<crate::env::EnvError> for ModerationError {
    fn from(error: crate::env::EnvError) -> Self {
        ModerationError::ConfigError(error.to_string())
    }
}

/// 错误结果类型别名
pub type ModerationResult<T> = Result<T, ModerationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误，不中断调用方
    pub fn log_error(error: &ModerationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::debug!("审核信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("审核警告: {}", error),
            ErrorSeverity::Error => tracing::error!("审核错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("审核严重错误: {}", error),
        }
    }

    /// 创建结构错误
    pub fn structural_error<T: fmt::Display>(msg: T) -> ModerationError {
        ModerationError::StructuralError(msg.to_string())
    }

    /// 创建脱离文档错误
    pub fn detached_error<T: fmt::Display>(msg: T) -> ModerationError {
        ModerationError::ElementDetached(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_fall_back() {
        assert!(ModerationError::NetworkError("refused".into()).is_transport());
        assert!(ModerationError::ServiceError {
            status: 503,
            message: "unavailable".into()
        }
        .is_transport());
        assert!(ModerationError::InvalidVerdict("action=quarantine".into()).is_transport());
        assert!(!ModerationError::ElementDetached("img".into()).is_transport());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            ModerationError::StructuralError("overlay".into()).category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            ModerationError::ChannelClosed("runtime".into()).category(),
            ErrorCategory::Messaging
        );
        assert_eq!(
            ModerationError::ConfigError("batch".into()).severity(),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_with_context() {
        let error = ModerationError::ServiceError {
            status: 500,
            message: "boom".into(),
        }
        .with_context("analyze/text");
        assert!(error.to_string().contains("analyze/text"));
        assert!(error.to_string().contains("HTTP 500"));
    }
}
