//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Downtime Monitor 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum MonitorError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 站点存储相关错误
    #[error("站点存储错误: {0}")]
    Store(#[from] StoreError),

    /// 探测相关错误
    #[error("探测错误: {0}")]
    Probe(#[from] ProbeError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 单次探测失败的分类
///
/// 传输失败与非200响应是两类不同的失败：前者没有完成HTTP交换，
/// 后者完成了交换但状态码不符合预期。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// 无法完成HTTP交换（构建请求、连接、超时等）
    #[error("传输失败: {0}")]
    Transport(TransportFailure),

    /// 收到了响应，但状态码不是200
    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),
}

impl ProbeError {
    /// 是否为传输层失败
    pub fn is_transport(&self) -> bool {
        matches!(self, ProbeError::Transport(_))
    }
}

/// 传输失败的具体原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// 请求无法构建（URL或方法无效）
    #[error("无效的请求: {0}")]
    InvalidRequest(String),

    /// 连接失败
    #[error("连接失败: {0}")]
    Connect(String),

    /// 请求超时
    #[error("请求超时")]
    Timeout,

    /// 其他网络错误
    #[error("请求失败: {0}")]
    Other(String),
}

/// 站点存储错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 名称或URL重复
    #[error("站点已存在: {field} = {value}")]
    Duplicate { field: &'static str, value: String },

    /// 站点不存在
    #[error("站点不存在: {0}")]
    NotFound(i64),

    /// 站点数据无效
    #[error("站点数据无效: {0}")]
    Invalid(String),

    /// 站点文件格式错误
    #[error("站点文件第 {line} 行格式错误: {reason}")]
    Malformed { line: usize, reason: String },

    /// 读取站点文件失败
    #[error("读取站点文件失败: {0}")]
    Io(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_classification() {
        let transport = ProbeError::Transport(TransportFailure::Timeout);
        assert!(transport.is_transport());
        assert_eq!(transport.to_string(), "传输失败: 请求超时");

        let status = ProbeError::UnexpectedStatus(503);
        assert!(!status.is_transport());
        assert!(status.to_string().contains("unexpected status code"));
    }

    #[test]
    fn test_store_error_converts_into_monitor_error() {
        let err: MonitorError = StoreError::NotFound(7).into();
        assert!(matches!(err, MonitorError::Store(StoreError::NotFound(7))));
        assert!(err.to_string().contains("站点不存在: 7"));
    }
}
