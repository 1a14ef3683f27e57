//! 探测结果数据结构
//!
//! 定义单次探测的结果类型和状态枚举

use crate::error::ProbeError;
use crate::store::{Site, SiteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 传输失败时使用的状态码哨兵值
pub const TRANSPORT_FAILURE_CODE: i32 = -1;

/// 健康状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 站点正常
    Up,
    /// 站点异常
    Down,
    /// 尚未探测
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "正常"),
            HealthStatus::Down => write!(f, "异常"),
            HealthStatus::Unknown => write!(f, "未知"),
        }
    }
}

impl HealthStatus {
    /// 判断状态是否为健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Up)
    }
}

/// 单次探测的原始结果
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// HTTP状态码，传输失败时为 -1
    pub status_code: i32,
    /// 失败原因，成功时为空
    pub error: Option<ProbeError>,
    /// 探测耗时
    pub response_time: Duration,
}

impl ProbeOutcome {
    /// 200响应
    pub fn ok(response_time: Duration) -> Self {
        Self {
            status_code: 200,
            error: None,
            response_time,
        }
    }

    /// 完成了HTTP交换但状态码不是200
    pub fn unexpected_status(code: u16, response_time: Duration) -> Self {
        Self {
            status_code: i32::from(code),
            error: Some(ProbeError::UnexpectedStatus(code)),
            response_time,
        }
    }

    /// 未能完成HTTP交换
    pub fn transport(error: ProbeError, response_time: Duration) -> Self {
        Self {
            status_code: TRANSPORT_FAILURE_CODE,
            error: Some(error),
            response_time,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 一次探测的结果事件，由 Poller 产生，经结果通道交给 Collector
#[derive(Debug, Clone, Serialize)]
pub struct PollResult {
    /// 站点ID
    pub site_id: SiteId,
    /// 站点名称
    pub site_name: String,
    /// 站点URL
    pub url: String,
    /// HTTP状态码，-1 表示传输失败
    pub status_code: i32,
    /// 失败原因
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ProbeError>,
    /// 观测时间
    pub observed_at: DateTime<Utc>,
    /// 响应时间
    #[serde(serialize_with = "serialize_millis")]
    pub response_time: Duration,
}

impl PollResult {
    /// 根据站点和探测结果创建事件
    pub fn from_outcome(site: &Site, outcome: ProbeOutcome) -> Self {
        Self {
            site_id: site.id,
            site_name: site.name.clone(),
            url: site.url.clone(),
            status_code: outcome.status_code,
            error: outcome.error,
            observed_at: Utc::now(),
            response_time: outcome.response_time,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// 是否为传输层失败
    pub fn is_transport_failure(&self) -> bool {
        self.error.as_ref().is_some_and(ProbeError::is_transport)
    }

    /// 健康状态
    pub fn status(&self) -> HealthStatus {
        if self.is_success() {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        }
    }

    /// 获取响应时间（毫秒）
    pub fn response_time_ms(&self) -> u64 {
        self.response_time.as_millis() as u64
    }

    /// 错误信息文本
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

fn serialize_error<S>(error: &Option<ProbeError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}
