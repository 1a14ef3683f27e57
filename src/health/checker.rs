//! HTTP探测器实现
//!
//! 对单个URL发起一次HTTP请求，并把结果归类为状态码或传输失败。
//! 探测器内部不做重试，重试完全交给 Poller 的下一次 tick。

use crate::error::{MonitorError, ProbeError, TransportFailure};
use crate::health::result::ProbeOutcome;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// 默认的浏览器 User-Agent
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/116.0";

/// 默认请求超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// 探测器trait，定义单次探测接口
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// 对URL执行一次探测
    ///
    /// # 参数
    /// * `url` - 目标URL
    ///
    /// # 返回
    /// * `ProbeOutcome` - 状态码与失败原因；失败只会被报告，不会中止进程
    async fn check(&self, url: &str) -> ProbeOutcome;

    /// 批量探测，结果顺序与输入一致
    async fn check_batch(&self, urls: &[String]) -> Vec<ProbeOutcome> {
        let futures = urls.iter().map(|url| self.check(url));
        futures::future::join_all(futures).await
    }
}

/// 探测请求配置
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// HTTP方法
    pub method: String,
    /// User-Agent
    pub user_agent: String,
    /// 请求超时
    pub timeout: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            method: "POST".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// 基于 reqwest 的HTTP探测器
pub struct HttpHealthChecker {
    /// HTTP客户端
    client: Client,
    /// 请求方法
    method: Method,
    /// 请求超时
    timeout: Duration,
}

impl HttpHealthChecker {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `config` - 请求配置
    ///
    /// # 返回
    /// * `Result<Self>` - 探测器实例；方法无效或客户端无法构建时返回错误
    pub fn new(config: CheckerConfig) -> crate::error::Result<Self> {
        let method = Method::from_str(&config.method.to_uppercase()).map_err(|_| {
            MonitorError::Other(anyhow::anyhow!("无效的HTTP方法: {}", config.method))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| MonitorError::Other(anyhow::anyhow!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            method,
            timeout: config.timeout,
        })
    }

    /// 把 reqwest 错误归类为传输失败
    fn classify_error(error: &reqwest::Error) -> TransportFailure {
        if error.is_timeout() {
            TransportFailure::Timeout
        } else if error.is_connect() {
            TransportFailure::Connect(error.to_string())
        } else if error.is_builder() {
            TransportFailure::InvalidRequest(error.to_string())
        } else {
            TransportFailure::Other(error.to_string())
        }
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self, url: &str) -> ProbeOutcome {
        let start_time = Instant::now();

        let parsed = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ProbeOutcome::transport(
                    ProbeError::Transport(TransportFailure::InvalidRequest(e.to_string())),
                    start_time.elapsed(),
                )
            }
        };

        let request = self.client.request(self.method.clone(), parsed);
        let response = timeout(self.timeout, request.send()).await;
        let response_time = start_time.elapsed();

        match response {
            Ok(Ok(response)) => {
                let status = response.status();
                if status == StatusCode::OK {
                    ProbeOutcome::ok(response_time)
                } else {
                    ProbeOutcome::unexpected_status(status.as_u16(), response_time)
                }
            }
            Ok(Err(e)) => ProbeOutcome::transport(
                ProbeError::Transport(Self::classify_error(&e)),
                response_time,
            ),
            Err(_) => ProbeOutcome::transport(
                ProbeError::Transport(TransportFailure::Timeout),
                response_time,
            ),
        }
    }
}
