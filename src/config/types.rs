//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::health::checker::DEFAULT_USER_AGENT;
use crate::health::FailurePolicy;
use crate::store::NewSite;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// Web 服务器配置
    #[serde(default)]
    pub web: WebConfig,
    /// 初始站点列表
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// 探测使用的HTTP方法
    #[serde(default = "default_method")]
    pub http_method: String,
    /// 探测使用的 User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 结果通道容量
    #[serde(default = "default_channel_capacity")]
    pub result_channel_capacity: usize,
    /// 探测失败后的处理策略
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// CSV站点文件（每行 `name,intervalSeconds`）
    pub sites_file: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            request_timeout_seconds: default_timeout(),
            http_method: default_method(),
            user_agent: default_user_agent(),
            result_channel_capacity: default_channel_capacity(),
            failure_policy: FailurePolicy::default(),
            sites_file: None,
        }
    }
}

/// Web 服务器配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 是否启用 Web 功能
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,
    /// 监听端口
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// 绑定地址
    #[serde(default = "default_web_bind_address")]
    pub bind_address: String,
    /// 页面自动刷新间隔（秒），0 表示不刷新
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u32,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            port: default_web_port(),
            bind_address: default_web_bind_address(),
            refresh_interval_seconds: default_refresh_interval(),
        }
    }
}

impl WebConfig {
    /// 解析监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| format!("无效的监听地址 {}:{}: {}", self.bind_address, self.port, e))
    }
}

/// 站点配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    /// 站点名称
    pub name: String,
    /// 站点URL
    pub url: String,
    /// 检测间隔（秒）
    #[serde(default = "default_site_interval")]
    pub interval_seconds: u64,
}

impl From<SiteConfig> for NewSite {
    fn from(site: SiteConfig) -> Self {
        NewSite::new(site.name, site.url, site.interval_seconds)
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_method() -> String {
    "POST".to_string()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_channel_capacity() -> usize {
    1
}
fn default_site_interval() -> u64 {
    60
}
fn default_web_enabled() -> bool {
    true
}
fn default_web_port() -> u16 {
    8000
}
fn default_web_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_refresh_interval() -> u32 {
    10
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.global.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    if config.global.result_channel_capacity == 0 {
        return Err("结果通道容量不能为0".to_string());
    }

    let valid_log_levels = ["debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.global.log_level, valid_log_levels
        ));
    }

    let valid_methods = ["GET", "POST", "HEAD"];
    if !valid_methods.contains(&config.global.http_method.to_uppercase().as_str()) {
        return Err(format!(
            "无效的HTTP方法: {}，支持的方法: {:?}",
            config.global.http_method, valid_methods
        ));
    }

    if config.web.enabled {
        if config.web.port == 0 {
            return Err("Web服务器端口不能为0".to_string());
        }
        if config.web.bind_address.is_empty() {
            return Err("Web服务器绑定地址不能为空".to_string());
        }
        config.web.socket_addr()?;
    }

    let mut names = HashSet::new();
    let mut urls = HashSet::new();
    for site in &config.sites {
        NewSite::from(site.clone())
            .validate()
            .map_err(|e| e.to_string())?;

        if !names.insert(site.name.as_str()) {
            return Err(format!("站点名称重复: {}", site.name));
        }
        if !urls.insert(site.url.as_str()) {
            return Err(format!("站点URL重复: {}", site.url));
        }
    }

    Ok(())
}
