//! Downtime Monitor - 按站点间隔轮询的可用性监控工具
//!
//! 每个站点由独立的 Poller 按各自的间隔发起HTTP探测，结果经共享通道
//! 汇总到结果收集器。支持：
//! - 站点登记表，保证每个站点最多一个活跃 Poller
//! - 可配置的失败处理策略
//! - CSV站点文件和TOML配置
//! - Web站点管理界面和JSON状态接口
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod health;
pub mod logging;
pub mod status;
pub mod store;
pub mod web;

// 重新导出主要类型
pub use config::{Config, GlobalConfig};
pub use error::{MonitorError, Result};
pub use health::{Coordinator, FailurePolicy, HealthChecker, HealthStatus, PollResult, Poller};
pub use store::{Site, SiteId, SiteStore};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
