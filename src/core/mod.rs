//! 核心模块
//!
//! 包含命令分发和监控服务的生命周期管理

pub mod app;
pub mod service;

// 重新导出主要类型
pub use app::{execute_command, run};
pub use service::{MonitorHandle, MonitorService, ServiceLauncher};
