//! Web界面和API模块
//!
//! 提供站点列表页面、添加/删除站点的表单处理和JSON状态接口

use crate::config::WebConfig;
use crate::core::service::MonitorHandle;

pub mod handlers;
pub mod server;

pub use server::{create_router, WebServer};

/// Web 应用共享状态
#[derive(Clone)]
pub struct WebAppState {
    /// 监控组件
    pub monitor: MonitorHandle,
    /// Web 配置
    pub config: WebConfig,
}

impl WebAppState {
    pub fn new(monitor: MonitorHandle, config: WebConfig) -> Self {
        Self { monitor, config }
    }
}
