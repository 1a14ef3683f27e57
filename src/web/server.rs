//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::{handlers, WebAppState};
use crate::config::WebConfig;
use crate::core::service::MonitorHandle;
use crate::error::{ConfigError, Result};
use axum::{routing::get, Router};
use std::future::Future;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// 创建路由
pub fn create_router(state: WebAppState) -> Router {
    Router::new()
        .route("/", get(handlers::index).post(handlers::add_site))
        .route("/site/", get(handlers::delete_site))
        .route("/api/status", get(handlers::api_status))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Web服务器
pub struct WebServer {
    config: WebConfig,
    state: WebAppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: WebConfig, monitor: MonitorHandle) -> Self {
        let state = WebAppState::new(monitor, config.clone());
        Self { config, state }
    }

    /// 绑定监听地址并运行，直到 `shutdown` 完成
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self
            .config
            .socket_addr()
            .map_err(ConfigError::ValidationError)?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// 在已绑定的监听器上运行
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let router = create_router(self.state);

        info!("Web服务器已启动: http://{}", addr);
        info!("状态接口: http://{}/api/status", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
