//! Web 路由处理函数
//!
//! 实现站点列表、添加站点、删除站点和状态接口

use super::WebAppState;
use crate::error::StoreError;
use crate::health::HealthStatus;
use crate::status::{format_timedelta, OverallStatus, SiteStatus};
use crate::store::{NewSite, Site, SiteId};
use askama::Template;
use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{error, info, warn};

/// 站点列表页面的一行
struct SiteRow {
    id: SiteId,
    name: String,
    url: String,
    interval_seconds: u64,
    status: String,
    status_class: &'static str,
    status_code: String,
    last_check: String,
    response_time: String,
    uptime: String,
    error_message: String,
}

impl SiteRow {
    fn new(site: &Site, status: Option<&SiteStatus>) -> Self {
        let health = status.map(|s| s.status).unwrap_or(HealthStatus::Unknown);
        let status_class = match health {
            HealthStatus::Up => "up",
            HealthStatus::Down => "down",
            HealthStatus::Unknown => "unknown",
        };

        Self {
            id: site.id,
            name: site.name.clone(),
            url: site.url.clone(),
            interval_seconds: site.interval_seconds,
            status: health.to_string(),
            status_class,
            status_code: status
                .and_then(|s| s.status_code)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            last_check: status
                .and_then(|s| s.last_check)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            response_time: status
                .and_then(|s| s.response_time_ms)
                .map(|ms| format!("{ms}ms"))
                .unwrap_or_else(|| "-".to_string()),
            uptime: format_timedelta(Utc::now() - site.date_added),
            error_message: status
                .and_then(|s| s.error_message.clone())
                .unwrap_or_default(),
        }
    }
}

/// 站点列表模板
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    sites: Vec<SiteRow>,
    last_updated: String,
    up_count: usize,
    down_count: usize,
    unknown_count: usize,
    refresh_interval: u32,
}

/// 添加站点表单
#[derive(Debug, Deserialize)]
pub struct AddSiteForm {
    pub name: String,
    pub url: String,
    pub interval: String,
}

/// 删除站点查询参数
#[derive(Debug, Deserialize)]
pub struct DeleteSiteQuery {
    pub id: SiteId,
}

fn store_error_response(e: StoreError) -> Response {
    let status = match &e {
        StoreError::Duplicate { .. } => StatusCode::CONFLICT,
        StoreError::Invalid(_) | StoreError::Malformed { .. } => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string()).into_response()
}

/// 站点列表页面
pub async fn index(State(state): State<WebAppState>) -> Response {
    let sites = match state.monitor.store.list_sites().await {
        Ok(sites) => sites,
        Err(e) => {
            error!("读取站点表失败: {}", e);
            return store_error_response(e);
        }
    };

    let overall = state.monitor.board.overall().await;
    let statuses: HashMap<SiteId, &SiteStatus> =
        overall.sites.iter().map(|s| (s.site_id, s)).collect();

    let template = IndexTemplate {
        sites: sites
            .iter()
            .map(|site| SiteRow::new(site, statuses.get(&site.id).copied()))
            .collect(),
        last_updated: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        up_count: overall.up_sites,
        down_count: overall.down_sites,
        unknown_count: overall.unknown_sites,
        refresh_interval: state.config.refresh_interval_seconds,
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("模板渲染失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "模板渲染失败").into_response()
        }
    }
}

/// 添加站点，成功后跳转回列表页
pub async fn add_site(State(state): State<WebAppState>, Form(form): Form<AddSiteForm>) -> Response {
    let interval: u64 = match form.interval.trim().parse() {
        Ok(interval) => interval,
        Err(_) => {
            warn!("无效的检测间隔: {}", form.interval);
            return (
                StatusCode::BAD_REQUEST,
                format!("无效的检测间隔: {}", form.interval),
            )
                .into_response();
        }
    };

    let site = NewSite::new(form.name.trim(), form.url.trim(), interval);
    match state.monitor.add_site(site).await {
        Ok(id) => {
            info!("通过Web界面添加站点 {}: {}", id, form.url.trim());
            Redirect::to("/").into_response()
        }
        Err(e) => {
            warn!("添加站点失败: {}", e);
            store_error_response(e)
        }
    }
}

/// 删除站点并停止其 Poller，成功后跳转回列表页
pub async fn delete_site(
    State(state): State<WebAppState>,
    Query(query): Query<DeleteSiteQuery>,
) -> Response {
    match state.monitor.remove_site(query.id).await {
        Ok(()) => {
            info!("通过Web界面删除站点 {}", query.id);
            Redirect::to("/").into_response()
        }
        Err(e) => {
            warn!("删除站点 {} 失败: {}", query.id, e);
            store_error_response(e)
        }
    }
}

/// 整体状态接口
pub async fn api_status(State(state): State<WebAppState>) -> Json<OverallStatus> {
    Json(state.monitor.board.overall().await)
}
