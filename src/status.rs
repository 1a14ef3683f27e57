//! 站点状态看板
//!
//! 作为结果输出端记录每个站点的最新状态，供Web页面和API查询

use crate::health::collector::ResultSink;
use crate::health::{HealthStatus, PollResult};
use crate::store::{Site, SiteId};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// 单个站点的最新状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatus {
    /// 站点ID
    pub site_id: SiteId,
    /// 站点名称
    pub name: String,
    /// 站点URL
    pub url: String,
    /// 检测间隔（秒）
    pub interval_seconds: u64,
    /// 当前状态
    pub status: HealthStatus,
    /// 最近一次状态码
    pub status_code: Option<i32>,
    /// 最近一次检测时间
    pub last_check: Option<DateTime<Utc>>,
    /// 响应时间（毫秒）
    pub response_time_ms: Option<u64>,
    /// 错误信息
    pub error_message: Option<String>,
    /// 添加时间
    pub date_added: DateTime<Utc>,
    /// 检测总次数
    pub total_checks: u64,
    /// 失败次数
    pub failed_checks: u64,
}

impl SiteStatus {
    fn from_site(site: &Site) -> Self {
        Self {
            site_id: site.id,
            name: site.name.clone(),
            url: site.url.clone(),
            interval_seconds: site.interval_seconds,
            status: HealthStatus::Unknown,
            status_code: site.status_code,
            last_check: site.last_checked_at,
            response_time_ms: None,
            error_message: None,
            date_added: site.date_added,
            total_checks: 0,
            failed_checks: 0,
        }
    }

    /// 成功率（百分比），尚未检测时为空
    pub fn success_rate(&self) -> Option<f64> {
        (self.total_checks > 0).then(|| {
            (self.total_checks - self.failed_checks) as f64 / self.total_checks as f64 * 100.0
        })
    }
}

/// 整体状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallStatus {
    /// 看板创建时间
    pub start_time: DateTime<Utc>,
    /// 站点总数
    pub total_sites: usize,
    /// 正常站点数
    pub up_sites: usize,
    /// 异常站点数
    pub down_sites: usize,
    /// 未知站点数
    pub unknown_sites: usize,
    /// 站点详细状态（按ID升序）
    pub sites: Vec<SiteStatus>,
}

/// 站点状态看板
#[derive(Debug)]
pub struct StatusBoard {
    sites: RwLock<BTreeMap<SiteId, SiteStatus>>,
    start_time: DateTime<Utc>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            sites: RwLock::new(BTreeMap::new()),
            start_time: Utc::now(),
        }
    }

    /// 同步站点列表：新增站点以未知状态加入，已删除的站点被移除，已有站点保留状态
    pub async fn sync_sites(&self, sites: &[Site]) {
        let mut map = self.sites.write().await;
        map.retain(|id, _| sites.iter().any(|s| s.id == *id));
        for site in sites {
            map.entry(site.id)
                .or_insert_with(|| SiteStatus::from_site(site));
        }
    }

    /// 移除站点
    pub async fn remove_site(&self, id: SiteId) {
        self.sites.write().await.remove(&id);
    }

    /// 用一条结果更新站点状态
    pub async fn record(&self, result: &PollResult) {
        let mut map = self.sites.write().await;
        let Some(entry) = map.get_mut(&result.site_id) else {
            // 站点已被删除，丢弃迟到的结果
            return;
        };

        entry.status = result.status();
        entry.status_code = Some(result.status_code);
        entry.last_check = Some(result.observed_at);
        entry.response_time_ms = Some(result.response_time_ms());
        entry.error_message = result.error_message();
        entry.total_checks += 1;
        if !result.is_success() {
            entry.failed_checks += 1;
        }
    }

    /// 获取单个站点状态
    pub async fn get(&self, id: SiteId) -> Option<SiteStatus> {
        self.sites.read().await.get(&id).cloned()
    }

    /// 获取整体状态
    pub async fn overall(&self) -> OverallStatus {
        let sites: Vec<SiteStatus> = self.sites.read().await.values().cloned().collect();
        let count = |status: HealthStatus| sites.iter().filter(|s| s.status == status).count();

        OverallStatus {
            start_time: self.start_time,
            total_sites: sites.len(),
            up_sites: count(HealthStatus::Up),
            down_sites: count(HealthStatus::Down),
            unknown_sites: count(HealthStatus::Unknown),
            sites,
        }
    }
}

#[async_trait]
impl ResultSink for StatusBoard {
    async fn handle(&self, result: &PollResult) {
        self.record(result).await;
    }
}

/// 把时长格式化为 `"{h}h {m}m"`，超过一天时为 `"{d}d {h}h {m}m"`
pub fn format_timedelta(delta: ChronoDuration) -> String {
    let total = delta.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total / 3_600) % 24;
    let minutes = (total / 60) % 60;

    if days == 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{days}d {hours}h {minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProbeError, TransportFailure};
    use crate::health::result::ProbeOutcome;
    use std::time::Duration;

    fn sites() -> Vec<Site> {
        vec![
            Site::new(1, "ok", "http://example.test/ok", 5),
            Site::new(2, "down", "http://example.test/down", 3),
        ]
    }

    #[tokio::test]
    async fn test_sync_and_record() {
        let board = StatusBoard::new();
        let sites = sites();
        board.sync_sites(&sites).await;

        let overall = board.overall().await;
        assert_eq!(overall.total_sites, 2);
        assert_eq!(overall.unknown_sites, 2);

        board
            .record(&PollResult::from_outcome(
                &sites[0],
                ProbeOutcome::ok(Duration::from_millis(80)),
            ))
            .await;
        board
            .handle(&PollResult::from_outcome(
                &sites[1],
                ProbeOutcome::transport(
                    ProbeError::Transport(TransportFailure::Connect("refused".into())),
                    Duration::ZERO,
                ),
            ))
            .await;

        let overall = board.overall().await;
        assert_eq!(overall.up_sites, 1);
        assert_eq!(overall.down_sites, 1);

        let down = board.get(2).await.unwrap();
        assert_eq!(down.status_code, Some(-1));
        assert_eq!(down.failed_checks, 1);
        assert_eq!(down.success_rate(), Some(0.0));
        assert!(down.error_message.unwrap().contains("连接失败"));

        let up = board.get(1).await.unwrap();
        assert_eq!(up.response_time_ms, Some(80));
        assert_eq!(up.success_rate(), Some(100.0));
    }

    #[tokio::test]
    async fn test_sync_removes_deleted_sites_and_keeps_state() {
        let board = StatusBoard::new();
        let sites = sites();
        board.sync_sites(&sites).await;
        board
            .record(&PollResult::from_outcome(
                &sites[0],
                ProbeOutcome::ok(Duration::ZERO),
            ))
            .await;

        board.sync_sites(&sites[..1]).await;
        assert!(board.get(2).await.is_none());
        assert_eq!(board.get(1).await.unwrap().status, HealthStatus::Up);

        // 已删除站点的结果被忽略
        board
            .record(&PollResult::from_outcome(
                &sites[1],
                ProbeOutcome::ok(Duration::ZERO),
            ))
            .await;
        assert!(board.get(2).await.is_none());
    }

    #[test]
    fn test_format_timedelta() {
        assert_eq!(format_timedelta(ChronoDuration::minutes(5)), "0h 5m");
        assert_eq!(
            format_timedelta(ChronoDuration::days(4) + ChronoDuration::minutes(123)),
            "4d 2h 3m"
        );
        assert_eq!(format_timedelta(ChronoDuration::seconds(-30)), "0h 0m");
    }
}
