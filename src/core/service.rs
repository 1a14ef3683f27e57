//! 监控服务管理
//!
//! 负责组装探测器、结果收集器、协调器和状态看板，并管理它们的生命周期

use crate::config::{Config, GlobalConfig};
use crate::error::{Result, StoreError};
use crate::health::{
    CheckerConfig, Coordinator, HealthChecker, HttpHealthChecker, LogSink, ReconcileReport,
    ResultCollector, ResultSink,
};
use crate::status::StatusBoard;
use crate::store::{CsvSiteLoader, MemorySiteStore, NewSite, SiteId, SiteStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 等待结果收集器排空的最长时间
const COLLECTOR_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 监控组件句柄，可在 Web 处理函数之间共享
#[derive(Clone)]
pub struct MonitorHandle {
    /// 站点表
    pub store: Arc<dyn SiteStore>,
    /// 轮询协调器
    pub coordinator: Arc<Coordinator>,
    /// 状态看板
    pub board: Arc<StatusBoard>,
    /// 串行化读取站点表与删除站点
    sites_lock: Arc<Mutex<()>>,
}

impl MonitorHandle {
    pub fn new(
        store: Arc<dyn SiteStore>,
        coordinator: Arc<Coordinator>,
        board: Arc<StatusBoard>,
    ) -> Self {
        Self {
            store,
            coordinator,
            board,
            sites_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 读取当前站点表并执行一轮协调
    ///
    /// 返回时本轮启动的 Poller 均已结束。读取期间被删除的站点由协调器跳过。
    pub async fn reconcile(&self) -> std::result::Result<ReconcileReport, StoreError> {
        let sites = {
            let _guard = self.sites_lock.lock().await;
            let sites = self.store.list_sites().await?;
            self.board.sync_sites(&sites).await;
            sites
        };
        Ok(self.coordinator.reconcile(sites).await)
    }

    /// 在后台执行一轮协调
    pub fn spawn_reconcile(&self) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            match handle.reconcile().await {
                Ok(report) => info!(
                    "协调轮次结束: 启动 {} 个，跳过 {} 个，无效 {} 个",
                    report.started.len(),
                    report.already_active.len(),
                    report.invalid.len()
                ),
                Err(e) => error!("读取站点表失败: {}", e),
            }
        })
    }

    /// 添加站点并在后台为其启动 Poller
    pub async fn add_site(&self, site: NewSite) -> std::result::Result<SiteId, StoreError> {
        let id = {
            let _guard = self.sites_lock.lock().await;
            let id = self.store.add_site(site).await?;
            let sites = self.store.list_sites().await?;
            self.board.sync_sites(&sites).await;
            id
        };
        self.spawn_reconcile();
        Ok(id)
    }

    /// 删除站点并停止其 Poller
    pub async fn remove_site(&self, id: SiteId) -> std::result::Result<(), StoreError> {
        let _guard = self.sites_lock.lock().await;
        self.store.delete_site(id).await?;
        if !self.coordinator.stop_site(id) {
            info!("站点 {} 没有活跃的 Poller", id);
        }
        self.board.remove_site(id).await;
        Ok(())
    }
}

/// 运行中的监控服务
pub struct MonitorService {
    handle: MonitorHandle,
    collector: JoinHandle<u64>,
}

impl MonitorService {
    /// 启动结果收集器并创建协调器
    ///
    /// 看板和日志输出端总是启用，`extra_sinks` 追加在它们之后。
    /// 此时尚未启动任何 Poller，需要调用 [`MonitorHandle::reconcile`]。
    pub fn start(
        global: &GlobalConfig,
        store: Arc<dyn SiteStore>,
        extra_sinks: Vec<Arc<dyn ResultSink>>,
    ) -> Result<Self> {
        let checker = Arc::new(ServiceLauncher::build_checker(global)?);
        Ok(Self::start_with_checker(global, store, checker, extra_sinks))
    }

    /// 使用指定探测器启动
    pub fn start_with_checker(
        global: &GlobalConfig,
        store: Arc<dyn SiteStore>,
        checker: Arc<dyn HealthChecker>,
        extra_sinks: Vec<Arc<dyn ResultSink>>,
    ) -> Self {
        let (result_tx, collector) = ResultCollector::channel(global.result_channel_capacity);
        let board = Arc::new(StatusBoard::new());

        let mut sinks: Vec<Arc<dyn ResultSink>> = vec![
            board.clone() as Arc<dyn ResultSink>,
            Arc::new(LogSink) as Arc<dyn ResultSink>,
        ];
        sinks.extend(extra_sinks);
        let collector = tokio::spawn(collector.run(sinks));

        let coordinator = Arc::new(Coordinator::new(
            checker,
            result_tx,
            global.failure_policy,
        ));
        info!("监控服务已创建，失败策略: {:?}", global.failure_policy);

        Self {
            handle: MonitorHandle::new(store, coordinator, board),
            collector,
        }
    }

    pub fn handle(&self) -> &MonitorHandle {
        &self.handle
    }

    /// 停止所有 Poller 并等待结果收集器排空
    ///
    /// # 返回
    /// * `Option<u64>` - 收集器处理的结果总数；超时未结束时为空
    pub async fn shutdown(self) -> Option<u64> {
        let Self { handle, collector } = self;
        handle.coordinator.shutdown();
        // 协调器持有结果通道的发送端，所有副本销毁后收集器才会结束
        drop(handle);

        let abort = collector.abort_handle();
        match tokio::time::timeout(COLLECTOR_DRAIN_TIMEOUT, collector).await {
            Ok(Ok(count)) => Some(count),
            Ok(Err(e)) => {
                error!("结果收集器异常结束: {}", e);
                None
            }
            Err(_) => {
                warn!("结果收集器未在 {:?} 内结束，强制停止", COLLECTOR_DRAIN_TIMEOUT);
                abort.abort();
                None
            }
        }
    }
}

/// 服务启动辅助函数
pub struct ServiceLauncher;

impl ServiceLauncher {
    /// 按全局配置创建HTTP探测器
    pub fn build_checker(global: &GlobalConfig) -> Result<HttpHealthChecker> {
        HttpHealthChecker::new(CheckerConfig {
            method: global.http_method.clone(),
            user_agent: global.user_agent.clone(),
            timeout: Duration::from_secs(global.request_timeout_seconds),
        })
    }

    /// 用配置中的站点和CSV文件初始化站点表
    ///
    /// # 参数
    /// * `config` - 应用配置
    /// * `sites_file` - 额外的CSV站点文件，优先于配置中的 `sites_file`
    pub async fn build_store(
        config: &Config,
        sites_file: Option<&Path>,
    ) -> Result<Arc<MemorySiteStore>> {
        let store = Arc::new(MemorySiteStore::new());

        let configured: Vec<NewSite> = config.sites.iter().cloned().map(NewSite::from).collect();
        store.seed(configured).await?;

        if let Some(path) = sites_file.or(config.global.sites_file.as_deref()) {
            let sites = CsvSiteLoader::new().load_from_file(path).await?;
            store.seed(sites).await?;
        }

        info!("站点表初始化完成，共 {} 个站点", store.len().await);
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::health::{HealthStatus, ProbeOutcome};
    use crate::store::Site;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::NamedTempFile;
    use tokio::sync::Notify;

    /// 第一次列出站点后停住，直到 `gate` 放行
    struct GatedStore {
        inner: MemorySiteStore,
        armed: AtomicBool,
        reached: Notify,
        gate: Notify,
    }

    #[async_trait]
    impl SiteStore for GatedStore {
        async fn add_site(&self, site: NewSite) -> std::result::Result<SiteId, StoreError> {
            self.inner.add_site(site).await
        }

        async fn list_sites(&self) -> std::result::Result<Vec<Site>, StoreError> {
            let sites = self.inner.list_sites().await?;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.gate.notified().await;
            }
            Ok(sites)
        }

        async fn get_site(&self, id: SiteId) -> std::result::Result<Site, StoreError> {
            self.inner.get_site(id).await
        }

        async fn delete_site(&self, id: SiteId) -> std::result::Result<(), StoreError> {
            self.inner.delete_site(id).await
        }
    }

    struct AlwaysUp;

    #[async_trait]
    impl HealthChecker for AlwaysUp {
        async fn check(&self, _url: &str) -> ProbeOutcome {
            ProbeOutcome::ok(Duration::from_millis(1))
        }
    }

    fn config_with_site() -> Config {
        let mut config = Config::default();
        config.sites.push(SiteConfig {
            name: "ok".to_string(),
            url: "http://example.test/ok".to_string(),
            interval_seconds: 5,
        });
        config
    }

    #[tokio::test]
    async fn test_build_store_from_config_and_csv() {
        let csv = temp_csv("example.test/csv,10\n");
        let store = ServiceLauncher::build_store(&config_with_site(), Some(csv.path()))
            .await
            .unwrap();

        let sites = store.list_sites().await.unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].name, "ok");
        assert_eq!(sites[1].url, "http://example.test/csv");
    }

    #[tokio::test]
    async fn test_build_store_rejects_duplicate_csv_entry() {
        let csv = temp_csv("http://example.test/ok,10\n");
        let err = ServiceLauncher::build_store(&config_with_site(), Some(csv.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("example.test/ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_add_remove_and_shutdown() {
        let store = ServiceLauncher::build_store(&Config::default(), None)
            .await
            .unwrap();
        let service = MonitorService::start_with_checker(
            &GlobalConfig::default(),
            store,
            Arc::new(AlwaysUp),
            Vec::new(),
        );
        let handle = service.handle().clone();

        let id = handle
            .add_site(NewSite::new("ok", "http://example.test/ok", 5))
            .await
            .unwrap();

        // 等待首个结果到达看板
        for _ in 0..100 {
            if handle.board.get(id).await.map(|s| s.status) == Some(HealthStatus::Up) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handle.board.get(id).await.unwrap().status, HealthStatus::Up);
        assert_eq!(handle.coordinator.active_sites(), vec![id]);

        handle.remove_site(id).await.unwrap();
        assert!(handle.board.get(id).await.is_none());
        assert!(matches!(
            handle.remove_site(id).await,
            Err(StoreError::NotFound(_))
        ));

        drop(handle);
        let processed = service.shutdown().await;
        assert!(processed.unwrap() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_during_reconcile_stops_site() {
        let inner = MemorySiteStore::new();
        let id = inner
            .add_site(NewSite::new("ok", "http://example.test/ok", 5))
            .await
            .unwrap();
        let store = Arc::new(GatedStore {
            inner,
            armed: AtomicBool::new(true),
            reached: Notify::new(),
            gate: Notify::new(),
        });
        let service = MonitorService::start_with_checker(
            &GlobalConfig::default(),
            store.clone(),
            Arc::new(AlwaysUp),
            Vec::new(),
        );
        let handle = service.handle().clone();

        // 协调轮次已读到包含该站点的快照
        let round = handle.spawn_reconcile();
        store.reached.notified().await;

        let remover = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.remove_site(id).await })
        };
        tokio::task::yield_now().await;
        store.gate.notify_one();
        remover.await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(store.get_site(id).await.is_err());
        assert!(handle.coordinator.active_sites().is_empty());
        assert!(handle.board.get(id).await.is_none());

        round.await.unwrap();
        drop(handle);
        service.shutdown().await;
    }

    fn temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }
}
