//! 轮询协调器
//!
//! 把期望的站点列表与登记表对比，为新出现的站点启动 Poller，
//! 并等待本轮启动的所有 Poller 结束。

use crate::health::checker::HealthChecker;
use crate::health::poller::{FailurePolicy, Poller, PollerExit};
use crate::health::registry::{SiteClaim, SiteRegistry};
use crate::health::result::PollResult;
use crate::store::{Site, SiteId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// 一轮协调的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// 本轮启动的站点
    pub started: Vec<SiteId>,
    /// 已有 Poller 而跳过的站点
    pub already_active: Vec<SiteId>,
    /// 间隔无效而跳过的站点
    pub invalid: Vec<SiteId>,
    /// 已被移除而跳过的站点
    pub retired: Vec<SiteId>,
    /// 协调器已关闭而跳过的站点
    pub skipped_shutdown: Vec<SiteId>,
    /// 本轮启动的 Poller 的退出原因
    pub exits: Vec<(SiteId, PollerExit)>,
}

#[derive(Debug, Default)]
struct StopSignals {
    /// 协调器是否已关闭
    closed: bool,
    /// 每个活跃站点的停止信号
    senders: HashMap<SiteId, watch::Sender<bool>>,
    /// 已移除的站点，不再为其启动 Poller
    retired: HashSet<SiteId>,
}

/// Poller 任务持有的登记
///
/// 任务结束或被中止时销毁：先移除停止信号，再释放站点登记。
struct ActivePoller {
    id: SiteId,
    stop_tx: watch::Sender<bool>,
    stops: Arc<Mutex<StopSignals>>,
    _claim: SiteClaim,
}

impl Drop for ActivePoller {
    fn drop(&mut self) {
        let mut stops = lock_stops(&self.stops);
        if stops
            .senders
            .get(&self.id)
            .is_some_and(|current| current.same_channel(&self.stop_tx))
        {
            stops.senders.remove(&self.id);
        }
    }
}

/// 轮询协调器
///
/// 登记表归协调器所有，生命周期与协调器一致。
pub struct Coordinator {
    registry: Arc<SiteRegistry>,
    checker: Arc<dyn HealthChecker>,
    result_tx: mpsc::Sender<PollResult>,
    policy: FailurePolicy,
    stops: Arc<Mutex<StopSignals>>,
}

impl Coordinator {
    /// 创建新的协调器
    ///
    /// # 参数
    /// * `checker` - 探测器
    /// * `result_tx` - 共享结果通道的发送端
    /// * `policy` - 失败处理策略
    pub fn new(
        checker: Arc<dyn HealthChecker>,
        result_tx: mpsc::Sender<PollResult>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            registry: Arc::new(SiteRegistry::new()),
            checker,
            result_tx,
            policy,
            stops: Arc::new(Mutex::new(StopSignals::default())),
        }
    }

    fn stops(&self) -> MutexGuard<'_, StopSignals> {
        lock_stops(&self.stops)
    }

    pub fn registry(&self) -> &Arc<SiteRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// 当前有活跃 Poller 的站点
    pub fn active_sites(&self) -> Vec<SiteId> {
        self.registry.active_ids()
    }

    /// 协调一轮站点列表
    ///
    /// 为登记表中不存在的站点启动 Poller，然后等待本轮启动的 Poller 全部结束。
    /// 之前轮次启动的 Poller 不计入本轮。丢弃返回的 future 会中止本轮的 Poller。
    pub async fn reconcile(&self, known_sites: Vec<Site>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut round = JoinSet::new();

        for site in known_sites {
            let id = site.id;
            if !site.has_valid_interval() {
                warn!("站点 {} 的检测间隔无效，跳过", site.name);
                report.invalid.push(id);
                continue;
            }

            // 登记与停止信号在同一把锁下完成，关闭后不再启动新的 Poller
            let (active, stop_rx) = {
                let mut stops = self.stops();
                if stops.closed {
                    debug!("协调器已关闭，跳过站点 {}", site.name);
                    report.skipped_shutdown.push(id);
                    continue;
                }
                if stops.retired.contains(&id) {
                    debug!("站点 {} 已被移除，跳过", site.name);
                    report.retired.push(id);
                    continue;
                }
                let Some(claim) = self.registry.claim(id) else {
                    debug!("站点 {} 已有活跃的 Poller", site.name);
                    report.already_active.push(id);
                    continue;
                };
                let (stop_tx, stop_rx) = watch::channel(false);
                stops.senders.insert(id, stop_tx.clone());
                let active = ActivePoller {
                    id,
                    stop_tx,
                    stops: Arc::clone(&self.stops),
                    _claim: claim,
                };
                (active, stop_rx)
            };

            info!("为站点启动 Poller: {} ({})", site.name, site.url);
            let poller = Poller::new(site, Arc::clone(&self.checker), self.policy);
            let result_tx = self.result_tx.clone();

            round.spawn(async move {
                let exit = poller.run(result_tx, stop_rx).await;
                drop(active);
                (id, exit)
            });
            report.started.push(id);
        }

        info!(
            "本轮启动 {} 个 Poller，跳过 {} 个已活跃站点，{} 个无效站点，{} 个已移除站点",
            report.started.len(),
            report.already_active.len(),
            report.invalid.len(),
            report.retired.len()
        );

        while let Some(joined) = round.join_next().await {
            match joined {
                Ok((id, exit)) => {
                    debug!("站点 {} 的 Poller 已结束: {}", id, exit);
                    report.exits.push((id, exit));
                }
                Err(e) => error!("Poller 任务异常结束: {}", e),
            }
        }

        info!("本轮协调完成，{} 个 Poller 已结束", report.exits.len());
        report
    }

    /// 停止单个站点的 Poller，并把站点标记为已移除
    ///
    /// 标记后的协调轮次不再为该站点启动 Poller，包括调用时正在进行的轮次。
    ///
    /// # 返回
    /// * `bool` - 站点存在活跃 Poller 时返回 true
    pub fn stop_site(&self, id: SiteId) -> bool {
        let mut stops = self.stops();
        stops.retired.insert(id);
        match stops.senders.get(&id) {
            Some(sender) => {
                info!("停止站点 {} 的 Poller", id);
                sender.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// 关闭协调器：停止所有 Poller，之后的协调不再启动新的 Poller
    pub fn shutdown(&self) {
        let mut stops = self.stops();
        stops.closed = true;
        info!("关闭协调器，停止 {} 个 Poller", stops.senders.len());
        for sender in stops.senders.values() {
            sender.send_replace(true);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.stops().closed
    }
}

fn lock_stops(stops: &Mutex<StopSignals>) -> MutexGuard<'_, StopSignals> {
    stops.lock().unwrap_or_else(PoisonError::into_inner)
}
