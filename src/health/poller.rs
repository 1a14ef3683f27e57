//! 单站点轮询任务
//!
//! 每个站点一个 Poller：按站点间隔定时探测，把结果交给结果通道。
//! 首次 tick 立即触发，用于建立基线读数。

use crate::health::checker::HealthChecker;
use crate::health::result::PollResult;
use crate::store::Site;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 探测失败后的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 首次失败后停止该站点的轮询
    #[default]
    StopOnFailure,
    /// 失败后继续按间隔轮询，重复报告失败
    KeepPolling,
}

/// Poller 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerExit {
    /// 探测失败，按策略停止
    Failed,
    /// 收到停止信号
    Shutdown,
    /// 结果通道已关闭
    ChannelClosed,
}

impl std::fmt::Display for PollerExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollerExit::Failed => write!(f, "探测失败"),
            PollerExit::Shutdown => write!(f, "停止信号"),
            PollerExit::ChannelClosed => write!(f, "结果通道关闭"),
        }
    }
}

/// 单站点轮询器
pub struct Poller {
    site: Site,
    checker: Arc<dyn HealthChecker>,
    policy: FailurePolicy,
}

impl Poller {
    pub fn new(site: Site, checker: Arc<dyn HealthChecker>, policy: FailurePolicy) -> Self {
        Self {
            site,
            checker,
            policy,
        }
    }

    /// 运行轮询循环，直到失败（按策略）、收到停止信号或结果通道关闭
    ///
    /// # 参数
    /// * `result_tx` - 结果通道；发送会阻塞到 Collector 接收为止
    /// * `stop` - 停止信号；值变为 true 或发送端被销毁时退出
    ///
    /// # 返回
    /// * `PollerExit` - 退出原因
    pub async fn run(
        self,
        result_tx: mpsc::Sender<PollResult>,
        mut stop: watch::Receiver<bool>,
    ) -> PollerExit {
        let period = Duration::from_secs(self.site.interval_seconds.max(1));
        let mut ticker = interval(period);
        // 探测慢于间隔时丢弃错过的 tick，不积压
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "启动站点轮询: {} ({}), 间隔 {}s",
            self.site.name, self.site.url, self.site.interval_seconds
        );

        let exit = loop {
            if *stop.borrow_and_update() {
                break PollerExit::Shutdown;
            }

            tokio::select! {
                biased;
                _ = stop.changed() => break PollerExit::Shutdown,
                _ = ticker.tick() => {}
            }

            debug!("开始探测站点: {}", self.site.name);
            let outcome = tokio::select! {
                biased;
                _ = stop.changed() => break PollerExit::Shutdown,
                outcome = self.checker.check(&self.site.url) => outcome,
            };

            let result = PollResult::from_outcome(&self.site, outcome);
            let success = result.is_success();
            if success {
                debug!("站点探测正常: {}", self.site.name);
            } else {
                warn!(
                    "站点探测失败: {}, 状态码 {}, {}",
                    self.site.name,
                    result.status_code,
                    result.error_message().unwrap_or_else(|| "N/A".to_string())
                );
            }

            tokio::select! {
                biased;
                _ = stop.changed() => break PollerExit::Shutdown,
                sent = result_tx.send(result) => {
                    if sent.is_err() {
                        break PollerExit::ChannelClosed;
                    }
                }
            }

            if !success && self.policy == FailurePolicy::StopOnFailure {
                break PollerExit::Failed;
            }
        };

        info!("站点轮询结束: {} ({})", self.site.name, exit);
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProbeError, TransportFailure};
    use crate::health::result::ProbeOutcome;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按脚本返回结果的探测器，脚本耗尽后重复最后一个结果
    struct ScriptedChecker {
        script: Mutex<VecDeque<ProbeOutcome>>,
        last: Mutex<Option<ProbeOutcome>>,
    }

    impl ScriptedChecker {
        fn new(outcomes: Vec<ProbeOutcome>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(outcomes.into()),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl HealthChecker for ScriptedChecker {
        async fn check(&self, _url: &str) -> ProbeOutcome {
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(outcome) = next {
                *last = Some(outcome);
            }
            last.clone().expect("script must not be empty")
        }
    }

    /// 第一次探测耗时 `first`，之后每次耗时 `rest`
    struct SlowChecker {
        first: Duration,
        rest: Duration,
        calls: Mutex<u32>,
    }

    impl SlowChecker {
        fn new(first: Duration, rest: Duration) -> Arc<Self> {
            Arc::new(Self {
                first,
                rest,
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl HealthChecker for SlowChecker {
        async fn check(&self, _url: &str) -> ProbeOutcome {
            let delay = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    self.first
                } else {
                    self.rest
                }
            };
            tokio::time::sleep(delay).await;
            ProbeOutcome::ok(delay)
        }
    }

    fn ok() -> ProbeOutcome {
        ProbeOutcome::ok(Duration::ZERO)
    }

    fn refused() -> ProbeOutcome {
        ProbeOutcome::transport(
            ProbeError::Transport(TransportFailure::Connect("connection refused".into())),
            Duration::ZERO,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_result_is_immediate() {
        let site = Site::new(1, "ok", "http://example.test/ok", 5);
        let poller = Poller::new(site, ScriptedChecker::new(vec![ok()]), FailurePolicy::default());
        let (tx, mut rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let start = tokio::time::Instant::now();
        tokio::spawn(poller.run(tx, stop_rx));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.status_code, 200);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_on_first_failure() {
        let site = Site::new(2, "down", "http://example.test/down", 3);
        let poller = Poller::new(
            site,
            ScriptedChecker::new(vec![ok(), refused()]),
            FailurePolicy::StopOnFailure,
        );
        let (tx, mut rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(tx, stop_rx));

        assert!(rx.recv().await.unwrap().is_success());
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.status_code, -1);
        assert!(failed.is_transport_failure());

        assert_eq!(handle.await.unwrap(), PollerExit::Failed);
        // 发送端已随任务销毁
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_polling_reports_repeated_failures() {
        let site = Site::new(3, "flaky", "http://example.test/flaky", 2);
        let poller = Poller::new(
            site,
            ScriptedChecker::new(vec![refused()]),
            FailurePolicy::KeepPolling,
        );
        let (tx, mut rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(tx, stop_rx));
        for _ in 0..3 {
            assert!(!rx.recv().await.unwrap().is_success());
        }

        stop_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), PollerExit::Shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_armed_exits_promptly() {
        let site = Site::new(4, "slow", "http://example.test/slow", 3600);
        let poller = Poller::new(site, ScriptedChecker::new(vec![ok()]), FailurePolicy::default());
        let (tx, mut rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let start = tokio::time::Instant::now();
        let handle = tokio::spawn(poller.run(tx, stop_rx));
        rx.recv().await.unwrap();

        stop_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), PollerExit::Shutdown);
        assert!(start.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_blocked_on_handoff() {
        let site = Site::new(5, "ok", "http://example.test/ok", 1);
        let poller = Poller::new(site, ScriptedChecker::new(vec![ok()]), FailurePolicy::default());
        let (tx, _rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(tx, stop_rx));
        // 通道容量为1且无人接收，第二次发送会阻塞
        tokio::time::sleep(Duration::from_secs(5)).await;

        stop_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), PollerExit::Shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_ticks_are_skipped() {
        let site = Site::new(8, "slow", "http://example.test/slow", 2);
        let checker = SlowChecker::new(Duration::from_secs(5), Duration::ZERO);
        let poller = Poller::new(site, checker, FailurePolicy::default());
        let (tx, mut rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let start = tokio::time::Instant::now();
        tokio::spawn(poller.run(tx, stop_rx));

        let mut times = Vec::new();
        for _ in 0..4 {
            rx.recv().await.unwrap();
            times.push(start.elapsed());
        }

        // 2s 和 4s 的 tick 在探测期间错过，只补一次，之后回到 2s 的整数倍
        assert_eq!(
            times,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(5),
                Duration::from_secs(6),
                Duration::from_secs(8),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_probe_publishes_nothing() {
        let site = Site::new(9, "hang", "http://example.test/hang", 60);
        let checker = SlowChecker::new(Duration::from_secs(10), Duration::from_secs(10));
        let poller = Poller::new(site, checker, FailurePolicy::default());
        let (tx, mut rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let start = tokio::time::Instant::now();
        let handle = tokio::spawn(poller.run(tx, stop_rx));
        tokio::time::sleep(Duration::from_secs(1)).await;

        stop_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), PollerExit::Shutdown);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_ends_poller() {
        let site = Site::new(6, "ok", "http://example.test/ok", 1);
        let poller = Poller::new(site, ScriptedChecker::new(vec![ok()]), FailurePolicy::default());
        let (tx, rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);
        drop(rx);

        assert_eq!(poller.run(tx, stop_rx).await, PollerExit::ChannelClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_stopped_never_probes() {
        let site = Site::new(7, "ok", "http://example.test/ok", 1);
        let poller = Poller::new(site, ScriptedChecker::new(vec![ok()]), FailurePolicy::default());
        let (tx, mut rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(true);

        assert_eq!(poller.run(tx, stop_rx).await, PollerExit::Shutdown);
        assert!(rx.recv().await.is_none());
    }
}
