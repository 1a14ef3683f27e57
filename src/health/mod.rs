//! 健康检测模块
//!
//! 提供HTTP探测、单站点轮询、站点登记、结果收集和轮询协调功能

pub mod checker;
pub mod collector;
pub mod coordinator;
pub mod poller;
pub mod registry;
pub mod result;

// 重新导出主要类型
pub use checker::{CheckerConfig, HealthChecker, HttpHealthChecker};
pub use collector::{LogSink, ResultCollector, ResultSink, TableSink};
pub use coordinator::{Coordinator, ReconcileReport};
pub use poller::{FailurePolicy, Poller, PollerExit};
pub use registry::{SiteClaim, SiteRegistry};
pub use result::{HealthStatus, PollResult, ProbeOutcome};
