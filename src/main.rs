//! Downtime Monitor 主程序入口
//!
//! 按站点间隔轮询的可用性监控工具

use clap::Parser;
use downtime_monitor::cli::Args;
use tracing::error;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = downtime_monitor::core::run(args).await {
        error!("命令执行失败: {:#}", e);
        eprintln!("错误: {e:#}");
        std::process::exit(1);
    }
}
