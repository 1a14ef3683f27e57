//! 应用程序核心逻辑
//!
//! 包含日志初始化、命令分发和应用程序生命周期管理

use crate::cli::args::{Args, Commands};
use crate::cli::commands::{
    load_config, CheckCommand, Command, ServeCommand, ValidateCommand, WatchCommand,
};
use crate::logging::{parse_level, LogConfig, LoggingSystem};
use anyhow::{Context, Result};
use log::LevelFilter;
use tracing::info;

/// 应用程序入口：初始化日志并执行命令
pub async fn run(args: Args) -> Result<()> {
    let log_config = LogConfig {
        level: resolve_log_level(&args).await,
        json_format: args.json_logs,
        ..LogConfig::default()
    };
    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("{} v{} 启动", crate::APP_NAME, crate::VERSION);

    execute_command(&args).await
}

/// 命令行参数优先，其次为配置文件中的级别
async fn resolve_log_level(args: &Args) -> LevelFilter {
    if let Some(level) = args.log_level {
        return level.into();
    }
    match load_config(args).await {
        Ok(config) => parse_level(&config.global.log_level),
        // 配置错误由命令本身报告
        Err(_) => LevelFilter::Info,
    }
}

/// 执行CLI命令
pub async fn execute_command(args: &Args) -> Result<()> {
    let command: &dyn Command = match &args.command {
        Commands::Serve { .. } => &ServeCommand,
        Commands::Watch { .. } => &WatchCommand,
        Commands::Check { .. } => &CheckCommand,
        Commands::Validate { .. } => &ValidateCommand,
    };

    command.execute(args).await.map_err(anyhow::Error::from)
}
