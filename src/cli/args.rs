//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::health::FailurePolicy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Downtime Monitor - 按站点间隔轮询的可用性监控工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "downtime-monitor",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "DOWNTIME_MONITOR_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的级别
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "DOWNTIME_MONITOR_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志")]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// 失败策略参数
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum PolicyArg {
    /// 首次失败后停止该站点的轮询
    Stop,
    /// 失败后继续轮询
    Keep,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Stop => FailurePolicy::StopOnFailure,
            PolicyArg::Keep => FailurePolicy::KeepPolling,
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动监控服务和Web界面
    Serve {
        /// 绑定地址
        #[arg(long, value_name = "ADDR", help = "Web服务器绑定地址")]
        bind: Option<String>,

        /// 监听端口
        #[arg(short, long, value_name = "PORT", help = "Web服务器端口")]
        port: Option<u16>,

        /// 失败策略
        #[arg(long, value_enum, help = "探测失败后的处理策略")]
        failure_policy: Option<PolicyArg>,

        /// CSV站点文件
        #[arg(long, value_name = "FILE", help = "CSV站点文件（name,intervalSeconds）")]
        sites_file: Option<PathBuf>,

        /// 不启动Web界面
        #[arg(long, help = "不启动Web界面")]
        no_web: bool,
    },

    /// 监控CSV文件中的站点，把结果以表格输出到标准输出
    Watch {
        /// CSV站点文件
        #[arg(value_name = "CSV", help = "CSV站点文件（name,intervalSeconds）")]
        sites_file: PathBuf,

        /// 失败后继续轮询
        #[arg(short, long, help = "失败后继续轮询")]
        keep_polling: bool,
    },

    /// 对URL执行一次性探测
    Check {
        /// 目标URL
        #[arg(value_name = "URL", required = true, help = "目标URL")]
        urls: Vec<String>,

        /// 超时时间（秒）
        #[arg(short, long, value_name = "SECONDS", help = "超时时间（秒）")]
        timeout: Option<u64>,

        /// 以JSON格式输出
        #[arg(long, help = "以JSON格式输出")]
        json: bool,
    },

    /// 验证配置文件
    Validate {
        /// 显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },
}

impl Args {
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::get_default_config_path)
    }

    /// 是否显式指定了配置文件
    pub fn has_explicit_config(&self) -> bool {
        self.config.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let args = Args::try_parse_from([
            "downtime-monitor",
            "-c",
            "monitor.toml",
            "-l",
            "debug",
            "serve",
            "--port",
            "9000",
            "--failure-policy",
            "keep",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("monitor.toml")));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        match args.command {
            Commands::Serve {
                port,
                failure_policy,
                no_web,
                ..
            } => {
                assert_eq!(port, Some(9000));
                assert_eq!(failure_policy.map(FailurePolicy::from), Some(FailurePolicy::KeepPolling));
                assert!(!no_web);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_check_requires_url() {
        assert!(Args::try_parse_from(["downtime-monitor", "check"]).is_err());

        let args = Args::try_parse_from([
            "downtime-monitor",
            "check",
            "http://example.test/a",
            "http://example.test/b",
        ])
        .unwrap();
        match args.command {
            Commands::Check { urls, timeout, .. } => {
                assert_eq!(urls.len(), 2);
                assert_eq!(timeout, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_watch() {
        let args =
            Args::try_parse_from(["downtime-monitor", "watch", "sites.csv", "--keep-polling"])
                .unwrap();
        match args.command {
            Commands::Watch {
                sites_file,
                keep_polling,
            } => {
                assert_eq!(sites_file, PathBuf::from("sites.csv"));
                assert!(keep_polling);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(log::LevelFilter::from(LogLevel::Warn), log::LevelFilter::Warn);
    }
}
