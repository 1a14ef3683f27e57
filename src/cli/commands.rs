//! 命令处理逻辑
//!
//! 实现各个CLI子命令

use crate::cli::args::{Args, Commands};
use crate::config::{validate_config, Config, ConfigLoader, TomlConfigLoader};
use crate::core::service::{MonitorService, ServiceLauncher};
use crate::error::{ConfigError, MonitorError, Result};
use crate::health::{FailurePolicy, HealthChecker, PollResult, ResultSink, TableSink};
use crate::store::{CsvSiteLoader, MemorySiteStore, Site};
use crate::web::WebServer;
use async_trait::async_trait;
use std::future;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 加载配置
///
/// 显式指定的配置文件必须存在；使用默认路径时文件不存在则使用默认配置。
pub async fn load_config(args: &Args) -> Result<Config> {
    let loader = TomlConfigLoader::new(true);
    let path = args.get_config_path();
    if args.has_explicit_config() {
        loader.load_from_file(&path).await
    } else {
        loader.load_or_default(&path).await
    }
}

/// 启动监控服务和Web界面
pub struct ServeCommand;

#[async_trait]
impl Command for ServeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Serve {
            bind,
            port,
            failure_policy,
            sites_file,
            no_web,
        } = &args.command
        else {
            return Ok(());
        };

        let mut config = load_config(args).await?;
        if let Some(bind) = bind {
            config.web.bind_address = bind.clone();
        }
        if let Some(port) = port {
            config.web.port = *port;
        }
        if let Some(policy) = failure_policy {
            config.global.failure_policy = (*policy).into();
        }
        if *no_web {
            config.web.enabled = false;
        }
        validate_config(&config).map_err(ConfigError::ValidationError)?;

        let store = ServiceLauncher::build_store(&config, sites_file.as_deref()).await?;
        let service = MonitorService::start(&config.global, store, Vec::new())?;
        service.handle().spawn_reconcile();

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut web_handle = if config.web.enabled {
            let server = WebServer::new(config.web.clone(), service.handle().clone());
            let mut shutdown_rx = shutdown_tx.subscribe();
            Some(tokio::spawn(server.start(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })))
        } else {
            info!("Web界面已禁用");
            None
        };

        let web_exit = async {
            match web_handle.as_mut() {
                Some(handle) => handle.await,
                None => future::pending().await,
            }
        };

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("收到中断信号，正在停止服务...");
            }
            joined = web_exit => {
                // Web服务器提前退出（例如端口被占用）
                service.shutdown().await;
                return match joined {
                    Ok(result) => result,
                    Err(e) => Err(MonitorError::Other(anyhow::anyhow!("Web服务器任务异常: {}", e))),
                };
            }
        }

        let _ = shutdown_tx.send(());
        if let Some(handle) = web_handle {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Web服务器停止时出错: {}", e),
                Err(e) => error!("Web服务器任务异常: {}", e),
            }
        }

        match service.shutdown().await {
            Some(count) => info!("服务已停止，共处理 {} 条结果", count),
            None => warn!("服务已停止，部分结果可能未处理"),
        }
        Ok(())
    }
}

/// 监控CSV文件中的站点并以表格输出结果
pub struct WatchCommand;

#[async_trait]
impl Command for WatchCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Watch {
            sites_file,
            keep_polling,
        } = &args.command
        else {
            return Ok(());
        };

        let mut config = load_config(args).await?;
        if *keep_polling {
            config.global.failure_policy = FailurePolicy::KeepPolling;
        }

        let sites = CsvSiteLoader::new().load_from_file(sites_file).await?;
        let store = Arc::new(MemorySiteStore::new());
        store.seed(sites).await?;

        let table: Arc<dyn ResultSink> = Arc::new(TableSink::stdout());
        let service = MonitorService::start(&config.global, store, vec![table])?;
        let handle = service.handle().clone();

        tokio::select! {
            report = handle.reconcile() => {
                let report = report?;
                info!(
                    "所有 Poller 已结束: 启动 {} 个，无效 {} 个",
                    report.started.len(),
                    report.invalid.len()
                );
            }
            result = signal::ctrl_c() => {
                result?;
                info!("收到中断信号，正在停止...");
            }
        }

        drop(handle);
        service.shutdown().await;
        Ok(())
    }
}

/// 对URL执行一次性探测
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Check {
            urls,
            timeout,
            json,
        } = &args.command
        else {
            return Ok(());
        };

        let config = load_config(args).await?;
        let mut global = config.global;
        if let Some(timeout) = timeout {
            global.request_timeout_seconds = *timeout;
        }

        let checker = ServiceLauncher::build_checker(&global)?;
        let results = Self::probe_all(&checker, urls).await;

        if *json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            println!("{}", TableSink::header());
            for result in &results {
                println!("{}", TableSink::format_row(result));
            }
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            return Err(MonitorError::Other(anyhow::anyhow!(
                "{} 个URL探测失败",
                failed
            )));
        }
        Ok(())
    }
}

impl CheckCommand {
    /// 并发探测所有URL，结果顺序与输入一致
    pub async fn probe_all(checker: &dyn HealthChecker, urls: &[String]) -> Vec<PollResult> {
        let outcomes = checker.check_batch(urls).await;
        urls.iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (url, outcome))| {
                let site = Site::new(index as i64 + 1, url, url, 0);
                PollResult::from_outcome(&site, outcome)
            })
            .collect()
    }
}

/// 验证配置文件
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Validate { verbose } = &args.command else {
            return Ok(());
        };

        let config_path = args.get_config_path();
        println!("验证配置文件: {}", config_path.display());

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(&config_path).await?;

        let csv_sites = match &config.global.sites_file {
            Some(path) => Some(CsvSiteLoader::new().load_from_file(path).await?),
            None => None,
        };

        println!("✓ 配置文件验证通过");
        println!("✓ 找到 {} 个站点配置", config.sites.len());
        if let Some(sites) = &csv_sites {
            println!("✓ CSV站点文件包含 {} 个站点", sites.len());
        }

        if *verbose {
            println!("全局配置:");
            println!("  日志级别: {}", config.global.log_level);
            println!("  请求超时: {}秒", config.global.request_timeout_seconds);
            println!("  请求方法: {}", config.global.http_method);
            println!("  结果通道容量: {}", config.global.result_channel_capacity);
            println!("  失败策略: {:?}", config.global.failure_policy);
            if config.web.enabled {
                println!(
                    "  Web界面: http://{}:{}",
                    config.web.bind_address, config.web.port
                );
            } else {
                println!("  Web界面: 已禁用");
            }

            println!("站点配置:");
            for (i, site) in config.sites.iter().enumerate() {
                println!(
                    "  {}. {} ({}) 每 {} 秒",
                    i + 1,
                    site.name,
                    site.url,
                    site.interval_seconds
                );
            }
        }

        Ok(())
    }
}
