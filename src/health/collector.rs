//! 结果收集器
//!
//! 消费所有 Poller 发布的结果并转发给各个输出端，
//! 不会对调度产生任何反向影响。

use crate::health::result::PollResult;
use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 结果输出端trait
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// 处理一条结果
    async fn handle(&self, result: &PollResult);
}

/// 结果收集器
pub struct ResultCollector {
    receiver: mpsc::Receiver<PollResult>,
}

impl ResultCollector {
    pub fn new(receiver: mpsc::Receiver<PollResult>) -> Self {
        Self { receiver }
    }

    /// 创建容量为 `capacity` 的结果通道和对应的收集器
    pub fn channel(capacity: usize) -> (mpsc::Sender<PollResult>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// 转换为惰性的结果流，所有发送端销毁后结束
    pub fn into_stream(self) -> impl Stream<Item = PollResult> {
        stream::unfold(self.receiver, |mut rx| async move {
            rx.recv().await.map(|result| (result, rx))
        })
    }

    /// 把每条结果依次交给所有输出端，直到通道关闭
    ///
    /// # 返回
    /// * `u64` - 处理的结果数量
    pub async fn run(mut self, sinks: Vec<Arc<dyn ResultSink>>) -> u64 {
        info!("结果收集器已启动，输出端数量: {}", sinks.len());
        let mut count = 0u64;

        while let Some(result) = self.receiver.recv().await {
            count += 1;
            debug!("收到站点 {} 的结果", result.site_id);
            for sink in &sinks {
                sink.handle(&result).await;
            }
        }

        info!("结果通道已关闭，共处理 {} 条结果", count);
        count
    }
}

/// 通过 tracing 输出结果
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl ResultSink for LogSink {
    async fn handle(&self, result: &PollResult) {
        if result.is_success() {
            info!(
                site_id = result.site_id,
                url = %result.url,
                status_code = result.status_code,
                response_time_ms = result.response_time_ms(),
                "站点正常"
            );
        } else {
            warn!(
                site_id = result.site_id,
                url = %result.url,
                status_code = result.status_code,
                error = %result.error_message().unwrap_or_default(),
                "站点异常"
            );
        }
    }
}

/// 以文本表格输出结果
pub struct TableSink {
    writer: Mutex<Box<dyn Write + Send>>,
    header_written: Mutex<bool>,
}

impl TableSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            header_written: Mutex::new(false),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// 表头
    pub fn header() -> String {
        format!(
            "{:<20} {:<6} {:<40} {:>6} {:>8}  {}",
            "TIME", "ID", "URL", "CODE", "MS", "STATUS"
        )
    }

    /// 格式化一行
    pub fn format_row(result: &PollResult) -> String {
        let status = match result.error_message() {
            Some(message) => format!("DOWN ({message})"),
            None => "UP".to_string(),
        };
        format!(
            "{:<20} {:<6} {:<40} {:>6} {:>8}  {}",
            result.observed_at.format("%Y-%m-%d %H:%M:%S"),
            result.site_id,
            truncate(&result.url, 40),
            result.status_code,
            result.response_time_ms(),
            status
        )
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('…');
        cut
    }
}

#[async_trait]
impl ResultSink for TableSink {
    async fn handle(&self, result: &PollResult) {
        let mut header_written = self
            .header_written
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut output = String::new();
        if !*header_written {
            output.push_str(&Self::header());
            output.push('\n');
            *header_written = true;
        }
        output.push_str(&Self::format_row(result));
        output.push('\n');

        if let Err(e) = writer.write_all(output.as_bytes()).and_then(|_| writer.flush()) {
            warn!("写入结果表格失败: {}", e);
        }
    }
}
