//! 站点存储模块
//!
//! 提供站点定义的来源：内存站点表和CSV站点文件。
//! 调度核心只读取这里产生的站点列表，从不修改站点记录。

pub mod csv;
pub mod memory;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::csv::CsvSiteLoader;
pub use memory::MemorySiteStore;

/// 站点ID
pub type SiteId = i64;

/// 被监控的站点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// 站点ID
    pub id: SiteId,
    /// 站点名称
    pub name: String,
    /// 站点URL
    pub url: String,
    /// 检测间隔（秒）
    pub interval_seconds: u64,
    /// 最近一次观测到的状态码
    pub status_code: Option<i32>,
    /// 最近一次检测时间
    pub last_checked_at: Option<DateTime<Utc>>,
    /// 添加时间
    pub date_added: DateTime<Utc>,
}

impl Site {
    pub fn new(id: SiteId, name: &str, url: &str, interval_seconds: u64) -> Self {
        Self {
            id,
            name: name.to_string(),
            url: url.to_string(),
            interval_seconds,
            status_code: None,
            last_checked_at: None,
            date_added: Utc::now(),
        }
    }

    /// 间隔是否有效
    pub fn has_valid_interval(&self) -> bool {
        self.interval_seconds > 0
    }
}

/// 待插入的站点（尚未分配ID）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSite {
    pub name: String,
    pub url: String,
    pub interval_seconds: u64,
}

impl NewSite {
    pub fn new(name: impl Into<String>, url: impl Into<String>, interval_seconds: u64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            interval_seconds,
        }
    }

    /// 校验站点数据：名称非空、URL为http(s)、间隔大于0
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Invalid("站点名称不能为空".to_string()));
        }

        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| StoreError::Invalid(format!("站点 {} 的URL无效: {}", self.name, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(StoreError::Invalid(format!(
                "站点 {} 的URL必须使用 http 或 https",
                self.name
            )));
        }

        if self.interval_seconds == 0 {
            return Err(StoreError::Invalid(format!(
                "站点 {} 的检测间隔不能为0",
                self.name
            )));
        }

        Ok(())
    }
}

/// 站点存储trait
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// 插入站点，返回分配的ID
    async fn add_site(&self, site: NewSite) -> Result<SiteId, StoreError>;

    /// 按ID升序列出全部站点
    async fn list_sites(&self) -> Result<Vec<Site>, StoreError>;

    /// 获取单个站点
    async fn get_site(&self, id: SiteId) -> Result<Site, StoreError>;

    /// 删除站点
    async fn delete_site(&self, id: SiteId) -> Result<(), StoreError>;
}
