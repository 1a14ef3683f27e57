//! 内存站点表
//!
//! 进程内的站点存储，重启后不保留

use super::{NewSite, Site, SiteId, SiteStore};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Inner {
    sites: BTreeMap<SiteId, Site>,
    /// 名称索引
    names: HashSet<String>,
    /// URL索引
    urls: HashSet<String>,
    next_id: SiteId,
}

/// 基于 BTreeMap 的站点存储，ID 自增且按升序遍历
#[derive(Debug, Default)]
pub struct MemorySiteStore {
    inner: RwLock<Inner>,
}

impl MemorySiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 批量导入站点，遇到重复项直接返回错误
    pub async fn seed(&self, sites: Vec<NewSite>) -> Result<Vec<SiteId>, StoreError> {
        let mut ids = Vec::with_capacity(sites.len());
        for site in sites {
            ids.push(self.add_site(site).await?);
        }
        Ok(ids)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sites.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sites.is_empty()
    }
}

#[async_trait]
impl SiteStore for MemorySiteStore {
    async fn add_site(&self, site: NewSite) -> Result<SiteId, StoreError> {
        site.validate()?;

        let mut inner = self.inner.write().await;
        if inner.names.contains(&site.name) {
            return Err(StoreError::Duplicate {
                field: "name",
                value: site.name,
            });
        }
        if inner.urls.contains(&site.url) {
            return Err(StoreError::Duplicate {
                field: "url",
                value: site.url,
            });
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.names.insert(site.name.clone());
        inner.urls.insert(site.url.clone());
        inner.sites.insert(
            id,
            Site {
                id,
                name: site.name,
                url: site.url,
                interval_seconds: site.interval_seconds,
                status_code: None,
                last_checked_at: None,
                date_added: Utc::now(),
            },
        );

        info!("添加站点: id={}", id);
        Ok(id)
    }

    async fn list_sites(&self) -> Result<Vec<Site>, StoreError> {
        let inner = self.inner.read().await;
        debug!("列出站点，共 {} 个", inner.sites.len());
        Ok(inner.sites.values().cloned().collect())
    }

    async fn get_site(&self, id: SiteId) -> Result<Site, StoreError> {
        self.inner
            .read()
            .await
            .sites
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn delete_site(&self, id: SiteId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let site = inner.sites.remove(&id).ok_or(StoreError::NotFound(id))?;
        inner.names.remove(&site.name);
        inner.urls.remove(&site.url);
        info!("删除站点: id={}", id);
        Ok(())
    }
}
