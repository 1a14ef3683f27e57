//! 站点登记表
//!
//! 记录当前有活跃 Poller 的站点，保证每个站点最多只有一个 Poller。

use crate::store::SiteId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// 并发安全的站点集合
#[derive(Debug, Default)]
pub struct SiteRegistry {
    active: Mutex<HashSet<SiteId>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> MutexGuard<'_, HashSet<SiteId>> {
        // 持锁期间不会 panic，中毒时数据仍然一致
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 尝试登记站点
    ///
    /// # 返回
    /// * `bool` - 插入成功返回 true；已有 Poller 时返回 false
    pub fn try_claim(&self, id: SiteId) -> bool {
        let inserted = self.active().insert(id);
        debug!("登记站点 {}: {}", id, inserted);
        inserted
    }

    /// 释放站点登记
    pub fn release(&self, id: SiteId) {
        if self.active().remove(&id) {
            debug!("释放站点 {}", id);
        }
    }

    /// 登记站点并返回守卫，守卫销毁时自动释放
    pub fn claim(self: &Arc<Self>, id: SiteId) -> Option<SiteClaim> {
        self.try_claim(id).then(|| SiteClaim {
            registry: Arc::clone(self),
            id,
        })
    }

    pub fn contains(&self, id: SiteId) -> bool {
        self.active().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active().is_empty()
    }

    /// 当前活跃站点ID（升序）
    pub fn active_ids(&self) -> Vec<SiteId> {
        let mut ids: Vec<SiteId> = self.active().iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// 站点登记守卫
///
/// 由 Poller 任务持有；任务无论以何种方式结束（包括被中止），
/// 登记都只会被释放一次。
#[derive(Debug)]
pub struct SiteClaim {
    registry: Arc<SiteRegistry>,
    id: SiteId,
}

impl SiteClaim {
    pub fn site_id(&self) -> SiteId {
        self.id
    }
}

impl Drop for SiteClaim {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
