//! CSV站点文件加载器
//!
//! 每行一个站点：`name,intervalSeconds`。名称即探测地址，
//! 未带协议时补全为 `http://`。空行和 `#` 开头的行会被忽略。

use super::NewSite;
use crate::error::StoreError;
use std::path::Path;
use tracing::{debug, info};

/// CSV站点文件加载器
#[derive(Debug, Clone)]
pub struct CsvSiteLoader {
    /// 未指定协议时补全的前缀
    default_scheme: String,
}

impl Default for CsvSiteLoader {
    fn default() -> Self {
        Self {
            default_scheme: "http".to_string(),
        }
    }
}

impl CsvSiteLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从文件加载站点
    pub async fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<NewSite>, StoreError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;

        let sites = self.parse(&content)?;
        info!("从 {} 加载了 {} 个站点", path.display(), sites.len());
        Ok(sites)
    }

    /// 解析CSV内容
    pub fn parse(&self, content: &str) -> Result<Vec<NewSite>, StoreError> {
        let mut sites = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let site = self.parse_line(line, line_no)?;
            debug!("解析站点: {} ({}s)", site.url, site.interval_seconds);
            sites.push(site);
        }

        Ok(sites)
    }

    fn parse_line(&self, line: &str, line_no: usize) -> Result<NewSite, StoreError> {
        let malformed = |reason: String| StoreError::Malformed {
            line: line_no,
            reason,
        };

        let mut fields = line.split(',').map(str::trim);
        let name = fields
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("缺少站点名称".to_string()))?;
        let interval = fields
            .next()
            .ok_or_else(|| malformed("缺少检测间隔".to_string()))?;
        if fields.next().is_some() {
            return Err(malformed("字段过多，应为 name,intervalSeconds".to_string()));
        }

        let interval_seconds: u64 = interval
            .parse()
            .map_err(|_| malformed(format!("检测间隔不是有效整数: {interval}")))?;

        let url = if name.contains("://") {
            name.to_string()
        } else {
            format!("{}://{}", self.default_scheme, name)
        };

        let site = NewSite::new(name, url, interval_seconds);
        site.validate().map_err(|e| malformed(e.to_string()))?;
        Ok(site)
    }
}
