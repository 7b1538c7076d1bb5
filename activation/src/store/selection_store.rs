//! 当前选中展台的持久化
//!
//! 启动时读取（hydrate），用户选择展台或激活成功时写入。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::{read_optional, write_atomically};
use crate::error::{ClientError, Result};

#[async_trait]
pub trait SelectionStore: Send + Sync {
    /// 读取上次选中的展台
    async fn load(&self) -> Result<Option<String>>;

    /// 写入选中的展台，`None` 表示清除
    async fn save(&self, booth_id: Option<&str>) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SelectionFile {
    booth_id: Option<String>,
    updated_at: DateTime<Utc>,
}

/// 基于 JSON 文件的实现
#[derive(Debug, Clone)]
pub struct FileSelectionStore {
    path: PathBuf,
}

impl FileSelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SelectionStore for FileSelectionStore {
    async fn load(&self) -> Result<Option<String>> {
        let Some(bytes) = read_optional(&self.path).await? else {
            debug!("[SelectionStore] 尚未保存过选中展台: {}", self.path.display());
            return Ok(None);
        };

        match serde_json::from_slice::<SelectionFile>(&bytes) {
            Ok(file) => {
                debug!("[SelectionStore] 读取选中展台: {:?}", file.booth_id);
                Ok(file.booth_id)
            }
            Err(e) => {
                // 损坏的选择文件不影响激活流程，当作未选择
                warn!(
                    "[SelectionStore] 选择文件无法解析，已忽略: {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, booth_id: Option<&str>) -> Result<()> {
        let file = SelectionFile {
            booth_id: booth_id.map(str::to_string),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| ClientError::Store(format!("序列化选中展台失败: {}", e)))?;
        write_atomically(&self.path, &json).await?;
        debug!("[SelectionStore] 保存选中展台: {:?}", booth_id);
        Ok(())
    }
}

/// 内存实现，不跨进程保存
#[derive(Debug, Default)]
pub struct MemorySelectionStore {
    booth_id: Mutex<Option<String>>,
}

impl MemorySelectionStore {
    pub fn new(booth_id: Option<&str>) -> Self {
        Self {
            booth_id: Mutex::new(booth_id.map(str::to_string)),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.booth_id
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SelectionStore for MemorySelectionStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.current())
    }

    async fn save(&self, booth_id: Option<&str>) -> Result<()> {
        let mut guard = self
            .booth_id
            .lock()
            .map_err(|_| ClientError::Store("选中展台锁已损坏".to_string()))?;
        *guard = booth_id.map(str::to_string);
        Ok(())
    }
}
