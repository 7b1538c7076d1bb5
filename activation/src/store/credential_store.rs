//! 激活凭据存储
//!
//! 许可证和云同步配置只在激活成功时返回一次，
//! 会话结束前必须写入这里，否则只能走重新生成许可证流程。

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

use super::{read_optional, write_atomically};
use crate::error::{ClientError, Result};
use crate::models::IssuedCredentials;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 持久化凭据，同一展台的旧凭据会被覆盖
    async fn save(&self, credentials: &IssuedCredentials) -> Result<()>;

    async fn load(&self, booth_id: &str) -> Result<Option<IssuedCredentials>>;
}

/// 每个展台一个 JSON 文件，权限 0600
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, booth_id: &str) -> Result<PathBuf> {
        let valid = !booth_id.is_empty()
            && booth_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ClientError::Store(format!("展台 ID 不能用作文件名: {:?}", booth_id)));
        }
        Ok(self.dir.join(format!("{}.json", booth_id)))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn save(&self, credentials: &IssuedCredentials) -> Result<()> {
        let path = self.path_for(&credentials.booth_id)?;
        let json = serde_json::to_vec_pretty(credentials)
            .map_err(|e| ClientError::Store(format!("序列化凭据失败: {}", e)))?;
        write_atomically(&path, &json).await?;
        info!(
            "[CredentialStore] 凭据已保存: booth={}, path={}",
            credentials.booth_id,
            path.display()
        );
        Ok(())
    }

    async fn load(&self, booth_id: &str) -> Result<Option<IssuedCredentials>> {
        let path = self.path_for(booth_id)?;
        let Some(bytes) = read_optional(&path).await? else {
            debug!("[CredentialStore] 未找到凭据: booth={}", booth_id);
            return Ok(None);
        };
        let credentials = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Store(format!("凭据文件损坏 {}: {}", path.display(), e)))?;
        Ok(Some(credentials))
    }
}

/// 内存实现
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, IssuedCredentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn save(&self, credentials: &IssuedCredentials) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ClientError::Store("凭据锁已损坏".to_string()))?;
        entries.insert(credentials.booth_id.clone(), credentials.clone());
        Ok(())
    }

    async fn load(&self, booth_id: &str) -> Result<Option<IssuedCredentials>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ClientError::Store("凭据锁已损坏".to_string()))?;
        Ok(entries.get(booth_id).cloned())
    }
}
