//! 本地持久化
//!
//! 激活流程只通过这两个 trait 读写本地状态，宿主可以注入任意实现。

mod credential_store;
mod selection_store;

pub use credential_store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use selection_store::{FileSelectionStore, MemorySelectionStore, SelectionStore};

use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::error::{ClientError, Result};

/// 先写临时文件再重命名，避免写入中断留下半个文件
pub(crate) async fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ClientError::Store(format!("创建目录 {} 失败: {}", parent.display(), e)))?;
    }

    let tmp = path.with_extension("json.tmp");
    let mut file = open_private(&tmp)
        .await
        .map_err(|e| ClientError::Store(format!("写入 {} 失败: {}", tmp.display(), e)))?;
    file.write_all(contents)
        .await
        .map_err(|e| ClientError::Store(format!("写入 {} 失败: {}", tmp.display(), e)))?;
    file.sync_all()
        .await
        .map_err(|e| ClientError::Store(format!("同步 {} 失败: {}", tmp.display(), e)))?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| ClientError::Store(format!("重命名 {} 失败: {}", path.display(), e)))
}

#[cfg(unix)]
async fn open_private(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await
}

#[cfg(not(unix))]
async fn open_private(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::File::create(path).await
}

/// 读取文件，不存在时返回 `None`
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ClientError::Store(format!("读取 {} 失败: {}", path.display(), e))),
    }
}
