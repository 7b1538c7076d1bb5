use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 后端 API 基础地址（不带结尾的 `/`）
    pub api_url: String,
    /// Bearer Token（可选，登录流程不在本模块内）
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    /// 单次请求超时时间（毫秒）
    pub request_timeout_ms: u64,
    /// 本地数据目录（选中展台、激活凭据）
    pub data_dir: PathBuf,
    /// 日志级别
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api/v1".to_string(),
            api_token: None,
            request_timeout_ms: 30000,
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源加载配置，缺失或无法解析的项使用默认值
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            api_url: lookup("BOOTHFLEET_API_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            api_token: lookup("BOOTHFLEET_API_TOKEN").filter(|s| !s.is_empty()),
            request_timeout_ms: lookup("BOOTHFLEET_REQUEST_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.request_timeout_ms), // 默认 30 秒
            data_dir: lookup("BOOTHFLEET_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 选中展台的持久化文件
    pub fn selection_path(&self) -> PathBuf {
        self.data_dir.join("selection.json")
    }

    /// 激活凭据目录
    pub fn credentials_dir(&self) -> PathBuf {
        self.data_dir.join("credentials")
    }
}
