//! 后端 HTTP 客户端
//!
//! 负责 Bearer 认证、超时和非 2xx 响应的统一转换。
//! 不做自动重试，所有重试都由用户触发。

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::ApiErrorBody;

/// 后端 API 客户端
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// 根据配置创建客户端（带超时，禁用系统代理）
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ClientError::Config(format!("API Token 包含非法字符: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .no_proxy()
            .user_agent(concat!("boothfleet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                error!("[ApiClient] 创建 HTTP 客户端失败: {}", e);
                ClientError::Config(format!("创建 HTTP 客户端失败: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 发送请求，返回原始响应（不检查状态码）
    pub(crate) async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let url = self.url(path);
        debug!("[ApiClient] {} {}", method, url);

        let mut req = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            req = req.json(body);
        }

        req.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("[ApiClient] 请求超时: {} {}", method, path);
            } else if e.is_connect() {
                warn!("[ApiClient] 无法连接到后端: {}", e);
            } else {
                warn!("[ApiClient] 请求失败: {} {}: {}", method, path, e);
            }
            ClientError::Transport(e)
        })
    }

    /// 发送请求并把 2xx 响应解析为 `T`
    pub(crate) async fn request_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body).await?;
        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            return Err(http_error(status, &body));
        }
        decode_json(response).await
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json(Method::POST, path, Some(body)).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request_json::<(), T>(Method::GET, path, None).await
    }
}

/// 读取响应体并解析为 JSON
pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        warn!("[ApiClient] 响应解析失败: {}", e);
        ClientError::Decode(e.to_string())
    })
}

/// 解析错误响应体，非 JSON 时把原文作为 message
pub(crate) fn parse_error_body(bytes: &[u8]) -> ApiErrorBody {
    serde_json::from_slice(bytes).unwrap_or_else(|_| ApiErrorBody {
        message: Some(String::from_utf8_lossy(bytes).trim().to_string()).filter(|s| !s.is_empty()),
        ..Default::default()
    })
}

/// 读取错误响应体，读取失败时返回空结构
pub(crate) async fn read_error_body(response: Response) -> ApiErrorBody {
    match response.bytes().await {
        Ok(bytes) => parse_error_body(&bytes),
        Err(e) => {
            warn!("[ApiClient] 读取错误响应失败: {}", e);
            ApiErrorBody::default()
        }
    }
}

pub(crate) fn http_error(status: StatusCode, body: &ApiErrorBody) -> ClientError {
    let message = body
        .text()
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
    warn!("[ApiClient] 服务端返回错误: status={}, message={}", status, message);
    ClientError::Http { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>, timeout_ms: u64) -> ApiClient {
        let config = ClientConfig {
            api_url: format!("{}/", server.uri()),
            api_token: token.map(str::to_string),
            request_timeout_ms: timeout_ms,
            ..Default::default()
        };
        ApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("t0ken"), 5000);
        let body: Value = client.get_json("/ping").await.unwrap();
        assert_eq!(body["ok"], json!(true));
    }

    #[tokio::test]
    async fn non_success_status_becomes_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/things"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({ "detail": "maintenance" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None, 5000);
        let err = client
            .post_json::<_, Value>("/things", &json!({}))
            .await
            .unwrap_err();
        match &err {
            ClientError::Http { status, message } => {
                assert_eq!(*status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn plain_text_error_body_is_kept_as_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
            .mount(&server)
            .await;

        let client = client_for(&server, None, 5000);
        let err = client.get_json::<Value>("/things").await.unwrap_err();
        assert!(matches!(err, ClientError::Http { ref message, .. } if message == "no such thing"));
    }

    #[test]
    fn error_body_falls_back_to_raw_text() {
        let body = parse_error_body(br#"{"detail":"Not authenticated"}"#);
        assert_eq!(body.text(), Some("Not authenticated"));

        let body = parse_error_body(b"  upstream down \n");
        assert_eq!(body.text(), Some("upstream down"));
        assert!(body.error_code.is_none());

        assert_eq!(parse_error_body(b"").text(), None);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None, 50);
        let err = client.get_json::<Value>("/slow").await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn garbage_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, None, 5000);
        let err = client.get_json::<Value>("/things").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let config = ClientConfig {
            api_token: Some("bad\ntoken".to_string()),
            ..Default::default()
        };
        assert!(matches!(ApiClient::new(&config), Err(ClientError::Config(_))));
    }
}
