//! Dolphin Anty 指纹浏览器配置文件控制
//!
//! 通过本地 API 启动 / 停止配置文件，并等待浏览器就绪

use reqwest::header::ACCEPT;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, BrowserError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(2);

/// 已启动的配置文件
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSession {
    pub profile_id: String,
    pub status: String,
    /// 自动化连接信息（只保留对象形式）
    pub connection: Option<JsonValue>,
}

impl ProfileSession {
    /// 连接信息中的 websocket 地址
    pub fn ws_endpoint(&self) -> Option<&str> {
        let connection = self.connection.as_ref()?;
        ["wsEndpoint", "ws_endpoint", "browserWSEndpoint"]
            .iter()
            .find_map(|key| connection.get(*key).and_then(JsonValue::as_str))
    }

    /// 连接信息中的调试端口
    pub fn port(&self) -> Option<u16> {
        self.connection
            .as_ref()?
            .get("port")
            .and_then(JsonValue::as_u64)
            .and_then(|port| u16::try_from(port).ok())
    }
}

/// Dolphin 本地 API 客户端
pub struct DolphinClient {
    client: reqwest::Client,
    base_url: String,
    healthcheck_timeout: Duration,
}

impl DolphinClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            healthcheck_timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.dolphin_base_url)
            .with_healthcheck_timeout(Duration::from_secs(config.healthcheck_timeout_secs))
    }

    pub fn with_healthcheck_timeout(mut self, timeout: Duration) -> Self {
        self.healthcheck_timeout = timeout;
        self
    }

    /// 启动配置文件并等待健康检查通过
    pub async fn start_profile(&self, profile_id: &str) -> AppResult<ProfileSession> {
        info!("🐬 启动 Dolphin 配置文件: {}", profile_id);
        let response = self.post("profile/start", profile_id).await?;
        let session = session_from_response(profile_id, &response);

        if !self
            .wait_for_healthcheck(profile_id, self.healthcheck_timeout, HEALTHCHECK_INTERVAL)
            .await
        {
            return Err(AppError::Browser(BrowserError::HealthcheckTimeout {
                profile_id: profile_id.to_string(),
                timeout_secs: self.healthcheck_timeout.as_secs(),
            }));
        }

        info!("✅ 配置文件已就绪: {}", profile_id);
        Ok(session)
    }

    pub async fn stop_profile(&self, profile_id: &str) -> AppResult<()> {
        info!("🛑 停止 Dolphin 配置文件: {}", profile_id);
        self.post("profile/stop", profile_id).await?;
        Ok(())
    }

    /// 浏览器是否存活
    pub async fn healthcheck(&self, profile_id: &str) -> AppResult<bool> {
        let response = self.post("profile/healthcheck", profile_id).await?;
        Ok(is_alive(&response))
    }

    /// 轮询健康检查直到通过或超时
    pub async fn wait_for_healthcheck(
        &self,
        profile_id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match self.healthcheck(profile_id).await {
                Ok(true) => return true,
                Ok(false) => debug!("配置文件 {} 尚未就绪", profile_id),
                Err(e) => warn!("健康检查失败: {}", e),
            }
            sleep(interval).await;
        }
        false
    }

    async fn post(&self, path: &str, profile_id: &str) -> AppResult<JsonValue> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .header(ACCEPT, "application/json")
            .json(&json!({ "profile_id": profile_id }))
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&url, e))?;

        if !response.status().is_success() {
            return Err(AppError::Api(ApiError::BadResponse {
                endpoint: url,
                status: response.status().as_u16(),
            }));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(&url, e))?;
        if body.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&body).map_err(|e| AppError::api_json_failed(&url, e))
    }
}

/// `alive` 为真或 `status == "ok"` 视为存活
pub fn is_alive(response: &JsonValue) -> bool {
    response
        .get("alive")
        .and_then(JsonValue::as_bool)
        .unwrap_or(false)
        || response.get("status").and_then(JsonValue::as_str) == Some("ok")
}

/// 连接信息优先取 `automation`，其次 `ws`，最后是整个响应
pub fn session_from_response(profile_id: &str, response: &JsonValue) -> ProfileSession {
    let connection = response
        .get("automation")
        .filter(|v| !v.is_null())
        .or_else(|| response.get("ws").filter(|v| !v.is_null()))
        .unwrap_or(response);

    ProfileSession {
        profile_id: profile_id.to_string(),
        status: "STARTED".to_string(),
        connection: connection.is_object().then(|| connection.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_alive() {
        assert!(is_alive(&json!({"alive": true})));
        assert!(is_alive(&json!({"status": "ok"})));
        assert!(!is_alive(&json!({"alive": false, "status": "starting"})));
        assert!(!is_alive(&json!({})));
    }

    #[test]
    fn test_session_prefers_automation() {
        let response = json!({
            "success": true,
            "automation": {"port": 50123, "wsEndpoint": "/devtools/browser/abc"}
        });
        let session = session_from_response("p1", &response);
        assert_eq!(session.status, "STARTED");
        assert_eq!(session.port(), Some(50123));
        assert_eq!(session.ws_endpoint(), Some("/devtools/browser/abc"));
    }

    #[test]
    fn test_session_falls_back_to_body() {
        let session = session_from_response("p1", &json!({"port": 9222}));
        assert_eq!(session.port(), Some(9222));

        let session = session_from_response("p1", &json!({"ws": "ws://localhost/x"}));
        assert!(session.connection.is_none());
    }

    #[tokio::test]
    #[ignore] // 需要本地运行 Dolphin Anty
    async fn test_healthcheck_against_local_api() {
        let client = DolphinClient::new("http://localhost:3001");
        let result = client.healthcheck("test-profile").await;
        println!("healthcheck: {:?}", result);
    }
}
