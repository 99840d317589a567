//! 批次来源
//!
//! 轮询时提供"当前可处理的批次 ID 列表"

use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::services::photo_importer::get_json;
use crate::workflow::BatchSource;

/// 从批次 API 拉取已就绪的批次
pub struct HttpBatchSource {
    client: reqwest::Client,
    api_base_url: String,
    token: String,
}

impl HttpBatchSource {
    pub fn new(api_base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.into(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.batch_api_base_url, &config.batch_api_token)
    }

    async fn fetch(&self) -> AppResult<Vec<String>> {
        let url = format!(
            "{}/batches?status=ready",
            self.api_base_url.trim_end_matches('/')
        );
        let body = get_json(&self.client, &url, &self.token).await?;
        parse_batch_ids(&body).map_err(|message| {
            AppError::Api(ApiError::UnexpectedShape {
                endpoint: url,
                message,
            })
        })
    }
}

impl BatchSource for HttpBatchSource {
    async fn fetch_batches(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.fetch().await?)
    }
}

/// 解析批次列表
///
/// 支持两种格式：
/// - `["b1", "b2"]`
/// - `{"batches": [{"id": "b1"}, {"batch_id": "b2"}]}`
pub fn parse_batch_ids(body: &JsonValue) -> Result<Vec<String>, String> {
    let items = match body {
        JsonValue::Array(items) => items,
        JsonValue::Object(map) => match map.get("batches") {
            Some(JsonValue::Array(items)) => items,
            _ => return Err("missing `batches` array".to_string()),
        },
        _ => return Err("expected an array or an object".to_string()),
    };

    items
        .iter()
        .map(|item| match item {
            JsonValue::String(id) => Ok(id.clone()),
            JsonValue::Object(obj) => obj
                .get("id")
                .or_else(|| obj.get("batch_id"))
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .ok_or_else(|| "batch entry without id".to_string()),
            other => Err(format!("unexpected batch entry: {}", other)),
        })
        .collect()
}

/// 固定的批次列表（本地调试 / 测试用）
#[derive(Debug, Clone, Default)]
pub struct StaticBatchSource {
    batches: Vec<String>,
}

impl StaticBatchSource {
    pub fn new<S: Into<String>>(batches: impl IntoIterator<Item = S>) -> Self {
        Self {
            batches: batches.into_iter().map(Into::into).collect(),
        }
    }
}

impl BatchSource for StaticBatchSource {
    async fn fetch_batches(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.batches.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_array() {
        assert_eq!(
            parse_batch_ids(&json!(["b1", "b2"])).unwrap(),
            vec!["b1".to_string(), "b2".to_string()]
        );
    }

    #[test]
    fn test_parse_wrapped_objects() {
        let body = json!({"batches": [{"id": "b1"}, {"batch_id": "b2", "status": "ready"}]});
        assert_eq!(
            parse_batch_ids(&body).unwrap(),
            vec!["b1".to_string(), "b2".to_string()]
        );
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(parse_batch_ids(&json!({"items": []})).is_err());
        assert!(parse_batch_ids(&json!([{"name": "x"}])).is_err());
        assert!(parse_batch_ids(&json!(42)).is_err());
    }

    #[tokio::test]
    async fn test_static_source_keeps_order() {
        let source = StaticBatchSource::new(["b3", "b1", "b2"]);
        assert_eq!(
            source.fetch_batches().await.unwrap(),
            vec!["b3".to_string(), "b1".to_string(), "b2".to_string()]
        );
    }
}
