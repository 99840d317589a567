//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"导航 / 执行 JS / 上传文件 / 截图"能力

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{AppError, AppResult, BrowserError};

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 不认识 Card / 表单字段
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 导航到指定 URL 并等待加载
    pub async fn goto(&self, url: &str) -> AppResult<()> {
        self.page.goto(url).await.map_err(|e| {
            AppError::Browser(BrowserError::NavigationFailed {
                url: url.to_string(),
                source: Box::new(e),
            })
        })?;
        Ok(())
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        result.into_value().map_err(script_failed)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        decode_script_value(json_value)
    }

    /// 给 `<input type=file>` 设置本地文件
    pub async fn set_input_files(&self, selector: &str, files: &[String]) -> AppResult<()> {
        let element = self.page.find_element(selector).await?;
        let mut params = SetFileInputFilesParams::new(files.to_vec());
        params.backend_node_id = Some(element.backend_node_id);
        self.page.execute(params).await?;
        Ok(())
    }

    /// 整页截图并保存为 PNG
    pub async fn screenshot(&self, output: &Path) -> AppResult<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::file_write_failed(output.to_string_lossy(), e))?;
        }
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, output)
            .await
            .map_err(|e| {
                AppError::Browser(BrowserError::ScreenshotFailed {
                    source: Box::new(e),
                })
            })?;
        Ok(())
    }
}

/// 把脚本返回值反序列化为指定类型
pub fn decode_script_value<T: DeserializeOwned>(value: JsonValue) -> AppResult<T> {
    serde_json::from_value(value).map_err(script_failed)
}

fn script_failed(source: serde_json::Error) -> AppError {
    AppError::Browser(BrowserError::ScriptExecutionFailed {
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        status: String,
    }

    #[test]
    fn test_decode_script_value() {
        let reply: Reply = decode_script_value(json!({"status": "posted"})).unwrap();
        assert_eq!(reply.status, "posted");
    }

    #[test]
    fn test_decode_mismatch_is_script_error() {
        let result = decode_script_value::<Reply>(json!([1, 2, 3]));
        assert!(matches!(
            result,
            Err(AppError::Browser(BrowserError::ScriptExecutionFailed { .. }))
        ));
    }
}
