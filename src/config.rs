use std::time::Duration;

use crate::error::{AppResult, ConfigError};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 两次轮询之间的间隔（分钟）
    pub interval_minutes: u64,
    /// 运行的轮询次数，None 表示一直运行
    pub cycles: Option<usize>,
    // --- 批次 / 照片 API 配置 ---
    pub batch_api_base_url: String,
    pub batch_api_token: String,
    /// 照片下载目录
    pub photo_output_dir: String,
    // --- 文案模板 ---
    pub templates_dir: String,
    pub default_template_id: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- Dolphin 指纹浏览器配置 ---
    pub dolphin_base_url: String,
    pub dolphin_profile_id: String,
    pub healthcheck_timeout_secs: u64,
    /// 浏览器调试端口（未从配置文件拿到 ws 地址时使用）
    pub browser_debug_port: u16,
    // --- 发布 ---
    pub post_form_url: String,
    pub screenshot_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_minutes: 10,
            cycles: None,
            batch_api_base_url: "http://localhost:8080/api".to_string(),
            batch_api_token: String::new(),
            photo_output_dir: "data".to_string(),
            templates_dir: "templates".to_string(),
            default_template_id: crate::models::DEFAULT_TEMPLATE_ID.to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            dolphin_base_url: "http://localhost:3001".to_string(),
            dolphin_profile_id: String::new(),
            healthcheck_timeout_secs: 60,
            browser_debug_port: 9222,
            post_form_url: "https://www.avito.ru/additem".to_string(),
            screenshot_dir: "screenshots".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            interval_minutes: env_parse("FLOW_INTERVAL_MINUTES").unwrap_or(default.interval_minutes),
            cycles: env_parse("FLOW_CYCLES").or(default.cycles),
            batch_api_base_url: std::env::var("BATCH_API_BASE_URL").unwrap_or(default.batch_api_base_url),
            batch_api_token: std::env::var("BATCH_API_TOKEN").unwrap_or(default.batch_api_token),
            photo_output_dir: std::env::var("PHOTO_OUTPUT_DIR").unwrap_or(default.photo_output_dir),
            templates_dir: std::env::var("TEMPLATES_DIR").unwrap_or(default.templates_dir),
            default_template_id: std::env::var("DEFAULT_TEMPLATE_ID").unwrap_or(default.default_template_id),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            dolphin_base_url: std::env::var("DOLPHIN_BASE_URL").unwrap_or(default.dolphin_base_url),
            dolphin_profile_id: std::env::var("DOLPHIN_PROFILE_ID").unwrap_or(default.dolphin_profile_id),
            healthcheck_timeout_secs: env_parse("HEALTHCHECK_TIMEOUT_SECS").unwrap_or(default.healthcheck_timeout_secs),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(default.browser_debug_port),
            post_form_url: std::env::var("POST_FORM_URL").unwrap_or(default.post_form_url),
            screenshot_dir: std::env::var("SCREENSHOT_DIR").unwrap_or(default.screenshot_dir),
        }
    }

    /// 轮询间隔
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    /// 检查运行所需的必填项
    pub fn validate(&self) -> AppResult<()> {
        if self.dolphin_profile_id.trim().is_empty() {
            return Err(ConfigError::EnvVarNotFound {
                var_name: "DOLPHIN_PROFILE_ID".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    parse_value(std::env::var(name).ok())
}

/// 无法解析的值视为未设置
fn parse_value<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|v| v.trim().parse().ok())
}
