//! 文案生成服务 - 业务能力层
//!
//! 照片 + 模板 → LLM → 结构化 JSON，并校验结果是否可用。
//! LLM 调用失败、返回非 JSON、或校验不通过都算"需要人工处理"；
//! 模板缺失属于硬失败。

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, FileError};
use crate::models::{load_template, ListingTemplate};
use crate::services::llm_service::Responder;
use crate::services::photo_importer::detect_image_kind;
use crate::utils::logging::truncate_text;
use crate::workflow::{Generator, StageOutcome};

pub const REQUIRED_TOP_LEVEL_FIELDS: [&str; 5] =
    ["title", "description", "specs", "equipment", "avito_fields"];

pub const REQUIRED_EQUIPMENT_SECTIONS: [&str; 8] = [
    "comfort",
    "interior",
    "security",
    "exterior",
    "assist",
    "visibility",
    "safety",
    "multimedia",
];

pub const TRANSMISSION_ALLOWED: [&str; 4] = ["MT", "AT", "CVT", "AMT"];

pub const MAX_MILEAGE_KM: f64 = 160_000.0;
pub const PAYMENT_RANGE_RUB: std::ops::RangeInclusive<f64> = 5_000.0..=25_000.0;

const SYSTEM_MESSAGE: &str = "Ты помощник, который составляет объявления о продаже автомобилей. \
                              Отвечай только JSON без пояснений.";

/// 文案生成服务
pub struct ListingGenerator<R> {
    responder: R,
    templates_dir: String,
}

impl<R: Responder> ListingGenerator<R> {
    pub fn new(responder: R, templates_dir: impl Into<String>) -> Self {
        Self {
            responder,
            templates_dir: templates_dir.into(),
        }
    }

    async fn generate(
        &self,
        photo_files: &[String],
        template_id: &str,
    ) -> anyhow::Result<StageOutcome<JsonValue>> {
        let template = load_template(&self.templates_dir, template_id)
            .await
            .with_context(|| format!("加载模板 {} 失败", template_id))?;

        let prompt = build_prompt(photo_files, &template);
        debug!("文案生成 prompt 长度: {} 字符", prompt.chars().count());

        // 照片随消息一起发送，读不到照片属于硬失败
        let mut images = Vec::with_capacity(photo_files.len());
        for path in photo_files {
            let url = photo_data_url(path)
                .await
                .with_context(|| format!("读取照片失败: {}", path))?;
            images.push(url);
        }

        let response = match self
            .responder
            .respond(&prompt, Some(SYSTEM_MESSAGE), &images)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("LLM 调用失败，转人工处理: {}", e);
                return Ok(StageOutcome::need_action(e.to_string()));
            }
        };

        debug!("LLM 返回: {}", truncate_text(&response, 200));

        let ai_result = match parse_ai_response(&response) {
            Ok(value) => value,
            Err(message) => return Ok(StageOutcome::need_action(message)),
        };

        let errors = validate_ai_result(&ai_result);
        if !errors.is_empty() {
            warn!("AI 结果校验未通过: {}", errors.join("; "));
            return Ok(StageOutcome::NeedAction { errors });
        }

        Ok(StageOutcome::Ready(ai_result))
    }
}

impl<R: Responder> Generator for ListingGenerator<R> {
    async fn generate_listing(
        &self,
        photo_files: &[String],
        template_id: &str,
    ) -> anyhow::Result<StageOutcome<JsonValue>> {
        self.generate(photo_files, template_id).await
    }
}

/// 构建 prompt
pub fn build_prompt(photo_files: &[String], template: &ListingTemplate) -> String {
    format!(
        "Верни JSON строго по схеме. Не добавляй лишних ключей. Список фото: {:?}. Шаблон объявления: {}",
        photo_files, template.text_template
    )
}

/// 本地照片转成 `data:image/<类型>;base64,...`
pub async fn photo_data_url(path: &str) -> AppResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::file_read_failed(path, e))?;
    let kind = detect_image_kind(&bytes).ok_or_else(|| {
        AppError::File(FileError::NotAnImage {
            path: path.to_string(),
        })
    })?;
    Ok(format!("data:image/{};base64,{}", kind, STANDARD.encode(&bytes)))
}

/// 解析 LLM 返回的 JSON（允许外层包裹 ``` 代码块）
pub fn parse_ai_response(response: &str) -> Result<JsonValue, String> {
    let text = strip_code_fence(response.trim());
    match serde_json::from_str::<JsonValue>(text) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err("AI response is not a JSON object".to_string()),
        Err(_) => Err("AI response is not valid JSON".to_string()),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // 去掉语言标记（如 ```json）
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// 校验 AI 结果，返回所有错误信息
pub fn validate_ai_result(ai_result: &JsonValue) -> Vec<String> {
    let mut errors = Vec::new();

    let mut missing: Vec<&str> = REQUIRED_TOP_LEVEL_FIELDS
        .iter()
        .copied()
        .filter(|key| ai_result.get(key).is_none())
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        errors.push(format!("Missing top-level fields: {}", missing.join(", ")));
        return errors;
    }

    let specs = &ai_result["specs"];
    let equipment = &ai_result["equipment"];
    let avito_fields = &ai_result["avito_fields"];

    match specs.get("mileage_km").and_then(JsonValue::as_f64) {
        None => errors.push("specs.mileage_km must be a number".to_string()),
        Some(mileage) if mileage > MAX_MILEAGE_KM => {
            errors.push("specs.mileage_km must be <= 160000".to_string())
        }
        Some(_) => {}
    }

    match avito_fields
        .get("payment_per_month_rub")
        .and_then(JsonValue::as_f64)
    {
        None => errors.push("avito_fields.payment_per_month_rub must be a number".to_string()),
        Some(payment) if !PAYMENT_RANGE_RUB.contains(&payment) => {
            errors.push("avito_fields.payment_per_month_rub must be 5000..25000".to_string())
        }
        Some(_) => {}
    }

    let mut missing_sections: Vec<&str> = REQUIRED_EQUIPMENT_SECTIONS
        .iter()
        .copied()
        .filter(|section| equipment.get(section).is_none())
        .collect();
    if !missing_sections.is_empty() {
        missing_sections.sort_unstable();
        errors.push(format!(
            "Missing equipment sections: {}",
            missing_sections.join(", ")
        ));
    } else {
        for section in REQUIRED_EQUIPMENT_SECTIONS {
            if !equipment[section].is_array() {
                errors.push(format!("equipment.{} must be an array", section));
            }
        }
    }

    let transmission = specs.get("transmission").and_then(JsonValue::as_str);
    if !transmission.is_some_and(|t| TRANSMISSION_ALLOWED.contains(&t)) {
        errors.push("specs.transmission must be one of MT, AT, CVT, AMT".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use serde_json::json;
    use std::future::{ready, Future};
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FixedResponder {
        reply: Result<String, String>,
        images: Mutex<Vec<String>>,
    }

    impl Responder for FixedResponder {
        fn respond(
            &self,
            _user_message: &str,
            _system_message: Option<&str>,
            image_urls: &[String],
        ) -> impl Future<Output = AppResult<String>> + Send {
            self.images.lock().unwrap().extend_from_slice(image_urls);
            ready(self.reply.clone().map_err(|message| {
                AppError::Llm(LlmError::ApiCallFailed {
                    model: "fixed".to_string(),
                    source: message.into(),
                })
            }))
        }
    }

    fn valid_result() -> JsonValue {
        json!({
            "title": "Kia Rio 2019",
            "description": "Один владелец, обслуживание у дилера",
            "specs": {"mileage_km": 85000, "transmission": "AT"},
            "equipment": {
                "comfort": ["климат-контроль"],
                "interior": [],
                "security": [],
                "exterior": [],
                "assist": [],
                "visibility": [],
                "safety": [],
                "multimedia": []
            },
            "avito_fields": {"payment_per_month_rub": 15000}
        })
    }

    fn templates_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("car_listing_flow_gen_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("sale.toml"), "text_template = \"Продажа авто\"\n").unwrap();
        dir
    }

    fn generator(reply: Result<String, String>) -> ListingGenerator<FixedResponder> {
        ListingGenerator::new(
            FixedResponder {
                reply,
                images: Mutex::new(Vec::new()),
            },
            templates_dir().to_string_lossy().to_string(),
        )
    }

    #[test]
    fn test_valid_result_has_no_errors() {
        assert!(validate_ai_result(&valid_result()).is_empty());
    }

    #[test]
    fn test_missing_top_level_reports_only_that() {
        let errors = validate_ai_result(&json!({"title": "x", "description": "y"}));
        assert_eq!(
            errors,
            vec!["Missing top-level fields: avito_fields, equipment, specs".to_string()]
        );
    }

    #[test]
    fn test_range_and_enum_checks() {
        let mut result = valid_result();
        result["specs"]["mileage_km"] = json!(200000);
        result["specs"]["transmission"] = json!("ROBOT");
        result["avito_fields"]["payment_per_month_rub"] = json!(30000);
        result["equipment"]["safety"] = json!("airbags");

        let errors = validate_ai_result(&result);
        assert!(errors.contains(&"specs.mileage_km must be <= 160000".to_string()));
        assert!(errors.contains(&"specs.transmission must be one of MT, AT, CVT, AMT".to_string()));
        assert!(errors.contains(&"avito_fields.payment_per_month_rub must be 5000..25000".to_string()));
        assert!(errors.contains(&"equipment.safety must be an array".to_string()));
    }

    #[test]
    fn test_missing_equipment_sections() {
        let mut result = valid_result();
        result["equipment"] = json!({"comfort": []});
        let errors = validate_ai_result(&result);
        assert!(errors[0].starts_with("Missing equipment sections: assist, exterior"));
    }

    #[test]
    fn test_parse_ai_response_strips_code_fence() {
        let value = parse_ai_response("```json\n{\"title\": \"x\"}\n```").unwrap();
        assert_eq!(value["title"], "x");
        assert!(parse_ai_response("not json").is_err());
        assert!(parse_ai_response("[1, 2]").is_err());
    }

    #[tokio::test]
    async fn test_generate_ready_sends_photos() {
        let photo = templates_dir().join("01_front.png");
        std::fs::write(&photo, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00]).unwrap();

        let generator = generator(Ok(valid_result().to_string()));
        let outcome = generator
            .generate_listing(&[photo.to_string_lossy().to_string()], "sale")
            .await
            .unwrap();

        assert!(matches!(outcome, StageOutcome::Ready(_)));
        let images = generator.responder.images.lock().unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[tokio::test]
    async fn test_unreadable_photo_is_hard_failure() {
        let generator = generator(Ok(valid_result().to_string()));
        let result = generator
            .generate_listing(&["data/missing/01.jpg".to_string()], "sale")
            .await;
        assert!(result.is_err());
        assert!(generator.responder.images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_invalid_json_needs_action() {
        let generator = generator(Ok("Извините, не могу".to_string()));
        let outcome = generator.generate_listing(&[], "sale").await.unwrap();
        assert_eq!(
            outcome,
            StageOutcome::NeedAction {
                errors: vec!["AI response is not valid JSON".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_generate_llm_error_needs_action() {
        let generator = generator(Err("timeout".to_string()));
        let outcome = generator.generate_listing(&[], "sale").await.unwrap();
        assert!(matches!(outcome, StageOutcome::NeedAction { .. }));
    }

    #[tokio::test]
    async fn test_missing_template_is_hard_failure() {
        let generator = generator(Ok(valid_result().to_string()));
        let result = generator.generate_listing(&[], "no_such_template").await;
        assert!(result.is_err());
    }
}
