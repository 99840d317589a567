//! 表单映射服务 - 业务能力层
//!
//! 把 AI 结果整理成平台发布表单需要的结构：
//! 校验必填字段、清理文本、附上照片列表。

use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::sync::OnceLock;

use crate::workflow::{Mapper, StageOutcome};

pub const DEFAULT_REQUIRED_FIELDS: [&str; 10] = [
    "category",
    "brand",
    "model",
    "price_rub",
    "city",
    "body_type",
    "drive_type",
    "color",
    "owners",
    "payment_per_month_rub",
];

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 3000;

/// 表单映射服务
#[derive(Debug, Clone)]
pub struct ListingMapper {
    required_fields: Vec<String>,
}

impl Default for ListingMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingMapper {
    pub fn new() -> Self {
        Self::with_required_fields(DEFAULT_REQUIRED_FIELDS)
    }

    pub fn with_required_fields<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            required_fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// 执行映射
    pub fn map(&self, ai_result: &JsonValue, photo_files: &[String]) -> StageOutcome<JsonValue> {
        // 空值（null / [] / "" / 0 / false）按空表处理
        let fields = match ai_result.get("avito_fields") {
            Some(JsonValue::Object(map)) => map.clone(),
            value if !is_truthy(value) => Map::new(),
            _ => return StageOutcome::need_action("avito_fields must be an object"),
        };

        let mut errors = Vec::new();

        let title = non_empty_str(ai_result.get("title"));
        let description = non_empty_str(ai_result.get("description"));
        if title.is_none() {
            errors.push("title is required".to_string());
        }
        if description.is_none() {
            errors.push("description is required".to_string());
        }

        let mut missing: Vec<&str> = self
            .required_fields
            .iter()
            .map(String::as_str)
            .filter(|field| !is_truthy(fields.get(*field)))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            errors.push(format!("Missing required avito_fields: {}", missing.join(", ")));
        }

        let photos: Vec<String> = photo_files
            .iter()
            .filter(|path| !path.is_empty())
            .cloned()
            .collect();
        if photos.is_empty() {
            errors.push("At least one photo is required".to_string());
        }

        let (Some(title), Some(description)) = (title, description) else {
            return StageOutcome::NeedAction { errors };
        };
        if !errors.is_empty() {
            return StageOutcome::NeedAction { errors };
        }

        let mut payload = Map::new();
        payload.insert(
            "title".to_string(),
            JsonValue::String(clean_text(title, TITLE_MAX_CHARS)),
        );
        payload.insert(
            "description".to_string(),
            JsonValue::String(clean_text(description, DESCRIPTION_MAX_CHARS)),
        );
        payload.insert(
            "photos".to_string(),
            JsonValue::Array(photos.into_iter().map(JsonValue::String).collect()),
        );
        // 平台字段平铺在顶层，同名时覆盖前面的值
        payload.extend(fields);

        StageOutcome::Ready(JsonValue::Object(payload))
    }
}

impl Mapper for ListingMapper {
    async fn map_to_schema(
        &self,
        ai_result: &JsonValue,
        photo_files: &[String],
    ) -> anyhow::Result<StageOutcome<JsonValue>> {
        Ok(self.map(ai_result, photo_files))
    }
}

fn non_empty_str(value: Option<&JsonValue>) -> Option<&str> {
    value
        .and_then(JsonValue::as_str)
        .filter(|text| !text.is_empty())
}

/// 与 JSON 语义一致的"有值"判断：null、false、0、空串、空数组、空对象都算缺失
fn is_truthy(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(JsonValue::Array(a)) => !a.is_empty(),
        Some(JsonValue::Object(o)) => !o.is_empty(),
    }
}

struct CleanPatterns {
    blank_controls: Regex,
    extra_newlines: Regex,
    extra_spaces: Regex,
}

fn patterns() -> &'static CleanPatterns {
    static PATTERNS: OnceLock<CleanPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CleanPatterns {
        blank_controls: Regex::new(r"[\t\x0C\x0B]+").expect("valid regex"),
        extra_newlines: Regex::new(r"\n{3,}").expect("valid regex"),
        extra_spaces: Regex::new(r" {2,}").expect("valid regex"),
    })
}

/// 清理文本
///
/// 统一换行、制表符转空格、压缩多余空行与空格、去首尾空白，
/// 超长时按字符截断
pub fn clean_text(text: &str, max_chars: usize) -> String {
    let p = patterns();
    let cleaned = text.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned = p.blank_controls.replace_all(&cleaned, " ");
    let cleaned = p.extra_newlines.replace_all(&cleaned, "\n\n");
    let cleaned = p.extra_spaces.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() > max_chars {
        cleaned
            .chars()
            .take(max_chars)
            .collect::<String>()
            .trim_end()
            .to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ai_result() -> JsonValue {
        json!({
            "title": "  Kia   Rio\t2019 ",
            "description": "Один владелец.\r\n\r\n\r\n\r\nТорг уместен.",
            "avito_fields": {
                "category": "Автомобили",
                "brand": "Kia",
                "model": "Rio",
                "price_rub": 1200000,
                "city": "Москва",
                "body_type": "Седан",
                "drive_type": "Передний",
                "color": "Белый",
                "owners": 1,
                "payment_per_month_rub": 15000
            }
        })
    }

    fn photos() -> Vec<String> {
        vec!["data/b1/01_front.jpg".to_string(), String::new()]
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("a\r\nb\rc", 100), "a\nb\nc");
        assert_eq!(clean_text("a\t\tb", 100), "a b");
        assert_eq!(clean_text("a\n\n\n\nb", 100), "a\n\nb");
        assert_eq!(clean_text("  a    b  ", 100), "a b");
        assert_eq!(clean_text("абв где", 4), "абв");
    }

    #[test]
    fn test_map_ready_payload() {
        let outcome = ListingMapper::new().map(&ai_result(), &photos());
        let StageOutcome::Ready(payload) = outcome else {
            panic!("expected ready payload, got {:?}", outcome);
        };

        assert_eq!(payload["title"], "Kia Rio 2019");
        assert_eq!(payload["description"], "Один владелец.\n\nТорг уместен.");
        assert_eq!(payload["photos"], json!(["data/b1/01_front.jpg"]));
        assert_eq!(payload["brand"], "Kia");
        assert_eq!(payload["price_rub"], 1200000);
    }

    #[test]
    fn test_missing_fields_collected() {
        let mut result = ai_result();
        result["title"] = json!("");
        result["avito_fields"]["owners"] = json!(0);
        result["avito_fields"]
            .as_object_mut()
            .unwrap()
            .remove("city");

        let outcome = ListingMapper::new().map(&result, &[]);
        assert_eq!(
            outcome,
            StageOutcome::NeedAction {
                errors: vec![
                    "title is required".to_string(),
                    "Missing required avito_fields: city, owners".to_string(),
                    "At least one photo is required".to_string(),
                ]
            }
        );
    }

    #[test]
    fn test_avito_fields_must_be_object() {
        let outcome = ListingMapper::new().map(&json!({"avito_fields": [1, 2]}), &photos());
        assert_eq!(
            outcome,
            StageOutcome::NeedAction {
                errors: vec!["avito_fields must be an object".to_string()]
            }
        );
    }

    #[test]
    fn test_empty_avito_fields_treated_as_missing() {
        let mapper = ListingMapper::with_required_fields(["brand"]);
        for empty in [json!([]), json!(""), json!(0), json!(false), json!(null)] {
            let result = json!({"title": "t", "description": "d", "avito_fields": empty.clone()});
            assert_eq!(
                mapper.map(&result, &photos()),
                StageOutcome::NeedAction {
                    errors: vec!["Missing required avito_fields: brand".to_string()]
                },
                "avito_fields = {}",
                empty
            );
        }
    }

    #[test]
    fn test_custom_required_fields() {
        let mapper = ListingMapper::with_required_fields(["brand"]);
        let result = json!({
            "title": "t",
            "description": "d",
            "avito_fields": {"brand": "Lada"}
        });
        assert!(matches!(mapper.map(&result, &photos()), StageOutcome::Ready(_)));
    }
}
