//! 车辆卡片 - 数据层
//!
//! 一张卡片对应一个批次（一辆车）的一次发布尝试

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::Display;

/// 默认的文案模板
pub const DEFAULT_TEMPLATE_ID: &str = "sale";

/// 重置后日志中唯一保留的标记
pub const RESET_MARKER: &str = "Reset card";

/// 卡片状态
///
/// 流水线顺序：NEW → PHOTOS_READY → AI_READY → READY_TO_POST → POSTED，
/// 任意阶段都可能转入 NEED_ACTION 或 FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    New,
    PhotosReady,
    AiReady,
    ReadyToPost,
    Posted,
    NeedAction,
    Failed,
}

impl CardStatus {
    /// 全部状态（按流水线顺序）
    pub const ALL: [CardStatus; 7] = [
        CardStatus::New,
        CardStatus::PhotosReady,
        CardStatus::AiReady,
        CardStatus::ReadyToPost,
        CardStatus::Posted,
        CardStatus::NeedAction,
        CardStatus::Failed,
    ];

    /// 是否为终态（只有重置才能离开）
    pub fn is_terminal(&self) -> bool {
        matches!(self, CardStatus::Posted | CardStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::New => "NEW",
            CardStatus::PhotosReady => "PHOTOS_READY",
            CardStatus::AiReady => "AI_READY",
            CardStatus::ReadyToPost => "READY_TO_POST",
            CardStatus::Posted => "POSTED",
            CardStatus::NeedAction => "NEED_ACTION",
            CardStatus::Failed => "FAILED",
        }
    }
}

impl Display for CardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 车辆卡片
///
/// 字段只由编排层写入；阶段函数拿到的是普通数据，不直接修改卡片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub batch_id: String,
    pub status: CardStatus,
    #[serde(default)]
    pub photo_files: Vec<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    pub template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_payload: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    /// 只追加，不重排、不截断
    #[serde(default)]
    pub logs: Vec<String>,
    /// 各阶段累积的错误
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Card {
    /// 创建新卡片（状态为 NEW）
    pub fn new(id: impl Into<String>, batch_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            batch_id: batch_id.into(),
            status: CardStatus::New,
            photo_files: Vec::new(),
            photo_urls: Vec::new(),
            template_id: DEFAULT_TEMPLATE_ID.to_string(),
            ai_result: None,
            mapped_payload: None,
            post_url: None,
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// 指定文案模板
    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = template_id.into();
        self
    }

    /// 追加一条带时间戳的日志
    pub fn log(&mut self, message: impl AsRef<str>) {
        self.logs.push(format!("{} {}", timestamp_now(), message.as_ref()));
    }

    /// 重置卡片
    ///
    /// 状态回到 NEW，清空所有派生字段与错误，日志只保留重置标记
    pub fn reset(&mut self) {
        self.status = CardStatus::New;
        self.photo_files.clear();
        self.photo_urls.clear();
        self.ai_result = None;
        self.mapped_payload = None;
        self.post_url = None;
        self.errors.clear();
        self.logs.clear();
        self.log(RESET_MARKER);
    }
}

impl Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[卡片 {} 批次 {} 状态 {}]", self.id, self.batch_id, self.status)
    }
}

/// 当前 UTC 时间，精确到秒
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_statuses_serialize_as_names() {
        for status in CardStatus::ALL {
            assert_eq!(serde_json::to_value(status).unwrap(), json!(status.as_str()));
        }
        let terminal: Vec<CardStatus> = CardStatus::ALL
            .into_iter()
            .filter(CardStatus::is_terminal)
            .collect();
        assert_eq!(terminal, vec![CardStatus::Posted, CardStatus::Failed]);
    }

    #[test]
    fn test_new_card_defaults() {
        let card = Card::new("card_1", "batch_1");
        assert_eq!(card.status, CardStatus::New);
        assert_eq!(card.template_id, DEFAULT_TEMPLATE_ID);
        assert!(card.photo_files.is_empty());
        assert!(card.ai_result.is_none());
        assert!(card.logs.is_empty());
    }

    #[test]
    fn test_log_is_timestamped_and_appended() {
        let mut card = Card::new("card_1", "batch_1");
        card.log("first");
        card.log("second");

        assert_eq!(card.logs.len(), 2);
        assert!(card.logs[0].ends_with(" first"));
        assert!(card.logs[1].ends_with(" second"));
        // 2026-01-01T00:00:00Z first
        assert!(card.logs[0].contains('T'));
        assert!(card.logs[0].split(' ').next().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_reset_clears_derived_fields() {
        let mut card = Card::new("card_1", "batch_1");
        card.status = CardStatus::Posted;
        card.photo_files = vec!["a.jpg".to_string()];
        card.ai_result = Some(json!({"title": "x"}));
        card.mapped_payload = Some(json!({"title": "x"}));
        card.post_url = Some("https://example.com/item/1".to_string());
        card.errors.push("boom".to_string());
        card.log("Card created");
        card.log("Posting listing");

        card.reset();

        assert_eq!(card.status, CardStatus::New);
        assert!(card.photo_files.is_empty());
        assert!(card.ai_result.is_none());
        assert!(card.mapped_payload.is_none());
        assert!(card.post_url.is_none());
        assert!(card.errors.is_empty());
        assert_eq!(card.logs.len(), 1);
        assert!(card.logs[0].ends_with(RESET_MARKER));
    }

    #[test]
    fn test_status_serializes_as_screaming_snake_case() {
        let value = serde_json::to_value(CardStatus::ReadyToPost).unwrap();
        assert_eq!(value, json!("READY_TO_POST"));
        let parsed: CardStatus = serde_json::from_value(json!("NEED_ACTION")).unwrap();
        assert_eq!(parsed, CardStatus::NeedAction);
    }

    #[test]
    fn test_terminal_states() {
        assert!(CardStatus::Posted.is_terminal());
        assert!(CardStatus::Failed.is_terminal());
        assert!(!CardStatus::NeedAction.is_terminal());
        assert!(!CardStatus::New.is_terminal());
    }
}
