//! 流程状态 - 聚合根
//!
//! 持有全部卡片、人工处理队列、发布历史以及已处理批次集合。
//! 由调度器显式持有，不存在进程级全局状态。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::card::{timestamp_now, Card, CardStatus};

/// 人工处理队列条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedActionItem {
    pub card_id: String,
    pub batch_id: String,
    pub reason: String,
    pub requires_manual_confirmation: bool,
}

/// 发布记录（只追加）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub card_id: String,
    pub batch_id: String,
    pub post_url: Option<String>,
    pub status: CardStatus,
    pub published_at: String,
}

/// 流程状态
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowState {
    pub cards: HashMap<String, Card>,
    /// FIFO 人工处理队列
    pub need_action: Vec<NeedActionItem>,
    /// 发布历史
    pub history: Vec<PublicationRecord>,
    pub processed_batches: HashSet<String>,
    /// 卡片序号，整个生命周期内单调递增
    #[serde(default)]
    next_seq: u64,
}

/// 各状态卡片数量
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub total_cards: usize,
    pub by_status: BTreeMap<String, usize>,
    pub need_action_queue: usize,
    pub history: usize,
    pub processed_batches: usize,
}

impl StateSummary {
    pub fn count(&self, status: CardStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生成新的卡片 ID
    ///
    /// 格式：`card_<unix 秒>_<序号>`，序号不会重复
    pub fn next_card_id(&mut self) -> String {
        self.next_seq += 1;
        format!("card_{}_{}", chrono::Utc::now().timestamp(), self.next_seq)
    }

    pub fn is_processed(&self, batch_id: &str) -> bool {
        self.processed_batches.contains(batch_id)
    }

    pub fn mark_processed(&mut self, batch_id: impl Into<String>) {
        self.processed_batches.insert(batch_id.into());
    }

    pub fn insert_card(&mut self, card: Card) {
        self.cards.insert(card.id.clone(), card);
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.get(card_id)
    }

    /// 按批次查找卡片
    pub fn card_for_batch(&self, batch_id: &str) -> Option<&Card> {
        self.cards.values().find(|card| card.batch_id == batch_id)
    }

    pub fn cards_with_status(&self, status: CardStatus) -> Vec<&Card> {
        self.cards
            .values()
            .filter(|card| card.status == status)
            .collect()
    }

    /// 记录一次成功发布
    pub fn add_history(&mut self, card: &Card) {
        self.history.push(PublicationRecord {
            card_id: card.id.clone(),
            batch_id: card.batch_id.clone(),
            post_url: card.post_url.clone(),
            status: card.status,
            published_at: timestamp_now(),
        });
    }

    /// 加入人工处理队列
    pub fn add_need_action(&mut self, card: &Card, reason: impl Into<String>) {
        self.need_action.push(NeedActionItem {
            card_id: card.id.clone(),
            batch_id: card.batch_id.clone(),
            reason: reason.into(),
            requires_manual_confirmation: true,
        });
    }

    /// 移除某张卡片的全部队列条目
    ///
    /// 返回是否移除了至少一条
    pub fn resolve_need_action(&mut self, card_id: &str) -> bool {
        let before = self.need_action.len();
        self.need_action.retain(|item| item.card_id != card_id);
        self.need_action.len() < before
    }

    /// 重置卡片并撤下它的队列条目
    pub fn reset_card(&mut self, card_id: &str) -> bool {
        match self.cards.get_mut(card_id) {
            Some(card) => {
                card.reset();
                self.resolve_need_action(card_id);
                true
            }
            None => false,
        }
    }

    pub fn summary(&self) -> StateSummary {
        let mut by_status = BTreeMap::new();
        for card in self.cards.values() {
            *by_status.entry(card.status.as_str().to_string()).or_insert(0) += 1;
        }
        StateSummary {
            total_cards: self.cards.len(),
            by_status,
            need_action_queue: self.need_action.len(),
            history: self.history.len(),
            processed_batches: self.processed_batches.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(state: &mut FlowState, batch_id: &str) -> Card {
        let id = state.next_card_id();
        Card::new(id, batch_id)
    }

    #[test]
    fn test_card_ids_are_unique() {
        let mut state = FlowState::new();
        let ids: HashSet<String> = (0..100).map(|_| state.next_card_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_resolve_need_action_removes_all_entries_for_card() {
        let mut state = FlowState::new();
        let a = card(&mut state, "batch_a");
        let b = card(&mut state, "batch_b");
        state.add_need_action(&a, "Captcha required");
        state.add_need_action(&b, "Mapping failed");

        assert!(state.resolve_need_action(&a.id));
        assert_eq!(state.need_action.len(), 1);
        assert_eq!(state.need_action[0].card_id, b.id);
        assert!(state.need_action[0].requires_manual_confirmation);
    }

    #[test]
    fn test_resolve_unknown_card_changes_nothing() {
        let mut state = FlowState::new();
        let a = card(&mut state, "batch_a");
        state.add_need_action(&a, "Captcha required");

        assert!(!state.resolve_need_action("card_missing"));
        assert_eq!(state.need_action.len(), 1);
    }

    #[test]
    fn test_history_snapshot_of_card() {
        let mut state = FlowState::new();
        let mut posted = card(&mut state, "batch_a");
        posted.status = CardStatus::Posted;
        posted.post_url = Some("https://example.com/item/a".to_string());
        state.add_history(&posted);

        let record = &state.history[0];
        assert_eq!(record.card_id, posted.id);
        assert_eq!(record.batch_id, "batch_a");
        assert_eq!(record.status, CardStatus::Posted);
        assert_eq!(record.post_url.as_deref(), Some("https://example.com/item/a"));
        assert!(!record.published_at.is_empty());
    }

    #[test]
    fn test_reset_card_drops_queue_entries() {
        let mut state = FlowState::new();
        let mut paused = card(&mut state, "batch_a");
        paused.status = CardStatus::NeedAction;
        state.add_need_action(&paused, "Captcha required");
        let id = paused.id.clone();
        state.insert_card(paused);

        assert!(state.reset_card(&id));
        assert!(state.need_action.is_empty());
        assert_eq!(state.card(&id).unwrap().status, CardStatus::New);
        assert!(!state.reset_card("card_missing"));
    }

    #[test]
    fn test_summary_counts() {
        let mut state = FlowState::new();
        for (batch, status) in [
            ("b1", CardStatus::Posted),
            ("b2", CardStatus::Posted),
            ("b3", CardStatus::Failed),
        ] {
            let mut c = card(&mut state, batch);
            c.status = status;
            state.insert_card(c);
            state.mark_processed(batch);
        }

        let summary = state.summary();
        assert_eq!(summary.total_cards, 3);
        assert_eq!(summary.count(CardStatus::Posted), 2);
        assert_eq!(summary.count(CardStatus::Failed), 1);
        assert_eq!(summary.count(CardStatus::NeedAction), 0);
        assert_eq!(summary.processed_batches, 3);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = FlowState::new();
        let c = card(&mut state, "b1");
        state.add_need_action(&c, "Captcha required");
        state.insert_card(c);
        state.mark_processed("b1");

        let json = serde_json::to_string(&state).unwrap();
        let mut restored: FlowState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.cards.len(), 1);
        assert_eq!(restored.need_action.len(), 1);
        assert!(restored.is_processed("b1"));
        // 序号随状态一起恢复，新 ID 不会与旧 ID 冲突
        let next = restored.next_card_id();
        assert!(!restored.cards.contains_key(&next));
    }
}
