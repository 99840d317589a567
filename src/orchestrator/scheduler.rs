//! 轮询调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **轮询**：从批次来源拉取当前可用的批次
//! 2. **准入控制**：已处理过的批次不会再次建卡（最多处理一次）
//! 3. **逐个处理**：按来源顺序为每个新批次建卡，并委托 `CardFlow` 跑完流水线
//! 4. **结果落地**：发布成功写入历史，需要人工处理的进入队列
//! 5. **间隔等待**：每轮结束后休眠固定时长
//!
//! ## 设计特点
//!
//! - 单线程顺序执行：一张卡片处理完才开始下一张，状态无需加锁
//! - 无论成功、暂停还是失败，批次处理完都会被标记为已处理；
//!   想重新处理只能先重置卡片，再调用 `rerun_card`
//! - 不自动重试

use std::collections::HashSet;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::FlowError;
use crate::models::{Card, CardStatus, FlowState, DEFAULT_TEMPLATE_ID};
use crate::utils::logging::{log_cycle_complete, log_cycle_start};
use crate::workflow::{BatchSource, CardFlow, ChainEnd, Generator, Importer, Mapper, Poster};

/// 一轮轮询的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 来源返回的批次数
    pub fetched: usize,
    /// 本轮新建卡片数
    pub admitted: usize,
    pub posted: usize,
    pub need_action: usize,
    pub failed: usize,
}

/// 轮询调度器
pub struct FlowScheduler<B, I, G, M, P> {
    interval: Duration,
    template_id: String,
    state: FlowState,
    source: B,
    flow: CardFlow<I, G, M, P>,
    cycle: usize,
}

impl<B, I, G, M, P> FlowScheduler<B, I, G, M, P>
where
    B: BatchSource,
    I: Importer,
    G: Generator,
    M: Mapper,
    P: Poster,
{
    pub fn new(interval: Duration, state: FlowState, source: B, flow: CardFlow<I, G, M, P>) -> Self {
        Self {
            interval,
            template_id: DEFAULT_TEMPLATE_ID.to_string(),
            state,
            source,
            flow,
            cycle: 0,
        }
    }

    /// 新卡片使用的文案模板
    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = template_id.into();
        self
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn into_state(self) -> FlowState {
        self.state
    }

    /// 执行一轮轮询
    pub async fn run_once(&mut self) -> CycleReport {
        self.cycle += 1;
        log_cycle_start(self.cycle);

        let batch_ids = match self.source.fetch_batches().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("❌ 拉取批次列表失败，本轮跳过: {:#}", e);
                return CycleReport::default();
            }
        };

        let mut report = CycleReport {
            fetched: batch_ids.len(),
            ..Default::default()
        };

        // 保持来源顺序，同一次拉取中的重复 ID 只取第一个
        let mut seen = HashSet::new();
        let new_batches: Vec<String> = batch_ids
            .into_iter()
            .filter(|id| !self.state.is_processed(id) && seen.insert(id.clone()))
            .collect();

        if new_batches.is_empty() {
            info!("没有新的批次");
        }

        for batch_id in new_batches {
            let mut card = Card::new(self.state.next_card_id(), batch_id.as_str())
                .with_template(self.template_id.as_str());
            card.log("Card created");
            info!("[批次 {}] 🆕 创建卡片 {}", batch_id, card.id);
            report.admitted += 1;

            let end = self.flow.run(&mut card).await;
            self.settle(card, end, &mut report);
            self.state.mark_processed(batch_id);
        }

        log_cycle_complete(self.cycle, &report);
        report
    }

    /// 执行 n 轮，每轮之后等待固定间隔
    pub async fn run_cycles(&mut self, cycles: usize) {
        for _ in 0..cycles {
            self.run_once().await;
            self.idle().await;
        }
    }

    /// 一直运行，由宿主进程决定何时停止（丢弃 future 即可）
    pub async fn run_forever(&mut self) {
        loop {
            self.run_once().await;
            self.idle().await;
        }
    }

    /// 人工处理完成，移出队列
    pub fn resolve_need_action(&mut self, card_id: &str) -> bool {
        let removed = self.state.resolve_need_action(card_id);
        if removed {
            info!("[卡片 {}] ✓ 人工处理已确认", card_id);
        }
        removed
    }

    /// 重置卡片到 NEW
    pub fn reset_card(&mut self, card_id: &str) -> bool {
        let reset = self.state.reset_card(card_id);
        if reset {
            info!("[卡片 {}] 🔄 已重置", card_id);
        } else {
            warn!("[卡片 {}] 重置失败：卡片不存在", card_id);
        }
        reset
    }

    /// 对一张已重置（NEW）的卡片重新执行流水线
    pub async fn rerun_card(&mut self, card_id: &str) -> Result<CardStatus, FlowError> {
        let status = self
            .state
            .card(card_id)
            .map(|card| card.status)
            .ok_or_else(|| FlowError::CardNotFound {
                card_id: card_id.to_string(),
            })?;

        if status != CardStatus::New {
            return Err(FlowError::CardNotNew {
                card_id: card_id.to_string(),
                status: status.to_string(),
            });
        }

        // 卡片留在状态里原地执行，中途取消也不会丢失
        let Some(card) = self.state.cards.get_mut(card_id) else {
            return Err(FlowError::CardNotFound {
                card_id: card_id.to_string(),
            });
        };

        info!("[卡片 {}] 🔁 重新执行流水线", card_id);
        let end = self.flow.run(card).await;
        let card = card.clone();
        let status = card.status;
        self.record(&card, &end, &mut CycleReport::default());
        Ok(status)
    }

    /// 把处理完的卡片写回状态
    fn settle(&mut self, card: Card, end: ChainEnd, report: &mut CycleReport) {
        self.record(&card, &end, report);
        self.state.insert_card(card);
    }

    /// 按结果写历史或人工队列
    fn record(&mut self, card: &Card, end: &ChainEnd, report: &mut CycleReport) {
        match end {
            ChainEnd::Posted => {
                report.posted += 1;
                self.state.add_history(card);
            }
            ChainEnd::NeedAction { reason } => {
                report.need_action += 1;
                self.state.add_need_action(card, reason.as_str());
            }
            ChainEnd::Failed { .. } => {
                report.failed += 1;
            }
        }
    }

    async fn idle(&self) {
        if !self.interval.is_zero() {
            info!("💤 等待 {} 秒后进行下一轮", self.interval.as_secs());
        }
        tokio::time::sleep(self.interval).await;
    }
}
