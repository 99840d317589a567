//! 单张卡片处理流程 - 流程层
//!
//! 核心职责：定义"一张卡片"的完整处理流程
//!
//! 流程顺序：
//! 1. 导入照片 → PHOTOS_READY
//! 2. AI 生成文案 → AI_READY
//! 3. 映射到平台表单 → READY_TO_POST
//! 4. 发布 → POSTED
//!
//! 任一阶段报告 NeedAction 时卡片暂停（NEED_ACTION），
//! 任一阶段返回错误时卡片失败（FAILED）并立即中止，已写入的字段保留。

use tracing::{error, info, warn};

use crate::models::{Card, CardStatus};
use crate::workflow::stages::{Generator, Importer, Mapper, PostOutcome, Poster, StageOutcome};

const AI_FALLBACK_REASON: &str = "AI validation failed";
const MAPPING_FALLBACK_REASON: &str = "Mapping failed";
const POST_FALLBACK_REASON: &str = "Captcha or manual confirmation required";

/// 流程结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEnd {
    /// 发布成功
    Posted,
    /// 需要人工处理
    NeedAction { reason: String },
    /// 失败
    Failed { error: String },
}

/// 卡片处理流程
///
/// - 编排四个阶段的调用顺序
/// - 是卡片字段的唯一写入者
/// - 不持有流程状态，由调度器负责入队和记录历史
pub struct CardFlow<I, G, M, P> {
    importer: I,
    generator: G,
    mapper: M,
    poster: P,
}

impl<I, G, M, P> CardFlow<I, G, M, P>
where
    I: Importer,
    G: Generator,
    M: Mapper,
    P: Poster,
{
    pub fn new(importer: I, generator: G, mapper: M, poster: P) -> Self {
        Self {
            importer,
            generator,
            mapper,
            poster,
        }
    }

    /// 执行完整流程，直到成功、暂停或失败
    pub async fn run(&self, card: &mut Card) -> ChainEnd {
        match self.run_stages(card).await {
            Ok(end) => end,
            Err(e) => {
                let message = format!("{:#}", e);
                error!("[卡片 {}] ❌ 处理失败: {}", card.id, message);
                card.status = CardStatus::Failed;
                card.errors.push(message.clone());
                ChainEnd::Failed { error: message }
            }
        }
    }

    async fn run_stages(&self, card: &mut Card) -> anyhow::Result<ChainEnd> {
        // ========== 阶段 1: 导入照片 ==========
        card.log("Importing photos");
        info!("[卡片 {}] 📥 正在导入批次 {} 的照片...", card.id, card.batch_id);

        let photos = self.importer.import_photos(&card.batch_id).await?;
        card.photo_files = photos.photo_files;
        card.photo_urls = photos.photo_urls;
        card.status = CardStatus::PhotosReady;
        info!("[卡片 {}] ✓ 照片导入完成，共 {} 张", card.id, card.photo_files.len());

        // ========== 阶段 2: AI 生成文案 ==========
        card.log("Running AI");
        info!("[卡片 {}] 🤖 正在生成文案 (模板: {})...", card.id, card.template_id);

        let ai_result = match self
            .generator
            .generate_listing(&card.photo_files, &card.template_id)
            .await?
        {
            StageOutcome::Ready(result) => result,
            StageOutcome::NeedAction { errors } => {
                return Ok(divert(card, errors, AI_FALLBACK_REASON));
            }
        };
        card.ai_result = Some(ai_result.clone());
        card.status = CardStatus::AiReady;

        // ========== 阶段 3: 映射 ==========
        card.log("Mapping to marketplace");
        info!("[卡片 {}] 🧩 正在映射到平台表单...", card.id);

        let mapped = match self
            .mapper
            .map_to_schema(&ai_result, &card.photo_files)
            .await?
        {
            StageOutcome::Ready(payload) => payload,
            StageOutcome::NeedAction { errors } => {
                return Ok(divert(card, errors, MAPPING_FALLBACK_REASON));
            }
        };
        card.mapped_payload = Some(mapped.clone());
        card.status = CardStatus::ReadyToPost;

        // ========== 阶段 4: 发布 ==========
        card.log("Posting listing");
        info!("[卡片 {}] 📤 正在发布...", card.id);

        let outcome = self.poster.post_listing(&mapped, &card.photo_files).await?;
        if let Some(url) = outcome.post_url() {
            card.post_url = Some(url.to_string());
        }

        match outcome {
            PostOutcome::Posted { .. } => {
                card.status = CardStatus::Posted;
                card.log("Listing posted");
                info!(
                    "[卡片 {}] ✅ 发布成功: {}",
                    card.id,
                    card.post_url.as_deref().unwrap_or("-")
                );
                Ok(ChainEnd::Posted)
            }
            PostOutcome::NeedAction { errors, .. } => {
                Ok(divert(card, errors, POST_FALLBACK_REASON))
            }
            PostOutcome::Failed { errors, .. } => {
                card.status = CardStatus::Failed;
                let error = errors.join("; ");
                card.errors.extend(errors);
                error!("[卡片 {}] ❌ 发布失败: {}", card.id, error);
                Ok(ChainEnd::Failed { error })
            }
        }
    }
}

/// 转入人工处理
fn divert(card: &mut Card, errors: Vec<String>, fallback: &str) -> ChainEnd {
    let reason = if errors.is_empty() {
        fallback.to_string()
    } else {
        errors.join("; ")
    };
    card.status = CardStatus::NeedAction;
    card.errors.extend(errors);
    card.log(format!("Need action: {}", reason));
    warn!("[卡片 {}] ⚠️ 需要人工处理: {}", card.id, reason);
    ChainEnd::NeedAction { reason }
}
