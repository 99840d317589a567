//! 阶段能力接口
//!
//! 流水线的四个阶段（导入 → 生成 → 映射 → 发布）以及批次来源，
//! 每个阶段一个小 trait，便于替换和在测试中 mock。
//!
//! 约定：
//! - `Err(_)` 表示硬失败，卡片直接进入 FAILED
//! - `NeedAction` 表示输入本身没问题，但需要人工修正或确认
//! - 阶段只接收普通数据并返回结果，不接触 `Card`

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::future::{ready, Future};

/// 导入阶段的产出
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSet {
    pub photo_files: Vec<String>,
    pub photo_urls: Vec<String>,
}

/// 生成 / 映射阶段的结果
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// 可以进入下一阶段
    Ready(T),
    /// 需要人工处理
    NeedAction { errors: Vec<String> },
}

impl<T> StageOutcome<T> {
    pub fn need_action(error: impl Into<String>) -> Self {
        StageOutcome::NeedAction {
            errors: vec![error.into()],
        }
    }
}

/// 发布阶段的结果
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    Posted {
        post_url: Option<String>,
    },
    NeedAction {
        post_url: Option<String>,
        errors: Vec<String>,
    },
    Failed {
        post_url: Option<String>,
        errors: Vec<String>,
    },
}

impl PostOutcome {
    pub fn post_url(&self) -> Option<&str> {
        match self {
            PostOutcome::Posted { post_url }
            | PostOutcome::NeedAction { post_url, .. }
            | PostOutcome::Failed { post_url, .. } => post_url.as_deref(),
        }
    }
}

/// 批次来源
pub trait BatchSource: Send + Sync {
    /// 当前可用的批次 ID（保持来源给出的顺序）
    fn fetch_batches(&self) -> impl Future<Output = anyhow::Result<Vec<String>>> + Send;
}

/// 照片导入
pub trait Importer: Send + Sync {
    fn import_photos(
        &self,
        batch_id: &str,
    ) -> impl Future<Output = anyhow::Result<PhotoSet>> + Send;
}

/// 文案生成（AI）
pub trait Generator: Send + Sync {
    fn generate_listing(
        &self,
        photo_files: &[String],
        template_id: &str,
    ) -> impl Future<Output = anyhow::Result<StageOutcome<JsonValue>>> + Send;
}

/// 映射到平台表单结构
pub trait Mapper: Send + Sync {
    fn map_to_schema(
        &self,
        ai_result: &JsonValue,
        photo_files: &[String],
    ) -> impl Future<Output = anyhow::Result<StageOutcome<JsonValue>>> + Send;
}

/// 发布
pub trait Poster: Send + Sync {
    fn post_listing(
        &self,
        mapped_payload: &JsonValue,
        photo_files: &[String],
    ) -> impl Future<Output = anyhow::Result<PostOutcome>> + Send;
}

// ========== 同步函数适配 ==========
// 普通函数 / 闭包可以直接当作阶段使用

impl<F> BatchSource for F
where
    F: Fn() -> anyhow::Result<Vec<String>> + Send + Sync,
{
    fn fetch_batches(&self) -> impl Future<Output = anyhow::Result<Vec<String>>> + Send {
        ready(self())
    }
}

impl<F> Importer for F
where
    F: Fn(&str) -> anyhow::Result<PhotoSet> + Send + Sync,
{
    fn import_photos(
        &self,
        batch_id: &str,
    ) -> impl Future<Output = anyhow::Result<PhotoSet>> + Send {
        ready(self(batch_id))
    }
}

impl<F> Generator for F
where
    F: Fn(&[String], &str) -> anyhow::Result<StageOutcome<JsonValue>> + Send + Sync,
{
    fn generate_listing(
        &self,
        photo_files: &[String],
        template_id: &str,
    ) -> impl Future<Output = anyhow::Result<StageOutcome<JsonValue>>> + Send {
        ready(self(photo_files, template_id))
    }
}

impl<F> Mapper for F
where
    F: Fn(&JsonValue, &[String]) -> anyhow::Result<StageOutcome<JsonValue>> + Send + Sync,
{
    fn map_to_schema(
        &self,
        ai_result: &JsonValue,
        photo_files: &[String],
    ) -> impl Future<Output = anyhow::Result<StageOutcome<JsonValue>>> + Send {
        ready(self(ai_result, photo_files))
    }
}

impl<F> Poster for F
where
    F: Fn(&JsonValue, &[String]) -> anyhow::Result<PostOutcome> + Send + Sync,
{
    fn post_listing(
        &self,
        mapped_payload: &JsonValue,
        photo_files: &[String],
    ) -> impl Future<Output = anyhow::Result<PostOutcome>> + Send {
        ready(self(mapped_payload, photo_files))
    }
}
