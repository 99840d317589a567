//! # Car Listing Flow
//!
//! 把照片批次自动变成二手车平台发布的批处理流水线
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `browser/` - Dolphin 配置文件控制与浏览器连接
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个批次 / 单份文案
//! - `PhotoImporter` - 下载并校验照片
//! - `ListingGenerator` - 基于模板调用 LLM 生成文案
//! - `ListingMapper` - 映射为平台表单结构
//! - `ListingPoster` - 填写并提交发布表单
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一张卡片"的完整处理流程
//! - `CardFlow` - 流程编排（import → generate → map → post）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/scheduler` - 轮询批次、建卡、结算结果
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, FlowError};
pub use infrastructure::JsExecutor;
pub use models::{Card, CardStatus, FlowState, StateSummary};
pub use orchestrator::{CycleReport, FlowScheduler};
pub use workflow::{CardFlow, ChainEnd, PostOutcome, StageOutcome};
