//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责轮询和调度，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! scheduler::FlowScheduler (处理 Vec<批次>，持有 FlowState)
//!     ↓
//! workflow::CardFlow (处理单张卡片)
//!     ↓
//! services (能力层：import / generate / map / post)
//!     ↓
//! infrastructure / browser (基础设施：JsExecutor、Dolphin)
//! ```
//!
//! ## 设计原则
//!
//! 1. **状态显式**：FlowState 由调度器持有，没有全局注册表
//! 2. **失败隔离**：一张卡片失败不影响同一轮的其他批次
//! 3. **最多一次**：批次一旦处理过就不会再被建卡

pub mod scheduler;

pub use scheduler::{CycleReport, FlowScheduler};
