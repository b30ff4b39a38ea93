//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`     — 数据模型（Talent / TalentOutcome / RunSummary）
//! - `manager`    — 单成员图片落盘与断点续传判断
//! - `pool`       — 成员并发处理工作池
//! - `downloader` — 下载主流程编排

pub mod downloader;
pub mod manager;
pub mod models;
pub(crate) mod pool;
