//! 网络与页面结构模块入口。
//!
//! - `network`  — 站点 HTTP 客户端（超时、退避重试、类型化错误）
//! - `document` — 已获取页面的结构化扫描（表格、锚点、区块定位）

pub mod document;
pub mod network;
