//! 下载相关的数据模型定义。
//!
//! 成员（Talent）、分组视图、单成员处理结局与整次运行的统计。

use serde::{Deserialize, Serialize};

/// 一位成员：展示名、详情页链接、按发现顺序排列的图片 URL。
///
/// `image_urls` 在解析阶段只追加、不重排，顺序决定落盘文件名
/// （`0.png`、`1.png`…）。清单文件里该字段序列化为 `resources`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Talent {
    pub name: String,
    pub link: String,
    #[serde(rename = "resources", default)]
    pub image_urls: Vec<String>,
}

impl Talent {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
            image_urls: Vec::new(),
        }
    }
}

/// 一张成员表格对应的分组；表头锚点的 title 作为组名（所属期生）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalentGroup {
    pub label: String,
    pub talents: Vec<Talent>,
}

/// 单个成员的处理结局。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TalentOutcome {
    /// 本次实际传输并落盘
    Downloaded { images: usize },
    /// 目录文件数与图片数一致，跳过传输
    AlreadyComplete { images: usize },
    /// 详情页没有服装区块
    NoCostumeSection,
    /// 解析或下载失败，原因已写日志
    Failed { reason: String },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub total: usize,
    pub downloaded: usize,
    pub already_complete: usize,
    pub skipped: usize,
    pub failed: usize,
    pub canceled: usize,
}

impl RunSummary {
    pub(crate) fn record(&mut self, outcome: &TalentOutcome) {
        match outcome {
            TalentOutcome::Downloaded { .. } => self.downloaded += 1,
            TalentOutcome::AlreadyComplete { .. } => self.already_complete += 1,
            TalentOutcome::NoCostumeSection => self.skipped += 1,
            TalentOutcome::Failed { .. } => self.failed += 1,
        }
    }
}
