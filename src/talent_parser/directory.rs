//! 主页成员表格抽取。
//!
//! 主页上每张 `wikitable` 是一组成员；表内第一个带 title 的锚点是
//! 组链接（指向该期生的汇总页），不算成员，其余每个带 title 的锚点
//! 产出一条成员记录。个别成员的链接需要按位置覆写（见
//! [`TalentOverride`]）。

use thiserror::Error;
use tracing::{debug, info};

use crate::base_system::context::TalentOverride;
use crate::download::models::{Talent, TalentGroup};
use crate::network_parser::document::{Document, absolutize, anchors};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("index page {url} has no talent tables")]
    NoTables { url: String },
    #[error("override position {position} is out of range ({len} talents extracted)")]
    OverrideOutOfRange { position: usize, len: usize },
}

pub struct DirectoryParser {
    site_base: String,
    overrides: Vec<TalentOverride>,
}

impl DirectoryParser {
    pub fn new(site_base: impl Into<String>, overrides: Vec<TalentOverride>) -> Self {
        Self {
            site_base: site_base.into(),
            overrides,
        }
    }

    /// 抽取全部成员，按“表格顺序、表内文档顺序”排列，覆写已应用。
    pub fn extract(&self, page: &Document) -> Result<Vec<Talent>, ExtractError> {
        let groups = self.extract_grouped(page)?;
        let talents: Vec<Talent> = groups.into_iter().flat_map(|g| g.talents).collect();
        info!("主页共解析出 {} 位成员", talents.len());
        Ok(talents)
    }

    /// 按表格分组抽取，组名取表头锚点的 title。
    ///
    /// 覆写按扁平位置（跨组累计）应用，与 [`extract`](Self::extract)
    /// 的下标一致。
    pub fn extract_grouped(&self, page: &Document) -> Result<Vec<TalentGroup>, ExtractError> {
        let tables = page.member_tables();
        if tables.is_empty() {
            return Err(ExtractError::NoTables {
                url: page.url().to_string(),
            });
        }

        let mut groups = Vec::with_capacity(tables.len());
        for table in tables {
            let mut label = String::new();
            let mut talents = Vec::new();
            let mut seen_header = false;

            for anchor in anchors(table) {
                let Some(title) = anchor.title else {
                    continue;
                };
                if !seen_header {
                    // 表内第一个锚点是组链接，不是成员
                    seen_header = true;
                    label = title;
                    continue;
                }
                let Some(href) = anchor.href else {
                    debug!("锚点 “{}” 缺少 href，跳过", title);
                    continue;
                };
                debug!("发现成员 {}", title);
                talents.push(Talent::new(title, absolutize(&self.site_base, &href)));
            }

            groups.push(TalentGroup { label, talents });
        }

        self.apply_overrides(&mut groups)?;
        Ok(groups)
    }

    fn apply_overrides(&self, groups: &mut [TalentGroup]) -> Result<(), ExtractError> {
        let len: usize = groups.iter().map(|g| g.talents.len()).sum();
        for rule in &self.overrides {
            if rule.position >= len {
                return Err(ExtractError::OverrideOutOfRange {
                    position: rule.position,
                    len,
                });
            }
            let mut index = rule.position;
            for group in groups.iter_mut() {
                if index < group.talents.len() {
                    let talent = &mut group.talents[index];
                    debug!("按位置 {} 覆写成员: {} → {}", rule.position, talent.name, rule.name);
                    talent.name = rule.name.clone();
                    talent.link = rule.link.clone();
                    break;
                }
                index -= group.talents.len();
            }
        }
        Ok(())
    }
}
