//! 服装图片解析。
//!
//! 两级间接：成员详情页的服装 tabber 区块里，`class="image"` 的锚点
//! 指向文件页；文件页上 `fullImageLink` 容器里的锚点才是原图地址。
//! 区块内混着装饰性/布局锚点属于预期噪音，单个候选不满足结构就跳过
//! 该候选，不影响整次解析。

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::download::models::Talent;
use crate::network_parser::document::{absolutize, anchors};
use crate::network_parser::network::{FetchError, Fetcher};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{talent}: costume section not found on {url}")]
    SectionNotFound { talent: String, url: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub struct CostumeResolver<'a> {
    fetcher: &'a dyn Fetcher,
    site_base: &'a str,
    tab_title: &'a str,
}

impl<'a> CostumeResolver<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, site_base: &'a str, tab_title: &'a str) -> Self {
        Self {
            fetcher,
            site_base,
            tab_title,
        }
    }

    /// 解析一位成员的全部服装图片，按区块内文档顺序追加到
    /// `talent.image_urls`。
    ///
    /// 只应对每位成员调用一次：重复调用会追加重复项，调用方负责
    /// 保证成员来自刚抽取的空列表。
    pub fn resolve(&self, talent: &mut Talent) -> Result<usize, ResolveError> {
        info!("开始解析 {} 的服装图片", talent.name);
        let start = Instant::now();

        let page = self.fetcher.fetch_document(&talent.link)?;
        let Some(section) = page.tabber_section(self.tab_title) else {
            return Err(ResolveError::SectionNotFound {
                talent: talent.name.clone(),
                url: talent.link.clone(),
            });
        };

        let mut found = 0usize;
        for anchor in anchors(section) {
            // 候选判定：class 第一个 token 必须是 image
            if anchor.first_class.as_deref() != Some("image") {
                continue;
            }
            let Some(href) = anchor.href else {
                debug!("{}: 图片锚点缺少 href，跳过该候选", talent.name);
                continue;
            };

            let file_page_url = absolutize(self.site_base, &href);
            let file_page = match self.fetcher.fetch_document(&file_page_url) {
                Ok(p) => p,
                Err(err) => {
                    warn!("{}: 文件页获取失败，跳过该图片: {}", talent.name, err);
                    continue;
                }
            };
            let Some(full) = file_page.full_image_href() else {
                debug!(
                    "{}: 文件页 {} 缺少原图容器，跳过该候选",
                    talent.name, file_page_url
                );
                continue;
            };

            talent.image_urls.push(absolutize(self.site_base, &full));
            found += 1;
        }

        debug!(
            "{}: 找到 {} 张图片，用时 {:.2}s",
            talent.name,
            found,
            start.elapsed().as_secs_f32()
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_parser::network::stub::StubFetcher;

    const BASE: &str = "https://hololive.wiki";
    const TAB: &str = "Costumes ";

    fn detail_page(body: &str) -> String {
        format!(r#"<div class="tabbertab" title="Costumes ">{body}</div>"#)
    }

    fn file_page(full_href: &str) -> String {
        format!(r#"<div class="fullImageLink"><a href="{full_href}"><img></a></div>"#)
    }

    #[test]
    fn resolves_two_level_image_urls_in_order() {
        let fetcher = StubFetcher::new()
            .with_page(
                "https://hololive.wiki/wiki/A",
                &detail_page(
                    r#"<a class="image" href="/wiki/File:A0.png">x</a>
                       <a class="image" href="/wiki/File:A1.png">y</a>"#,
                ),
            )
            .with_page("https://hololive.wiki/wiki/File:A0.png", &file_page("/images/a0.png"))
            .with_page("https://hololive.wiki/wiki/File:A1.png", &file_page("/images/a1.png"));

        let mut talent = Talent::new("A", "https://hololive.wiki/wiki/A");
        let resolver = CostumeResolver::new(&fetcher, BASE, TAB);
        let found = resolver.resolve(&mut talent).unwrap();

        assert_eq!(found, 2);
        assert_eq!(
            talent.image_urls,
            vec![
                "https://hololive.wiki/images/a0.png",
                "https://hololive.wiki/images/a1.png"
            ]
        );
    }

    #[test]
    fn missing_section_fails_and_leaves_urls_empty() {
        let fetcher = StubFetcher::new()
            .with_page("https://hololive.wiki/wiki/A", "<p>no costumes tab</p>");
        let mut talent = Talent::new("A", "https://hololive.wiki/wiki/A");
        let resolver = CostumeResolver::new(&fetcher, BASE, TAB);

        let err = resolver.resolve(&mut talent).unwrap_err();
        assert!(matches!(err, ResolveError::SectionNotFound { .. }));
        assert!(talent.image_urls.is_empty());
    }

    #[test]
    fn decoration_anchors_are_expected_noise() {
        let fetcher = StubFetcher::new()
            .with_page(
                "https://hololive.wiki/wiki/A",
                &detail_page(
                    r#"<a class="mw-redirect" href="/wiki/Other">decor</a>
                       <a href="/wiki/Plain">no class</a>
                       <a class="image" href="/wiki/File:A0.png">x</a>"#,
                ),
            )
            .with_page("https://hololive.wiki/wiki/File:A0.png", &file_page("/images/a0.png"));

        let mut talent = Talent::new("A", "https://hololive.wiki/wiki/A");
        let resolver = CostumeResolver::new(&fetcher, BASE, TAB);
        assert_eq!(resolver.resolve(&mut talent).unwrap(), 1);
    }

    #[test]
    fn candidate_without_container_is_dropped_not_fatal() {
        let fetcher = StubFetcher::new()
            .with_page(
                "https://hololive.wiki/wiki/A",
                &detail_page(
                    r#"<a class="image" href="/wiki/File:Bad.png">x</a>
                       <a class="image" href="/wiki/File:Good.png">y</a>"#,
                ),
            )
            // Bad 的文件页没有原图容器；Good 正常
            .with_page("https://hololive.wiki/wiki/File:Bad.png", "<p>broken layout</p>")
            .with_page("https://hololive.wiki/wiki/File:Good.png", &file_page("/images/good.png"));

        let mut talent = Talent::new("A", "https://hololive.wiki/wiki/A");
        let resolver = CostumeResolver::new(&fetcher, BASE, TAB);
        assert_eq!(resolver.resolve(&mut talent).unwrap(), 1);
        assert_eq!(talent.image_urls, vec!["https://hololive.wiki/images/good.png"]);
    }

    #[test]
    fn candidate_fetch_failure_is_dropped_not_fatal() {
        // File:Gone.png 不在桩页面表里 → 404
        let fetcher = StubFetcher::new()
            .with_page(
                "https://hololive.wiki/wiki/A",
                &detail_page(
                    r#"<a class="image" href="/wiki/File:Gone.png">x</a>
                       <a class="image" href="/wiki/File:Here.png">y</a>"#,
                ),
            )
            .with_page("https://hololive.wiki/wiki/File:Here.png", &file_page("/images/here.png"));

        let mut talent = Talent::new("A", "https://hololive.wiki/wiki/A");
        let resolver = CostumeResolver::new(&fetcher, BASE, TAB);
        assert_eq!(resolver.resolve(&mut talent).unwrap(), 1);
    }

    #[test]
    fn detail_page_fetch_failure_is_fatal_for_the_talent() {
        let fetcher = StubFetcher::new();
        let mut talent = Talent::new("A", "https://hololive.wiki/wiki/A");
        let resolver = CostumeResolver::new(&fetcher, BASE, TAB);
        assert!(matches!(
            resolver.resolve(&mut talent),
            Err(ResolveError::Fetch(_))
        ));
    }
}
