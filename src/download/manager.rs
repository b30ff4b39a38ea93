//! 单成员图片落盘。
//!
//! 断点续传用“目录内文件数 == 图片数”这一粗粒度判断（可在配置里
//! 关掉）：它不校验内容，数量恰好相同的受损目录会被当成已完成。
//! 这是沿用下来的已知取舍，不在这里悄悄加固。

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::base_system::context::Config;
use crate::base_system::fs_tools::{file_count, write_atomic};
use crate::base_system::talent_paths::talent_folder_name;
use crate::download::models::Talent;
use crate::network_parser::network::{FetchError, Fetcher};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to download {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// 本次实际传输
    Downloaded { files: usize },
    /// 文件数匹配，零传输跳过
    AlreadyComplete { files: usize },
}

pub struct ImageDownloader<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a Config,
}

impl<'a> ImageDownloader<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a Config) -> Self {
        Self { fetcher, config }
    }

    /// 把一位成员的全部图片写进 `root/<成员名>/`，文件名是图片在
    /// `image_urls` 里的下标。已存在的同下标文件会被覆盖。
    ///
    /// 目录创建失败（典型是权限问题）只影响该成员，调用方记为
    /// 失败后继续处理其他成员。
    pub fn materialize(
        &self,
        talent: &Talent,
        root: &Path,
        forced: bool,
    ) -> Result<MaterializeOutcome, MaterializeError> {
        let dir = root.join(talent_folder_name(&talent.name));
        std::fs::create_dir_all(&dir).map_err(|source| MaterializeError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let expected = talent.image_urls.len();
        if !forced && self.config.trust_file_count && file_count(&dir) == expected {
            info!("{} 的图片已全部存在，跳过下载", talent.name);
            return Ok(MaterializeOutcome::AlreadyComplete { files: expected });
        }

        info!(
            "开始下载 {} 的 {} 张图片到 {}",
            talent.name,
            expected,
            dir.display()
        );
        for (index, url) in talent.image_urls.iter().enumerate() {
            let bytes =
                self.fetcher
                    .fetch_bytes(url)
                    .map_err(|source| MaterializeError::Fetch {
                        url: url.clone(),
                        source,
                    })?;
            let path = dir.join(format!("{index}.{}", self.extension_for(url)));
            write_atomic(&path, &bytes).map_err(|source| MaterializeError::Write {
                path: path.clone(),
                source,
            })?;
            debug!("已保存 {}", path.display());
        }

        Ok(MaterializeOutcome::Downloaded { files: expected })
    }

    fn extension_for<'b>(&'b self, url: &'b str) -> &'b str {
        if self.config.preserve_source_extension
            && let Some(ext) = extension_from_url(url)
        {
            return ext;
        }
        &self.config.image_extension
    }
}

/// URL 最后一段路径的扩展名（去掉 query/fragment）。
fn extension_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_parser::network::stub::StubFetcher;

    fn talent_with_urls(urls: &[&str]) -> Talent {
        let mut t = Talent::new("A", "https://hololive.wiki/wiki/A");
        t.image_urls = urls.iter().map(|u| u.to_string()).collect();
        t
    }

    #[test]
    fn downloads_all_images_named_by_index() {
        let fetcher = StubFetcher::new()
            .with_bytes("https://cdn/x.png", b"xx")
            .with_bytes("https://cdn/y.jpg", b"yy");
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let talent = talent_with_urls(&["https://cdn/x.png", "https://cdn/y.jpg"]);

        let outcome = ImageDownloader::new(&fetcher, &config)
            .materialize(&talent, dir.path(), false)
            .unwrap();

        assert_eq!(outcome, MaterializeOutcome::Downloaded { files: 2 });
        // 扩展名固定，按下标命名
        assert_eq!(std::fs::read(dir.path().join("A/0.png")).unwrap(), b"xx");
        assert_eq!(std::fs::read(dir.path().join("A/1.png")).unwrap(), b"yy");
    }

    #[test]
    fn matching_file_count_skips_all_transfers() {
        let fetcher = StubFetcher::new();
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let talent_dir = dir.path().join("A");
        std::fs::create_dir_all(&talent_dir).unwrap();
        std::fs::write(talent_dir.join("0.png"), b"old0").unwrap();
        std::fs::write(talent_dir.join("1.png"), b"old1").unwrap();
        let talent = talent_with_urls(&["https://cdn/x.png", "https://cdn/y.png"]);

        let outcome = ImageDownloader::new(&fetcher, &config)
            .materialize(&talent, dir.path(), false)
            .unwrap();

        assert_eq!(outcome, MaterializeOutcome::AlreadyComplete { files: 2 });
        assert!(fetcher.hits().is_empty());
    }

    #[test]
    fn forced_redownloads_even_when_count_matches() {
        let fetcher = StubFetcher::new()
            .with_bytes("https://cdn/x.png", b"new0")
            .with_bytes("https://cdn/y.png", b"new1");
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let talent_dir = dir.path().join("A");
        std::fs::create_dir_all(&talent_dir).unwrap();
        std::fs::write(talent_dir.join("0.png"), b"old0").unwrap();
        std::fs::write(talent_dir.join("1.png"), b"old1").unwrap();
        let talent = talent_with_urls(&["https://cdn/x.png", "https://cdn/y.png"]);

        let outcome = ImageDownloader::new(&fetcher, &config)
            .materialize(&talent, dir.path(), true)
            .unwrap();

        assert_eq!(outcome, MaterializeOutcome::Downloaded { files: 2 });
        assert_eq!(std::fs::read(talent_dir.join("0.png")).unwrap(), b"new0");
        assert_eq!(std::fs::read(talent_dir.join("1.png")).unwrap(), b"new1");
        assert_eq!(fetcher.hits().len(), 2);
    }

    #[test]
    fn distrusting_file_count_always_transfers() {
        let fetcher = StubFetcher::new().with_bytes("https://cdn/x.png", b"x");
        let mut config = Config::default();
        config.trust_file_count = false;
        let dir = tempfile::tempdir().unwrap();
        let talent_dir = dir.path().join("A");
        std::fs::create_dir_all(&talent_dir).unwrap();
        std::fs::write(talent_dir.join("0.png"), b"old").unwrap();
        let talent = talent_with_urls(&["https://cdn/x.png"]);

        let outcome = ImageDownloader::new(&fetcher, &config)
            .materialize(&talent, dir.path(), false)
            .unwrap();
        assert_eq!(outcome, MaterializeOutcome::Downloaded { files: 1 });
    }

    #[test]
    fn count_mismatch_triggers_full_download() {
        let fetcher = StubFetcher::new()
            .with_bytes("https://cdn/x.png", b"x")
            .with_bytes("https://cdn/y.png", b"y");
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let talent_dir = dir.path().join("A");
        std::fs::create_dir_all(&talent_dir).unwrap();
        std::fs::write(talent_dir.join("0.png"), b"only-one").unwrap();
        let talent = talent_with_urls(&["https://cdn/x.png", "https://cdn/y.png"]);

        let outcome = ImageDownloader::new(&fetcher, &config)
            .materialize(&talent, dir.path(), false)
            .unwrap();
        assert_eq!(outcome, MaterializeOutcome::Downloaded { files: 2 });
        assert_eq!(fetcher.hits().len(), 2);
    }

    #[test]
    fn preserve_source_extension_uses_url_extension() {
        let fetcher = StubFetcher::new()
            .with_bytes("https://cdn/art.jpg?version=3", b"j")
            .with_bytes("https://cdn/noext", b"n");
        let mut config = Config::default();
        config.preserve_source_extension = true;
        let dir = tempfile::tempdir().unwrap();
        let talent = talent_with_urls(&["https://cdn/art.jpg?version=3", "https://cdn/noext"]);

        ImageDownloader::new(&fetcher, &config)
            .materialize(&talent, dir.path(), false)
            .unwrap();
        assert!(dir.path().join("A/0.jpg").exists());
        // 取不出扩展名时退回固定扩展名
        assert!(dir.path().join("A/1.png").exists());
    }

    #[test]
    fn failed_resource_download_fails_the_talent() {
        let fetcher = StubFetcher::new(); // 桩里没有任何字节 → 404
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let talent = talent_with_urls(&["https://cdn/x.png"]);

        let err = ImageDownloader::new(&fetcher, &config)
            .materialize(&talent, dir.path(), false)
            .unwrap_err();
        assert!(matches!(err, MaterializeError::Fetch { .. }));
    }
}
