//! 下载主流程编排。
//!
//! 主页 → 成员列表 → 工作池并发处理（解析 + 落盘）→ 按下标收集
//! 结果 → 写清单 → 汇总。主页取不到或解析不出成员是运行级失败；
//! 单个成员的失败只记入汇总，不中断其他成员。

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{info, warn};

use crate::base_system::context::Config;
use crate::download::models::{RunSummary, Talent};
use crate::download::pool::{TalentEvent, TalentJob, TalentWorkerPool};
use crate::network_parser::network::{Fetcher, WikiNetwork};
use crate::talent_parser::catalog::{load_catalog, save_catalog};
use crate::talent_parser::directory::DirectoryParser;

pub struct RunOptions {
    pub forced: bool,
    /// 非空时只处理名字匹配的成员（不区分大小写）
    pub talent_filter: Vec<String>,
    pub progress_bars: bool,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            forced: false,
            talent_filter: Vec::new(),
            progress_bars: true,
            cancel: None,
        }
    }
}

/// 跑一整次流水线：主页 → 解析 → 下载 → 写清单。
pub fn run(config: &Config, options: RunOptions) -> Result<RunSummary> {
    let network = Arc::new(WikiNetwork::new(config).context("init http client")?);
    run_with_fetcher(config, options, network)
}

/// 跳过主页与详情页解析，直接按已有清单落盘。
///
/// 清单里的成员已带图片列表，工作池不会重新解析；适合离线补齐
/// 文件或换目录重下。
pub fn run_from_manifest(config: &Config, options: RunOptions) -> Result<RunSummary> {
    let network = Arc::new(WikiNetwork::new(config).context("init http client")?);
    run_from_manifest_with_fetcher(config, options, network)
}

pub(crate) fn run_with_fetcher(
    config: &Config,
    options: RunOptions,
    fetcher: Arc<dyn Fetcher>,
) -> Result<RunSummary> {
    let start = Instant::now();

    info!("获取成员总览页: {}", config.index_url);
    let index_doc = fetcher
        .fetch_document(&config.index_url)
        .context("fetch index page")?;

    let parser = DirectoryParser::new(&config.site_base, config.overrides.clone());
    let talents = parser
        .extract(&index_doc)
        .context("extract talent directory")?;

    let (summary, catalog) = dispatch_talents(config, &options, fetcher, talents)?;

    if summary.canceled > 0 {
        warn!("运行被取消：{} 位成员未处理，清单不写出", summary.canceled);
        return Ok(summary);
    }

    save_catalog(&catalog, &config.manifest_path()).context("write manifest")?;
    log_summary(&summary, start);
    Ok(summary)
}

pub(crate) fn run_from_manifest_with_fetcher(
    config: &Config,
    options: RunOptions,
    fetcher: Arc<dyn Fetcher>,
) -> Result<RunSummary> {
    let start = Instant::now();

    let manifest = config.manifest_path();
    info!("从清单 {} 读取成员", manifest.display());
    let talents = load_catalog(&manifest).context("load manifest")?;

    let (summary, _catalog) = dispatch_talents(config, &options, fetcher, talents)?;
    if summary.canceled > 0 {
        warn!("运行被取消：{} 位成员未处理", summary.canceled);
        return Ok(summary);
    }
    log_summary(&summary, start);
    Ok(summary)
}

/// 把成员分发给工作池并按下标收集结果。
///
/// 返回的目录与传入顺序一致；任何单成员失败都只记入汇总。
fn dispatch_talents(
    config: &Config,
    options: &RunOptions,
    fetcher: Arc<dyn Fetcher>,
    mut talents: Vec<Talent>,
) -> Result<(RunSummary, Vec<Talent>)> {
    if !options.talent_filter.is_empty() {
        let before = talents.len();
        talents.retain(|t| {
            options
                .talent_filter
                .iter()
                .any(|f| f.eq_ignore_ascii_case(&t.name))
        });
        info!("按名称过滤成员: {} → {}", before, talents.len());
        if talents.is_empty() {
            return Err(anyhow!("过滤后没有匹配的成员"));
        }
    }

    let total = talents.len();
    let root = config.save_dir();
    std::fs::create_dir_all(&root)
        .with_context(|| format!("create save dir {}", root.display()))?;

    let bars = options.progress_bars.then(|| make_bars(total));

    // 目录先按输入占位；每个任务独占一个下标，结果按下标写回，
    // 任务之间不会碰到同一条记录
    let mut catalog: Vec<Talent> = talents.clone();
    let mut pool = TalentWorkerPool::new(
        config.clone(),
        fetcher,
        root,
        options.forced,
        options.cancel.clone(),
    );
    for (index, talent) in talents.into_iter().enumerate() {
        pool.submit(TalentJob { index, talent });
    }
    pool.seal();

    let mut summary = RunSummary {
        total,
        ..Default::default()
    };
    let mut done = 0usize;
    for evt in pool.events().iter() {
        match evt {
            TalentEvent::Resolved { .. } => {
                if let Some(b) = &bars {
                    b.resolve_bar.inc(1);
                }
            }
            TalentEvent::Done {
                index,
                talent,
                outcome,
            } => {
                done += 1;
                summary.record(&outcome);
                if let Some(b) = &bars {
                    b.download_bar.inc(1);
                }
                catalog[index] = talent;
            }
        }
    }
    pool.join();

    if let Some(b) = bars {
        b.resolve_bar.finish_and_clear();
        b.download_bar.finish_and_clear();
    }

    if let Some(cancel) = &options.cancel
        && cancel.load(Ordering::Relaxed)
    {
        summary.canceled = total.saturating_sub(done);
    }

    Ok((summary, catalog))
}

fn log_summary(summary: &RunSummary, start: Instant) {
    info!(
        "处理完成：共 {} 位成员，下载 {}，已是最新 {}，跳过 {}，失败 {}，用时 {:.1}s",
        summary.total,
        summary.downloaded,
        summary.already_complete,
        summary.skipped,
        summary.failed,
        start.elapsed().as_secs_f32()
    );
}

struct CliBars {
    _mp: MultiProgress,
    resolve_bar: ProgressBar,
    download_bar: ProgressBar,
}

fn make_bars(total: usize) -> CliBars {
    let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
    let style =
        ProgressStyle::with_template("{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

    let resolve_bar = mp.add(ProgressBar::new(total as u64));
    resolve_bar.set_style(style.clone());
    resolve_bar.set_prefix("图片解析");

    let download_bar = mp.add(ProgressBar::new(total as u64));
    download_bar.set_style(style);
    download_bar.set_prefix("图片下载");

    CliBars {
        _mp: mp,
        resolve_bar,
        download_bar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_parser::network::stub::StubFetcher;
    use crate::talent_parser::catalog::load_catalog;

    /// 两张表、三位成员的完整桩站点：表 1 是表头 + A、B，表 2 是
    /// 表头 + C；位置 0 覆写为 Z（与线上 AZKi 修正同构）。
    fn stub_site() -> StubFetcher {
        let index = r#"
            <table class="wikitable">
              <a href="/wiki/Gen0" title="Gen 0">g</a>
              <a href="/wiki/A" title="A">A</a>
              <a href="/wiki/B" title="B">B</a>
            </table>
            <table class="wikitable">
              <a href="/wiki/Gen1" title="Gen 1">g</a>
              <a href="/wiki/C" title="C">C</a>
            </table>"#;
        let detail = |file: &str| {
            format!(r#"<div class="tabbertab" title="Costumes "><a class="image" href="/wiki/File:{file}">x</a></div>"#)
        };
        let file_page =
            |img: &str| format!(r#"<div class="fullImageLink"><a href="/images/{img}"></a></div>"#);

        StubFetcher::new()
            .with_page("https://hololive.wiki/wiki/Main_Page", index)
            .with_page("https://hololive.wiki/wiki/Z", &detail("Z.png"))
            .with_page("https://hololive.wiki/wiki/B", &detail("B.png"))
            .with_page("https://hololive.wiki/wiki/C", &detail("C.png"))
            .with_page("https://hololive.wiki/wiki/File:Z.png", &file_page("z.png"))
            .with_page("https://hololive.wiki/wiki/File:B.png", &file_page("b.png"))
            .with_page("https://hololive.wiki/wiki/File:C.png", &file_page("c.png"))
            .with_bytes("https://hololive.wiki/images/z.png", b"zz")
            .with_bytes("https://hololive.wiki/images/b.png", b"bb")
            .with_bytes("https://hololive.wiki/images/c.png", b"cc")
    }

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.save_path = dir.join("images").to_string_lossy().to_string();
        config.manifest_file = dir.join("talents.json").to_string_lossy().to_string();
        config.max_workers = 2;
        // 默认覆写表指向 AZKi；桩站点用 Z 代替
        config.overrides[0].name = "Z".to_string();
        config.overrides[0].link = "https://hololive.wiki/wiki/Z".to_string();
        config
    }

    fn quiet_options() -> RunOptions {
        RunOptions {
            progress_bars: false,
            ..Default::default()
        }
    }

    #[test]
    fn end_to_end_downloads_and_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let summary =
            run_with_fetcher(&config, quiet_options(), Arc::new(stub_site())).unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.downloaded, 3);
        assert_eq!(summary.failed, 0);

        // 覆写后的顺序是 [Z, B, C]，文件按下标落盘
        assert_eq!(
            std::fs::read(dir.path().join("images/Z/0.png")).unwrap(),
            b"zz"
        );
        assert!(dir.path().join("images/B/0.png").exists());
        assert!(dir.path().join("images/C/0.png").exists());

        let catalog = load_catalog(&config.manifest_path()).unwrap();
        let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Z", "B", "C"]);
        assert_eq!(
            catalog[0].image_urls,
            vec!["https://hololive.wiki/images/z.png"]
        );
    }

    #[test]
    fn second_run_skips_completed_talents() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        run_with_fetcher(&config, quiet_options(), Arc::new(stub_site())).unwrap();
        let summary =
            run_with_fetcher(&config, quiet_options(), Arc::new(stub_site())).unwrap();

        assert_eq!(summary.already_complete, 3);
        assert_eq!(summary.downloaded, 0);
    }

    #[test]
    fn forced_run_transfers_again() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        run_with_fetcher(&config, quiet_options(), Arc::new(stub_site())).unwrap();
        let options = RunOptions {
            forced: true,
            ..quiet_options()
        };
        let summary = run_with_fetcher(&config, options, Arc::new(stub_site())).unwrap();
        assert_eq!(summary.downloaded, 3);
    }

    #[test]
    fn talent_without_costume_section_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        // B 的详情页没有服装区块
        let fetcher = stub_site().with_page("https://hololive.wiki/wiki/B", "<p>bare</p>");

        let summary = run_with_fetcher(&config, quiet_options(), Arc::new(fetcher)).unwrap();
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.skipped, 1);

        // 清单仍包含被跳过的成员，resources 为空
        let catalog = load_catalog(&config.manifest_path()).unwrap();
        let b = catalog.iter().find(|t| t.name == "B").unwrap();
        assert!(b.image_urls.is_empty());
    }

    #[test]
    fn manifest_mode_downloads_without_touching_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        // 第一次完整运行产出清单，然后清空图片目录
        run_with_fetcher(&config, quiet_options(), Arc::new(stub_site())).unwrap();
        std::fs::remove_dir_all(dir.path().join("images")).unwrap();

        let fetcher = Arc::new(stub_site());
        let summary =
            run_from_manifest_with_fetcher(&config, quiet_options(), fetcher.clone()).unwrap();

        assert_eq!(summary.downloaded, 3);
        assert!(dir.path().join("images/Z/0.png").exists());
        // 清单模式不碰主页，也不重新解析详情页
        assert!(
            fetcher
                .hits()
                .iter()
                .all(|url| !url.contains("Main_Page") && !url.contains("wiki/File:"))
        );
    }

    #[test]
    fn unreachable_index_page_is_run_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let fetcher = StubFetcher::new(); // 主页 404

        assert!(run_with_fetcher(&config, quiet_options(), Arc::new(fetcher)).is_err());
        assert!(!config.manifest_path().exists());
    }

    #[test]
    fn talent_filter_limits_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let options = RunOptions {
            talent_filter: vec!["b".to_string()],
            ..quiet_options()
        };

        let summary = run_with_fetcher(&config, options, Arc::new(stub_site())).unwrap();
        assert_eq!(summary.total, 1);
        assert!(dir.path().join("images/B/0.png").exists());
        assert!(!dir.path().join("images/Z").exists());
    }
}
