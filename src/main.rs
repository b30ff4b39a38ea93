//! hololive wiki 成员服装图片下载器。
//!
//! 本 crate 负责：从 wiki 主页解析成员列表、逐成员解析服装图片
//! 地址、并发下载落盘、输出成员清单（JSON）。
//!
//! 代码结构（读代码入口）：
//! - `base_system`    — 配置/日志/路径等基础设施
//! - `network_parser` — HTTP 客户端与页面结构扫描
//! - `talent_parser`  — 成员表格抽取、服装图片解析、清单读写
//! - `download`       — 落盘、工作池与主流程编排

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;

mod base_system;
mod download;
mod network_parser;
mod talent_parser;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem, register_cancel_flag};
use download::downloader::{RunOptions, run, run_from_manifest};
use network_parser::network::{Fetcher, WikiNetwork};
use talent_parser::directory::DirectoryParser;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "hololive-image-downloader")]
#[command(about = "hololive wiki 成员服装图片下载器")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 忽略断点续传检查，强制重新下载全部图片
    #[arg(long, default_value_t = false)]
    forced: bool,

    /// 只处理指定成员（可重复；按展示名匹配，不区分大小写）
    #[arg(long = "talent")]
    talents: Vec<String>,

    /// 只打印成员清单（按期生分组），不下载
    #[arg(long, default_value_t = false)]
    list: bool,

    /// 不抓主页，按已有清单文件直接下载
    #[arg(long, default_value_t = false)]
    from_manifest: bool,

    /// 图片保存根目录（覆盖配置文件）
    #[arg(long)]
    output: Option<String>,

    /// 清单输出路径（覆盖配置文件）
    #[arg(long)]
    manifest: Option<String>,

    /// 工作线程数（覆盖配置文件）
    #[arg(long)]
    workers: Option<usize>,

    /// 配置文件路径
    #[arg(long)]
    config: Option<String>,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("hololive-image-downloader v{}", VERSION);
        return Ok(());
    }

    let _log = init_logging(cli.debug)?;
    info!("hololive-image-downloader v{} 启动", VERSION);

    let mut config = load_or_create::<Config>(cli.config.as_deref().map(Path::new))
        .map_err(|e| anyhow!(e.to_string()))?;
    if let Some(output) = cli.output {
        config.save_path = output;
    }
    if let Some(manifest) = cli.manifest {
        config.manifest_file = manifest;
    }
    if let Some(workers) = cli.workers {
        config.max_workers = workers.max(1);
    }

    if cli.list {
        return list_talents(&config);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    register_cancel_flag(cancel.clone());

    let options = RunOptions {
        forced: cli.forced,
        talent_filter: cli.talents,
        progress_bars: true,
        cancel: Some(cancel),
    };
    let summary = if cli.from_manifest {
        run_from_manifest(&config, options)?
    } else {
        run(&config, options)?
    };

    println!(
        "处理完成：共 {} 位成员，下载 {}，已是最新 {}，跳过 {}，失败 {}{}",
        summary.total,
        summary.downloaded,
        summary.already_complete,
        summary.skipped,
        summary.failed,
        if summary.canceled > 0 {
            format!("，取消 {}", summary.canceled)
        } else {
            String::new()
        }
    );
    Ok(())
}

/// 只抓主页、按期生分组打印成员清单。
fn list_talents(config: &Config) -> Result<()> {
    let network = WikiNetwork::new(config).context("init http client")?;
    let page = network
        .fetch_document(&config.index_url)
        .context("fetch index page")?;
    let parser = DirectoryParser::new(&config.site_base, config.overrides.clone());
    let groups = parser
        .extract_grouped(&page)
        .context("extract talent directory")?;

    for group in groups {
        if group.label.is_empty() {
            println!("(未命名分组)");
        } else {
            println!("{}", group.label);
        }
        for talent in group.talents {
            println!("  {} — {}", talent.name, talent.link);
        }
    }
    Ok(())
}

fn init_logging(debug: bool) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: true,
    };
    LogSystem::init(opts).map_err(|e| anyhow!(e.to_string()))
}
