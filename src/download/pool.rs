//! 成员并发处理工作池。
//!
//! 每个任务处理一位成员：先解析服装图片，再落盘。任务之间没有共享
//! 可变状态，结果带下标经事件通道送回编排方，由编排方写回目录里
//! 对应的位置，所以不需要加锁。成员内部的两级解析保持顺序执行，
//! 保证图片顺序（也就是落盘文件名）不被并发打乱。

use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use crossbeam_channel as channel;
use tracing::{error, warn};

use crate::base_system::context::Config;
use crate::download::manager::{ImageDownloader, MaterializeOutcome};
use crate::download::models::{Talent, TalentOutcome};
use crate::network_parser::network::Fetcher;
use crate::talent_parser::resolver::{CostumeResolver, ResolveError};

pub(crate) struct TalentJob {
    pub index: usize,
    pub talent: Talent,
}

pub(crate) enum TalentEvent {
    /// 解析完成（随后还会有同下标的 `Done`）
    Resolved { index: usize, images: usize },
    /// 该成员处理完毕，带回（可能已填充图片的）成员记录
    Done {
        index: usize,
        talent: Talent,
        outcome: TalentOutcome,
    },
}

pub(crate) struct TalentWorkerPool {
    tx: Option<channel::Sender<TalentJob>>,
    rx_evt: channel::Receiver<TalentEvent>,
    handles: Vec<std::thread::JoinHandle<()>>,
}

impl TalentWorkerPool {
    pub(crate) fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        root: PathBuf,
        forced: bool,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Self {
        // 解析阶段每位成员要发 O(图片数) 个请求，线程数设上限控制
        // 对站点的并发压力
        let workers = config.max_workers.clamp(1, 8);
        let (tx, rx) = channel::unbounded::<TalentJob>();
        let (tx_evt, rx_evt) = channel::unbounded::<TalentEvent>();

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = rx.clone();
            let tx_evt = tx_evt.clone();
            let config = config.clone();
            let fetcher = fetcher.clone();
            let root = root.clone();
            let cancel = cancel.clone();

            handles.push(std::thread::spawn(move || {
                loop {
                    if cancel
                        .as_ref()
                        .map(|c| c.load(Ordering::Relaxed))
                        .unwrap_or(false)
                    {
                        return;
                    }

                    let job = match rx.recv_timeout(Duration::from_millis(200)) {
                        Ok(job) => job,
                        Err(channel::RecvTimeoutError::Timeout) => continue,
                        Err(channel::RecvTimeoutError::Disconnected) => return,
                    };

                    let evt = process_talent(&config, fetcher.as_ref(), &root, forced, job, &tx_evt);
                    let _ = tx_evt.send(evt);
                }
            }));
        }

        // 工作线程各自持有克隆；这里不留原件，线程全部退出后事件通道
        // 随之关闭，编排方的 iter() 才能结束
        drop(tx_evt);

        Self {
            tx: Some(tx),
            rx_evt,
            handles,
        }
    }

    pub(crate) fn submit(&self, job: TalentJob) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(job);
        }
    }

    /// 不再接收新任务；队列清空后工作线程自行退出。
    pub(crate) fn seal(&mut self) {
        self.tx.take();
    }

    pub(crate) fn events(&self) -> channel::Receiver<TalentEvent> {
        self.rx_evt.clone()
    }

    pub(crate) fn join(&mut self) {
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

fn process_talent(
    config: &Config,
    fetcher: &dyn Fetcher,
    root: &std::path::Path,
    forced: bool,
    job: TalentJob,
    tx_evt: &channel::Sender<TalentEvent>,
) -> TalentEvent {
    let TalentJob { index, mut talent } = job;

    // 已带图片列表的成员（来自清单）不再解析：resolve 重复调用会
    // 追加重复项
    if !talent.image_urls.is_empty() {
        let _ = tx_evt.send(TalentEvent::Resolved {
            index,
            images: talent.image_urls.len(),
        });
        return materialize_talent(config, fetcher, root, forced, index, talent);
    }

    let resolver = CostumeResolver::new(fetcher, &config.site_base, &config.costumes_tab_title);
    match resolver.resolve(&mut talent) {
        Ok(images) => {
            let _ = tx_evt.send(TalentEvent::Resolved { index, images });
        }
        Err(ResolveError::SectionNotFound { .. }) => {
            warn!("{}: 详情页没有服装区块，跳过该成员", talent.name);
            return TalentEvent::Done {
                index,
                talent,
                outcome: TalentOutcome::NoCostumeSection,
            };
        }
        Err(err) => {
            error!("{}: 解析失败: {}", talent.name, err);
            return TalentEvent::Done {
                index,
                talent,
                outcome: TalentOutcome::Failed {
                    reason: err.to_string(),
                },
            };
        }
    }

    materialize_talent(config, fetcher, root, forced, index, talent)
}

fn materialize_talent(
    config: &Config,
    fetcher: &dyn Fetcher,
    root: &std::path::Path,
    forced: bool,
    index: usize,
    talent: Talent,
) -> TalentEvent {
    let downloader = ImageDownloader::new(fetcher, config);
    let outcome = match downloader.materialize(&talent, root, forced) {
        Ok(MaterializeOutcome::Downloaded { files }) => TalentOutcome::Downloaded { images: files },
        Ok(MaterializeOutcome::AlreadyComplete { files }) => {
            TalentOutcome::AlreadyComplete { images: files }
        }
        Err(err) => {
            error!("{}: 下载失败: {}", talent.name, err);
            TalentOutcome::Failed {
                reason: err.to_string(),
            }
        }
    };

    TalentEvent::Done {
        index,
        talent,
        outcome,
    }
}
