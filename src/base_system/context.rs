//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

/// 按抽取位置覆写一条成员记录。
///
/// 主页上个别成员的链接指向消歧义页而不是真正的详情页
/// （目前只有 AZKi 一例），用配置表修正而不是写死在代码里，
/// 站点结构变动时改 `config.yml` 即可。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalentOverride {
    pub position: usize,
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 站点配置
    #[serde(default = "default_index_url")]
    pub index_url: String,
    #[serde(default = "default_site_base")]
    pub site_base: String,
    #[serde(default = "default_costumes_tab_title")]
    pub costumes_tab_title: String,
    #[serde(default = "default_overrides")]
    pub overrides: Vec<TalentOverride>,

    // 网络配置
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_min_wait_time")]
    pub min_wait_time: u64,
    #[serde(default = "default_max_wait_time")]
    pub max_wait_time: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 保存配置
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
    #[serde(default = "default_false")]
    pub preserve_source_extension: bool,
    #[serde(default = "default_true")]
    pub trust_file_count: bool,
}

impl Config {
    /// 图片根目录；`save_path` 为空时落在当前目录的 `images/`。
    pub fn save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            PathBuf::from("images")
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        PathBuf::from(&self.manifest_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            site_base: default_site_base(),
            costumes_tab_title: default_costumes_tab_title(),
            overrides: default_overrides(),
            max_workers: default_max_workers(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            min_wait_time: default_min_wait_time(),
            max_wait_time: default_max_wait_time(),
            user_agent: default_user_agent(),
            save_path: String::new(),
            manifest_file: default_manifest_file(),
            image_extension: default_image_extension(),
            preserve_source_extension: false,
            trust_file_count: true,
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        &[
            FieldMeta {
                name: "index_url",
                description: "成员总览页（wiki 主页）地址",
            },
            FieldMeta {
                name: "site_base",
                description: "站点根地址，用于把相对链接补全为绝对链接",
            },
            FieldMeta {
                name: "costumes_tab_title",
                description: "服装区块的 tabber 标题（注意站点源码里带一个尾随空格）",
            },
            FieldMeta {
                name: "overrides",
                description: "按抽取位置覆写成员记录（position/name/link），\n用于修正主页上指向消歧义页的链接",
            },
            FieldMeta {
                name: "max_workers",
                description: "并发处理成员的工作线程数",
            },
            FieldMeta {
                name: "request_timeout",
                description: "单次请求超时（秒）",
            },
            FieldMeta {
                name: "max_retries",
                description: "网络请求最大重试次数",
            },
            FieldMeta {
                name: "min_wait_time",
                description: "重试退避起始等待（毫秒）",
            },
            FieldMeta {
                name: "max_wait_time",
                description: "重试退避等待上限（毫秒）",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "save_path",
                description: "图片保存根目录；留空表示 ./images",
            },
            FieldMeta {
                name: "manifest_file",
                description: "成员清单（JSON）输出路径",
            },
            FieldMeta {
                name: "image_extension",
                description: "保存图片使用的固定扩展名",
            },
            FieldMeta {
                name: "preserve_source_extension",
                description: "true 时按图片 URL 的真实扩展名保存，忽略 image_extension",
            },
            FieldMeta {
                name: "trust_file_count",
                description: "断点续传判断：目录内文件数等于图片数时视为已完成并跳过。\nfalse 则每次运行都重新下载（等价于 --forced）",
            },
        ]
    }
}

fn default_index_url() -> String {
    "https://hololive.wiki/wiki/Main_Page".to_string()
}

fn default_site_base() -> String {
    "https://hololive.wiki".to_string()
}

fn default_costumes_tab_title() -> String {
    // 站点源码里 title 属性确实带尾随空格
    "Costumes ".to_string()
}

fn default_overrides() -> Vec<TalentOverride> {
    vec![TalentOverride {
        position: 0,
        name: "AZKi".to_string(),
        link: "https://hololive.wiki/wiki/AZKi".to_string(),
    }]
}

fn default_max_workers() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_min_wait_time() -> u64 {
    600
}

fn default_max_wait_time() -> u64 {
    8000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string()
}

fn default_manifest_file() -> String {
    "talents.json".to_string()
}

fn default_image_extension() -> String {
    "png".to_string()
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

/// 把任意展示名转成安全的文件/目录名。
pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|ch| match ch {
            ':' => '：',
            '"' => '”',
            '<' => '《',
            '>' => '》',
            '/' | '\\' => '、',
            '|' => '｜',
            '?' => '？',
            '*' => '＊',
            c if (c as u32) < 32 => replacement.chars().next().unwrap_or('_'),
            _ => ch,
        })
        .collect();

    cleaned = cleaned.trim().trim_end_matches('.').to_string();
    if cleaned.is_empty() {
        cleaned = replacement.to_string();
    }
    if cleaned.chars().count() > max_len {
        cleaned = cleaned.chars().take(max_len).collect();
    }
    cleaned
}
