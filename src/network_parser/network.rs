//! 站点 HTTP 客户端：超时、退避重试、类型化错误。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::{debug, warn};

use super::document::Document;
use crate::base_system::context::Config;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http client init failed: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode body of {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// 结构错误不重试，可用性错误重试：超时/连接失败、5xx、429。
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Client(_) | FetchError::Decode { .. } => false,
            FetchError::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            FetchError::Status { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
        }
    }
}

/// 抓取能力的接口；真实实现是 [`WikiNetwork`]，
/// 解析与下载逻辑靠它解耦，测试用离线桩页面驱动。
pub trait Fetcher: Send + Sync {
    fn fetch_document(&self, url: &str) -> Result<Document, FetchError>;
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct WikiNetwork {
    client: Client,
    max_retries: u32,
    min_wait: Duration,
    max_wait: Duration,
}

impl WikiNetwork {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(config.request_timeout.max(1)))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
            min_wait: Duration::from_millis(config.min_wait_time.max(1)),
            max_wait: Duration::from_millis(config.max_wait_time.max(config.min_wait_time.max(1))),
        })
    }

    /// GET 一个 URL，带退避重试。
    fn get_with_retry(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let mut backoff = self.min_wait;
        let mut last_err: Option<FetchError> = None;

        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                debug!("重试第 {} 次：{}", attempt, url);
            }

            let err = match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    FetchError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    }
                }
                Err(source) => FetchError::Transport {
                    url: url.to_string(),
                    source,
                },
            };

            if err.is_retryable() && attempt < self.max_retries {
                warn!("请求失败（将重试）: {}", err);
                std::thread::sleep(backoff + jitter(backoff / 4));
                backoff = (backoff * 2).min(self.max_wait);
                last_err = Some(err);
            } else {
                return Err(err);
            }
        }

        // max_retries 保证至少循环一次，能走到这里必然有错误记录
        Err(last_err.unwrap_or(FetchError::Status {
            url: url.to_string(),
            status: 0,
        }))
    }
}

impl Fetcher for WikiNetwork {
    fn fetch_document(&self, url: &str) -> Result<Document, FetchError> {
        debug!("获取页面: {}", url);
        let resp = self.get_with_retry(url)?;
        let text = resp.text().map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(Document::new(url, text))
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("下载资源: {}", url);
        let resp = self.get_with_retry(url)?;
        let bytes = resp.bytes().map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

/// 轻量抖动，避免重试同步踩点（不引入 rand 依赖）。
fn jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    Duration::from_millis(nanos % max.as_millis().max(1) as u64)
}
