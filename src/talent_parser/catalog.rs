//! 成员清单（manifest）读写。
//!
//! 清单是一个 JSON 数组，每条记录恰好三个字段：`name`、`link`、
//! `resources`（按发现顺序的图片 URL 列表）。保存在全部解析完成之后
//! 进行，中途取消的运行不会留下清单。

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::base_system::fs_tools::write_atomic;
use crate::download::models::Talent;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub fn save_catalog(talents: &[Talent], path: &Path) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let bytes = serde_json::to_vec_pretty(talents).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("清单已写入 {}（{} 位成员）", path.display(), talents.len());
    Ok(())
}

pub fn load_catalog(path: &Path) -> Result<Vec<Talent>, CatalogError> {
    let bytes = std::fs::read(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
