//! 图纸快照的读写。
//!
//! DXF 的解析/写出不在本仓库范围内：宿主用外部 CAD 库解析文件后，
//! 把扁平实体集合交给链接引擎。本 crate 提供这份集合的序列化接口
//! （JSON 快照），作为宿主与引擎之间的数据接缝。

use std::fs;
use std::path::Path;

use cadlink_core::drawing::Drawing;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("读取文件 {path:?} 失败: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("写入文件 {path:?} 失败: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("快照格式无效 {path:?}: {source}")]
    Format {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait DrawingLoader {
    fn load(&self, path: &Path) -> Result<Drawing, IoError>;
}

pub trait DrawingSaver {
    fn save(&self, drawing: &Drawing, path: &Path) -> Result<(), IoError>;
}

/// JSON 快照门面：宿主导出的实体集合以 JSON 落盘，再由此读回。
pub struct SnapshotFacade;

impl SnapshotFacade {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SnapshotFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingLoader for SnapshotFacade {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| IoError::Format {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl DrawingSaver for SnapshotFacade {
    fn save(&self, drawing: &Drawing, path: &Path) -> Result<(), IoError> {
        let data = serde_json::to_string_pretty(drawing).map_err(|source| IoError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, data).map_err(|source| IoError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
