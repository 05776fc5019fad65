use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZapError {
    #[error("Frame directory not found or unreadable: {0}")]
    NotFound(PathBuf),
    #[error("Invalid region: {0}")]
    InvalidRegion(String),
    #[error("Insufficient data: need {needed} frames, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("Failed to decode frame {frame}: {source}")]
    Decode {
        frame: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Duplicate frame identifier: {0}")]
    DuplicateFrame(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZapError {
    /// 配置类错误（目录不可读、区域非法）：不计入换台统计；其余错误计为一次失败
    pub fn is_fatal(&self) -> bool {
        matches!(self, ZapError::NotFound(_) | ZapError::InvalidRegion(_))
    }
}
