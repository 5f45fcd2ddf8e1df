use std::{io, path::PathBuf};

use steno_core::OutlineParseError;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("读写 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },
    #[error("JSON 词典 {path} 格式错误: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("配置 {path} 格式错误: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{path} 第 {line} 行缺少 outline/translation")]
    MissingField { path: PathBuf, line: usize },
    #[error("{path} 中的 outline `{outline}` 不合法: {source}")]
    InvalidOutline {
        path: PathBuf,
        outline: String,
        source: OutlineParseError,
    },
    #[error("未知 asset: {0}")]
    UnknownAsset(String),
    #[error("不支持的词典格式: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("词典只读: {0}")]
    ReadOnly(String),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
