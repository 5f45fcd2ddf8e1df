//! `steno_dict`：词典文件的加载与写回。
//!
//! 负责 core 不关心的部分：
//! - 词典标识（路径 / asset 引用）的展开与缩写
//! - 只读判定（asset 永远只读；文件按权限判断）
//! - 文件格式（JSON、TSV）与栈配置（TOML）
pub mod config;
pub mod error;
pub mod format;
pub mod paths;

pub use config::{DictionaryEntry, StackConfig, load_stack};
pub use error::LoadError;
pub use format::{Format, load, save};
pub use paths::{ASSET_SCHEME, DictionaryPaths, is_asset};
