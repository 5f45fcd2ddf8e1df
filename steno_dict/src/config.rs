//! `config`：词典栈配置（TOML）。
//!
//! ```toml
//! [[dictionaries]]
//! path = "user.json"            # 优先级最高
//!
//! [[dictionaries]]
//! path = "asset:steno:assets/main.json"
//! enabled = false
//! ```
use std::{fs, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use steno_core::Dictionary;
use tracing::debug;

use crate::{error::LoadError, format::load, paths::DictionaryPaths};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// 优先级从高到低
    #[serde(default)]
    pub dictionaries: Vec<DictionaryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// 缩写形式的词典标识
    pub path: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl StackConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(LoadError::io(path))?;
        toml::from_str(&s).map_err(|source| LoadError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 直接由命令行给出的词典列表构造（全部启用）。
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dictionaries: paths
                .into_iter()
                .map(|path| DictionaryEntry {
                    path: path.into(),
                    enabled: true,
                })
                .collect(),
        }
    }
}

/// 按配置依次加载词典并应用启用状态，返回值可直接交给 `DictionaryStack::set_dictionaries`。
pub fn load_stack(
    config: &StackConfig,
    paths: &DictionaryPaths,
) -> Result<Vec<Arc<Dictionary>>, LoadError> {
    let mut dictionaries = Vec::with_capacity(config.dictionaries.len());
    for entry in &config.dictionaries {
        let dictionary = load(&entry.path, paths)?;
        dictionary.set_enabled(entry.enabled);
        debug!(path = dictionary.path(), enabled = entry.enabled, "栈成员");
        dictionaries.push(dictionary);
    }
    Ok(dictionaries)
}
