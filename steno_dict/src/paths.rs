//! `paths`：词典标识的展开/缩写。
//!
//! 词典标识有两种形式：
//! - 普通文件路径：可以是绝对路径、相对配置目录的路径、或 `~/` 开头的用户目录路径
//! - asset 引用：`asset:<package>:<相对路径>`，指向随程序分发的只读词典
//!
//! 配置文件里保存缩写形式，栈里的 `Dictionary::path` 使用展开后的形式。
use std::{
    collections::HashMap,
    path::{MAIN_SEPARATOR_STR, Path, PathBuf},
};

use crate::error::LoadError;

pub const ASSET_SCHEME: &str = "asset:";

const HOME_PREFIX: &str = "~";

pub fn is_asset(path: &str) -> bool {
    path.starts_with(ASSET_SCHEME)
}

/// 路径解析所需的目录信息。
#[derive(Debug, Clone)]
pub struct DictionaryPaths {
    /// 相对路径以它为基准
    config_dir: PathBuf,
    home_dir: Option<PathBuf>,
    /// asset package 名 -> 资源根目录
    assets: HashMap<String, PathBuf>,
}

impl DictionaryPaths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            home_dir: None,
            assets: HashMap::new(),
        }
    }

    /// 平台默认目录：`<config>/steno` 与用户主目录。
    pub fn from_env() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("steno");
        let mut paths = Self::new(config_dir);
        paths.home_dir = dirs::home_dir();
        paths
    }

    pub fn with_config_dir(mut self, config_dir: impl Into<PathBuf>) -> Self {
        self.config_dir = config_dir.into();
        self
    }

    pub fn with_home_dir(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home_dir.into());
        self
    }

    pub fn with_asset_root(mut self, package: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.assets.insert(package.into(), root.into());
        self
    }

    /// 缩写 -> 完整标识。asset 与绝对路径保持不变。
    pub fn expand(&self, short: &str) -> String {
        if is_asset(short) {
            return short.to_owned();
        }
        if let Some(home) = &self.home_dir
            && let Some(rest) = strip_home(short)
        {
            return join(home, rest);
        }
        let path = Path::new(short);
        if path.is_absolute() {
            return short.to_owned();
        }
        join(&self.config_dir, short)
    }

    /// 完整标识 -> 缩写：配置目录下的写成相对路径，用户目录下的写成 `~/…`。
    pub fn shorten(&self, full: &str) -> String {
        if is_asset(full) {
            return full.to_owned();
        }
        let path = Path::new(full);
        if let Ok(relative) = path.strip_prefix(&self.config_dir) {
            return relative.to_string_lossy().into_owned();
        }
        if let Some(home) = &self.home_dir
            && let Ok(relative) = path.strip_prefix(home)
        {
            return format!("{HOME_PREFIX}{MAIN_SEPARATOR_STR}{}", relative.display());
        }
        full.to_owned()
    }

    /// 把 asset 引用解析为磁盘路径。
    pub fn resolve_asset(&self, reference: &str) -> Result<PathBuf, LoadError> {
        let unknown = || LoadError::UnknownAsset(reference.to_owned());
        let rest = reference.strip_prefix(ASSET_SCHEME).ok_or_else(unknown)?;
        let (package, relative) = rest.split_once(':').ok_or_else(unknown)?;
        let root = self.assets.get(package).ok_or_else(unknown)?;
        Ok(root.join(relative))
    }
}

fn strip_home(short: &str) -> Option<&str> {
    let rest = short.strip_prefix(HOME_PREFIX)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix('/')
        .or_else(|| rest.strip_prefix(MAIN_SEPARATOR_STR))
}

fn join(base: &Path, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string_lossy().into_owned();
    }
    base.join(relative).to_string_lossy().into_owned()
}
