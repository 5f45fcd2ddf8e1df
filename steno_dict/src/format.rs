//! `format`：词典文件格式。
//!
//! - JSON：`{"TEFT/-G": "testing", ...}`，按 outline 排序写回
//! - TSV（简化版）：`outline<TAB>translation`，允许 `#` 开头注释行
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use steno_core::{Dictionary, Outline};
use tracing::info;

use crate::{
    error::LoadError,
    paths::{DictionaryPaths, is_asset},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Tsv,
}

impl Format {
    /// 按扩展名判断格式。
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => Ok(Self::Tsv),
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn parse(self, path: &Path, s: &str) -> Result<Vec<(Outline, String)>, LoadError> {
        match self {
            Self::Json => parse_json(path, s),
            Self::Tsv => parse_tsv(path, s),
        }
    }

    /// `path` 只用于错误信息。
    pub fn render(self, path: &Path, entries: &[(Outline, String)]) -> Result<String, LoadError> {
        match self {
            Self::Json => render_json(path, entries),
            Self::Tsv => Ok(render_tsv(entries)),
        }
    }
}

/// 加载一个词典。`path` 可以是缩写形式，栈内标识使用展开后的形式。
///
/// asset 永远只读；普通文件没有写权限时只读。
pub fn load(path: &str, paths: &DictionaryPaths) -> Result<Arc<Dictionary>, LoadError> {
    let full = paths.expand(path);
    let (file, readonly) = if is_asset(&full) {
        (paths.resolve_asset(&full)?, true)
    } else {
        let file = PathBuf::from(&full);
        let metadata = fs::metadata(&file).map_err(LoadError::io(&file))?;
        (file, metadata.permissions().readonly())
    };
    let format = Format::from_path(&file)?;
    let s = fs::read_to_string(&file).map_err(LoadError::io(&file))?;
    let entries = format.parse(&file, &s)?;
    let count = entries.len();
    let dictionary = Dictionary::from_entries(full, entries, readonly);
    info!(
        path = dictionary.path(),
        entries = count,
        readonly,
        longest_key = dictionary.longest_key(),
        "词典已加载"
    );
    Ok(Arc::new(dictionary))
}

/// 写回词典文件；只读词典（包括 asset）拒绝写入。
pub fn save(dictionary: &Dictionary) -> Result<(), LoadError> {
    if dictionary.readonly() || is_asset(dictionary.path()) {
        return Err(LoadError::ReadOnly(dictionary.path().to_owned()));
    }
    let file = Path::new(dictionary.path());
    let format = Format::from_path(file)?;
    let entries = dictionary.entries();
    let body = format.render(file, &entries)?;
    fs::write(file, body).map_err(LoadError::io(file))?;
    info!(path = dictionary.path(), entries = entries.len(), "词典已保存");
    Ok(())
}

fn parse_outline(path: &Path, s: &str) -> Result<Outline, LoadError> {
    s.parse().map_err(|source| LoadError::InvalidOutline {
        path: path.to_path_buf(),
        outline: s.to_owned(),
        source,
    })
}

fn parse_json(path: &Path, s: &str) -> Result<Vec<(Outline, String)>, LoadError> {
    let map: BTreeMap<String, String> = serde_json::from_str(s).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    map.into_iter()
        .map(|(outline, translation)| Ok((parse_outline(path, &outline)?, translation)))
        .collect()
}

fn render_json(path: &Path, entries: &[(Outline, String)]) -> Result<String, LoadError> {
    let map: BTreeMap<String, &str> = entries
        .iter()
        .map(|(outline, translation)| (outline.to_string(), translation.as_str()))
        .collect();
    let mut out = serde_json::to_string_pretty(&map).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    out.push('\n');
    Ok(out)
}

fn parse_tsv(path: &Path, s: &str) -> Result<Vec<(Outline, String)>, LoadError> {
    let mut entries = Vec::new();
    for (idx, line) in s.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let mut it = line.splitn(2, '\t');
        let outline = it.next().unwrap_or("").trim();
        let translation = it.next().unwrap_or("");
        if outline.is_empty() || translation.is_empty() {
            return Err(LoadError::MissingField {
                path: path.to_path_buf(),
                line: idx + 1,
            });
        }
        entries.push((parse_outline(path, outline)?, translation.to_owned()));
    }
    Ok(entries)
}

fn render_tsv(entries: &[(Outline, String)]) -> String {
    let mut out = String::new();
    for (outline, translation) in entries {
        out.push_str(&outline.to_string());
        out.push('\t');
        out.push_str(translation);
        out.push('\n');
    }
    out
}
