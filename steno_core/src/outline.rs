//! `outline`：词典的键（一次或多次击键组成的序列）。
//!
//! 说明：
//! - core 只关心 stroke 的**顺序与内容**，不关心具体键位含义。
//! - 协议解码/键位映射层负责把设备输入转换成 stroke 字符串。
use std::{fmt, str::FromStr, sync::Arc};

/// 文本表示中 stroke 之间的分隔符（例如 `TEFT/-G`）。
pub const STROKE_SEPARATOR: char = '/';

/// 不可变的 stroke 序列；按完整序列比较与哈希，clone 只复制 `Arc`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Outline(Arc<[String]>);

impl Outline {
    pub fn new<I, S>(strokes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(strokes.into_iter().map(Into::into).collect())
    }

    /// stroke 个数（`longest_key` 统计的就是这个值）。
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn strokes(&self) -> &[String] {
        &self.0
    }
}

impl From<&[&str]> for Outline {
    fn from(strokes: &[&str]) -> Self {
        Self::new(strokes.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Outline {
    fn from(strokes: [&str; N]) -> Self {
        Self::new(strokes)
    }
}

impl fmt::Display for Outline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stroke) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{STROKE_SEPARATOR}")?;
            }
            f.write_str(stroke)?;
        }
        Ok(())
    }
}

/// 文本形式的 outline 不合法。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutlineParseError {
    #[error("outline 为空")]
    Empty,
    #[error("outline `{0}` 含有空 stroke")]
    EmptyStroke(String),
}

impl FromStr for Outline {
    type Err = OutlineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(OutlineParseError::Empty);
        }
        let strokes: Vec<&str> = s.split(STROKE_SEPARATOR).collect();
        if strokes.iter().any(|stroke| stroke.is_empty()) {
            return Err(OutlineParseError::EmptyStroke(s.to_owned()));
        }
        Ok(Self::new(strokes))
    }
}
