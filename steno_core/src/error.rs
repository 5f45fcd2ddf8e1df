//! `error`：词典层与词典栈的可恢复错误。
use crate::outline::Outline;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DictionaryError {
    /// 删除不存在的 outline。
    #[error("词典中没有 outline `{0}`")]
    KeyNotFound(Outline),
    /// 按 path 寻址的词典不在栈中。
    #[error("未知词典: {0}")]
    UnknownDictionary(String),
    /// 写入只读词典；写入本身不生效。
    #[error("词典只读: {0}")]
    ReadOnlyDictionary(String),
    /// 未指定目标且所有词典都只读。
    #[error("没有可写的词典")]
    NoWritableDictionary,
    /// 同一个 path 在栈中出现两次。
    #[error("词典重复: {0}")]
    DuplicateDictionary(String),
    /// 词典已经属于另一个栈。
    #[error("词典已属于另一个栈: {0}")]
    AlreadyAttached(String),
}
