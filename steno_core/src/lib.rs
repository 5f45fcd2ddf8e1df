//! `steno_core`：纯逻辑层，不做任何 I/O。
//!
//! 设计目标：
//! - **核心可复用**：翻译引擎、编辑工具、CLI 都查询同一个 `DictionaryStack`
//! - **分层清晰**：outline（键序列） -> dictionary（单个词典层） -> stack（按优先级叠加） -> filter（可见性过滤）
//! - **不解释语义**：stroke 与 translation 都是不透明字符串
pub mod dictionary;
pub mod error;
pub mod filter;
pub mod outline;
pub mod stack;

pub use dictionary::{Dictionary, ListenerId};
pub use error::DictionaryError;
pub use filter::Filter;
pub use outline::{Outline, OutlineParseError};
pub use stack::DictionaryStack;
