//! `filter`：对已解析的 (outline, translation) 做可见性过滤。
//!
//! 约定：
//! - filter 只影响 `DictionaryStack::lookup`，不影响 `raw_lookup` 与反查
//! - filter 返回 true 表示“隐藏”，隐藏后**不会**回退到低优先级词典

use crate::outline::Outline;

/// Filter：判断一条已解析的翻译是否应对调用方隐藏。
pub trait Filter: Send + Sync {
    fn hides(&self, outline: &Outline, translation: &str) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&Outline, &str) -> bool + Send + Sync,
{
    fn hides(&self, outline: &Outline, translation: &str) -> bool {
        self(outline, translation)
    }
}

/// 隐藏包含命令（`{...}` 格式化/控制指令）的翻译，对应界面上的“隐藏命令”开关。
pub struct HideCommands;

impl Filter for HideCommands {
    fn hides(&self, _outline: &Outline, translation: &str) -> bool {
        translation.contains('{')
    }
}
