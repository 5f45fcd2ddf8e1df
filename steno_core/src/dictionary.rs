//! `dictionary`：单个可变词典层。
//!
//! 每个词典同时维护三份索引，任何一次修改都在同一把写锁内同步更新：
//! - 正向：outline -> translation
//! - 精确反查：translation -> 映射到它的所有 outline
//! - 大小写折叠反查：folded(translation) -> 当前存在的各种大小写写法
//!
//! translation 存在 `slab` 里，反查索引只保存 slot 下标；
//! 一个 slot 的 outline 集合为空时，slot 连同它的折叠索引项一起释放。
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use slab::Slab;
use tracing::trace;

use crate::{error::DictionaryError, outline::Outline};

/// longest_key 变化时的回调，参数是新值。
pub type LongestKeyListener = Arc<dyn Fn(usize) + Send + Sync>;

/// 注册回调时返回的句柄，用于之后注销。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// 大小写折叠：反查时 `Testing` 与 `testing` 归为同一组。
pub fn fold_case(translation: &str) -> String {
    translation.to_lowercase()
}

struct TranslationSlot {
    text: Arc<str>,
    outlines: HashSet<Outline>,
}

#[derive(Default)]
struct Index {
    forward: HashMap<Outline, usize>,
    slots: Slab<TranslationSlot>,
    by_text: HashMap<Arc<str>, usize>,
    folded: HashMap<String, BTreeSet<usize>>,
    /// outline 长度 -> 该长度的 outline 个数
    lengths: BTreeMap<usize, usize>,
}

impl Index {
    fn longest(&self) -> usize {
        self.lengths.keys().next_back().copied().unwrap_or(0)
    }

    fn get(&self, outline: &Outline) -> Option<&str> {
        self.forward.get(outline).map(|&slot| &*self.slots[slot].text)
    }

    /// 调用方保证 `outline` 当前不在正向索引中。
    fn insert(&mut self, outline: Outline, translation: &str) {
        let slot = match self.by_text.get(translation) {
            Some(&slot) => slot,
            None => {
                let text: Arc<str> = Arc::from(translation);
                let slot = self.slots.insert(TranslationSlot {
                    text: text.clone(),
                    outlines: HashSet::new(),
                });
                self.by_text.insert(text, slot);
                self.folded.entry(fold_case(translation)).or_default().insert(slot);
                slot
            }
        };
        self.slots[slot].outlines.insert(outline.clone());
        *self.lengths.entry(outline.len()).or_default() += 1;
        self.forward.insert(outline, slot);
    }

    fn remove(&mut self, outline: &Outline) -> Option<Arc<str>> {
        let slot = self.forward.remove(outline)?;
        let entry = &mut self.slots[slot];
        entry.outlines.remove(outline);
        let text = entry.text.clone();
        if entry.outlines.is_empty() {
            self.slots.remove(slot);
            self.by_text.remove(&text);
            let folded = fold_case(&text);
            if let Some(cased) = self.folded.get_mut(&folded) {
                cased.remove(&slot);
                if cased.is_empty() {
                    self.folded.remove(&folded);
                }
            }
        }
        if let Some(count) = self.lengths.get_mut(&outline.len()) {
            *count -= 1;
            if *count == 0 {
                self.lengths.remove(&outline.len());
            }
        }
        Some(text)
    }

    fn reverse_lookup(&self, translation: &str) -> impl Iterator<Item = &Outline> {
        self.by_text
            .get(translation)
            .into_iter()
            .flat_map(move |&slot| self.slots[slot].outlines.iter())
    }

    fn casereverse_lookup(&self, folded: &str) -> impl Iterator<Item = &str> {
        self.folded
            .get(folded)
            .into_iter()
            .flat_map(move |slots| slots.iter().map(move |&slot| &*self.slots[slot].text))
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// 持有读锁的只读视图；`DictionaryStack` 用它在多个词典上取得一致快照。
pub(crate) struct DictionaryView<'a> {
    index: RwLockReadGuard<'a, Index>,
}

impl DictionaryView<'_> {
    pub(crate) fn get(&self, outline: &Outline) -> Option<&str> {
        self.index.get(outline)
    }

    pub(crate) fn reverse_lookup(&self, translation: &str) -> impl Iterator<Item = &Outline> {
        self.index.reverse_lookup(translation)
    }

    pub(crate) fn casereverse_lookup(&self, folded: &str) -> impl Iterator<Item = &str> {
        self.index.casereverse_lookup(folded)
    }
}

/// 词典层：一份可独立加载、启停、编辑的 outline -> translation 映射。
///
/// 通常以 `Arc<Dictionary>` 的形式同时被 `DictionaryStack` 和编辑工具持有；
/// 所有方法都只需要 `&self`。
pub struct Dictionary {
    /// 词典标识（路径或 asset 引用），在同一个栈内唯一
    path: String,
    enabled: AtomicBool,
    readonly: AtomicBool,
    index: RwLock<Index>,
    longest_key: AtomicUsize,
    listeners: Mutex<Vec<(ListenerId, LongestKeyListener)>>,
    next_listener: AtomicU64,
    /// 同一时刻只有一个线程在派发回调
    delivery: Mutex<()>,
    /// 最近一次派发给回调的值，只在持有 `delivery` 时修改
    delivered: AtomicUsize,
    /// 是否已属于某个 `DictionaryStack`
    attached: AtomicBool,
}

impl Dictionary {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            enabled: AtomicBool::new(true),
            readonly: AtomicBool::new(false),
            index: RwLock::new(Index::default()),
            longest_key: AtomicUsize::new(0),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            delivery: Mutex::new(()),
            delivered: AtomicUsize::new(0),
            attached: AtomicBool::new(false),
        }
    }

    /// 批量构建（加载器使用）：先填充，再设置 readonly。
    ///
    /// 重复的 outline 以最后一次出现为准。
    pub fn from_entries<I, S>(path: impl Into<String>, entries: I, readonly: bool) -> Self
    where
        I: IntoIterator<Item = (Outline, S)>,
        S: AsRef<str>,
    {
        let dictionary = Self::new(path);
        {
            let mut index = dictionary.index.write();
            for (outline, translation) in entries {
                index.remove(&outline);
                index.insert(outline, translation.as_ref());
            }
            let longest = index.longest();
            dictionary.longest_key.store(longest, Ordering::SeqCst);
            dictionary.delivered.store(longest, Ordering::SeqCst);
        }
        dictionary.readonly.store(readonly, Ordering::Release);
        dictionary
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// 禁用后，该词典对栈上的所有查询都不可见（等同于被移除）。
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn readonly(&self) -> bool {
        self.readonly.load(Ordering::Acquire)
    }

    /// 与写操作互斥：返回后不会再有写入落到只读词典上。
    pub fn set_readonly(&self, readonly: bool) {
        let _index = self.index.write();
        self.readonly.store(readonly, Ordering::Release);
    }

    /// 当前最长 outline 的 stroke 数；空词典为 0。
    pub fn longest_key(&self) -> usize {
        self.longest_key.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.index.read().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, outline: &Outline) -> bool {
        self.index.read().forward.contains_key(outline)
    }

    pub fn get(&self, outline: &Outline) -> Option<String> {
        self.index.read().get(outline).map(str::to_owned)
    }

    /// 全部条目的快照，按 outline 排序（写回文件时使用）。
    pub fn entries(&self) -> Vec<(Outline, String)> {
        let index = self.index.read();
        let mut entries: Vec<(Outline, String)> = index
            .forward
            .iter()
            .map(|(outline, &slot)| (outline.clone(), index.slots[slot].text.to_string()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// 写入（覆盖）一条映射。
    pub fn set(&self, outline: Outline, translation: &str) -> Result<(), DictionaryError> {
        let changed = {
            let mut index = self.index.write();
            self.ensure_writable()?;
            if index.get(&outline) == Some(translation) {
                return Ok(());
            }
            index.remove(&outline);
            index.insert(outline, translation);
            self.sync_longest_key(&index)
        };
        if changed {
            self.notify();
        }
        Ok(())
    }

    pub fn delete(&self, outline: &Outline) -> Result<(), DictionaryError> {
        let changed = {
            let mut index = self.index.write();
            self.ensure_writable()?;
            if index.remove(outline).is_none() {
                return Err(DictionaryError::KeyNotFound(outline.clone()));
            }
            self.sync_longest_key(&index)
        };
        if changed {
            self.notify();
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), DictionaryError> {
        let changed = {
            let mut index = self.index.write();
            self.ensure_writable()?;
            index.clear();
            self.sync_longest_key(&index)
        };
        if changed {
            self.notify();
        }
        Ok(())
    }

    /// 把 `other` 的全部条目按 `set` 语义写入本词典。
    ///
    /// 整批在一把写锁内完成，longest_key 若有变化只通知一次最终值。
    pub fn merge_from(&self, other: &Dictionary) -> Result<(), DictionaryError> {
        let entries = other.entries();
        let changed = {
            let mut index = self.index.write();
            self.ensure_writable()?;
            for (outline, translation) in entries {
                if index.get(&outline) == Some(translation.as_str()) {
                    continue;
                }
                index.remove(&outline);
                index.insert(outline, &translation);
            }
            self.sync_longest_key(&index)
        };
        if changed {
            self.notify();
        }
        Ok(())
    }

    /// 精确反查（区分大小写）：当前映射到 `translation` 的所有 outline。
    pub fn reverse_lookup(&self, translation: &str) -> Vec<Outline> {
        let mut outlines: Vec<Outline> = self
            .index
            .read()
            .reverse_lookup(translation)
            .cloned()
            .collect();
        outlines.sort();
        outlines
    }

    /// 折叠反查：`folded` 应为已折叠的文本，返回当前存在的各种大小写写法。
    pub fn casereverse_lookup(&self, folded: &str) -> Vec<String> {
        let mut cased: Vec<String> = self
            .index
            .read()
            .casereverse_lookup(folded)
            .map(str::to_owned)
            .collect();
        cased.sort();
        cased
    }

    /// 注册 longest_key 回调；只有值真正变化时才会被调用。
    pub fn add_longest_key_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// 注销回调；返回该句柄此前是否已注册。
    pub fn remove_longest_key_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn view(&self) -> DictionaryView<'_> {
        DictionaryView {
            index: self.index.read(),
        }
    }

    /// 加入栈时调用；已属于其他栈时返回 false。
    pub(crate) fn attach(&self) -> bool {
        self.attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    /// 须在写锁内调用。
    fn ensure_writable(&self) -> Result<(), DictionaryError> {
        if self.readonly() {
            return Err(DictionaryError::ReadOnlyDictionary(self.path.clone()));
        }
        Ok(())
    }

    /// 在写锁内调用：更新缓存值，返回是否变化。
    fn sync_longest_key(&self, index: &Index) -> bool {
        let longest = index.longest();
        self.longest_key.swap(longest, Ordering::SeqCst) != longest
    }

    /// 写锁释放后派发回调，回调里可以重新读取或修改本词典及所在的栈。
    ///
    /// 同一时刻只有一个派发者，它每轮都重新读取当前值；其余写者发现派发者
    /// 正忙时直接返回，由派发者补发最新值。并发修改期间中间值可能被合并，
    /// 但已被覆盖的旧值不会在新值之后送达，静止后回调最后收到的值等于 `longest_key()`。
    fn notify(&self) {
        loop {
            let Some(delivery) = self.delivery.try_lock() else {
                return;
            };
            loop {
                let longest = self.longest_key();
                if longest == self.delivered.load(Ordering::SeqCst) {
                    break;
                }
                self.delivered.store(longest, Ordering::SeqCst);
                trace!(path = %self.path, longest, "longest_key 变化");
                let listeners: Vec<LongestKeyListener> = self
                    .listeners
                    .lock()
                    .iter()
                    .map(|(_, listener)| listener.clone())
                    .collect();
                for listener in listeners {
                    // 已有更新的值，旧值不再派发
                    if self.longest_key() != longest {
                        break;
                    }
                    listener(longest);
                }
            }
            drop(delivery);
            // 释放前后之间可能有写者 try_lock 失败
            if self.longest_key() == self.delivered.load(Ordering::SeqCst) {
                return;
            }
        }
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("path", &self.path)
            .field("enabled", &self.enabled())
            .field("readonly", &self.readonly())
            .field("len", &self.len())
            .field("longest_key", &self.longest_key())
            .finish()
    }
}
