//! `stack`：按优先级叠加的词典栈。
//!
//! 约定：
//! - 成员顺序即优先级，第一个最高
//! - 被禁用的词典对所有查询完全透明，等同于不在栈中
//! - filter 只作用于 `lookup`；`raw_lookup` 与反查系列永远看到未过滤的结果
//! - 反查做“遮蔽”检查：某个 outline 只有在 `raw_lookup` 仍解析到目标文本时才算数
//!
//! 并发模型：成员表与 filter 表各自在一把 `RwLock` 后面；查询持读锁，
//! 替换成员持写锁。反查会按成员顺序同时持有所有已启用词典的读锁，从而看到
//! 一致快照；一个词典只能属于一个栈，所以不会出现两个栈以相反顺序加锁。
use std::{
    collections::HashSet,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::{
    dictionary::{Dictionary, DictionaryView, ListenerId},
    error::DictionaryError,
    filter::Filter,
    outline::Outline,
};

struct Member {
    dictionary: Arc<Dictionary>,
    /// 本栈在该词典上注册的 longest_key 回调
    listener: ListenerId,
}

struct Shared {
    members: RwLock<Vec<Member>>,
    filters: RwLock<Vec<Arc<dyn Filter>>>,
    longest_key: AtomicUsize,
    /// 串行化重算，避免旧的结果覆盖新的结果
    recompute: Mutex<()>,
}

impl Shared {
    fn recompute_longest_key(&self, members: &[Member]) {
        let _guard = self.recompute.lock();
        let longest = members
            .iter()
            .map(|member| member.dictionary.longest_key())
            .max()
            .unwrap_or(0);
        let previous = self.longest_key.swap(longest, Ordering::AcqRel);
        if previous != longest {
            trace!(previous, longest, "栈 longest_key 变化");
        }
    }
}

/// 词典栈：优先级解析、过滤、反查与 longest_key 汇总。
pub struct DictionaryStack {
    shared: Arc<Shared>,
}

impl Default for DictionaryStack {
    fn default() -> Self {
        Self::new()
    }
}

impl DictionaryStack {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                members: RwLock::new(Vec::new()),
                filters: RwLock::new(Vec::new()),
                longest_key: AtomicUsize::new(0),
                recompute: Mutex::new(()),
            }),
        }
    }

    pub fn with_dictionaries(
        dictionaries: Vec<Arc<Dictionary>>,
    ) -> Result<Self, DictionaryError> {
        let stack = Self::new();
        stack.set_dictionaries(dictionaries)?;
        Ok(stack)
    }

    /// 整体替换成员（优先级从高到低）。
    ///
    /// - 新旧成员中的同一个实例保留原有回调，不会重复订阅
    /// - 被移除的词典注销回调
    /// - path 重复时返回 `DuplicateDictionary`，成员保持不变
    /// - 一个词典同一时刻只能属于一个栈，否则返回 `AlreadyAttached`，成员保持不变
    pub fn set_dictionaries(
        &self,
        dictionaries: Vec<Arc<Dictionary>>,
    ) -> Result<(), DictionaryError> {
        let mut paths = HashSet::new();
        for dictionary in &dictionaries {
            if !paths.insert(dictionary.path()) {
                return Err(DictionaryError::DuplicateDictionary(
                    dictionary.path().to_owned(),
                ));
            }
        }

        let mut members = self.shared.members.write();
        let fresh: Vec<&Arc<Dictionary>> = dictionaries
            .iter()
            .filter(|dictionary| {
                !members
                    .iter()
                    .any(|member| Arc::ptr_eq(&member.dictionary, dictionary))
            })
            .collect();
        for (i, dictionary) in fresh.iter().enumerate() {
            if !dictionary.attach() {
                for attached in &fresh[..i] {
                    attached.detach();
                }
                return Err(DictionaryError::AlreadyAttached(
                    dictionary.path().to_owned(),
                ));
            }
        }

        let mut previous = std::mem::take(&mut *members);
        let mut next = Vec::with_capacity(dictionaries.len());
        for dictionary in dictionaries {
            let reused = previous
                .iter()
                .position(|member| Arc::ptr_eq(&member.dictionary, &dictionary));
            let member = match reused {
                Some(i) => previous.swap_remove(i),
                None => Member {
                    listener: dictionary.add_longest_key_listener(longest_key_listener(
                        Arc::downgrade(&self.shared),
                    )),
                    dictionary,
                },
            };
            next.push(member);
        }
        for stale in previous {
            stale.dictionary.remove_longest_key_listener(stale.listener);
            stale.dictionary.detach();
        }
        *members = next;
        self.shared.recompute_longest_key(&members);
        debug!(
            dictionaries = ?members.iter().map(|m| m.dictionary.path()).collect::<Vec<_>>(),
            longest_key = self.longest_key(),
            "词典栈已替换"
        );
        Ok(())
    }

    /// 所有成员中最长 outline 的 stroke 数（含被禁用的词典）。
    pub fn longest_key(&self) -> usize {
        self.shared.longest_key.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.shared.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.members.read().is_empty()
    }

    /// 成员快照（优先级从高到低）。
    pub fn dictionaries(&self) -> Vec<Arc<Dictionary>> {
        self.shared
            .members
            .read()
            .iter()
            .map(|member| member.dictionary.clone())
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.shared
            .members
            .read()
            .iter()
            .map(|member| member.dictionary.path().to_owned())
            .collect()
    }

    pub fn get(&self, path: &str) -> Option<Arc<Dictionary>> {
        self.shared
            .members
            .read()
            .iter()
            .find(|member| member.dictionary.path() == path)
            .map(|member| member.dictionary.clone())
    }

    /// 与 `get` 相同，但找不到时返回 `UnknownDictionary`。
    pub fn dictionary(&self, path: &str) -> Result<Arc<Dictionary>, DictionaryError> {
        self.get(path)
            .ok_or_else(|| DictionaryError::UnknownDictionary(path.to_owned()))
    }

    /// 第一个可写词典（不考虑是否启用）。
    pub fn first_writable(&self) -> Option<Arc<Dictionary>> {
        self.shared
            .members
            .read()
            .iter()
            .find(|member| !member.dictionary.readonly())
            .map(|member| member.dictionary.clone())
    }

    /// 带 filter 的查询：命中被隐藏时返回 `None`，不会回退到低优先级词典。
    pub fn lookup(&self, outline: &Outline) -> Option<String> {
        let translation = self.raw_lookup(outline)?;
        let hidden = self
            .shared
            .filters
            .read()
            .iter()
            .any(|filter| filter.hides(outline, &translation));
        (!hidden).then_some(translation)
    }

    /// 不经过 filter 的优先级解析。
    pub fn raw_lookup(&self, outline: &Outline) -> Option<String> {
        self.shared
            .members
            .read()
            .iter()
            .filter(|member| member.dictionary.enabled())
            .find_map(|member| member.dictionary.get(outline))
    }

    /// 反查：所有当前确实解析到 `translation` 的 outline（顺序无意义，无重复）。
    pub fn reverse_lookup(&self, translation: &str) -> Vec<Outline> {
        let members = self.shared.members.read();
        let views = enabled_views(&members);
        let mut seen: HashSet<&Outline> = HashSet::new();
        let mut outlines = Vec::new();
        for view in &views {
            for outline in view.reverse_lookup(translation) {
                if !seen.insert(outline) {
                    continue;
                }
                if resolve(&views, outline) == Some(translation) {
                    outlines.push(outline.clone());
                }
            }
        }
        outlines
    }

    /// 折叠反查：没有任何已启用词典时返回 `None`，否则返回（可能为空的）写法列表。
    ///
    /// 与 `reverse_lookup` 一样做遮蔽检查：某种写法只有在至少一个 outline
    /// 仍解析到它时才会返回。
    pub fn casereverse_lookup(&self, folded: &str) -> Option<Vec<String>> {
        let members = self.shared.members.read();
        let views = enabled_views(&members);
        if views.is_empty() {
            return None;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cased = Vec::new();
        for view in &views {
            for text in view.casereverse_lookup(folded) {
                if !seen.insert(text) {
                    continue;
                }
                if reachable(&views, text) {
                    cased.push(text.to_owned());
                }
            }
        }
        cased.sort();
        Some(cased)
    }

    /// 写入一条映射。
    ///
    /// - 指定 `path`：写到该词典（只读时报 `ReadOnlyDictionary`，不存在时报 `UnknownDictionary`）
    /// - 未指定：写到第一个可写词典（没有则报 `NoWritableDictionary`）
    pub fn set(
        &self,
        outline: Outline,
        translation: &str,
        path: Option<&str>,
    ) -> Result<(), DictionaryError> {
        let dictionary = match path {
            Some(path) => self.dictionary(path)?,
            None => self
                .first_writable()
                .ok_or(DictionaryError::NoWritableDictionary)?,
        };
        dictionary.set(outline, translation)
    }

    /// 添加 filter；同一个实例（按指针判断）只会添加一次。
    pub fn add_filter(&self, filter: Arc<dyn Filter>) {
        let mut filters = self.shared.filters.write();
        if filters.iter().any(|existing| Arc::ptr_eq(existing, &filter)) {
            return;
        }
        filters.push(filter);
        debug!(filters = filters.len(), "添加 filter");
    }

    /// 移除 filter；返回此前是否存在。
    pub fn remove_filter(&self, filter: &Arc<dyn Filter>) -> bool {
        let mut filters = self.shared.filters.write();
        let before = filters.len();
        filters.retain(|existing| !Arc::ptr_eq(existing, filter));
        let removed = filters.len() != before;
        if removed {
            debug!(filters = filters.len(), "移除 filter");
        }
        removed
    }
}

/// 回调只持有弱引用：栈被释放后回调自动失效。
fn longest_key_listener(shared: Weak<Shared>) -> impl Fn(usize) + Send + Sync + 'static {
    move |_| {
        if let Some(shared) = shared.upgrade() {
            let members = shared.members.read();
            shared.recompute_longest_key(&members);
        }
    }
}

fn enabled_views(members: &[Member]) -> Vec<DictionaryView<'_>> {
    members
        .iter()
        .filter(|member| member.dictionary.enabled())
        .map(|member| member.dictionary.view())
        .collect()
}

fn resolve<'a>(views: &'a [DictionaryView<'_>], outline: &Outline) -> Option<&'a str> {
    views.iter().find_map(|view| view.get(outline))
}

fn reachable(views: &[DictionaryView<'_>], translation: &str) -> bool {
    views.iter().any(|view| {
        view.reverse_lookup(translation)
            .any(|outline| resolve(views, outline) == Some(translation))
    })
}

impl Drop for DictionaryStack {
    fn drop(&mut self) {
        for member in self.shared.members.write().drain(..) {
            member.dictionary.remove_longest_key_listener(member.listener);
            member.dictionary.detach();
        }
    }
}

/// 遍历得到的是各词典的 path（优先级从高到低）。
impl IntoIterator for &DictionaryStack {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths().into_iter()
    }
}

impl fmt::Debug for DictionaryStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryStack")
            .field("dictionaries", &self.paths())
            .field("filters", &self.shared.filters.read().len())
            .field("longest_key", &self.longest_key())
            .finish()
    }
}
