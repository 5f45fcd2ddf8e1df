use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use steno_core::{Dictionary, DictionaryError, DictionaryStack, Filter, Outline};

fn o(s: &str) -> Outline {
    s.parse().unwrap()
}

fn dict(path: &str, entries: &[(&str, &str)]) -> Arc<Dictionary> {
    let d = Arc::new(Dictionary::new(path));
    for &(outline, translation) in entries {
        d.set(o(outline), translation).unwrap();
    }
    d
}

fn sorted(mut outlines: Vec<Outline>) -> Vec<Outline> {
    outlines.sort();
    outlines
}

#[test]
fn precedence_and_filters() {
    let d1 = dict("d1", &[("S", "a"), ("T", "b")]);
    let d2 = dict("d2", &[("S", "c"), ("W", "d")]);
    let stack = DictionaryStack::with_dictionaries(vec![d2.clone(), d1.clone()]).unwrap();
    assert_eq!(stack.lookup(&o("S")).as_deref(), Some("c"));
    assert_eq!(stack.lookup(&o("W")).as_deref(), Some("d"));
    assert_eq!(stack.lookup(&o("T")).as_deref(), Some("b"));

    let filter: Arc<dyn Filter> = Arc::new(|_: &Outline, t: &str| t == "c");
    stack.add_filter(filter.clone());
    assert_eq!(stack.lookup(&o("S")), None);
    assert_eq!(stack.raw_lookup(&o("S")).as_deref(), Some("c"));
    assert_eq!(stack.lookup(&o("W")).as_deref(), Some("d"));
    assert_eq!(stack.lookup(&o("T")).as_deref(), Some("b"));
    assert_eq!(stack.reverse_lookup("c"), vec![o("S")]);

    stack.remove_filter(&filter);
    assert_eq!(stack.lookup(&o("S")).as_deref(), Some("c"));
    assert_eq!(stack.reverse_lookup("c"), vec![o("S")]);

    let paths: Vec<String> = (&stack).into_iter().collect();
    assert_eq!(paths, vec!["d2".to_string(), "d1".to_string()]);
    assert!(Arc::ptr_eq(&stack.get("d1").unwrap(), &d1));
    assert!(Arc::ptr_eq(&stack.dictionary("d1").unwrap(), &d1));
    assert!(stack.get("invalid").is_none());
    assert_eq!(
        stack.dictionary("invalid").unwrap_err(),
        DictionaryError::UnknownDictionary("invalid".into())
    );
}

#[test]
fn writes_skip_readonly_dictionaries() {
    let d1 = dict("d1", &[("S", "a"), ("T", "b")]);
    let d2 = dict("d2", &[("S", "c"), ("W", "d")]);
    d2.set_readonly(true);
    let stack = DictionaryStack::with_dictionaries(vec![d2.clone(), d1.clone()]).unwrap();
    assert!(Arc::ptr_eq(&stack.first_writable().unwrap(), &d1));

    stack.set(o("S"), "A", None).unwrap();
    assert_eq!(d1.get(&o("S")).as_deref(), Some("A"));
    assert_eq!(d2.get(&o("S")).as_deref(), Some("c"));

    assert_eq!(
        stack.set(o("S"), "B", Some("d2")),
        Err(DictionaryError::ReadOnlyDictionary("d2".into()))
    );
    assert_eq!(
        d2.entries(),
        vec![(o("S"), "c".to_string()), (o("W"), "d".to_string())]
    );
}

#[test]
fn longest_key_follows_membership_and_edits() {
    let stack = DictionaryStack::new();
    assert_eq!(stack.longest_key(), 0);

    let d1 = dict("d1", &[("S", "a")]);
    stack.set_dictionaries(vec![d1.clone()]).unwrap();
    assert_eq!(stack.longest_key(), 1);

    d1.set(o("S/T"), "a").unwrap();
    assert_eq!(stack.longest_key(), 2);

    let d2 = dict("d2", &[("S/T/R", "c")]);
    stack.set_dictionaries(vec![d2.clone(), d1.clone()]).unwrap();
    assert_eq!(stack.longest_key(), 3);

    d1.delete(&o("S/T")).unwrap();
    assert_eq!(stack.longest_key(), 3);

    stack.set_dictionaries(vec![d1.clone()]).unwrap();
    assert_eq!(stack.longest_key(), 1);

    // 已移除的词典不再影响栈
    d2.set(o("A/B/C/D"), "x").unwrap();
    assert_eq!(stack.longest_key(), 1);

    stack.set_dictionaries(vec![]).unwrap();
    assert_eq!(stack.longest_key(), 0);
}

#[test]
fn reused_members_notify_exactly_once() {
    let d1 = dict("d1", &[("S", "a")]);
    let d2 = dict("d2", &[("T", "b")]);
    let stack = Arc::new(DictionaryStack::with_dictionaries(vec![d1.clone()]).unwrap());
    stack.set_dictionaries(vec![d2.clone(), d1.clone()]).unwrap();
    stack.set_dictionaries(vec![d1.clone(), d2.clone()]).unwrap();

    // 外部观察者记录栈在每次通知后的值
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let weak = Arc::downgrade(&stack);
    d1.add_longest_key_listener(move |_| {
        if let Some(stack) = weak.upgrade() {
            sink.lock().push(stack.longest_key());
        }
    });

    d1.set(o("S/S/S"), "c").unwrap();
    assert_eq!(stack.longest_key(), 3);
    d1.delete(&o("S/S/S")).unwrap();
    assert_eq!(stack.longest_key(), 1);
    assert_eq!(*seen.lock(), vec![3, 1]);
}

#[test]
fn reverse_lookup_respects_shadowing() {
    let d1 = dict("d1", &[("PWAOUFL", "beautiful"), ("WAOUFL", "beautiful")]);
    let d2 = dict("d2", &[("PW-FL", "beautiful")]);
    let d3 = dict("d3", &[("WAOUFL", "not beautiful")]);
    let stack = DictionaryStack::new();

    stack.set_dictionaries(vec![d1.clone()]).unwrap();
    assert_eq!(
        sorted(stack.reverse_lookup("beautiful")),
        vec![o("PWAOUFL"), o("WAOUFL")]
    );

    let d2_copy = Arc::new(Dictionary::new("d2_copy"));
    d2_copy.merge_from(&d2).unwrap();
    stack.set_dictionaries(vec![d2_copy, d2.clone()]).unwrap();
    assert_eq!(stack.reverse_lookup("beautiful"), vec![o("PW-FL")]);

    stack.set_dictionaries(vec![d2.clone(), d1.clone()]).unwrap();
    assert_eq!(
        sorted(stack.reverse_lookup("beautiful")),
        vec![o("PW-FL"), o("PWAOUFL"), o("WAOUFL")]
    );

    stack.set_dictionaries(vec![d3, d2, d1]).unwrap();
    assert_eq!(
        sorted(stack.reverse_lookup("beautiful")),
        vec![o("PW-FL"), o("PWAOUFL")]
    );
}

#[test]
fn disabled_dictionaries_are_transparent() {
    let d1 = dict("d1", &[("TEFT", "test1"), ("TEFGT", "Testing")]);
    let d2 = dict("d2", &[("TEFT", "test2"), ("TEFT/-G", "Testing")]);
    let stack = DictionaryStack::with_dictionaries(vec![d2.clone(), d1.clone()]).unwrap();
    assert_eq!(stack.lookup(&o("TEFT")).as_deref(), Some("test2"));
    assert_eq!(stack.raw_lookup(&o("TEFT")).as_deref(), Some("test2"));
    assert_eq!(
        stack.casereverse_lookup("testing"),
        Some(vec!["Testing".to_string()])
    );
    assert_eq!(
        sorted(stack.reverse_lookup("Testing")),
        vec![o("TEFGT"), o("TEFT/-G")]
    );

    d2.set_enabled(false);
    assert_eq!(stack.lookup(&o("TEFT")).as_deref(), Some("test1"));
    assert_eq!(stack.raw_lookup(&o("TEFT")).as_deref(), Some("test1"));
    assert_eq!(
        stack.casereverse_lookup("testing"),
        Some(vec!["Testing".to_string()])
    );
    assert_eq!(stack.reverse_lookup("Testing"), vec![o("TEFGT")]);

    d1.set_enabled(false);
    assert_eq!(stack.lookup(&o("TEST")), None);
    assert_eq!(stack.raw_lookup(&o("TEFT")), None);
    assert_eq!(stack.casereverse_lookup("testing"), None);
    assert!(stack.reverse_lookup("Testing").is_empty());
}

#[test]
fn casereverse_hides_fully_shadowed_casings() {
    let low = dict("low", &[("TEFT", "Test")]);
    let high = dict("high", &[("TEFT", "test")]);
    let stack = DictionaryStack::with_dictionaries(vec![high, low]).unwrap();
    assert_eq!(stack.casereverse_lookup("test"), Some(vec!["test".to_string()]));
    assert_eq!(stack.casereverse_lookup("nothing"), Some(vec![]));
}

#[test]
fn concurrent_readers_and_writer() {
    let d1 = dict("d1", &[("S", "a")]);
    let d2 = dict("d2", &[("T", "b")]);
    let stack = Arc::new(DictionaryStack::with_dictionaries(vec![d2.clone(), d1.clone()]).unwrap());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let stack = stack.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    assert_eq!(stack.lookup(&o("T")).as_deref(), Some("b"));
                    let _ = stack.reverse_lookup("x");
                    let _ = stack.casereverse_lookup("x");
                }
            })
        })
        .collect();

    for i in 0..200 {
        let outline = Outline::new((0..(i % 5 + 1)).map(|n| format!("K{n}")));
        d1.set(outline.clone(), "x").unwrap();
        if i % 2 == 0 {
            d1.delete(&outline).unwrap();
        }
    }
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(stack.longest_key(), d1.longest_key().max(d2.longest_key()));
}

#[derive(Debug, Clone)]
enum Op {
    Set(Vec<u8>, u8),
    Delete(Vec<u8>),
    Clear,
}

fn arb_outline() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..3, 1..6)
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (arb_outline(), 0u8..4).prop_map(|(k, v)| Op::Set(k, v)),
        3 => arb_outline().prop_map(Op::Delete),
        1 => Just(Op::Clear),
    ]
}

fn to_outline(strokes: &[u8]) -> Outline {
    Outline::new(strokes.iter().map(|s| format!("S{s}")))
}

proptest! {
    /// 任意 set/delete/clear 序列之后，longest_key 都等于当前最长 outline 的长度，
    /// 回调序列恰好是值的每一次变化。
    #[test]
    fn longest_key_tracks_maximum(ops in prop::collection::vec(arb_op(), 0..60)) {
        let d = Dictionary::new("d");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        d.add_longest_key_listener(move |n| sink.lock().push(n));

        let mut expected_changes = Vec::new();
        let mut last = 0;
        for op in ops {
            match op {
                Op::Set(k, v) => d.set(to_outline(&k), &v.to_string()).unwrap(),
                Op::Delete(k) => {
                    let outline = to_outline(&k);
                    let existed = d.contains(&outline);
                    prop_assert_eq!(d.delete(&outline).is_ok(), existed);
                }
                Op::Clear => d.clear().unwrap(),
            }
            let entries = d.entries();
            let expected = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
            prop_assert_eq!(d.longest_key(), expected);
            if expected != last {
                expected_changes.push(expected);
                last = expected;
            }
            for (outline, translation) in &entries {
                prop_assert!(d.reverse_lookup(translation).contains(outline));
                prop_assert!(d.casereverse_lookup(&translation.to_lowercase()).contains(translation));
            }
        }
        prop_assert_eq!(&*seen.lock(), &expected_changes);
    }
}
