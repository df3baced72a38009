#![cfg(test)]

// Property tests for the typed map kept inside the crate so they can check
// slot-level structure as well as the public contract.

use crate::hash_map::HashMap;
use crate::hash_table::Slot;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap as StdHashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::rc::Rc;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertOrAssign(usize, i32),
    EmplaceWith(usize, i32),
    Erase(usize),
    Remove(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Rehash(usize),
    ShrinkToFit,
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertOrAssign(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::EmplaceWith(i, v)),
            3 => idx.clone().prop_map(OpI::Erase),
            2 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Find),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (0usize..200).prop_map(OpI::Rehash),
            1 => Just(OpI::ShrinkToFit),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Slot-level checks that only hold for a correct Robin Hood table.
fn check_structure<S: BuildHasher>(sut: &HashMap<Key, i32, S>) -> Result<(), TestCaseError> {
    prop_assert!(sut.len() <= sut.capacity(), "size above capacity");
    if sut.hash_table_size() != 0 {
        prop_assert!(sut.hash_table_size() >= 16);
    }
    // Cursor walk visits every element once, in increasing slot order.
    let mut seen = 0;
    let mut prev: Option<Slot> = None;
    let mut cur = sut.first_slot();
    while let Some(s) = cur {
        if let Some(p) = prev {
            prop_assert!(p < s);
        }
        let (k, _) = sut.get_slot(s).expect("cursor yields occupied slots");
        // Every element is reachable from its home slot.
        prop_assert_eq!(sut.find_slot(k), Some(s));
        seen += 1;
        prev = Some(s);
        cur = sut.next_slot(s);
    }
    prop_assert_eq!(seen, sut.len());
    prop_assert!(sut.max_probe_distance() < sut.hash_table_size().max(1));
    Ok(())
}

fn run_state_machine<S: BuildHasher>(
    mut sut: HashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: StdHashMap<Key, i32> = StdHashMap::new();
    let calls = Rc::new(Cell::new(0));
    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let already = model.contains_key(&k);
                let (slot, fresh) = sut.insert(k.clone(), v);
                prop_assert_eq!(fresh, !already, "insert is fresh iff the key was absent");
                model.entry(k.clone()).or_insert(v);
                prop_assert_eq!(sut.get_slot(slot).map(|(_, m)| *m), model.get(&k).copied());
            }
            OpI::InsertOrAssign(i, v) => {
                let k = key_from(&pool, i);
                let before = sut.find_slot(&k);
                let (slot, fresh) = sut.insert_or_assign(k.clone(), v);
                prop_assert_eq!(fresh, model.insert(k, v).is_none());
                if let Some(b) = before {
                    prop_assert_eq!(b, slot, "assignment must not move the entry");
                }
            }
            OpI::EmplaceWith(i, v) => {
                let k = key_from(&pool, i);
                let already = model.contains_key(&k);
                let counter = calls.clone();
                let before = calls.get();
                let (_, fresh) = sut.emplace_with(k.clone(), move || {
                    counter.set(counter.get() + 1);
                    v
                });
                prop_assert_eq!(fresh, !already);
                prop_assert_eq!(calls.get(), before + usize::from(fresh));
                model.entry(k).or_insert(v);
            }
            OpI::Erase(i) => {
                let k = key_from(&pool, i);
                let n = sut.erase(&k);
                prop_assert_eq!(n, usize::from(model.remove(&k).is_some()));
                prop_assert!(sut.find_slot(&k).is_none());
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.remove_entry(&k), model.remove_entry(&k));
            }
            OpI::Find(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.count(&k), usize::from(model.contains_key(&k)));
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(vr) = sut.get_mut(&k) {
                    *vr = vr.saturating_add(d);
                    let mv = model.get_mut(&k).expect("present in model");
                    *mv = mv.saturating_add(d);
                } else {
                    prop_assert!(!model.contains_key(&k));
                }
            }
            OpI::Rehash(n) => {
                sut.rehash(n);
                prop_assert!(sut.hash_table_size() >= n.max(16));
            }
            OpI::ShrinkToFit => {
                sut.shrink_to_fit();
                if sut.is_empty() {
                    prop_assert_eq!(sut.hash_table_size(), 0);
                }
            }
            OpI::Clear => {
                let size = sut.hash_table_size();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.hash_table_size(), size, "clear keeps the buffers");
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                prop_assert_eq!(sut.iter().len(), model.len());
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        check_structure(&sut)?;
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - insert never overwrites; insert_or_assign overwrites in place.
// - emplace_with runs its constructor only for absent keys.
// - erase/remove parity with the model; erased keys stop resolving.
// - size never exceeds capacity; every element is findable from its home.
// - cursor iteration is strictly increasing in slot index and complete.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(HashMap::new(), pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key shares one home slot,
// so lookups depend entirely on the probe walk and equality.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(HashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

// Low load factors force frequent rehashes through set_max_load_factor.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_low_load_factor(
        (pool, ops) in arb_scenario(),
        ml in 0.2f32..=1.0,
    ) {
        let mut sut = HashMap::new();
        sut.set_max_load_factor(ml);
        run_state_machine(sut, pool, ops)?;
    }
}

// Long churn at a fixed key count: inserts and erases alternate over a small
// key space at high load factors, so the table keeps its size while
// tombstones pile up between rehashes.
proptest! {
    #![proptest_config(ProptestConfig { cases: 16, .. ProptestConfig::default() })]
    #[test]
    fn prop_fixed_size_churn(
        seed in any::<u64>(),
        keys in 8u64..48,
        ml in prop_oneof![Just(0.9f32), Just(1.0f32)],
        steps in 2_000usize..8_000,
    ) {
        let mut sut: HashMap<Key, i32> = HashMap::new();
        sut.set_max_load_factor(ml);
        let mut model: StdHashMap<Key, i32> = StdHashMap::new();
        let mut s = seed;
        for i in 0..steps {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let k = Key(format!("k{}", (s >> 33) % keys));
            if i % 2 == 0 {
                let (_, fresh) = sut.insert(k.clone(), i as i32);
                prop_assert_eq!(fresh, !model.contains_key(&k));
                model.entry(k).or_insert(i as i32);
            } else {
                prop_assert_eq!(sut.erase(&k), usize::from(model.remove(&k).is_some()));
            }
            prop_assert_eq!(sut.len(), model.len());
            if i % 256 == 0 {
                check_structure(&sut)?;
            }
        }
        check_structure(&sut)?;
        for (k, v) in &model {
            prop_assert_eq!(sut.get(k), Some(v));
        }
    }
}
