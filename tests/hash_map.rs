// HashMap / HashSet / SelfIndexedHashMap integration suite.
//
// Each test documents the behavior being verified. The core invariants
// exercised:
// - Capacity: len() <= floor(max_load_factor * hash_table_size()) after
//   every operation; growth at least doubles capacity.
// - Uniqueness: insert never overwrites; insert_or_assign overwrites in place.
// - Reachability: every stored key is found after any mix of inserts,
//   erases and rehashes.
// - Iteration: slot order, each live element exactly once.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rh_table::{ExtractKey, HashMap, HashSet, SelfIndexedHashMap};
use std::collections::hash_map::DefaultHasher;
use std::hash::BuildHasherDefault;

type Det = BuildHasherDefault<DefaultHasher>;

// Test: growth past the default load factor.
// Verifies: 15 inserts into a fresh map (15/16 > 0.9) leave it on a
// larger buffer, and nothing was allocated before the first insert.
#[test]
fn fifteenth_insert_triggers_rehash() {
    let mut m: HashMap<u32, u32> = HashMap::new();
    assert_eq!(m.hash_table_size(), 0);
    assert_eq!(m.max_load_factor(), 0.9);
    for k in 1..=14 {
        m.insert(k, k);
        assert_eq!(m.hash_table_size(), 16, "rehashed early at {k}");
    }
    m.insert(15, 15);
    assert!(m.hash_table_size() > 16);
    assert_eq!(m.hash_table_size(), 32);
    for k in 1..=15 {
        assert_eq!(m.get(&k), Some(&k));
    }
}

// Test: erase by key reports what it removed.
#[test]
fn erase_missing_and_present() {
    let mut m: HashMap<u32, &str> = (0..10).map(|k| (k, "v")).collect();
    assert_eq!(m.erase(&99), 0);
    assert_eq!(m.len(), 10);
    assert_eq!(m.erase(&4), 1);
    assert_eq!(m.len(), 9);
    assert!(!m.contains_key(&4));
}

// Test: insert_or_assign idempotence on size.
#[test]
fn insert_or_assign_overwrites() {
    let mut m: HashMap<String, i32> = HashMap::new();
    m.insert_or_assign("a".to_string(), 1);
    m.insert_or_assign("a".to_string(), 2);
    assert_eq!(m.len(), 1);
    assert_eq!(m.get("a"), Some(&2));
}

// Test: probe lengths stay short for random keys.
// Statistical: Robin Hood keeps the longest probe around O(log n).
#[test]
fn random_keys_keep_probe_distance_small() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut m: HashMap<u64, ()> = HashMap::new();
    while m.len() < 1000 {
        m.insert(rng.gen(), ());
    }
    assert!(m.len() <= m.capacity());
    let max = m.max_probe_distance();
    assert!(max <= 20, "max probe distance {max} for 1000 keys");
}

// Test: tombstones do not hide elements behind them, across many
// erase/insert rounds without an intervening rehash.
#[test]
fn churn_keeps_all_keys_reachable() {
    let mut m: HashMap<u64, u64> = HashMap::with_capacity(256);
    let size = m.hash_table_size();
    let mut rng = StdRng::seed_from_u64(7);
    let mut live = std::collections::HashSet::new();
    for _ in 0..5000 {
        let k = rng.gen_range(0..200u64);
        if rng.gen_bool(0.5) {
            m.insert(k, k * 2);
            live.insert(k);
        } else {
            assert_eq!(m.erase(&k), usize::from(live.remove(&k)));
        }
        assert_eq!(m.len(), live.len());
    }
    assert_eq!(m.hash_table_size(), size, "200 keys fit without growth");
    for k in 0..200u64 {
        assert_eq!(m.get(&k).copied(), live.contains(&k).then_some(k * 2));
    }
}

// Test: long alternating insert/erase over a small key space at high load
// factors. Erasure leaves tombstones that are only cleared by a rehash;
// without one the table would eventually hold no EMPTY slot at all and the
// next insertion would walk forever.
fn alternating_churn(ml: f32) {
    let mut m: HashMap<u64, u64, Det> = HashMap::with_hasher(Det::default());
    m.set_max_load_factor(ml);
    let mut live = std::collections::HashSet::new();
    let mut s = 1u64;
    let mut next = || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (s >> 33) % 40
    };
    for i in 0..200_000u32 {
        let k = next();
        if i % 2 == 0 {
            let (_, fresh) = m.insert(k, k + 1);
            assert_eq!(fresh, live.insert(k), "insert {k} at step {i}");
        } else {
            assert_eq!(m.erase(&k), usize::from(live.remove(&k)), "erase {k} at step {i}");
        }
        assert_eq!(m.len(), live.len());
        assert!(m.len() <= m.capacity());
    }
    assert!(m.hash_table_size() <= 64, "40 keys never need more than 64 slots");
    for k in 0..40u64 {
        assert_eq!(m.get(&k).copied(), live.contains(&k).then_some(k + 1));
    }
}

#[test]
fn alternating_churn_at_load_factor_0_9() {
    alternating_churn(0.9);
}

#[test]
fn alternating_churn_at_load_factor_1_0() {
    alternating_churn(1.0);
}

// Test: lowering the load factor rehashes immediately when over capacity.
#[test]
fn set_max_load_factor_rehashes_when_needed() {
    let mut m: HashMap<u32, u32> = (0..14).map(|k| (k, k)).collect();
    assert_eq!(m.hash_table_size(), 16);
    m.set_max_load_factor(0.5);
    assert!(m.len() <= m.capacity());
    assert!(m.hash_table_size() >= 28);
    // Raising it never shrinks.
    let size = m.hash_table_size();
    m.set_max_load_factor(1.0);
    assert_eq!(m.hash_table_size(), size);
}

#[test]
#[should_panic(expected = "max_load_factor")]
fn invalid_load_factor_panics() {
    let mut m: HashMap<u32, u32> = HashMap::new();
    m.set_max_load_factor(0.0);
}

// Test: reserve, rehash and shrink_to_fit respect their floors.
#[test]
fn sizing_operations() {
    let mut m: HashMap<u32, u32> = HashMap::new();
    m.reserve(100);
    assert!(m.capacity() >= 100);
    let reserved = m.hash_table_size();
    m.reserve(10);
    assert_eq!(m.hash_table_size(), reserved, "reserve never shrinks");

    m.extend((0..20).map(|k| (k, k)));
    m.rehash(0);
    assert!(m.hash_table_size() >= 16 && m.len() <= m.capacity());
    m.shrink_to_fit();
    assert_eq!(m.hash_table_size(), 23);
    m.clear();
    assert_eq!(m.hash_table_size(), 23, "clear keeps buffers");
    m.shrink_to_fit();
    assert_eq!(m.hash_table_size(), 0, "empty shrink frees buffers");
}

// Test: slot cursor with erase_at walks like begin/end iteration.
#[test]
fn cursor_erase_of_odd_values() {
    let mut m: HashMap<u32, u32> = (0..64).map(|k| (k, k)).collect();
    let mut cur = m.first_slot();
    while let Some(s) = cur {
        let (_, v) = m.get_slot(s).unwrap();
        cur = if v % 2 == 1 { m.erase_at(s) } else { m.next_slot(s) };
    }
    assert_eq!(m.len(), 32);
    assert!(m.keys().all(|k| k % 2 == 0));
}

// Test: maps built with the same hasher and history share one layout, and
// iteration order is slot order.
#[test]
fn deterministic_layout_and_order() {
    let build = || {
        let mut m: HashMap<u32, u32, Det> = HashMap::with_hasher(Det::default());
        for k in 0..100 {
            m.insert(k, k);
        }
        m
    };
    let a = build();
    let b = build();
    let slots = |m: &HashMap<u32, u32, Det>| {
        let mut out = Vec::new();
        let mut cur = m.first_slot();
        while let Some(s) = cur {
            out.push((s.index(), *m.get_slot(s).unwrap().0));
            cur = m.next_slot(s);
        }
        out
    };
    assert_eq!(slots(&a), slots(&b));
    let keys_by_iter: Vec<u32> = a.keys().copied().collect();
    let keys_by_slot: Vec<u32> = slots(&a).into_iter().map(|(_, k)| k).collect();
    assert_eq!(keys_by_iter, keys_by_slot);
}

// Test: clone copies slot for slot; swap exchanges whole tables.
#[test]
fn clone_and_swap() {
    let mut a: HashMap<String, Vec<u8>> = HashMap::new();
    a.insert("x".into(), vec![1]);
    a.insert("y".into(), vec![2]);
    let c = a.clone();
    assert_eq!(c, a);
    assert_eq!(c.find_slot("x"), a.find_slot("x"));
    let mut b = HashMap::new();
    a.swap(&mut b);
    assert!(a.is_empty());
    assert_eq!(b, c);
}

#[test]
fn hash_set_basics() {
    let mut s: HashSet<&str> = ["a", "b", "c"].into_iter().collect();
    assert!(!s.insert("a").1);
    assert!(s.contains("b"));
    assert_eq!(s.take("c"), Some("c"));
    let mut v: Vec<&str> = s.iter().copied().collect();
    v.sort_unstable();
    assert_eq!(v, ["a", "b"]);
}

#[derive(Debug, PartialEq)]
struct User {
    email: String,
    visits: u32,
}

struct ByEmail;
impl ExtractKey<User> for ByEmail {
    type Key = String;
    fn extract(u: &User) -> &String {
        &u.email
    }
}

// Test: self-indexed lookups by a borrowed form of the embedded key.
#[test]
fn self_indexed_by_email() {
    let mut users: SelfIndexedHashMap<User, ByEmail> = SelfIndexedHashMap::new();
    for (i, e) in ["a@x", "b@x", "c@x"].iter().enumerate() {
        users.insert(User {
            email: e.to_string(),
            visits: i as u32,
        });
    }
    users.get_mut("b@x").unwrap().visits += 10;
    assert_eq!(users.get("b@x").map(|u| u.visits), Some(11));
    assert_eq!(users.erase("a@x"), 1);
    let removed = users.remove("c@x").unwrap();
    assert_eq!(removed.visits, 2);
    assert_eq!(users.len(), 1);
}
