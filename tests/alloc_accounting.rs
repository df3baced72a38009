// Allocator accounting.
//
// A counting allocator checks the resource model: buffers come in pairs,
// nothing is allocated before the first insertion, a rehash briefly holds
// two generations, and every byte is returned on drop.
use rh_table::{ErasedTable, HashMap, TableAlloc, TypeDesc};
use std::alloc::Layout;
use std::cell::Cell;
use std::collections::hash_map::RandomState;
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Default)]
struct Counters {
    live: Cell<usize>,
    peak: Cell<usize>,
    allocs: Cell<usize>,
    bytes: Cell<usize>,
}

#[derive(Clone)]
struct CountingAlloc {
    id: u32,
    c: Rc<Counters>,
}

impl CountingAlloc {
    fn new(id: u32) -> Self {
        CountingAlloc {
            id,
            c: Rc::new(Counters::default()),
        }
    }
}

impl PartialEq for CountingAlloc {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

unsafe impl TableAlloc for CountingAlloc {
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        self.c.live.set(self.c.live.get() + 1);
        self.c.peak.set(self.c.peak.get().max(self.c.live.get()));
        self.c.allocs.set(self.c.allocs.get() + 1);
        self.c.bytes.set(self.c.bytes.get() + layout.size());
        rh_table::Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.c.live.set(self.c.live.get() - 1);
        self.c.bytes.set(self.c.bytes.get() - layout.size());
        rh_table::Global.deallocate(ptr, layout)
    }
}

// Test: lazy allocation, paired buffers, two generations during rehash,
// full release on drop.
#[test]
fn buffers_are_paired_and_released() {
    let a = CountingAlloc::new(1);
    let mut m: HashMap<u64, String, RandomState, CountingAlloc> = HashMap::new_in(a.clone());
    assert_eq!(a.c.allocs.get(), 0, "construction must not allocate");

    m.insert(1, "one".into());
    assert_eq!(a.c.live.get(), 2, "values + control");
    // 16 slots of (u64, String) plus 16 control words.
    assert_eq!(a.c.bytes.get(), 16 * (8 + 24) + 16 * 8);

    for k in 2..=15 {
        m.insert(k, k.to_string());
    }
    assert_eq!(m.hash_table_size(), 32);
    assert_eq!(a.c.live.get(), 2);
    assert_eq!(a.c.peak.get(), 4, "old and new generation coexist during rehash");

    m.clear();
    assert_eq!(a.c.live.get(), 2, "clear keeps buffers");
    drop(m);
    assert_eq!(a.c.live.get(), 0);
    assert_eq!(a.c.bytes.get(), 0);
}

// Test: shrink_to_fit on an empty table returns everything.
#[test]
fn empty_shrink_releases() {
    let a = CountingAlloc::new(1);
    let mut m: HashMap<u32, u32, RandomState, CountingAlloc> = HashMap::new_in(a.clone());
    m.extend((0..100).map(|k| (k, k)));
    for k in 0..100 {
        m.erase(&k);
    }
    assert_eq!(a.c.live.get(), 2);
    m.shrink_to_fit();
    assert_eq!(a.c.live.get(), 0);
    assert_eq!(m.hash_table_size(), 0);
}

// Test: move_in keeps buffers for an equal allocator and relocates for a
// different one; clone_in always copies into the target.
#[test]
fn move_in_and_clone_in() {
    let a = CountingAlloc::new(1);
    let b = CountingAlloc::new(2);
    let mut m: HashMap<u32, Vec<u8>, RandomState, CountingAlloc> = HashMap::new_in(a.clone());
    for k in 0..50 {
        m.insert(k, vec![k as u8]);
    }
    let slot = m.find_slot(&7);
    let allocs = a.c.allocs.get();

    let m = m.move_in(a.clone());
    assert_eq!(a.c.allocs.get(), allocs, "equal allocator steals buffers");

    let copy = m.clone_in(b.clone());
    assert_eq!(b.c.live.get(), 2);
    assert_eq!(copy.find_slot(&7), slot);

    let m = m.move_in(b.clone());
    assert_eq!(a.c.live.get(), 0, "old allocator fully released");
    assert_eq!(b.c.live.get(), 4);
    assert_eq!(m.get(&7), Some(&vec![7]));
    assert_eq!(m.find_slot(&7), slot, "relocation keeps slot positions");
    drop(m);
    drop(copy);
    assert_eq!(b.c.live.get(), 0);
}

// Test: the erased table uses the same allocator contract.
#[test]
fn erased_table_releases_on_drop() {
    let a = CountingAlloc::new(1);
    let d = Arc::new(TypeDesc::of::<String>("String"));
    let mut t = ErasedTable::with_hasher_in(d.clone(), RandomState::new(), a.clone());
    for i in 0..40 {
        t.insert(rh_table::ErasedValue::from_typed(d.clone(), i.to_string()));
    }
    assert_eq!(a.c.live.get(), 2);

    let b = CountingAlloc::new(2);
    let key = rh_table::ErasedValue::from_typed(d.clone(), "7".to_string());
    let slot = t.find(key.as_ref());
    let t = t.move_in(b.clone());
    assert_eq!(a.c.live.get(), 0, "old allocator fully released");
    assert_eq!(b.c.live.get(), 2);
    assert_eq!(t.find(key.as_ref()), slot);
    drop(t);
    assert_eq!(b.c.live.get(), 0);
}
