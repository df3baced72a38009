//! RawTable: the one Robin Hood engine behind every table in the crate.
//!
//! The engine never names an element type. It sees slots as `elem.size()`
//! byte strides and asks a [`SlotOps`] implementation to destroy or move
//! them. Typed tables pass the monomorphized [`TypedOps<T>`]; the erased
//! table passes a runtime [`TypeDesc`](crate::type_desc::TypeDesc).
//!
//! Buffers are allocated and freed as a pair ([`Buffers`]). Rehashing
//! builds a fresh pair, relocates every live element into it with
//! [`place`], then frees the old pair.

use crate::alloc::TableAlloc;
use crate::control::{
    buffer_size_for, capacity_for, check_max_load_factor, home, is_occupied, is_tombstone,
    probe_distance, EMPTY_SLOT, INITIAL_BUFFER_SIZE, INITIAL_LOAD_FACTOR, TOMBSTONE_BIT,
};
use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};

/// Per-element capability consumed by the engine.
///
/// # Safety
/// `layout` must describe exactly the elements stored in the table the ops
/// are used with, with `size` a multiple of `align`. `relocate` and `swap`
/// must be plain moves: after `relocate(dst, src)` the value lives at `dst`
/// and `src` is uninitialized.
pub unsafe trait SlotOps {
    fn layout(&self) -> Layout;

    /// # Safety
    /// `p` points to an initialized element.
    unsafe fn drop_slot(&self, p: *mut u8);

    /// # Safety
    /// `src` is initialized, `dst` is not, and they do not overlap.
    #[inline]
    unsafe fn relocate(&self, dst: *mut u8, src: *const u8) {
        ptr::copy_nonoverlapping(src, dst, self.layout().size());
    }

    /// # Safety
    /// Both are initialized and do not overlap.
    #[inline]
    unsafe fn swap(&self, a: *mut u8, b: *mut u8) {
        ptr::swap_nonoverlapping(a, b, self.layout().size());
    }
}

/// Compile-time slot operations for `T`.
pub struct TypedOps<T>(PhantomData<fn() -> T>);

impl<T> TypedOps<T> {
    pub const NEW: Self = TypedOps(PhantomData);
}

unsafe impl<T> SlotOps for TypedOps<T> {
    #[inline]
    fn layout(&self) -> Layout {
        Layout::new::<T>()
    }

    #[inline]
    unsafe fn drop_slot(&self, p: *mut u8) {
        ptr::drop_in_place(p.cast::<T>());
    }

    #[inline]
    unsafe fn relocate(&self, dst: *mut u8, src: *const u8) {
        ptr::copy_nonoverlapping(src.cast::<T>(), dst.cast::<T>(), 1);
    }

    #[inline]
    unsafe fn swap(&self, a: *mut u8, b: *mut u8) {
        ptr::swap_nonoverlapping(a.cast::<T>(), b.cast::<T>(), 1);
    }
}

fn values_layout(elem: Layout, len: usize) -> Layout {
    let size = elem.size().checked_mul(len).expect("capacity overflow");
    Layout::from_size_align(size, elem.align()).expect("capacity overflow")
}

fn ctrl_layout(len: usize) -> Layout {
    Layout::array::<usize>(len).expect("capacity overflow")
}

fn dangling_for(elem: Layout) -> NonNull<u8> {
    // Non-null and aligned; never dereferenced for non-zero sizes.
    unsafe { NonNull::new_unchecked(elem.align() as *mut u8) }
}

/// The value buffer and control buffer of one table generation.
pub(crate) struct Buffers {
    values: NonNull<u8>,
    ctrl: NonNull<usize>,
    len: usize,
}

impl Buffers {
    const fn unallocated() -> Self {
        Self {
            values: NonNull::dangling(),
            ctrl: NonNull::dangling(),
            len: 0,
        }
    }

    fn allocate<A: TableAlloc>(alloc: &A, elem: Layout, len: usize) -> Self {
        debug_assert!(len > 0);
        let vl = values_layout(elem, len);
        let values = if vl.size() == 0 {
            dangling_for(elem)
        } else {
            alloc.allocate(vl)
        };
        let ctrl = alloc.allocate(ctrl_layout(len)).cast::<usize>();
        // EMPTY_SLOT is zero.
        unsafe { ptr::write_bytes(ctrl.as_ptr(), 0, len) };
        Self { values, ctrl, len }
    }

    /// Releases the memory without touching the elements.
    unsafe fn free<A: TableAlloc>(&mut self, alloc: &A, elem: Layout) {
        if self.len == 0 {
            return;
        }
        let vl = values_layout(elem, self.len);
        if vl.size() != 0 {
            alloc.deallocate(self.values, vl);
        }
        alloc.deallocate(self.ctrl.cast::<u8>(), ctrl_layout(self.len));
        *self = Self::unallocated();
    }

    #[inline]
    fn ctrl(&self) -> &[usize] {
        unsafe { core::slice::from_raw_parts(self.ctrl.as_ptr(), self.len) }
    }

    #[inline]
    fn ctrl_mut(&mut self) -> &mut [usize] {
        unsafe { core::slice::from_raw_parts_mut(self.ctrl.as_ptr(), self.len) }
    }

    #[inline]
    fn slot(&self, stride: usize, pos: usize) -> *mut u8 {
        debug_assert!(pos < self.len);
        unsafe { self.values.as_ptr().add(stride * pos) }
    }
}

/// Robin Hood insertion of the element at `src` under control value `h`.
///
/// Walks forward from the home slot of `h`. An EMPTY slot, or a tombstone no
/// further from its own home than the carried element, receives the carried
/// element. A live resident closer to its home than the carried element is
/// evicted: the two trade places and the walk continues with the resident.
///
/// Returns the slot where the original element came to rest, and whether
/// the walk ended on a tombstone instead of an EMPTY slot.
///
/// The walk only moves forward, so one EMPTY slot anywhere in the buffer
/// bounds it to a single lap.
///
/// # Safety
/// `ops` describes the elements of `bufs`; `src` holds an initialized
/// element and is uninitialized on return; `bufs` has at least one EMPTY
/// slot.
pub(crate) unsafe fn place<O: SlotOps + ?Sized>(
    ops: &O,
    bufs: &mut Buffers,
    mut h: usize,
    src: *mut u8,
) -> (usize, bool) {
    debug_assert!(is_occupied(h));
    let n = bufs.len;
    let stride = ops.layout().size();
    let values = bufs.values.as_ptr();
    let ctrl = bufs.ctrl_mut();
    let mut pos = home(h, n);
    let mut dist = 0;
    let mut landed = None;
    loop {
        let existing = ctrl[pos];
        let dst = values.add(stride * pos);
        if existing == EMPTY_SLOT {
            ctrl[pos] = h;
            ops.relocate(dst, src);
            return (landed.unwrap_or(pos), false);
        }
        let existing_dist = probe_distance(existing, pos, n);
        if is_tombstone(existing) && existing_dist <= dist {
            ctrl[pos] = h;
            ops.relocate(dst, src);
            return (landed.unwrap_or(pos), true);
        }
        if existing_dist < dist {
            ctrl[pos] = h;
            h = existing;
            ops.swap(dst, src);
            dist = existing_dist;
            landed.get_or_insert(pos);
        }
        pos += 1;
        dist += 1;
        if pos == n {
            pos = 0;
        }
    }
}

pub(crate) struct RawTable<A: TableAlloc> {
    bufs: Buffers,
    elem: Layout,
    size: usize,
    tombstones: usize,
    max_load_factor: f32,
    alloc: A,
}

impl<A: TableAlloc> RawTable<A> {
    pub(crate) fn new_in(elem: Layout, alloc: A) -> Self {
        debug_assert_eq!(elem.size() % elem.align(), 0);
        Self {
            bufs: Buffers::unallocated(),
            elem,
            size: 0,
            tombstones: 0,
            max_load_factor: INITIAL_LOAD_FACTOR,
            alloc,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn buffer_size(&self) -> usize {
        self.bufs.len
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        capacity_for(self.bufs.len, self.max_load_factor)
    }

    pub(crate) fn load_factor(&self) -> f32 {
        if self.bufs.len == 0 {
            return 0.0;
        }
        self.size as f32 / self.bufs.len as f32
    }

    #[inline]
    pub(crate) fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    #[inline]
    pub(crate) fn allocator(&self) -> &A {
        &self.alloc
    }

    #[inline]
    pub(crate) fn is_occupied_at(&self, pos: usize) -> bool {
        pos < self.bufs.len && is_occupied(self.bufs.ctrl()[pos])
    }

    /// Pointer to slot `pos`; only meaningful while the slot is occupied.
    #[inline]
    pub(crate) fn slot_ptr(&self, pos: usize) -> *mut u8 {
        self.bufs.slot(self.elem.size(), pos)
    }

    /// First occupied slot at or after `from`.
    pub(crate) fn occupied_from(&self, from: usize) -> Option<usize> {
        let ctrl = self.bufs.ctrl();
        (from..ctrl.len()).find(|&i| is_occupied(ctrl[i]))
    }

    /// Looks up control value `h`, confirming candidates with `eq`.
    ///
    /// Stops at an EMPTY slot, or once the probe has travelled further than
    /// the resident it is looking at: Robin Hood ordering means the key would
    /// have displaced that resident.
    pub(crate) fn find(&self, h: usize, mut eq: impl FnMut(*const u8) -> bool) -> Option<usize> {
        let n = self.bufs.len;
        if n == 0 {
            return None;
        }
        let ctrl = self.bufs.ctrl();
        let mut pos = home(h, n);
        let mut dist = 0;
        loop {
            let existing = ctrl[pos];
            if existing == h && eq(self.slot_ptr(pos)) {
                return Some(pos);
            }
            if existing == EMPTY_SLOT || dist > probe_distance(existing, pos, n) {
                return None;
            }
            pos += 1;
            dist += 1;
            if pos == n {
                pos = 0;
            }
        }
    }

    /// Longest distance any live element sits from its home slot.
    pub(crate) fn max_probe_distance(&self) -> usize {
        let n = self.bufs.len;
        self.bufs
            .ctrl()
            .iter()
            .enumerate()
            .filter(|(_, &h)| is_occupied(h))
            .map(|(pos, &h)| probe_distance(h, pos, n))
            .max()
            .unwrap_or(0)
    }

    /// Grows ahead of a single-element insertion, at least doubling capacity.
    ///
    /// # Safety
    /// `ops` describes the elements of this table.
    pub(crate) unsafe fn increment_reserve<O: SlotOps + ?Sized>(&mut self, ops: &O, new_cap: usize) {
        let current = self.capacity();
        if new_cap > current {
            let new_cap = new_cap.max(current * 2);
            self.rehash(ops, buffer_size_for(new_cap, self.max_load_factor));
        }
    }

    /// # Safety
    /// `ops` describes the elements of this table.
    pub(crate) unsafe fn reserve<O: SlotOps + ?Sized>(&mut self, ops: &O, new_cap: usize) {
        if new_cap > self.capacity() {
            self.rehash(ops, buffer_size_for(new_cap, self.max_load_factor));
        }
    }

    /// Moves every element into a fresh buffer of at least `new_buffer_size` slots.
    ///
    /// # Safety
    /// `ops` describes the elements of this table.
    pub(crate) unsafe fn rehash<O: SlotOps + ?Sized>(&mut self, ops: &O, new_buffer_size: usize) {
        let new_buffer_size = new_buffer_size
            .max(buffer_size_for(self.size, self.max_load_factor))
            .max(INITIAL_BUFFER_SIZE);
        if new_buffer_size == self.bufs.len {
            return;
        }
        self.rebuild(ops, new_buffer_size);
    }

    /// Reinserts every live element into fresh buffers of exactly
    /// `buffer_size` slots, dropping all tombstones.
    unsafe fn rebuild<O: SlotOps + ?Sized>(&mut self, ops: &O, buffer_size: usize) {
        tracing::trace!(
            from = self.bufs.len,
            to = buffer_size,
            len = self.size,
            tombstones = self.tombstones,
            "rehash"
        );
        let mut fresh = Buffers::allocate(&self.alloc, self.elem, buffer_size);
        let stride = self.elem.size();
        for pos in 0..self.bufs.len {
            let h = self.bufs.ctrl()[pos];
            if !is_occupied(h) {
                continue;
            }
            place(ops, &mut fresh, h, self.bufs.slot(stride, pos));
        }
        let mut old = mem::replace(&mut self.bufs, fresh);
        old.free(&self.alloc, self.elem);
        self.tombstones = 0;
    }

    /// # Safety
    /// `ops` describes the elements of this table.
    pub(crate) unsafe fn shrink_to_fit<O: SlotOps + ?Sized>(&mut self, ops: &O) {
        let desired = buffer_size_for(self.size, self.max_load_factor);
        if desired == 0 {
            self.clear_and_free(ops);
            return;
        }
        self.rehash(ops, desired);
    }

    /// # Safety
    /// `ops` describes the elements of this table.
    pub(crate) unsafe fn set_max_load_factor<O: SlotOps + ?Sized>(&mut self, ops: &O, ml: f32) {
        check_max_load_factor(ml);
        self.max_load_factor = ml;
        if self.size > self.capacity() {
            self.rehash(ops, 0);
        }
    }

    /// Inserts the element at `src` (which becomes uninitialized) under
    /// control value `h`. The caller has already ruled out a duplicate key.
    ///
    /// Live elements plus tombstones never exceed `capacity()`, so at least
    /// one EMPTY slot is left for `place`. When only tombstones stand in the
    /// way, the table is rebuilt at its current size.
    ///
    /// # Safety
    /// `ops` describes the elements of this table; `src` holds one.
    pub(crate) unsafe fn insert_hashed<O: SlotOps + ?Sized>(
        &mut self,
        ops: &O,
        h: usize,
        src: *mut u8,
    ) -> usize {
        self.increment_reserve(ops, self.size + 1);
        if self.size + self.tombstones + 1 > self.capacity() {
            self.rebuild(ops, self.bufs.len);
        }
        debug_assert!(self.size + self.tombstones < self.bufs.len);
        let (pos, reused) = place(ops, &mut self.bufs, h, src);
        if reused {
            self.tombstones -= 1;
        }
        self.size += 1;
        pos
    }

    /// Tombstones left by erasure since the last rehash.
    #[inline]
    pub(crate) fn tombstones(&self) -> usize {
        self.tombstones
    }

    fn tombstone(&mut self, pos: usize) {
        self.bufs.ctrl_mut()[pos] |= TOMBSTONE_BIT;
        self.size -= 1;
        self.tombstones += 1;
    }

    /// Drops the element at `pos` and returns the next occupied slot.
    ///
    /// # Safety
    /// `ops` describes the elements of this table.
    pub(crate) unsafe fn erase_at<O: SlotOps + ?Sized>(&mut self, ops: &O, pos: usize) -> Option<usize> {
        assert!(self.is_occupied_at(pos), "erase of unoccupied slot {pos}");
        // Tombstone first so a panicking destructor cannot cause a double drop.
        self.tombstone(pos);
        ops.drop_slot(self.slot_ptr(pos));
        self.occupied_from(pos + 1)
    }

    /// Moves the element at `pos` into `dst` and tombstones the slot.
    ///
    /// # Safety
    /// `ops` describes the elements of this table; `dst` is valid for one element.
    pub(crate) unsafe fn take_at<O: SlotOps + ?Sized>(&mut self, ops: &O, pos: usize, dst: *mut u8) {
        assert!(self.is_occupied_at(pos), "take of unoccupied slot {pos}");
        ops.relocate(dst, self.slot_ptr(pos));
        self.tombstone(pos);
    }

    /// Drops every element and resets all slots to EMPTY; keeps the buffers.
    ///
    /// # Safety
    /// `ops` describes the elements of this table.
    pub(crate) unsafe fn clear<O: SlotOps + ?Sized>(&mut self, ops: &O) {
        self.drop_elements(ops);
        self.bufs.ctrl_mut().fill(EMPTY_SLOT);
        self.tombstones = 0;
    }

    /// # Safety
    /// `ops` describes the elements of this table.
    pub(crate) unsafe fn clear_and_free<O: SlotOps + ?Sized>(&mut self, ops: &O) {
        self.drop_elements(ops);
        self.bufs.free(&self.alloc, self.elem);
        self.tombstones = 0;
    }

    unsafe fn drop_elements<O: SlotOps + ?Sized>(&mut self, ops: &O) {
        let stride = self.elem.size();
        for pos in 0..self.bufs.len {
            let h = self.bufs.ctrl()[pos];
            if is_occupied(h) {
                self.bufs.ctrl_mut()[pos] = EMPTY_SLOT;
                self.size -= 1;
                ops.drop_slot(self.bufs.slot(stride, pos));
            }
        }
        debug_assert_eq!(self.size, 0);
    }

    /// Copies the table slot for slot into buffers from `alloc`.
    ///
    /// A slot's control value is written only after `clone` initialized it,
    /// so a panicking `clone` leaks the copies made so far instead of
    /// exposing uninitialized slots.
    ///
    /// # Safety
    /// `clone(dst, src)` must initialize `dst` from the element at `src`.
    pub(crate) unsafe fn clone_in<B: TableAlloc>(
        &self,
        alloc: B,
        mut clone: impl FnMut(*mut u8, *const u8),
    ) -> RawTable<B> {
        let mut out = RawTable::new_in(self.elem, alloc);
        out.max_load_factor = self.max_load_factor;
        if self.size == 0 {
            return out;
        }
        out.bufs = Buffers::allocate(&out.alloc, self.elem, self.bufs.len);
        let stride = self.elem.size();
        for pos in 0..self.bufs.len {
            let h = self.bufs.ctrl()[pos];
            if is_occupied(h) {
                clone(out.bufs.slot(stride, pos), self.bufs.slot(stride, pos));
                out.size += 1;
            }
            out.bufs.ctrl_mut()[pos] = h;
        }
        out.tombstones = self.tombstones;
        out
    }

    /// Rebinds the table to `alloc`. Buffers are kept when `alloc` compares
    /// equal to the current allocator; otherwise every element is relocated,
    /// slot for slot, into buffers obtained from `alloc`.
    ///
    /// # Safety
    /// `ops` describes the elements of this table.
    pub(crate) unsafe fn move_in<O: SlotOps + ?Sized>(mut self, ops: &O, alloc: A) -> Self
    where
        A: PartialEq,
    {
        if alloc == self.alloc || self.bufs.len == 0 {
            self.alloc = alloc;
            return self;
        }
        let mut out = RawTable::new_in(self.elem, alloc);
        out.max_load_factor = self.max_load_factor;
        out.bufs = Buffers::allocate(&out.alloc, self.elem, self.bufs.len);
        let stride = self.elem.size();
        for pos in 0..self.bufs.len {
            let h = self.bufs.ctrl()[pos];
            if is_occupied(h) {
                ops.relocate(out.bufs.slot(stride, pos), self.bufs.slot(stride, pos));
            }
            out.bufs.ctrl_mut()[pos] = h;
        }
        out.size = self.size;
        out.tombstones = self.tombstones;
        self.size = 0;
        self.bufs.free(&self.alloc, self.elem);
        out
    }
}

impl<A: TableAlloc> RawTable<A> {
    pub(crate) fn raw_iter(&self) -> RawIter<'_> {
        RawIter {
            ctrl: self.bufs.ctrl(),
            values: self.bufs.values.as_ptr(),
            stride: self.elem.size(),
            pos: 0,
            remaining: self.size,
        }
    }
}

/// Walks occupied slots in index order, yielding `(slot, element pointer)`.
#[derive(Clone)]
pub(crate) struct RawIter<'a> {
    ctrl: &'a [usize],
    values: *mut u8,
    stride: usize,
    pos: usize,
    remaining: usize,
}

impl Iterator for RawIter<'_> {
    type Item = (usize, *mut u8);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.ctrl.len() {
            let pos = self.pos;
            self.pos += 1;
            if is_occupied(self.ctrl[pos]) {
                self.remaining -= 1;
                return Some((pos, unsafe { self.values.add(self.stride * pos) }));
            }
        }
        None
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<A: TableAlloc> Drop for RawTable<A> {
    fn drop(&mut self) {
        // Owners drop the elements (they hold the ops); only memory is left here.
        unsafe { self.bufs.free(&self.alloc, self.elem) };
    }
}
