//! Control-block encoding, probe arithmetic and growth math.
//!
//! Every table in this crate (typed or type-erased) routes through these
//! functions, so the two cannot disagree on where an element lives or when
//! the table grows.

/// Control value of a slot that has never held an element.
pub const EMPTY_SLOT: usize = 0;

/// Set on the control value of a slot whose element was erased.
pub const TOMBSTONE_BIT: usize = 1 << (usize::BITS - 1);

/// Smallest buffer a table ever allocates.
pub const INITIAL_BUFFER_SIZE: usize = 16;

/// Default maximum load factor.
pub const INITIAL_LOAD_FACTOR: f32 = 0.9;

#[inline]
pub fn is_tombstone(h: usize) -> bool {
    h & TOMBSTONE_BIT != 0
}

/// True if the control value marks a live element.
#[inline]
pub fn is_occupied(h: usize) -> bool {
    h != EMPTY_SLOT && !is_tombstone(h)
}

/// Maps a raw hash onto a valid control value: never EMPTY, tombstone bit clear.
#[inline]
pub fn alter_hash(h: usize) -> usize {
    let h = h & !TOMBSTONE_BIT;
    if h == EMPTY_SLOT {
        1
    } else {
        h
    }
}

#[inline]
pub fn home(h: usize, buffer_size: usize) -> usize {
    (h & !TOMBSTONE_BIT) % buffer_size
}

/// Forward distance from the home slot of `h` to `pos`, wrapping around the buffer.
#[inline]
pub fn probe_distance(h: usize, pos: usize, buffer_size: usize) -> usize {
    let desired = home(h, buffer_size);
    if pos >= desired {
        pos - desired
    } else {
        buffer_size + pos - desired
    }
}

/// Number of elements a buffer of `buffer_size` slots holds before the next rehash.
#[inline]
pub fn capacity_for(buffer_size: usize, max_load_factor: f32) -> usize {
    (max_load_factor * buffer_size as f32).floor() as usize
}

/// Smallest buffer size whose capacity is at least `cap`.
pub fn buffer_size_for(cap: usize, max_load_factor: f32) -> usize {
    if cap == 0 {
        return 0;
    }
    let mut n = (cap as f32 / max_load_factor).ceil() as usize;
    // f32 rounding can leave `floor(ml * n)` one short.
    while capacity_for(n, max_load_factor) < cap {
        n += 1;
    }
    n
}

/// Panics unless `0 < max_load_factor <= 1`.
#[inline]
pub fn check_max_load_factor(max_load_factor: f32) {
    assert!(
        max_load_factor > 0.0 && max_load_factor <= 1.0,
        "max_load_factor must be in (0, 1], got {max_load_factor}"
    );
}
