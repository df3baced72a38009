//! Pluggable allocator threaded through every table constructor.

use core::alloc::Layout;
use core::ptr::NonNull;

/// Source of the paired value/control buffers.
///
/// Failure policy belongs to the implementation: `allocate` never returns
/// null, so an implementation either succeeds or diverges (abort, panic).
///
/// # Safety
/// `allocate` must return memory valid for `layout` until it is passed back
/// to `deallocate` on an allocator that compares equal (or is a clone).
/// Layouts passed here always have a non-zero size.
pub unsafe trait TableAlloc {
    fn allocate(&self, layout: Layout) -> NonNull<u8>;

    /// # Safety
    /// `ptr` must come from `allocate` on this allocator with the same `layout`.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process-wide allocator (`std::alloc`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Global;

unsafe impl TableAlloc for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        debug_assert!(layout.size() != 0);
        let ptr = unsafe { std::alloc::alloc(layout) };
        match NonNull::new(ptr) {
            Some(p) => p,
            None => std::alloc::handle_alloc_error(layout),
        }
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        std::alloc::dealloc(ptr.as_ptr(), layout)
    }
}

unsafe impl<A: TableAlloc + ?Sized> TableAlloc for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
}
