//! Conservative mark-and-sweep collector linked into generated programs.
//!
//! The C entry points share one process-wide [`Heap`] and assume a single
//! thread of execution.

use std::{
    ffi::{c_char, c_void, CStr},
    hint::black_box,
    mem,
    ptr,
    sync::{Mutex, MutexGuard, PoisonError},
};

pub mod heap;
pub mod obj;

pub use heap::{CollectStats, Heap};

/// Allocation failed, either because the allocator refused or because the
/// requested size can't be laid out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot allocate {size} bytes")]
pub struct AllocError {
    pub size: usize,
}

static HEAP: Mutex<Heap> = Mutex::new(Heap::new());

fn heap() -> MutexGuard<'static, Heap> {
    HEAP.lock().unwrap_or_else(PoisonError::into_inner)
}

fn alloc_or_abort(heap: &mut Heap, size: usize) -> *mut u8 {
    match heap.alloc(size) {
        Ok(ptr) => ptr.as_ptr(),
        Err(_) => {
            eprintln!("gc: out of memory");
            std::process::abort();
        }
    }
}

/// Forgets every allocation made so far.
#[no_mangle]
pub extern "C" fn gc_init() {
    heap().reset();
}

/// Allocates `size` zeroed bytes owned by the collector.
#[no_mangle]
pub extern "C" fn gc_alloc(size: usize) -> *mut c_void {
    alloc_or_abort(&mut heap(), size).cast()
}

/// Copies a NUL-terminated string into the collected heap. Returns null for a
/// null input.
///
/// # Safety
///
/// `s` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn gc_strdup(s: *const c_char) -> *mut c_char {
    if s.is_null() {
        return ptr::null_mut();
    }
    let bytes = CStr::from_ptr(s).to_bytes_with_nul();
    let copy = alloc_or_abort(&mut heap(), bytes.len());
    ptr::copy_nonoverlapping(bytes.as_ptr(), copy, bytes.len());
    copy.cast()
}

/// Collects with a single root word taken from this function's own frame.
///
/// Nothing a caller holds is visible from there, so in practice this frees
/// every allocation. Use [`gc_collect_range`] to pass real roots.
#[no_mangle]
pub extern "C" fn gc_collect() {
    let frame = black_box([0usize; 1]);
    heap().collect(&frame);
}

/// Collects, treating every aligned word in `[start, end)` as a possible
/// pointer. The bounds may come in either order.
///
/// # Safety
///
/// The whole range must be readable memory, such as the caller's stack.
#[no_mangle]
pub unsafe extern "C" fn gc_collect_range(start: *const c_void, end: *const c_void) {
    let (lo, hi) = if start <= end {
        (start as usize, end as usize)
    } else {
        (end as usize, start as usize)
    };
    let word = mem::size_of::<usize>();
    let first = lo.next_multiple_of(word);
    let roots: Vec<usize> = (first..hi.saturating_sub(word - 1))
        .step_by(word)
        .map(|addr| ptr::read_volatile(addr as *const usize))
        .collect();
    heap().collect(&roots);
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    // The C entry points share one heap, so they are exercised from a single
    // test.
    #[test]
    fn test_c_interface() {
        gc_init();

        let s = unsafe { gc_strdup(c"hello".as_ptr()) };
        assert_eq!(unsafe { CStr::from_ptr(s) }, c"hello");
        assert!(unsafe { gc_strdup(ptr::null()) }.is_null());

        let block = gc_alloc(32).cast::<u8>();
        let dropped = gc_alloc(16).cast::<u8>();
        assert_eq!(heap().len(), 3);

        // Only the words in the range are roots.
        let roots = [s as usize, block as usize + 8];
        let range = roots.as_ptr_range();
        unsafe { gc_collect_range(range.end.cast(), range.start.cast()) };
        assert!(heap().contains(s.cast()));
        assert!(heap().contains(block));
        assert!(!heap().contains(dropped));

        gc_collect();
        assert!(heap().is_empty());

        gc_alloc(8);
        gc_init();
        assert!(heap().is_empty());
    }
}
