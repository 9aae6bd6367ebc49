use std::ptr::NonNull;

use crate::{obj::Obj, AllocError};

/// A mark-and-sweep collected heap.
///
/// Roots are given explicitly on every collection and are scanned
/// conservatively: any word that points into a payload keeps its object
/// alive. Payloads themselves are never scanned.
pub struct Heap {
    head: Option<NonNull<Obj>>,
    len: usize,
    bytes: usize,
}

// SAFETY: the heap exclusively owns every object in its list.
unsafe impl Send for Heap {}

/// What a single collection did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub marked: usize,
    pub freed: usize,
    pub bytes_freed: usize,
}

impl Heap {
    pub const fn new() -> Heap {
        Heap {
            head: None,
            len: 0,
            bytes: 0,
        }
    }

    /// Allocates `size` zeroed bytes, returning a pointer to the payload.
    pub fn alloc(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let obj = Obj::allocate(size, self.head)?;
        self.head = Some(obj);
        self.len += 1;
        self.bytes += size;
        Ok(Obj::payload(obj))
    }

    /// Runs one mark and sweep cycle over `roots`.
    pub fn collect(&mut self, roots: &[usize]) -> CollectStats {
        let mut stats = CollectStats::default();

        for obj in self.objects() {
            if roots.iter().any(|&word| Obj::contains(obj, word)) {
                // SAFETY: objects in the list are live and owned by us.
                unsafe { (*obj.as_ptr()).marked = true };
                stats.marked += 1;
            }
        }

        let mut link: *mut Option<NonNull<Obj>> = &mut self.head;
        // SAFETY: `link` always points either to `self.head` or to the `next`
        // field of a live object.
        while let Some(obj) = unsafe { *link } {
            let header = obj.as_ptr();
            unsafe {
                if (*header).marked {
                    (*header).marked = false;
                    link = &mut (*header).next;
                } else {
                    *link = (*header).next;
                    stats.freed += 1;
                    stats.bytes_freed += (*header).size;
                    Obj::deallocate(obj);
                }
            }
        }

        self.len -= stats.freed;
        self.bytes -= stats.bytes_freed;
        stats
    }

    /// Forgets every allocation without freeing it.
    pub fn reset(&mut self) {
        self.head = None;
        self.len = 0;
        self.bytes = 0;
    }

    /// Whether `ptr` is the payload of a live allocation.
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.objects()
            .any(|obj| std::ptr::eq(Obj::payload(obj).as_ptr(), ptr))
    }

    /// Live allocations.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Live payload bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn objects(&self) -> impl Iterator<Item = NonNull<Obj>> + '_ {
        // SAFETY: objects in the list are live.
        std::iter::successors(self.head, |obj| unsafe { obj.as_ref().next })
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(obj) = next {
            // SAFETY: each object is freed once, after reading its link.
            unsafe {
                next = obj.as_ref().next;
                Obj::deallocate(obj);
            }
        }
    }
}
