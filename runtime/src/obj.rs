use std::{
    alloc::{alloc_zeroed, dealloc, Layout},
    mem,
    ptr::NonNull,
};

use crate::AllocError;

/// The header in front of every collected payload. Objects form an intrusive
/// singly-linked list through `next`.
#[repr(C, align(16))]
pub struct Obj {
    pub next: Option<NonNull<Obj>>,
    /// Payload size in bytes, excluding the header.
    pub size: usize,
    pub marked: bool,
}

impl Obj {
    /// Header size. Also the payload offset, as the header's alignment keeps
    /// its size a multiple of 16.
    pub const HEADER_SIZE: usize = mem::size_of::<Obj>();

    fn layout(size: usize) -> Result<Layout, AllocError> {
        let total = Self::HEADER_SIZE
            .checked_add(size)
            .ok_or(AllocError { size })?;
        Layout::from_size_align(total, mem::align_of::<Obj>()).map_err(|_| AllocError { size })
    }

    /// Allocates an unmarked object with a zeroed payload of `size` bytes,
    /// linked in front of `next`.
    ///
    /// The returned object must be released with [`Obj::deallocate`].
    pub fn allocate(
        size: usize,
        next: Option<NonNull<Obj>>,
    ) -> Result<NonNull<Obj>, AllocError> {
        let layout = Self::layout(size)?;
        // SAFETY: the layout is never zero-sized, it always holds the header.
        let ptr = unsafe { alloc_zeroed(layout) }.cast::<Obj>();
        let obj = NonNull::new(ptr).ok_or(AllocError { size })?;
        // SAFETY: freshly allocated with room and alignment for the header.
        unsafe {
            obj.as_ptr().write(Obj {
                next,
                size,
                marked: false,
            });
        }
        Ok(obj)
    }

    /// Deallocates an object.
    ///
    /// # Safety
    ///
    /// Caller must ensure:
    /// - `obj` was allocated using [`Obj::allocate`]
    /// - `obj` has not been deallocated before
    /// - `obj.size` has not been corrupted since allocation
    /// - Neither the object nor its payload is accessed after this call
    pub unsafe fn deallocate(obj: NonNull<Obj>) {
        let size = obj.as_ref().size;
        let total = Self::HEADER_SIZE + size;
        let layout = Layout::from_size_align_unchecked(total, mem::align_of::<Obj>());
        dealloc(obj.as_ptr().cast::<u8>(), layout);
    }

    /// Returns the start of the object's payload.
    pub fn payload(obj: NonNull<Obj>) -> NonNull<u8> {
        // SAFETY: every object is allocated with its payload right after the
        // header, so the offset stays in bounds.
        unsafe { obj.cast::<u8>().add(Self::HEADER_SIZE) }
    }

    /// Whether the address `word` points into the payload. Empty payloads
    /// contain nothing.
    pub fn contains(obj: NonNull<Obj>, word: usize) -> bool {
        let start = Self::payload(obj).as_ptr() as usize;
        // SAFETY: `obj` points to a live header.
        let size = unsafe { obj.as_ref().size };
        start <= word && word - start < size
    }
}

#[cfg(test)]
mod tests {
    use super::Obj;

    #[test]
    fn test_payload_follows_header() {
        assert_eq!(Obj::HEADER_SIZE % 16, 0);

        let obj = Obj::allocate(24, None).unwrap();
        let payload = Obj::payload(obj);
        assert_eq!(payload.as_ptr() as usize % 16, 0);
        assert_eq!(payload.as_ptr() as usize - obj.as_ptr() as usize, Obj::HEADER_SIZE);

        // SAFETY: the payload is 24 bytes long and zeroed.
        let bytes = unsafe { std::slice::from_raw_parts(payload.as_ptr(), 24) };
        assert!(bytes.iter().all(|&b| b == 0));

        let start = payload.as_ptr() as usize;
        assert!(Obj::contains(obj, start));
        assert!(Obj::contains(obj, start + 23));
        assert!(!Obj::contains(obj, start + 24));
        assert!(!Obj::contains(obj, start - 1));

        unsafe { Obj::deallocate(obj) };
    }

    #[test]
    fn test_empty_payload_contains_nothing() {
        let obj = Obj::allocate(0, None).unwrap();
        assert!(!Obj::contains(obj, Obj::payload(obj).as_ptr() as usize));
        unsafe { Obj::deallocate(obj) };
    }

    #[test]
    fn test_oversized_allocation_fails() {
        assert!(Obj::allocate(usize::MAX, None).is_err());
        assert!(Obj::allocate(isize::MAX as usize, None).is_err());
    }
}
