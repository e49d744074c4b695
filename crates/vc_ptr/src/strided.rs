use crate::Ptr;

// -----------------------------------------------------------------------------
// Strided

/// `count` elements of `stride` bytes each, starting at `base`.
///
/// This is the type-erased equivalent of `&[T]`: the element type is only
/// known to whoever created the span.
///
/// # Examples
///
/// ```
/// use vc_ptr::{Memory, Ptr, Strided};
///
/// let mut memory = Memory::new();
/// let base = Ptr::start(memory.alloc(12));
/// let span = Strided::new(base, 4, 3);
///
/// assert_eq!(span.get(2).unwrap().offset(), 8);
/// assert!(span.get(3).is_none());
/// assert_eq!(span.iter().count(), 3);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strided {
    base: Ptr,
    stride: usize,
    count: usize,
}

impl Strided {
    /// Creates a span.
    #[inline]
    pub const fn new(base: Ptr, stride: usize, count: usize) -> Self {
        Self {
            base,
            stride,
            count,
        }
    }

    /// Returns the address of the first element.
    #[inline(always)]
    pub const fn base(&self) -> Ptr {
        self.base
    }

    /// Returns the distance between two elements.
    #[inline(always)]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the number of elements.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if the span has no elements.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the total size in bytes.
    #[inline(always)]
    pub const fn byte_len(&self) -> usize {
        self.count * self.stride
    }

    /// Returns the address of element `index`, or `None` if out of range.
    #[inline]
    pub const fn get(&self, index: usize) -> Option<Ptr> {
        if index < self.count {
            Some(self.base.byte_add(index * self.stride))
        } else {
            None
        }
    }

    /// Iterates over element addresses.
    #[inline]
    pub const fn iter(&self) -> StridedIter {
        StridedIter {
            span: *self,
            index: 0,
        }
    }
}

impl IntoIterator for Strided {
    type Item = Ptr;
    type IntoIter = StridedIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the element addresses of a [`Strided`] span.
#[derive(Clone, Debug)]
pub struct StridedIter {
    span: Strided,
    index: usize,
}

impl Iterator for StridedIter {
    type Item = Ptr;

    #[inline]
    fn next(&mut self) -> Option<Ptr> {
        let item = self.span.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.span.len() - self.index;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for StridedIter {}
