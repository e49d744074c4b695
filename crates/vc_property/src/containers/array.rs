use vc_ptr::{BlockId, Memory, Ptr, Strided};

use super::{Backing, capacity, reserve};
use crate::error::SerialError;
use crate::info::{Property, PropertyKind};

// -----------------------------------------------------------------------------
// ArrayView

/// A view of a dynamic array slot: `[block u32][count u32]`.
///
/// # Examples
///
/// ```
/// use vc_ptr::{Memory, Ptr};
/// use vc_property::containers::{ArrayView, Backing};
/// use vc_property::info::{NumericKind, Property};
///
/// let inner = Property::numeric("", NumericKind::Int32);
/// let mut memory = Memory::new();
/// let slot = Ptr::start(memory.alloc(8));
///
/// let array = ArrayView::new(&inner, slot, Backing::Heap);
/// let first = array.add(&mut memory, 3).unwrap();
/// memory.write_i32(array.element_ptr(&memory, 2).unwrap(), 9).unwrap();
///
/// array.remove(&mut memory, first, 1).unwrap();
/// assert_eq!(array.len(&memory).unwrap(), 2);
/// assert_eq!(memory.read_i32(array.element_ptr(&memory, 1).unwrap()).unwrap(), 9);
///
/// array.empty(&mut memory).unwrap();
/// assert_eq!(memory.live_blocks(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ArrayView<'p> {
    inner: &'p Property,
    slot: Ptr,
    backing: Backing,
}

impl<'p> ArrayView<'p> {
    /// Slot size in bytes.
    pub const SLOT_SIZE: usize = PropertyKind::ARRAY_SIZE;

    #[inline]
    pub const fn new(inner: &'p Property, slot: Ptr, backing: Backing) -> Self {
        Self {
            inner,
            slot,
            backing,
        }
    }

    /// The element descriptor.
    #[inline]
    pub fn inner(&self) -> &'p Property {
        self.inner
    }

    #[inline]
    pub fn backing(&self) -> Backing {
        self.backing
    }

    #[inline]
    fn stride(&self) -> usize {
        self.inner.element_size()
    }

    #[inline]
    fn count_ptr(&self) -> Ptr {
        self.slot.byte_add(4)
    }

    #[inline]
    fn block(&self, memory: &Memory) -> Result<Option<BlockId>, SerialError> {
        Ok(memory.read_slot(self.slot)?)
    }

    #[inline]
    pub fn len(&self, memory: &Memory) -> Result<usize, SerialError> {
        Ok(memory.read_u32(self.count_ptr())? as usize)
    }

    #[inline]
    pub fn is_empty(&self, memory: &Memory) -> Result<bool, SerialError> {
        Ok(self.len(memory)? == 0)
    }

    /// Number of elements the current block holds without growing.
    #[inline]
    pub fn capacity(&self, memory: &Memory) -> Result<usize, SerialError> {
        capacity(memory, self.block(memory)?, self.stride())
    }

    #[inline]
    pub fn is_valid_index(&self, memory: &Memory, index: usize) -> Result<bool, SerialError> {
        Ok(index < self.len(memory)?)
    }

    /// The elements as a strided span.
    pub fn elements(&self, memory: &Memory) -> Result<Strided, SerialError> {
        let len = self.len(memory)?;
        Ok(match self.block(memory)? {
            Some(block) => Strided::new(Ptr::start(block), self.stride(), len),
            None => Strided::new(self.slot, self.stride(), 0),
        })
    }

    /// Address of element `index`.
    pub fn element_ptr(&self, memory: &Memory, index: usize) -> Result<Ptr, SerialError> {
        let elements = self.elements(memory)?;
        elements.get(index).ok_or(SerialError::IndexOutOfRange {
            index,
            len: elements.len(),
        })
    }

    /// Appends `count` zeroed elements without constructing them. Returns
    /// the index of the first one.
    pub fn add_uninitialized(&self, memory: &mut Memory, count: usize) -> Result<usize, SerialError> {
        self.backing.check_mutable()?;
        let len = self.len(memory)?;
        if count == 0 {
            return Ok(len);
        }
        let total = len + count;
        let limit = u32::try_from(total).map_err(|_| SerialError::IndexOutOfRange {
            index: total,
            len,
        })?;
        reserve(memory, self.slot, self.stride(), total)?;
        memory.write_u32(self.count_ptr(), limit)?;
        Ok(len)
    }

    /// Appends `count` default elements. Returns the index of the first one.
    pub fn add(&self, memory: &mut Memory, count: usize) -> Result<usize, SerialError> {
        let first = self.add_uninitialized(memory, count)?;
        for index in first..first + count {
            let ptr = self.element_ptr(memory, index)?;
            self.inner.init(memory, ptr)?;
        }
        Ok(first)
    }

    /// Destroys `count` elements starting at `index` and closes the gap.
    pub fn remove(&self, memory: &mut Memory, index: usize, count: usize) -> Result<(), SerialError> {
        self.backing.check_mutable()?;
        let len = self.len(memory)?;
        let end = index.checked_add(count).filter(|end| *end <= len);
        let Some(end) = end else {
            return Err(SerialError::IndexOutOfRange { index, len });
        };
        if count == 0 {
            return Ok(());
        }

        let elements = self.elements(memory)?;
        for ptr in elements.iter().skip(index).take(count) {
            self.inner.destroy(memory, ptr)?;
        }

        let stride = self.stride();
        let base = elements.base();
        let tail = (len - end) * stride;
        if tail > 0 {
            memory.copy(base.byte_add(index * stride), base.byte_add(end * stride), tail)?;
        }
        memory.fill(base.byte_add((len - count) * stride), count * stride, 0)?;
        memory.write_u32(self.count_ptr(), (len - count) as u32)?;
        Ok(())
    }

    /// Grows with default elements or shrinks to `len`.
    pub fn resize(&self, memory: &mut Memory, len: usize) -> Result<(), SerialError> {
        let current = self.len(memory)?;
        if len > current {
            self.add(memory, len - current)?;
        } else if len < current {
            self.remove(memory, len, current - len)?;
        }
        Ok(())
    }

    /// Destroys every element and releases the block.
    ///
    /// Image-backed storage is not owned, the slot is only reset.
    pub fn empty(&self, memory: &mut Memory) -> Result<(), SerialError> {
        if self.backing == Backing::Heap {
            for ptr in self.elements(memory)? {
                self.inner.destroy(memory, ptr)?;
            }
            if let Some(block) = self.block(memory)? {
                memory.free(block)?;
            }
        }
        memory.fill(self.slot, Self::SLOT_SIZE, 0)?;
        Ok(())
    }

    /// Replaces the content with a deep copy of `src`.
    ///
    /// Fixed-width plain data is copied in one block move, other kinds
    /// element by element.
    pub fn copy_from(&self, memory: &mut Memory, src: &ArrayView<'_>) -> Result<(), SerialError> {
        if self.slot == src.slot {
            return Ok(());
        }
        self.backing.check_mutable()?;
        self.empty(memory)?;
        let src_elements = src.elements(memory)?;
        if src_elements.is_empty() {
            return Ok(());
        }

        self.add_uninitialized(memory, src_elements.len())?;
        let dst_elements = self.elements(memory)?;
        if self.bulk_copyable() {
            memory.copy(dst_elements.base(), src_elements.base(), src_elements.byte_len())?;
        } else {
            for (to, from) in dst_elements.iter().zip(src_elements) {
                self.inner.copy(memory, to, from)?;
            }
        }
        Ok(())
    }

    /// Element kinds that can be moved as raw bytes, in memory and on the
    /// wire.
    fn bulk_copyable(&self) -> bool {
        match self.inner.kind() {
            PropertyKind::Enum(binding) => !binding.as_byte,
            PropertyKind::Bool(layout) => layout.is_native() && self.inner.is_pod(),
            _ => self.inner.is_pod(),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
