use core::ops::Deref;

use vc_ptr::{BlockId, Memory, Ptr, Strided};

use super::{Backing, capacity, reserve};
use crate::error::SerialError;
use crate::info::{MapLayout, Property, PropertyKind};
use crate::ops::IdenticalFlags;

const ELEMENTS: usize = 0;
const COUNT: usize = 4;
const INDEX: usize = 8;
const INDEX_CAP: usize = 12;
const MIN_INDEX_CAP: usize = 8;

// -----------------------------------------------------------------------------
// HashedView

/// The storage shared by sets and maps.
///
/// Elements live densely in one block, in insertion order. A separate index
/// block is an open-addressed table with linear probing, each `u32` entry is
/// `element index + 1`, `0` marks a free bucket.
///
/// Bulk construction is two-phase: [`add_default_invalid_needs_rehash`] may
/// be called any number of times, then [`rehash`] exactly once. Lookups in
/// between are a logic error, checked by `debug_assert!`. Release builds fall
/// back to a linear scan.
///
/// [`add_default_invalid_needs_rehash`]: Self::add_default_invalid_needs_rehash
/// [`rehash`]: Self::rehash
#[derive(Debug, Clone, Copy)]
pub struct HashedView<'p> {
    key: &'p Property,
    value: Option<(&'p Property, usize)>,
    stride: usize,
    slot: Ptr,
    backing: Backing,
}

impl<'p> HashedView<'p> {
    /// Slot size in bytes.
    pub const SLOT_SIZE: usize = PropertyKind::HASHED_SIZE;

    /// The key descriptor, the element descriptor of a set.
    #[inline]
    pub fn key(&self) -> &'p Property {
        self.key
    }

    /// The value descriptor of a map.
    #[inline]
    pub fn value(&self) -> Option<&'p Property> {
        self.value.map(|(value, _)| value)
    }

    #[inline]
    pub fn backing(&self) -> Backing {
        self.backing
    }

    /// The value descriptor and its offset inside an element.
    #[inline]
    pub(crate) fn value_entry(&self) -> Option<(&'p Property, usize)> {
        self.value
    }

    /// Size of one element.
    #[inline]
    pub(crate) fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    fn elements_block(&self, memory: &Memory) -> Result<Option<BlockId>, SerialError> {
        Ok(memory.read_slot(self.slot.byte_add(ELEMENTS))?)
    }

    #[inline]
    fn index_cap(&self, memory: &Memory) -> Result<usize, SerialError> {
        Ok(memory.read_u32(self.slot.byte_add(INDEX_CAP))? as usize)
    }

    #[inline]
    pub fn len(&self, memory: &Memory) -> Result<usize, SerialError> {
        Ok(memory.read_u32(self.slot.byte_add(COUNT))? as usize)
    }

    #[inline]
    pub fn is_empty(&self, memory: &Memory) -> Result<bool, SerialError> {
        Ok(self.len(memory)? == 0)
    }

    #[inline]
    pub fn is_valid_index(&self, memory: &Memory, index: usize) -> Result<bool, SerialError> {
        Ok(index < self.len(memory)?)
    }

    /// Returns `true` between a bulk insertion and the following
    /// [`rehash`](Self::rehash).
    pub fn needs_rehash(&self, memory: &Memory) -> Result<bool, SerialError> {
        Ok(self.len(memory)? > 0 && self.index_cap(memory)? == 0)
    }

    /// The elements as a strided span. A map element is a key-value pair.
    pub fn elements(&self, memory: &Memory) -> Result<Strided, SerialError> {
        let len = self.len(memory)?;
        Ok(match self.elements_block(memory)? {
            Some(block) => Strided::new(Ptr::start(block), self.stride, len),
            None => Strided::new(self.slot, self.stride, 0),
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

    /// Address of the key of element `index`.
    #[inline]
    pub fn key_ptr(&self, memory: &Memory, index: usize) -> Result<Ptr, SerialError> {
        self.element_ptr(memory, index)
    }

    fn hash_of(&self, memory: &Memory, key: Ptr) -> Result<u64, SerialError> {
        Ok(self.key.value_hash(memory, key)?.unwrap_or_default())
    }

    fn init_element(&self, memory: &mut Memory, ptr: Ptr) -> Result<(), SerialError> {
        self.key.init(memory, ptr)?;
        if let Some((value, offset)) = self.value {
            value.init(memory, ptr.byte_add(offset))?;
        }
        Ok(())
    }

    fn destroy_element(&self, memory: &mut Memory, ptr: Ptr) -> Result<(), SerialError> {
        self.key.destroy(memory, ptr)?;
        if let Some((value, offset)) = self.value {
            value.destroy(memory, ptr.byte_add(offset))?;
        }
        Ok(())
    }

    /// Appends a default element, leaving the index untouched.
    fn push_element(&self, memory: &mut Memory) -> Result<usize, SerialError> {
        self.backing.check_mutable()?;
        let len = self.len(memory)?;
        let count = u32::try_from(len + 1).map_err(|_| SerialError::IndexOutOfRange {
            index: len + 1,
            len,
        })?;
        reserve(memory, self.slot.byte_add(ELEMENTS), self.stride, len + 1)?;
        memory.write_u32(self.slot.byte_add(COUNT), count)?;
        let ptr = self.element_ptr(memory, len)?;
        self.init_element(memory, ptr)?;
        Ok(len)
    }

    fn drop_index(&self, memory: &mut Memory) -> Result<(), SerialError> {
        if let Some(block) = memory.read_slot(self.slot.byte_add(INDEX))? {
            memory.free(block)?;
        }
        memory.fill(self.slot.byte_add(INDEX), 8, 0)?;
        Ok(())
    }

    /// Appends a default element without indexing it. Returns its index.
    ///
    /// The container must be [`rehash`](Self::rehash)ed before the next
    /// lookup.
    pub fn add_default_invalid_needs_rehash(&self, memory: &mut Memory) -> Result<usize, SerialError> {
        let index = self.push_element(memory)?;
        self.drop_index(memory)?;
        Ok(index)
    }

    /// Rebuilds the index from the elements.
    pub fn rehash(&self, memory: &mut Memory) -> Result<(), SerialError> {
        self.backing.check_mutable()?;
        let len = self.len(memory)?;
        self.drop_index(memory)?;
        if len == 0 {
            return Ok(());
        }

        let cap = (len * 2).max(MIN_INDEX_CAP).next_power_of_two();
        let block = memory.alloc(cap * 4);
        memory.write_slot(self.slot.byte_add(INDEX), Some(block))?;
        memory.write_u32(self.slot.byte_add(INDEX_CAP), cap as u32)?;
        for index in 0..len {
            self.index_insert(memory, block, cap, index)?;
        }
        Ok(())
    }

    fn index_insert(&self, memory: &mut Memory, block: BlockId, cap: usize, index: usize) -> Result<(), SerialError> {
        let key = self.key_ptr(memory, index)?;
        let mut bucket = self.hash_of(memory, key)? as usize & (cap - 1);
        loop {
            let entry = Ptr::new(block, bucket * 4);
            if memory.read_u32(entry)? == 0 {
                memory.write_u32(entry, index as u32 + 1)?;
                return Ok(());
            }
            bucket = (bucket + 1) & (cap - 1);
        }
    }

    /// Finds the element whose key is identical to the key at `key`.
    pub fn find(&self, memory: &Memory, key: Ptr) -> Result<Option<usize>, SerialError> {
        let len = self.len(memory)?;
        if len == 0 {
            return Ok(None);
        }
        let cap = self.index_cap(memory)?;
        let index_block = memory.read_slot(self.slot.byte_add(INDEX))?;
        debug_assert!(cap > 0, "lookup in a set or map that needs a rehash");

        let Some(block) = index_block.filter(|_| cap > 0) else {
            for index in 0..len {
                if self.key_matches(memory, index, key)? {
                    return Ok(Some(index));
                }
            }
            return Ok(None);
        };

        let mut bucket = self.hash_of(memory, key)? as usize & (cap - 1);
        for _ in 0..cap {
            let entry = memory.read_u32(Ptr::new(block, bucket * 4))? as usize;
            if entry == 0 {
                return Ok(None);
            }
            if self.key_matches(memory, entry - 1, key)? {
                return Ok(Some(entry - 1));
            }
            bucket = (bucket + 1) & (cap - 1);
        }
        Ok(None)
    }

    fn key_matches(&self, memory: &Memory, index: usize, key: Ptr) -> Result<bool, SerialError> {
        let candidate = self.key_ptr(memory, index)?;
        self.key.identical(memory, candidate, key, IdenticalFlags::empty())
    }

    /// Inserts a copy of `key` (and `value` for maps) unless the key is
    /// present, in which case a map value is overwritten. Returns the
    /// element index.
    pub(crate) fn insert(&self, memory: &mut Memory, key: Ptr, value: Option<Ptr>) -> Result<usize, SerialError> {
        self.backing.check_mutable()?;
        if self.needs_rehash(memory)? {
            self.rehash(memory)?;
        }
        if let Some(index) = self.find(memory, key)? {
            if let (Some((prop, offset)), Some(src)) = (self.value, value) {
                let dst = self.element_ptr(memory, index)?.byte_add(offset);
                prop.copy(memory, dst, src)?;
            }
            return Ok(index);
        }

        let index = self.push_element(memory)?;
        let dst = self.element_ptr(memory, index)?;
        self.key.copy(memory, dst, key)?;
        if let (Some((prop, offset)), Some(src)) = (self.value, value) {
            prop.copy(memory, dst.byte_add(offset), src)?;
        }

        let cap = self.index_cap(memory)?;
        match memory.read_slot(self.slot.byte_add(INDEX))? {
            Some(block) if (index + 1) * 2 <= cap => self.index_insert(memory, block, cap, index)?,
            _ => self.rehash(memory)?,
        }
        Ok(index)
    }

    /// Destroys element `index`, closes the gap and rebuilds the index.
    pub fn remove_at(&self, memory: &mut Memory, index: usize) -> Result<(), SerialError> {
        self.backing.check_mutable()?;
        let len = self.len(memory)?;
        if index >= len {
            return Err(SerialError::IndexOutOfRange { index, len });
        }
        let elements = self.elements(memory)?;
        let base = elements.base();
        let ptr = base.byte_add(index * self.stride);
        self.destroy_element(memory, ptr)?;

        let tail = (len - index - 1) * self.stride;
        if tail > 0 {
            memory.copy(ptr, ptr.byte_add(self.stride), tail)?;
        }
        memory.fill(base.byte_add((len - 1) * self.stride), self.stride, 0)?;
        memory.write_u32(self.slot.byte_add(COUNT), (len - 1) as u32)?;
        self.rehash(memory)
    }

    /// Removes the element whose key is identical to `key`, if any.
    pub fn remove(&self, memory: &mut Memory, key: Ptr) -> Result<bool, SerialError> {
        match self.find(memory, key)? {
            Some(index) => self.remove_at(memory, index).map(|()| true),
            None => Ok(false),
        }
    }

    /// Destroys every element and releases both blocks.
    ///
    /// Image-backed storage is not owned, the slot is only reset.
    pub fn empty(&self, memory: &mut Memory) -> Result<(), SerialError> {
        if self.backing == Backing::Heap {
            for ptr in self.elements(memory)? {
                self.destroy_element(memory, ptr)?;
            }
            if let Some(block) = self.elements_block(memory)? {
                memory.free(block)?;
            }
            self.drop_index(memory)?;
        }
        memory.fill(self.slot, Self::SLOT_SIZE, 0)?;
        Ok(())
    }

    /// Replaces the content with a deep copy of `src` and rehashes.
    pub fn copy_from(&self, memory: &mut Memory, src: &HashedView<'_>) -> Result<(), SerialError> {
        if self.slot == src.slot {
            return Ok(());
        }
        self.empty(memory)?;
        for from in src.elements(memory)? {
            let index = self.push_element(memory)?;
            let to = self.element_ptr(memory, index)?;
            self.key.copy(memory, to, from)?;
            if let Some((value, offset)) = self.value {
                value.copy(memory, to.byte_add(offset), from.byte_add(offset))?;
            }
        }
        self.rehash(memory)
    }

    /// Number of elements the element block holds without growing.
    pub fn capacity(&self, memory: &Memory) -> Result<usize, SerialError> {
        capacity(memory, self.elements_block(memory)?, self.stride)
    }
}

// -----------------------------------------------------------------------------
// SetView

/// A view of a set slot.
///
/// # Examples
///
/// ```
/// use vc_ptr::{Memory, Ptr};
/// use vc_property::containers::{Backing, SetView};
/// use vc_property::info::{NumericKind, Property};
///
/// let element = Property::numeric("", NumericKind::Int32);
/// let mut memory = Memory::new();
/// let scratch = Ptr::start(memory.alloc(4));
/// let set = SetView::new(&element, Ptr::start(memory.alloc(16)), Backing::Heap);
///
/// for value in [3, 1, 3, 2] {
///     memory.write_i32(scratch, value).unwrap();
///     set.add(&mut memory, scratch).unwrap();
/// }
/// assert_eq!(set.len(&memory).unwrap(), 3);
///
/// memory.write_i32(scratch, 2).unwrap();
/// assert_eq!(set.find(&memory, scratch).unwrap(), Some(2));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SetView<'p>(HashedView<'p>);

impl<'p> SetView<'p> {
    #[inline]
    pub fn new(element: &'p Property, slot: Ptr, backing: Backing) -> Self {
        Self(HashedView {
            key: element,
            value: None,
            stride: element.element_size(),
            slot,
            backing,
        })
    }

    /// Adds a copy of the element at `src` unless an identical one exists.
    /// Returns the element index.
    #[inline]
    pub fn add(&self, memory: &mut Memory, src: Ptr) -> Result<usize, SerialError> {
        self.0.insert(memory, src, None)
    }

    #[inline]
    pub fn contains(&self, memory: &Memory, element: Ptr) -> Result<bool, SerialError> {
        Ok(self.0.find(memory, element)?.is_some())
    }
}

impl<'p> Deref for SetView<'p> {
    type Target = HashedView<'p>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// -----------------------------------------------------------------------------
// MapView

/// A view of a map slot, entries are `(key, value)` pairs laid out per
/// [`MapLayout`].
///
/// # Examples
///
/// ```
/// use vc_ptr::{Memory, Ptr};
/// use vc_property::containers::{Backing, MapView};
/// use vc_property::info::{NumericKind, Property, PropertyKind, text};
///
/// let map_prop = Property::new(
///     "Scores",
///     PropertyKind::map(
///         Property::new("", PropertyKind::Name).unwrap(),
///         Property::numeric("", NumericKind::Int32),
///     ),
/// )
/// .unwrap();
/// let PropertyKind::Map { key, value, layout } = map_prop.kind() else { unreachable!() };
///
/// let mut memory = Memory::new();
/// let scratch = memory.alloc(8);
/// let (k, v) = (Ptr::start(scratch), Ptr::new(scratch, 4));
/// let map = MapView::new(key, value, *layout, Ptr::start(memory.alloc(16)), Backing::Heap);
///
/// text::write_name(&mut memory, k, "Alice").unwrap();
/// memory.write_i32(v, 10).unwrap();
/// map.add(&mut memory, k, v).unwrap();
///
/// text::write_name(&mut memory, k, "ALICE").unwrap();
/// let found = map.find_value(&memory, k).unwrap().unwrap();
/// assert_eq!(memory.read_i32(found).unwrap(), 10);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MapView<'p>(HashedView<'p>);

impl<'p> MapView<'p> {
    #[inline]
    pub fn new(key: &'p Property, value: &'p Property, layout: MapLayout, slot: Ptr, backing: Backing) -> Self {
        Self(HashedView {
            key,
            value: Some((value, layout.value_offset)),
            stride: layout.stride,
            slot,
            backing,
        })
    }

    /// Address of the value of element `index`.
    pub fn value_ptr(&self, memory: &Memory, index: usize) -> Result<Ptr, SerialError> {
        let offset = self.0.value.map_or(0, |(_, offset)| offset);
        Ok(self.0.element_ptr(memory, index)?.byte_add(offset))
    }

    /// Inserts or overwrites the entry for the key at `key`.
    #[inline]
    pub fn add(&self, memory: &mut Memory, key: Ptr, value: Ptr) -> Result<usize, SerialError> {
        self.0.insert(memory, key, Some(value))
    }

    /// Address of the value stored for the key at `key`.
    pub fn find_value(&self, memory: &Memory, key: Ptr) -> Result<Option<Ptr>, SerialError> {
        match self.0.find(memory, key)? {
            Some(index) => self.value_ptr(memory, index).map(Some),
            None => Ok(None),
        }
    }
}

impl<'p> Deref for MapView<'p> {
    type Target = HashedView<'p>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// -----------------------------------------------------------------------------
// Tests
