use core::fmt;
use core::num::NonZeroU32;

// -----------------------------------------------------------------------------
// BlockId

/// Identifier of one block inside a [`Memory`](crate::Memory).
///
/// The id is never zero, so `Option<BlockId>` has the size of `u32` and
/// an empty slot can be stored as the raw value `0`.
///
/// # Examples
///
/// ```
/// use vc_ptr::BlockId;
///
/// assert!(BlockId::from_slot(0).is_none());
/// assert_eq!(BlockId::to_slot(None), 0);
///
/// let id = BlockId::from_slot(7).unwrap();
/// assert_eq!(BlockId::to_slot(Some(id)), 7);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(NonZeroU32);

impl BlockId {
    /// Decodes a slot value, `0` is "no block".
    #[inline]
    pub const fn from_slot(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Encodes an optional block as a slot value.
    #[inline]
    pub const fn to_slot(id: Option<Self>) -> u32 {
        match id {
            Some(id) => id.0.get(),
            None => 0,
        }
    }

    /// Returns the raw, non-zero value.
    #[inline(always)]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    #[inline(always)]
    pub(crate) const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    #[inline(always)]
    pub(crate) const fn from_index(index: usize) -> Self {
        // The arena never grows beyond `u32::MAX - 1` blocks.
        match NonZeroU32::new(index as u32 + 1) {
            Some(id) => Self(id),
            None => panic!("block index overflow"),
        }
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// -----------------------------------------------------------------------------
// Ptr

/// A type-erased address: a byte `offset` inside one memory block.
///
/// `Ptr` is only an address, it does not borrow the [`Memory`](crate::Memory).
/// Reads and writes go through the arena, which checks bounds.
///
/// # Examples
///
/// ```
/// use vc_ptr::{Memory, Ptr};
///
/// let mut memory = Memory::new();
/// let base = Ptr::start(memory.alloc(8));
///
/// let field = base.byte_add(2);
/// assert_eq!(field.offset(), 2);
/// assert_eq!(field.block(), base.block());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ptr {
    block: BlockId,
    offset: usize,
}

impl Ptr {
    /// Creates a pointer to `offset` within `block`.
    #[inline(always)]
    pub const fn new(block: BlockId, offset: usize) -> Self {
        Self { block, offset }
    }

    /// Creates a pointer to the first byte of `block`.
    #[inline(always)]
    pub const fn start(block: BlockId) -> Self {
        Self { block, offset: 0 }
    }

    /// Returns the block this pointer addresses.
    #[inline(always)]
    pub const fn block(self) -> BlockId {
        self.block
    }

    /// Returns the byte offset inside the block.
    #[inline(always)]
    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Advances the pointer by `count` bytes.
    ///
    /// This never fails, the resulting address is checked on access.
    #[inline(always)]
    pub const fn byte_add(self, count: usize) -> Self {
        Self {
            block: self.block,
            offset: self.offset + count,
        }
    }
}

impl fmt::Debug for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ptr({}+{})", self.block, self.offset)
    }
}
