use alloc::vec;
use alloc::vec::Vec;

use crate::{BlockId, MemoryError, Ptr};

// -----------------------------------------------------------------------------
// Memory

/// An arena of zero-initialized byte blocks.
///
/// Freed block ids are recycled, so a stale [`Ptr`] may observe a newer
/// block. Ownership of blocks is tracked by the code that stores their ids,
/// the arena only guarantees that every access stays inside a live block.
///
/// # Examples
///
/// ```
/// use vc_ptr::{Memory, Ptr};
///
/// let mut memory = Memory::new();
/// let a = memory.alloc(4);
/// let b = memory.alloc(4);
///
/// memory.write_i32(Ptr::start(a), -5).unwrap();
/// memory.copy(Ptr::start(b), Ptr::start(a), 4).unwrap();
/// assert_eq!(memory.read_i32(Ptr::start(b)).unwrap(), -5);
///
/// memory.free(a).unwrap();
/// assert_eq!(memory.live_blocks(), 1);
/// ```
#[derive(Default, Debug)]
pub struct Memory {
    blocks: Vec<Option<Vec<u8>>>,
    free: Vec<BlockId>,
}

macro_rules! impl_fixed_access {
    ($($read:ident, $write:ident => $ty:ty;)*) => {$(
        #[doc = concat!("Reads a little-endian `", stringify!($ty), "` at `ptr`.")]
        #[inline]
        pub fn $read(&self, ptr: Ptr) -> Result<$ty, MemoryError> {
            self.read_array(ptr).map(<$ty>::from_le_bytes)
        }

        #[doc = concat!("Writes a little-endian `", stringify!($ty), "` at `ptr`.")]
        #[inline]
        pub fn $write(&mut self, ptr: Ptr, value: $ty) -> Result<(), MemoryError> {
            self.write(ptr, &value.to_le_bytes())
        }
    )*};
}

impl Memory {
    /// Creates an empty arena.
    #[inline]
    pub const fn new() -> Self {
        Self {
            blocks: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Allocates a new zero-filled block of `len` bytes.
    pub fn alloc(&mut self, len: usize) -> BlockId {
        match self.free.pop() {
            Some(id) => {
                self.blocks[id.index()] = Some(vec![0; len]);
                id
            }
            None => {
                self.blocks.push(Some(vec![0; len]));
                BlockId::from_index(self.blocks.len() - 1)
            }
        }
    }

    /// Allocates a block holding a copy of `bytes`.
    pub fn alloc_from(&mut self, bytes: &[u8]) -> BlockId {
        let id = self.alloc(0);
        // The block was just allocated, the lookup cannot fail.
        if let Some(Some(block)) = self.blocks.get_mut(id.index()) {
            block.extend_from_slice(bytes);
        }
        id
    }

    /// Releases a block. Its id may be handed out again by [`alloc`](Self::alloc).
    pub fn free(&mut self, id: BlockId) -> Result<(), MemoryError> {
        match self.blocks.get_mut(id.index()) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.free.push(id);
                Ok(())
            }
            _ => Err(MemoryError::InvalidBlock(id.get())),
        }
    }

    /// Returns `true` if `id` refers to a live block.
    #[inline]
    pub fn is_live(&self, id: BlockId) -> bool {
        matches!(self.blocks.get(id.index()), Some(Some(_)))
    }

    /// Returns the number of live blocks.
    ///
    /// Mostly useful to verify that descriptors release what they allocate.
    pub fn live_blocks(&self) -> usize {
        self.blocks.len() - self.free.len()
    }

    /// Returns the length of a block in bytes.
    #[inline]
    pub fn block_len(&self, id: BlockId) -> Result<usize, MemoryError> {
        self.block(id).map(<[u8]>::len)
    }

    /// Grows or shrinks a block, new bytes are zero.
    pub fn resize(&mut self, id: BlockId, len: usize) -> Result<(), MemoryError> {
        self.block_mut(id)?.resize(len, 0);
        Ok(())
    }

    #[inline]
    fn block(&self, id: BlockId) -> Result<&[u8], MemoryError> {
        match self.blocks.get(id.index()) {
            Some(Some(block)) => Ok(block),
            _ => Err(MemoryError::InvalidBlock(id.get())),
        }
    }

    #[inline]
    fn block_mut(&mut self, id: BlockId) -> Result<&mut Vec<u8>, MemoryError> {
        match self.blocks.get_mut(id.index()) {
            Some(Some(block)) => Ok(block),
            _ => Err(MemoryError::InvalidBlock(id.get())),
        }
    }

    #[inline]
    fn range(size: usize, ptr: Ptr, len: usize) -> Result<core::ops::Range<usize>, MemoryError> {
        let start = ptr.offset();
        match start.checked_add(len) {
            Some(end) if end <= size => Ok(start..end),
            _ => Err(MemoryError::OutOfBounds {
                block: ptr.block().get(),
                offset: start,
                len,
                size,
            }),
        }
    }

    /// Returns `len` bytes starting at `ptr`.
    pub fn bytes(&self, ptr: Ptr, len: usize) -> Result<&[u8], MemoryError> {
        let block = self.block(ptr.block())?;
        let range = Self::range(block.len(), ptr, len)?;
        Ok(&block[range])
    }

    /// Returns `len` mutable bytes starting at `ptr`.
    pub fn bytes_mut(&mut self, ptr: Ptr, len: usize) -> Result<&mut [u8], MemoryError> {
        let block = self.block_mut(ptr.block())?;
        let range = Self::range(block.len(), ptr, len)?;
        Ok(&mut block[range])
    }

    /// Reads `N` bytes starting at `ptr`.
    #[inline]
    pub fn read_array<const N: usize>(&self, ptr: Ptr) -> Result<[u8; N], MemoryError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(ptr, N)?);
        Ok(out)
    }

    /// Copies `src` into memory at `ptr`.
    #[inline]
    pub fn write(&mut self, ptr: Ptr, src: &[u8]) -> Result<(), MemoryError> {
        self.bytes_mut(ptr, src.len())?.copy_from_slice(src);
        Ok(())
    }

    /// Sets `len` bytes at `ptr` to `value`.
    #[inline]
    pub fn fill(&mut self, ptr: Ptr, len: usize, value: u8) -> Result<(), MemoryError> {
        self.bytes_mut(ptr, len)?.fill(value);
        Ok(())
    }

    /// Returns `true` if all `len` bytes at `ptr` are zero.
    #[inline]
    pub fn is_zero(&self, ptr: Ptr, len: usize) -> Result<bool, MemoryError> {
        Ok(self.bytes(ptr, len)?.iter().all(|b| *b == 0))
    }

    /// Copies `len` bytes from `src` to `dst`. The ranges may overlap.
    pub fn copy(&mut self, dst: Ptr, src: Ptr, len: usize) -> Result<(), MemoryError> {
        if dst.block() == src.block() {
            let block = self.block_mut(dst.block())?;
            let from = Self::range(block.len(), src, len)?;
            Self::range(block.len(), dst, len)?;
            block.copy_within(from, dst.offset());
            return Ok(());
        }
        let tmp: Vec<u8> = self.bytes(src, len)?.to_vec();
        self.write(dst, &tmp)
    }

    impl_fixed_access! {
        read_u8, write_u8 => u8;
        read_u16, write_u16 => u16;
        read_u32, write_u32 => u32;
        read_u64, write_u64 => u64;
        read_i8, write_i8 => i8;
        read_i16, write_i16 => i16;
        read_i32, write_i32 => i32;
        read_i64, write_i64 => i64;
        read_f32, write_f32 => f32;
        read_f64, write_f64 => f64;
    }

    /// Reads a block slot (a `u32` block id, `0` for none).
    #[inline]
    pub fn read_slot(&self, ptr: Ptr) -> Result<Option<BlockId>, MemoryError> {
        self.read_u32(ptr).map(BlockId::from_slot)
    }

    /// Writes a block slot.
    #[inline]
    pub fn write_slot(&mut self, ptr: Ptr, id: Option<BlockId>) -> Result<(), MemoryError> {
        self.write_u32(ptr, BlockId::to_slot(id))
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::Memory;
    use crate::{MemoryError, Ptr};

    #[test]
    fn alloc_is_zeroed_and_recycled() {
        let mut memory = Memory::new();
        let a = memory.alloc(8);
        assert!(memory.is_zero(Ptr::start(a), 8).unwrap());

        memory.write_u64(Ptr::start(a), u64::MAX).unwrap();
        memory.free(a).unwrap();
        assert!(!memory.is_live(a));
        assert_eq!(memory.free(a), Err(MemoryError::InvalidBlock(a.get())));

        let b = memory.alloc(8);
        assert_eq!(a, b);
        assert!(memory.is_zero(Ptr::start(b), 8).unwrap());
    }

    #[test]
    fn out_of_bounds() {
        let mut memory = Memory::new();
        let a = memory.alloc(4);
        let err = memory.read_u64(Ptr::start(a)).unwrap_err();
        assert_eq!(
            err,
            MemoryError::OutOfBounds {
                block: a.get(),
                offset: 0,
                len: 8,
                size: 4
            }
        );
        assert!(memory.write_u8(Ptr::new(a, 4), 1).is_err());
    }

    #[test]
    fn overlapping_copy() {
        let mut memory = Memory::new();
        let a = memory.alloc_from(&[1, 2, 3, 4, 5]);
        memory.copy(Ptr::new(a, 1), Ptr::start(a), 4).unwrap();
        assert_eq!(memory.bytes(Ptr::start(a), 5).unwrap(), &[1, 1, 2, 3, 4]);
    }

    #[test]
    fn resize_zero_extends() {
        let mut memory = Memory::new();
        let a = memory.alloc_from(&[9, 9]);
        memory.resize(a, 4).unwrap();
        assert_eq!(memory.bytes(Ptr::start(a), 4).unwrap(), &[9, 9, 0, 0]);
        memory.resize(a, 1).unwrap();
        assert_eq!(memory.block_len(a).unwrap(), 1);
    }
}
