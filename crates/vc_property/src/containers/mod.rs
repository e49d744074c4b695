//! Type-erased views over container slots.
//!
//! A view is a short-lived, non-owning handle: the descriptor(s) of the
//! elements, the address of the container slot and the [`Backing`] of the
//! element storage. All element addresses are returned as [`Ptr`]s computed
//! from the element stride, the element type is only known to the
//! descriptor.
//!
//! - [`ArrayView`]: `[block u32][count u32]`, elements stored densely.
//! - [`SetView`] and [`MapView`], both built on [`HashedView`]:
//!   `[elements u32][count u32][index u32][index capacity u32]`, a dense
//!   element block plus an open-addressed index.
//!
//! [`Ptr`]: vc_ptr::Ptr

// -----------------------------------------------------------------------------
// Modules

mod array;
mod hashed;

// -----------------------------------------------------------------------------
// Exports

pub use array::ArrayView;
pub use hashed::{HashedView, MapView, SetView};

use vc_ptr::{BlockId, Memory, Ptr};

use crate::error::SerialError;

// -----------------------------------------------------------------------------
// Backing

/// Storage representation of a container, fixed for the life of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backing {
    /// Growable blocks owned by the slot.
    Heap,
    /// Blocks of a frozen memory image, read-only and not owned.
    Image,
}

impl Backing {
    #[inline]
    pub(crate) fn check_mutable(self) -> Result<(), SerialError> {
        match self {
            Self::Heap => Ok(()),
            Self::Image => Err(SerialError::FrozenContainer),
        }
    }

    #[inline]
    pub const fn is_frozen(self) -> bool {
        matches!(self, Self::Image)
    }
}

// -----------------------------------------------------------------------------
// Element storage

/// Number of `stride`-sized elements a block can hold.
fn capacity(memory: &Memory, block: Option<BlockId>, stride: usize) -> Result<usize, SerialError> {
    match block {
        None => Ok(0),
        Some(_) if stride == 0 => Ok(usize::MAX),
        Some(block) => Ok(memory.block_len(block)? / stride),
    }
}

/// Makes room for `needed` elements in the block stored at `slot`, growing
/// geometrically. New bytes are zero.
fn reserve(memory: &mut Memory, slot: Ptr, stride: usize, needed: usize) -> Result<BlockId, SerialError> {
    let block = memory.read_slot(slot)?;
    let have = capacity(memory, block, stride)?;
    match block {
        Some(block) if have >= needed => Ok(block),
        Some(block) => {
            let grown = needed.max(have.saturating_mul(2)).max(4);
            memory.resize(block, grown * stride)?;
            Ok(block)
        }
        None => {
            let block = memory.alloc(needed.max(4) * stride);
            memory.write_slot(slot, Some(block))?;
            Ok(block)
        }
    }
}
