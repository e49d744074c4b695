use thiserror::Error;

// -----------------------------------------------------------------------------
// MemoryError

/// Error returned by checked accesses into a [`Memory`](crate::Memory).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MemoryError {
    #[error("block {0} does not exist or was already freed")]
    InvalidBlock(u32),

    #[error("access of {len} bytes at offset {offset} exceeds block {block} of {size} bytes")]
    OutOfBounds {
        block: u32,
        offset: usize,
        len: usize,
        size: usize,
    },
}
