//! This crate provides the opaque memory model used by the property system.
//!
//! Property descriptors never know the concrete Rust type of the value they
//! describe, they only know offsets, strides and byte widths. Instead of raw
//! pointers plus manual offset arithmetic, all such memory lives in a
//! [`Memory`] arena and is addressed through small copyable handles.
//!
//! **Memory**
//!
//! [`Memory`] owns zero-initialized byte blocks. Each block is identified by a
//! [`BlockId`], a non-zero `u32`. A block id stored inside another block
//! (a "slot") uses `0` to mean "no block", see [`BlockId::to_slot`].
//!
//! **Ptr**
//!
//! [`Ptr`] is a `(block, offset)` pair, the type-erased equivalent of `&T`.
//! Every access through [`Memory`] is bounds-checked and reports a
//! [`MemoryError`] instead of invoking undefined behavior.
//!
//! **Strided**
//!
//! [`Strided`] describes `count` elements of `stride` bytes starting at a
//! base pointer. Containers expose their elements this way, so callers
//! never assume a concrete element type.
//!
//! # Examples
//!
//! ```
//! use vc_ptr::{Memory, Ptr};
//!
//! let mut memory = Memory::new();
//! let block = memory.alloc(16);
//! let ptr = Ptr::new(block, 4);
//!
//! memory.write_u32(ptr, 0xDEAD_BEEF).unwrap();
//! assert_eq!(memory.read_u32(ptr).unwrap(), 0xDEAD_BEEF);
//! assert_eq!(memory.read_u32(ptr.byte_add(4)).unwrap(), 0);
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod error;
mod memory;
mod ptr;
mod strided;

// -----------------------------------------------------------------------------
// Top-level exports

pub use error::MemoryError;
pub use memory::Memory;
pub use ptr::{BlockId, Ptr};
pub use strided::{Strided, StridedIter};
