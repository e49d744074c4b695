//! Uniform value operations of property descriptors.
//!
//! Every operation takes the address of one element (see
//! [`Property::value_ptr`]) and dispatches on the [`PropertyKind`]:
//!
//! - lifecycle: [`init`], [`destroy`], [`clear`], [`copy`];
//! - comparison: [`identical`], [`value_hash`], [`is_zero`];
//! - numeric access through [`Number`].
//!
//! [`Property::value_ptr`]: crate::info::Property::value_ptr
//! [`PropertyKind`]: crate::info::PropertyKind
//! [`init`]: crate::info::Property::init
//! [`destroy`]: crate::info::Property::destroy
//! [`clear`]: crate::info::Property::clear
//! [`copy`]: crate::info::Property::copy
//! [`identical`]: crate::info::Property::identical
//! [`value_hash`]: crate::info::Property::value_hash
//! [`is_zero`]: crate::info::Property::is_zero

// -----------------------------------------------------------------------------
// Modules

mod compare;
mod lifecycle;
mod numeric;

// -----------------------------------------------------------------------------
// Exports

pub use numeric::Number;

pub(crate) use lifecycle::DELEGATE_NAME;

use vc_ptr::{Memory, Ptr};

use crate::error::SerialError;
use crate::info::BoolLayout;

bitflags::bitflags! {
    /// Options of [`Property::identical`](crate::info::Property::identical).
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct IdenticalFlags: u32 {
        /// Editor-only fields of nested structs are not compared.
        const IGNORE_EDITOR_ONLY = 1 << 0;
    }
}

// -----------------------------------------------------------------------------
// Bool access

/// Reads the boolean described by `layout` at `ptr`.
#[inline]
pub fn read_bool(memory: &Memory, ptr: Ptr, layout: BoolLayout) -> Result<bool, SerialError> {
    let byte = memory.read_u8(ptr.byte_add(layout.byte_offset as usize))?;
    Ok(byte & layout.field_mask != 0)
}

/// Sets or clears the bits described by `layout`, other bits of the byte are
/// kept.
#[inline]
pub fn write_bool(memory: &mut Memory, ptr: Ptr, layout: BoolLayout, value: bool) -> Result<(), SerialError> {
    let at = ptr.byte_add(layout.byte_offset as usize);
    let byte = memory.read_u8(at)?;
    let byte = if value {
        byte | layout.field_mask
    } else {
        byte & !layout.field_mask
    };
    memory.write_u8(at, byte)?;
    Ok(())
}
