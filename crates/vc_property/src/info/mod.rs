//! Runtime type descriptions supplied by the reflection source.
//!
//! - [`Property`]: one field of a composite type, its [`PropertyKind`],
//!   offset, static array dimension and [`PropertyFlags`].
//! - [`StructDef`]: a composite type, its [`StructLayout`] and cached schemas.
//! - [`EnumDef`]: the enumerator table behind enum-kind properties.
//! - [`text`]: helpers for string and name slots.

// -----------------------------------------------------------------------------
// Modules

mod enum_def;
mod guid;
mod kind;
mod property;
mod struct_def;

pub mod text;

// -----------------------------------------------------------------------------
// Exports

pub use enum_def::EnumDef;
pub use guid::Guid;
pub use kind::{BoolLayout, EnumBinding, MapLayout, NumericKind, PropertyKind, WireType};
pub use property::{Property, PropertyFlags};
pub use struct_def::{StructDef, StructLayout, StructLayoutBuilder};
