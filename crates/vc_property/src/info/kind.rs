use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use crate::info::{EnumDef, Property, StructDef};
use crate::refs::ReferenceMode;

// -----------------------------------------------------------------------------
// NumericKind

/// The fixed-width numeric kinds.
///
/// All numeric values are stored little-endian, zero is their default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
}

impl NumericKind {
    /// Every numeric kind.
    pub const ALL: [Self; 10] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float,
        Self::Double,
    ];

    /// Size in bytes, which is also the alignment.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float => 4,
            Self::Int64 | Self::UInt64 | Self::Double => 8,
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::Float | Self::Double
        )
    }

    /// The tag type id of a plain numeric field of this kind.
    #[inline]
    pub const fn wire_type(self) -> WireType {
        match self {
            Self::Int8 => WireType::Int8,
            Self::Int16 => WireType::Int16,
            Self::Int32 => WireType::Int,
            Self::Int64 => WireType::Int64,
            Self::UInt8 => WireType::Byte,
            Self::UInt16 => WireType::UInt16,
            Self::UInt32 => WireType::UInt32,
            Self::UInt64 => WireType::UInt64,
            Self::Float => WireType::Float,
            Self::Double => WireType::Double,
        }
    }
}

// -----------------------------------------------------------------------------
// BoolLayout

/// Location of a boolean inside its byte.
///
/// Several bit-field booleans may share one byte, each with its own mask.
/// A native `bool` owns the whole byte, both masks are `0xFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoolLayout {
    /// Offset of the byte holding the bit, relative to the value pointer.
    pub byte_offset: u8,
    /// Bits tested and written inside that byte.
    pub byte_mask: u8,
    /// Bits of the whole field, equal to `byte_mask` for one-byte fields.
    pub field_mask: u8,
}

impl BoolLayout {
    /// A native, whole-byte `bool`.
    pub const NATIVE: Self = Self {
        byte_offset: 0,
        byte_mask: 0xFF,
        field_mask: 0xFF,
    };

    /// A single-bit field at `bit` (0..8).
    #[inline]
    pub const fn bit(bit: u8) -> Self {
        let mask = 1u8 << (bit & 7);
        Self {
            byte_offset: 0,
            byte_mask: mask,
            field_mask: mask,
        }
    }

    #[inline]
    pub const fn is_native(&self) -> bool {
        self.field_mask == 0xFF
    }
}

// -----------------------------------------------------------------------------
// EnumBinding

/// Payload of an enum-kind property.
#[derive(Debug, Clone)]
pub struct EnumBinding {
    /// The enumerator table.
    pub def: Arc<EnumDef>,
    /// How the value is stored.
    pub underlying: NumericKind,
    /// Legacy "byte with enum" fields are tagged as `ByteProperty`.
    pub as_byte: bool,
}

// -----------------------------------------------------------------------------
// MapLayout

/// Placement of keys and values inside one map entry.
///
/// The key is at offset `0`, the value at `value_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapLayout {
    pub value_offset: usize,
    pub stride: usize,
}

impl MapLayout {
    fn new(key: &Property, value: &Property) -> Self {
        let value_offset = key.element_size().next_multiple_of(value.align());
        let align = key.align().max(value.align());
        let stride = (value_offset + value.element_size()).next_multiple_of(align);
        Self {
            value_offset,
            stride,
        }
    }
}

// -----------------------------------------------------------------------------
// PropertyKind

/// The closed set of field kinds, each with its payload.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    Bool(BoolLayout),
    Numeric(NumericKind),
    Enum(EnumBinding),
    Name,
    String,
    Reference(ReferenceMode),
    Array(Box<Property>),
    Set(Box<Property>),
    Map {
        key: Box<Property>,
        value: Box<Property>,
        layout: MapLayout,
    },
    Struct(Arc<StructDef>),
    Delegate,
    MulticastDelegate,
}

impl PropertyKind {
    /// Slot size of a string or name: one block id.
    pub const TEXT_SIZE: usize = 4;
    /// Slot size of an array: block id and element count.
    pub const ARRAY_SIZE: usize = 8;
    /// Slot size of a set or map: elements, count, index block and capacity.
    pub const HASHED_SIZE: usize = 16;
    /// Object handle, function name slot and padding.
    pub const DELEGATE_SIZE: usize = 16;

    /// A native `bool`.
    #[inline]
    pub const fn native_bool() -> Self {
        Self::Bool(BoolLayout::NATIVE)
    }

    /// A single-bit `bool` at `bit` of its byte.
    #[inline]
    pub const fn bitfield(bit: u8) -> Self {
        Self::Bool(BoolLayout::bit(bit))
    }

    /// An enum stored as `underlying`.
    #[inline]
    pub fn enumeration(def: Arc<EnumDef>, underlying: NumericKind) -> Self {
        Self::Enum(EnumBinding {
            def,
            underlying,
            as_byte: false,
        })
    }

    /// A legacy byte-sized enum, tagged as `ByteProperty`.
    #[inline]
    pub fn enum_as_byte(def: Arc<EnumDef>) -> Self {
        Self::Enum(EnumBinding {
            def,
            underlying: NumericKind::UInt8,
            as_byte: true,
        })
    }

    /// A dynamic array of `inner`.
    #[inline]
    pub fn array(inner: Property) -> Self {
        Self::Array(Box::new(inner.into_inner()))
    }

    /// A hash set of `element`.
    #[inline]
    pub fn set(element: Property) -> Self {
        Self::Set(Box::new(element.into_inner()))
    }

    /// A hash map from `key` to `value`.
    pub fn map(key: Property, value: Property) -> Self {
        let key = key.into_inner();
        let value = value.into_inner();
        let layout = MapLayout::new(&key, &value);
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
            layout,
        }
    }

    /// Size of one value of this kind.
    pub fn size(&self) -> usize {
        match self {
            Self::Bool(_) => 1,
            Self::Numeric(n) => n.size(),
            Self::Enum(e) => e.underlying.size(),
            Self::Name | Self::String => Self::TEXT_SIZE,
            Self::Reference(mode) => mode.slot_size(),
            Self::Array(_) | Self::MulticastDelegate => Self::ARRAY_SIZE,
            Self::Set(_) | Self::Map { .. } => Self::HASHED_SIZE,
            Self::Struct(def) => def.layout().size(),
            Self::Delegate => Self::DELEGATE_SIZE,
        }
    }

    /// Alignment of one value of this kind.
    pub fn align(&self) -> usize {
        match self {
            Self::Bool(_) => 1,
            Self::Numeric(n) => n.size(),
            Self::Enum(e) => e.underlying.size(),
            Self::Name
            | Self::String
            | Self::Array(_)
            | Self::MulticastDelegate
            | Self::Set(_)
            | Self::Map { .. } => 4,
            Self::Reference(_) | Self::Delegate => 8,
            Self::Struct(def) => def.layout().align(),
        }
    }

    /// The tag type id of this kind.
    pub const fn wire_type(&self) -> WireType {
        match self {
            Self::Bool(_) => WireType::Bool,
            Self::Numeric(n) => n.wire_type(),
            Self::Enum(e) => {
                if e.as_byte {
                    WireType::Byte
                } else {
                    WireType::Enum
                }
            }
            Self::Name => WireType::Name,
            Self::String => WireType::Str,
            Self::Reference(mode) => match mode {
                ReferenceMode::Strong => WireType::Object,
                ReferenceMode::Weak => WireType::WeakObject,
                ReferenceMode::Lazy => WireType::LazyObject,
                ReferenceMode::Soft => WireType::SoftObject,
            },
            Self::Array(_) => WireType::Array,
            Self::Set(_) => WireType::Set,
            Self::Map { .. } => WireType::Map,
            Self::Struct(_) => WireType::Struct,
            Self::Delegate => WireType::Delegate,
            Self::MulticastDelegate => WireType::MulticastDelegate,
        }
    }
}

// -----------------------------------------------------------------------------
// WireType

/// Type ids written into field tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Bool,
    Int8,
    Int16,
    Int,
    Int64,
    Byte,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Enum,
    Name,
    Str,
    Object,
    WeakObject,
    LazyObject,
    SoftObject,
    Array,
    Set,
    Map,
    Struct,
    Delegate,
    MulticastDelegate,
}

impl WireType {
    const TABLE: [(Self, &'static str); 24] = [
        (Self::Bool, "BoolProperty"),
        (Self::Int8, "Int8Property"),
        (Self::Int16, "Int16Property"),
        (Self::Int, "IntProperty"),
        (Self::Int64, "Int64Property"),
        (Self::Byte, "ByteProperty"),
        (Self::UInt16, "UInt16Property"),
        (Self::UInt32, "UInt32Property"),
        (Self::UInt64, "UInt64Property"),
        (Self::Float, "FloatProperty"),
        (Self::Double, "DoubleProperty"),
        (Self::Enum, "EnumProperty"),
        (Self::Name, "NameProperty"),
        (Self::Str, "StrProperty"),
        (Self::Object, "ObjectProperty"),
        (Self::WeakObject, "WeakObjectProperty"),
        (Self::LazyObject, "LazyObjectProperty"),
        (Self::SoftObject, "SoftObjectProperty"),
        (Self::Array, "ArrayProperty"),
        (Self::Set, "SetProperty"),
        (Self::Map, "MapProperty"),
        (Self::Struct, "StructProperty"),
        (Self::Delegate, "DelegateProperty"),
        (Self::MulticastDelegate, "MulticastDelegateProperty"),
    ];

    /// The type id as written on the wire.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        Self::TABLE[self as usize].1
    }

    /// Parses a type id, `None` if unknown.
    pub fn parse(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, s)| *s == name)
            .map(|(ty, _)| *ty)
    }

    /// The numeric kind carried by this type, if any.
    ///
    /// `ByteProperty` is reported as [`NumericKind::UInt8`] even though it
    /// may carry an enumerator name instead.
    pub const fn numeric(self) -> Option<NumericKind> {
        match self {
            Self::Int8 => Some(NumericKind::Int8),
            Self::Int16 => Some(NumericKind::Int16),
            Self::Int => Some(NumericKind::Int32),
            Self::Int64 => Some(NumericKind::Int64),
            Self::Byte => Some(NumericKind::UInt8),
            Self::UInt16 => Some(NumericKind::UInt16),
            Self::UInt32 => Some(NumericKind::UInt32),
            Self::UInt64 => Some(NumericKind::UInt64),
            Self::Float => Some(NumericKind::Float),
            Self::Double => Some(NumericKind::Double),
            _ => None,
        }
    }

    /// The reference mode of an object type id.
    pub const fn reference(self) -> Option<ReferenceMode> {
        match self {
            Self::Object => Some(ReferenceMode::Strong),
            Self::WeakObject => Some(ReferenceMode::Weak),
            Self::LazyObject => Some(ReferenceMode::Lazy),
            Self::SoftObject => Some(ReferenceMode::Soft),
            _ => None,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{NumericKind, WireType};

    #[test]
    fn wire_names_round_trip() {
        for (ty, name) in WireType::TABLE {
            assert_eq!(ty.as_str(), name);
            assert_eq!(WireType::parse(name), Some(ty));
        }
        assert_eq!(WireType::parse("TextProperty"), None);
    }

    #[test]
    fn numeric_wire_types() {
        for kind in NumericKind::ALL {
            assert_eq!(kind.wire_type().numeric(), Some(kind));
        }
    }
}
