use alloc::string::ToString;
use alloc::sync::Arc;

use vc_ptr::Ptr;

use crate::containers::Backing;
use crate::error::SerialError;
use crate::info::{NumericKind, PropertyKind, WireType};
use crate::refs::ReferenceMode;

// -----------------------------------------------------------------------------
// PropertyFlags

bitflags::bitflags! {
    /// Properties of a field kind, derived when the descriptor is built.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u32 {
        /// Values can be copied and compared bytewise.
        const PLAIN_OLD_DATA = 1 << 0;
        /// The all-zero bit pattern is the default value.
        const ZERO_CONSTRUCTIBLE = 1 << 1;
        /// Values own no memory blocks.
        const NO_DESTRUCTOR = 1 << 2;
        /// Field only exists in editor builds.
        const EDITOR_ONLY = 1 << 3;
        /// Values can be hashed, required for set elements and map keys.
        const HAS_TYPE_HASH = 1 << 4;
        /// Containers are backed by a frozen memory image.
        const FROZEN_LAYOUT = 1 << 5;
    }
}

impl PropertyFlags {
    /// Flags a descriptor may set by itself, the rest derive from the kind.
    const USER: Self = Self::EDITOR_ONLY.union(Self::FROZEN_LAYOUT);

    fn of_kind(kind: &PropertyKind) -> Self {
        let scalar = Self::PLAIN_OLD_DATA
            .union(Self::ZERO_CONSTRUCTIBLE)
            .union(Self::NO_DESTRUCTOR)
            .union(Self::HAS_TYPE_HASH);
        match kind {
            PropertyKind::Bool(_) | PropertyKind::Numeric(_) | PropertyKind::Enum(_) => scalar,
            PropertyKind::Name | PropertyKind::String => {
                Self::ZERO_CONSTRUCTIBLE | Self::HAS_TYPE_HASH
            }
            PropertyKind::Reference(ReferenceMode::Soft) => {
                Self::ZERO_CONSTRUCTIBLE | Self::HAS_TYPE_HASH
            }
            PropertyKind::Reference(_) => scalar,
            PropertyKind::Array(_)
            | PropertyKind::Set(_)
            | PropertyKind::Map { .. }
            | PropertyKind::MulticastDelegate
            | PropertyKind::Delegate => Self::ZERO_CONSTRUCTIBLE,
            PropertyKind::Struct(def) => def.layout().flags(),
        }
    }
}

// -----------------------------------------------------------------------------
// Property

/// The runtime descriptor of one field.
///
/// A property knows where its value lives (`offset` from the owning
/// instance), how many values it holds (`array_dim`, static arrays) and how
/// to manipulate, compare and serialize them through its [`PropertyKind`].
///
/// Value operations take the pointer of one element, see
/// [`value_ptr`](Self::value_ptr).
///
/// # Examples
///
/// ```
/// use vc_property::info::{NumericKind, Property, PropertyFlags, PropertyKind};
///
/// let health = Property::new("Health", PropertyKind::Numeric(NumericKind::Int32))
///     .unwrap()
///     .with_array_dim(3);
///
/// assert_eq!(health.element_size(), 4);
/// assert_eq!(health.size(), 12);
/// assert!(health.flags().contains(PropertyFlags::PLAIN_OLD_DATA));
/// ```
#[derive(Debug, Clone)]
pub struct Property {
    name: Arc<str>,
    kind: PropertyKind,
    offset: usize,
    array_dim: usize,
    element_size: usize,
    align: usize,
    flags: PropertyFlags,
}

impl Property {
    /// Creates a descriptor at offset `0` with a single element.
    ///
    /// Fails if a set element or map key cannot be hashed.
    pub fn new(name: &str, kind: PropertyKind) -> Result<Self, SerialError> {
        let unhashable = match &kind {
            PropertyKind::Set(element) => !element.is_hashable(),
            PropertyKind::Map { key, .. } => !key.is_hashable(),
            _ => false,
        };
        if unhashable {
            return Err(SerialError::InvalidLayout {
                name: name.to_string(),
                reason: "set elements and map keys must be hashable",
            });
        }

        Ok(Self {
            name: Arc::from(name),
            element_size: kind.size(),
            align: kind.align(),
            flags: PropertyFlags::of_kind(&kind),
            kind,
            offset: 0,
            array_dim: 1,
        })
    }

    /// A plain numeric field.
    #[inline]
    pub fn numeric(name: &str, kind: NumericKind) -> Self {
        Self::unchecked(name, PropertyKind::Numeric(kind))
    }

    /// A native `bool` field.
    #[inline]
    pub fn boolean(name: &str) -> Self {
        Self::unchecked(name, PropertyKind::native_bool())
    }

    /// Builds a descriptor of a kind that needs no validation.
    pub(crate) fn unchecked(name: &str, kind: PropertyKind) -> Self {
        Self {
            name: Arc::from(name),
            element_size: kind.size(),
            align: kind.align(),
            flags: PropertyFlags::of_kind(&kind),
            kind,
            offset: 0,
            array_dim: 1,
        }
    }

    /// Places the field at `offset` inside its owner.
    #[inline]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Makes the field a static array of `dim` elements.
    #[inline]
    pub fn with_array_dim(mut self, dim: usize) -> Self {
        self.array_dim = dim.max(1);
        self
    }

    /// Marks the field as editor-only.
    #[inline]
    pub fn editor_only(mut self) -> Self {
        self.flags |= PropertyFlags::EDITOR_ONLY;
        self
    }

    /// Backs the containers of this field by a frozen memory image.
    #[inline]
    pub fn frozen(mut self) -> Self {
        self.flags |= PropertyFlags::FROZEN_LAYOUT;
        self
    }

    /// Normalizes a descriptor used as a container element.
    pub(crate) fn into_inner(mut self) -> Self {
        self.offset = 0;
        self.array_dim = 1;
        self.flags &= !PropertyFlags::USER;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn array_dim(&self) -> usize {
        self.array_dim
    }

    /// Size of one element.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Size of the whole field, `array_dim * element_size`.
    #[inline]
    pub fn size(&self) -> usize {
        self.array_dim * self.element_size
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    #[inline]
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    #[inline]
    pub fn is_editor_only(&self) -> bool {
        self.flags.contains(PropertyFlags::EDITOR_ONLY)
    }

    #[inline]
    pub fn is_hashable(&self) -> bool {
        self.flags.contains(PropertyFlags::HAS_TYPE_HASH)
    }

    #[inline]
    pub fn is_pod(&self) -> bool {
        self.flags.contains(PropertyFlags::PLAIN_OLD_DATA)
    }

    /// The tag type id of this field.
    #[inline]
    pub fn wire_type(&self) -> WireType {
        self.kind.wire_type()
    }

    /// Container backing selected by [`PropertyFlags::FROZEN_LAYOUT`].
    #[inline]
    pub(crate) fn backing(&self) -> Backing {
        if self.flags.contains(PropertyFlags::FROZEN_LAYOUT) {
            Backing::Image
        } else {
            Backing::Heap
        }
    }

    /// Address of element `index` of this field inside the instance at `base`.
    #[inline]
    pub fn value_ptr(&self, base: Ptr, index: usize) -> Ptr {
        base.byte_add(self.offset + index * self.element_size)
    }

    /// Byte range touched by this field, relative to its owner.
    pub(crate) fn span(&self) -> (usize, usize) {
        match &self.kind {
            PropertyKind::Bool(layout) => {
                let start = self.offset + layout.byte_offset as usize;
                (start, start + 1)
            }
            _ => (self.offset, self.offset + self.size()),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::{Property, PropertyFlags};
    use crate::error::SerialError;
    use crate::info::{EnumDef, NumericKind, PropertyKind};
    use crate::refs::ReferenceMode;

    #[test]
    fn derived_flags() {
        let string = Property::new("Title", PropertyKind::String).unwrap();
        assert!(!string.is_pod());
        assert!(string.is_hashable());
        assert!(!string.flags().contains(PropertyFlags::NO_DESTRUCTOR));

        let weak = Property::new("Owner", PropertyKind::Reference(ReferenceMode::Weak)).unwrap();
        assert!(weak.flags().contains(PropertyFlags::NO_DESTRUCTOR));
        assert_eq!(weak.element_size(), 8);

        let def = Arc::new(EnumDef::new("EMode", [("A", 0), ("B", 1)]));
        let mode = Property::new("Mode", PropertyKind::enum_as_byte(def)).unwrap();
        assert_eq!(mode.element_size(), 1);
        assert!(mode.is_pod());
    }

    #[test]
    fn unhashable_set_element() {
        let inner = Property::new("", PropertyKind::array(Property::boolean(""))).unwrap();
        let err = Property::new("Bad", PropertyKind::set(inner)).unwrap_err();
        assert!(matches!(err, SerialError::InvalidLayout { .. }));

        let key = Property::numeric("", NumericKind::Int32);
        let value = Property::new("", PropertyKind::String).unwrap();
        let map = Property::new("Good", PropertyKind::map(key, value)).unwrap();
        assert_eq!(map.element_size(), 16);
    }

    #[test]
    fn inner_descriptors_are_normalized() {
        let inner = Property::numeric("Item", NumericKind::Int16)
            .with_offset(12)
            .with_array_dim(4)
            .editor_only();
        let array = PropertyKind::array(inner);
        let PropertyKind::Array(inner) = array else {
            unreachable!()
        };
        assert_eq!(inner.offset(), 0);
        assert_eq!(inner.array_dim(), 1);
        assert!(!inner.is_editor_only());
    }
}
