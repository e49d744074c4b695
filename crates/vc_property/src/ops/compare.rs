use core::hash::Hasher;

use vc_ptr::{Memory, Ptr};

use super::lifecycle::DELEGATE_NAME;
use super::{IdenticalFlags, Number, read_bool};
use crate::config::SerialConfig;
use crate::containers::{MapView, SetView};
use crate::error::SerialError;
use crate::hash::{combine, new_hasher};
use crate::info::{Property, PropertyFlags, PropertyKind, text};
use crate::refs::{ReferenceMode, get_identity, lazy_guid};

impl Property {
    /// Compares two values of this property.
    pub fn identical(&self, memory: &Memory, a: Ptr, b: Ptr, flags: IdenticalFlags) -> Result<bool, SerialError> {
        if a == b {
            return Ok(true);
        }
        match self.kind() {
            PropertyKind::Bool(layout) => Ok(read_bool(memory, a, *layout)? == read_bool(memory, b, *layout)?),
            PropertyKind::Numeric(_) | PropertyKind::Enum(_) => {
                let len = self.element_size();
                Ok(memory.bytes(a, len)? == memory.bytes(b, len)?)
            }
            PropertyKind::Name => text::eq(memory, a, b, true),
            PropertyKind::String => text::eq(memory, a, b, false),
            PropertyKind::Reference(ReferenceMode::Lazy) => Ok(lazy_guid(memory, a)? == lazy_guid(memory, b)?),
            PropertyKind::Reference(ReferenceMode::Soft) => text::eq(memory, a, b, false),
            PropertyKind::Reference(mode) => Ok(get_identity(memory, *mode, a)? == get_identity(memory, *mode, b)?),
            PropertyKind::Delegate => Ok(memory.read_u64(a)? == memory.read_u64(b)?
                && text::eq(memory, a.byte_add(DELEGATE_NAME), b.byte_add(DELEGATE_NAME), true)?),
            PropertyKind::Array(_) | PropertyKind::MulticastDelegate => self.with_array(a, |left| {
                self.with_array(b, |right| {
                    let (xs, ys) = (left.elements(memory)?, right.elements(memory)?);
                    if xs.len() != ys.len() {
                        return Ok(false);
                    }
                    for (x, y) in xs.iter().zip(ys) {
                        if !left.inner().identical(memory, x, y, flags)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                })
            }),
            PropertyKind::Set(element) => {
                let left = SetView::new(element, a, self.backing());
                let right = SetView::new(element, b, self.backing());
                if left.len(memory)? != right.len(memory)? {
                    return Ok(false);
                }
                for ptr in left.elements(memory)? {
                    if !right.contains(memory, ptr)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            PropertyKind::Map { key, value, layout } => {
                let left = MapView::new(key, value, *layout, a, self.backing());
                let right = MapView::new(key, value, *layout, b, self.backing());
                if left.len(memory)? != right.len(memory)? {
                    return Ok(false);
                }
                for index in 0..left.len(memory)? {
                    let k = left.key_ptr(memory, index)?;
                    let Some(other) = right.find_value(memory, k)? else {
                        return Ok(false);
                    };
                    if !value.identical(memory, left.value_ptr(memory, index)?, other, flags)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            PropertyKind::Struct(def) => {
                let layout = def.layout();
                for field in layout.properties() {
                    if flags.contains(IdenticalFlags::IGNORE_EDITOR_ONLY) && field.is_editor_only() {
                        continue;
                    }
                    for index in 0..field.array_dim() {
                        if !field.identical(memory, field.value_ptr(a, index), field.value_ptr(b, index), flags)? {
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            }
        }
    }

    /// Hashes a value, `None` if the kind is not hashable.
    ///
    /// The hash is stable across runs: names hash case-insensitively and
    /// `-0.0` hashes like `0.0`.
    pub fn value_hash(&self, memory: &Memory, ptr: Ptr) -> Result<Option<u64>, SerialError> {
        if !self.flags().contains(PropertyFlags::HAS_TYPE_HASH) {
            return Ok(None);
        }
        let mut hasher = new_hasher();
        match self.kind() {
            PropertyKind::Bool(layout) => hasher.write_u8(read_bool(memory, ptr, *layout)? as u8),
            PropertyKind::Numeric(kind) => match Number::read(memory, ptr, *kind)? {
                Number::Float(v) if v == 0.0 => hasher.write_u64(0),
                Number::Float(v) => hasher.write_u64(v.to_bits()),
                number => hasher.write_i64(number.as_i64()),
            },
            PropertyKind::Enum(binding) => {
                hasher.write_i64(Number::read(memory, ptr, binding.underlying)?.as_i64());
            }
            PropertyKind::Name => {
                for byte in text::read(memory, ptr)?.bytes() {
                    hasher.write_u8(byte.to_ascii_lowercase());
                }
            }
            PropertyKind::String | PropertyKind::Reference(ReferenceMode::Soft) => {
                hasher.write(text::read(memory, ptr)?.as_bytes());
            }
            PropertyKind::Reference(ReferenceMode::Lazy) => hasher.write(&lazy_guid(memory, ptr)?.to_bytes()),
            PropertyKind::Reference(mode) => hasher.write_u64(get_identity(memory, *mode, ptr)?.get()),
            PropertyKind::Struct(def) => {
                let layout = def.layout();
                let mut hash = 0;
                for field in layout.properties() {
                    for index in 0..field.array_dim() {
                        let field_hash = field.value_hash(memory, field.value_ptr(ptr, index))?;
                        hash = combine(hash, field_hash.unwrap_or_default());
                    }
                }
                return Ok(Some(hash));
            }
            _ => return Ok(None),
        }
        Ok(Some(hasher.finish()))
    }

    /// Returns `true` if the value may be sent as "zero" by the unversioned
    /// codec and restored by [`clear`](Self::clear).
    ///
    /// Only booleans and kinds without owned blocks qualify, and only if they
    /// fit in [`SerialConfig::fast_zero_byte_limit`].
    pub fn is_zero(&self, config: &SerialConfig, memory: &Memory, ptr: Ptr) -> Result<bool, SerialError> {
        match self.kind() {
            PropertyKind::Bool(layout) => Ok(!read_bool(memory, ptr, *layout)?),
            _ if !self.flags().contains(PropertyFlags::NO_DESTRUCTOR) => Ok(false),
            _ if self.element_size() > config.fast_zero_byte_limit() => Ok(false),
            _ => Ok(memory.is_zero(ptr, self.element_size())?),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use vc_ptr::{Memory, Ptr};

    use crate::config::SerialConfig;
    use crate::info::{NumericKind, Property, PropertyKind, StructDef, StructLayout, text};
    use crate::ops::IdenticalFlags;

    #[test]
    fn float_zero_hashes_consistently() {
        let prop = Property::numeric("", NumericKind::Double);
        let mut memory = Memory::new();
        let block = memory.alloc(16);
        let (a, b) = (Ptr::start(block), Ptr::new(block, 8));
        memory.write_f64(a, 0.0).unwrap();
        memory.write_f64(b, -0.0).unwrap();

        assert_eq!(prop.value_hash(&memory, a).unwrap(), prop.value_hash(&memory, b).unwrap());
        // Bitwise comparison keeps the sign.
        assert!(!prop.identical(&memory, a, b, IdenticalFlags::empty()).unwrap());
    }

    #[test]
    fn editor_only_fields_can_be_ignored() {
        let layout = StructLayout::builder("FNote")
            .field(Property::numeric("Value", NumericKind::Int32))
            .field(Property::new("Comment", PropertyKind::String).unwrap().editor_only())
            .build()
            .unwrap();
        let note = Property::new("Note", PropertyKind::Struct(StructDef::new("FNote", layout))).unwrap();
        let size = note.element_size();

        let mut memory = Memory::new();
        let block = memory.alloc(2 * size);
        let (a, b) = (Ptr::start(block), Ptr::new(block, size));
        text::write(&mut memory, a.byte_add(4), "first draft").unwrap();

        assert!(!note.identical(&memory, a, b, IdenticalFlags::empty()).unwrap());
        assert!(note.identical(&memory, a, b, IdenticalFlags::IGNORE_EDITOR_ONLY).unwrap());
        assert!(note.value_hash(&memory, a).unwrap().is_some());
    }

    #[test]
    fn zero_check_is_bounded() {
        let config = SerialConfig {
            fast_zero_word_limit: 1,
            ..SerialConfig::DEFAULT
        };
        let small = Property::numeric("", NumericKind::Int64);
        let large = Property::numeric("", NumericKind::Int8).with_array_dim(64);
        let string = Property::new("", PropertyKind::String).unwrap();
        let mut memory = Memory::new();
        let ptr = Ptr::start(memory.alloc(64));

        assert!(small.is_zero(&config, &memory, ptr).unwrap());
        assert!(string.is_zero(&config, &memory, ptr).is_ok_and(|zero| !zero));
        // Element size decides, static arrays are checked per element.
        assert!(large.is_zero(&config, &memory, ptr).unwrap());
    }
}
