use alloc::string::{String, ToString};

use vc_ptr::{Memory, Ptr};

use crate::archive::{Archive, ArchiveExt};
use crate::error::SerialError;
use crate::info::{Guid, Property, PropertyKind, WireType, text};
use crate::ops::read_bool;

// -----------------------------------------------------------------------------
// TagExtras

/// Type-specific data following the fixed part of a [`FieldTag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagExtras {
    None,
    /// Struct name and guid.
    Struct { name: String, guid: Guid },
    /// The boolean value itself, the payload is empty.
    Bool(bool),
    /// Enum name of a `ByteProperty` (`None` for a plain byte) or of an
    /// `EnumProperty`.
    Enum(String),
    /// Element type of an array or set.
    Inner(WireType),
    Map { key: WireType, value: WireType },
}

// -----------------------------------------------------------------------------
// FieldTag

/// The self-describing header of one field in the tagged format.
///
/// Layout: name, type id, `i32` payload size, `i32` static array index,
/// then the [`TagExtras`] of the type. The payload follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTag {
    pub name: String,
    pub ty: WireType,
    /// Payload size in bytes.
    pub size: i32,
    pub array_index: i32,
    pub extras: TagExtras,
}

impl FieldTag {
    /// Describes element `array_index` of `property`, whose value is at
    /// `ptr`. The size is filled in after the payload is written.
    pub fn for_property(
        property: &Property,
        array_index: usize,
        memory: &Memory,
        ptr: Ptr,
    ) -> Result<Self, SerialError> {
        let extras = match property.kind() {
            PropertyKind::Bool(layout) => TagExtras::Bool(read_bool(memory, ptr, *layout)?),
            PropertyKind::Numeric(_) if property.wire_type() == WireType::Byte => {
                TagExtras::Enum(text::NONE.to_string())
            }
            PropertyKind::Enum(binding) => TagExtras::Enum(binding.def.name().to_string()),
            PropertyKind::Struct(def) => TagExtras::Struct {
                name: def.name().to_string(),
                guid: def.guid(),
            },
            PropertyKind::Array(inner) | PropertyKind::Set(inner) => TagExtras::Inner(inner.wire_type()),
            PropertyKind::Map { key, value, .. } => TagExtras::Map {
                key: key.wire_type(),
                value: value.wire_type(),
            },
            _ => TagExtras::None,
        };
        let array_index = i32::try_from(array_index).map_err(|_| SerialError::IndexOutOfRange {
            index: array_index,
            len: property.array_dim(),
        })?;
        Ok(Self {
            name: property.name().to_string(),
            ty: property.wire_type(),
            size: 0,
            array_index,
            extras,
        })
    }

    /// The tag of an element of a container whose tag declared `ty` as
    /// element type.
    pub fn element(ty: WireType) -> Self {
        let extras = match ty {
            WireType::Byte => TagExtras::Enum(text::NONE.to_string()),
            _ => TagExtras::None,
        };
        Self {
            name: String::new(),
            ty,
            size: -1,
            array_index: 0,
            extras,
        }
    }

    /// The enum name carried by a byte or enum tag, `None` for plain bytes.
    pub fn enum_name(&self) -> Option<&str> {
        match &self.extras {
            TagExtras::Enum(name) if !name.is_empty() && !text::is_none(name) => Some(name),
            _ => None,
        }
    }

    /// The value of a boolean tag.
    #[inline]
    pub fn bool_value(&self) -> Option<bool> {
        match self.extras {
            TagExtras::Bool(value) => Some(value),
            _ => None,
        }
    }

    /// Writes the tag with a zero size. Returns the position of the size
    /// field for backpatching.
    pub fn write(&self, archive: &mut dyn Archive) -> Result<u64, SerialError> {
        archive.write_string(&self.name)?;
        archive.write_string(self.ty.as_str())?;
        let size_at = archive.tell();
        archive.write_i32(self.size)?;
        archive.write_i32(self.array_index)?;
        match &self.extras {
            TagExtras::None => {}
            TagExtras::Struct { name, guid } => {
                archive.write_string(name)?;
                archive.write_guid(*guid)?;
            }
            TagExtras::Bool(value) => archive.write_u8(*value as u8)?,
            TagExtras::Enum(name) => archive.write_string(name)?,
            TagExtras::Inner(inner) => archive.write_string(inner.as_str())?,
            TagExtras::Map { key, value } => {
                archive.write_string(key.as_str())?;
                archive.write_string(value.as_str())?;
            }
        }
        Ok(size_at)
    }

    /// Reads the next tag, `None` at the end of a struct.
    ///
    /// An empty name or `None` terminates the field list.
    pub fn read(archive: &mut dyn Archive) -> Result<Option<Self>, SerialError> {
        let name = archive.read_string()?;
        if name.is_empty() || text::is_none(&name) {
            return Ok(None);
        }
        let ty = read_wire_type(archive)?;
        let offset = archive.tell();
        let size = archive.read_i32()?;
        if size < 0 {
            return Err(SerialError::InvalidLength {
                offset,
                len: size.into(),
            });
        }
        let array_index = archive.read_i32()?;
        let extras = match ty {
            WireType::Struct => TagExtras::Struct {
                name: archive.read_string()?,
                guid: archive.read_guid()?,
            },
            WireType::Bool => TagExtras::Bool(archive.read_u8()? != 0),
            WireType::Byte | WireType::Enum => TagExtras::Enum(archive.read_string()?),
            WireType::Array | WireType::Set => TagExtras::Inner(read_wire_type(archive)?),
            WireType::Map => TagExtras::Map {
                key: read_wire_type(archive)?,
                value: read_wire_type(archive)?,
            },
            _ => TagExtras::None,
        };
        Ok(Some(Self {
            name,
            ty,
            size,
            array_index,
            extras,
        }))
    }

    /// Returns `true` if the payload can be read by the generic path of
    /// `property`, without conversion.
    pub fn matches(&self, property: &Property) -> bool {
        if self.ty != property.wire_type() {
            return false;
        }
        match (property.kind(), &self.extras) {
            (PropertyKind::Numeric(_), _) => self.enum_name().is_none(),
            (PropertyKind::Enum(binding), _) if binding.as_byte => self.enum_name().is_some(),
            (PropertyKind::Struct(def), TagExtras::Struct { name, .. }) => name.eq_ignore_ascii_case(def.name()),
            (PropertyKind::Array(inner) | PropertyKind::Set(inner), TagExtras::Inner(ty)) => *ty == inner.wire_type(),
            (PropertyKind::Map { key, value, .. }, TagExtras::Map { key: k, value: v }) => {
                *k == key.wire_type() && *v == value.wire_type()
            }
            (PropertyKind::Struct(_) | PropertyKind::Array(_) | PropertyKind::Set(_) | PropertyKind::Map { .. }, _) => {
                false
            }
            _ => true,
        }
    }
}

fn read_wire_type(archive: &mut dyn Archive) -> Result<WireType, SerialError> {
    let offset = archive.tell();
    let name = archive.read_string()?;
    WireType::parse(&name).ok_or(SerialError::UnknownWireType { offset, name })
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::sync::Arc;

    use vc_ptr::{Memory, Ptr};

    use super::{FieldTag, TagExtras};
    use crate::archive::{ArchiveExt, ArchiveReader, ArchiveWriter};
    use crate::error::SerialError;
    use crate::info::{EnumDef, NumericKind, Property, PropertyKind, WireType};

    #[test]
    fn map_tag_round_trip() {
        let map = Property::new(
            "Prices",
            PropertyKind::map(
                Property::new("", PropertyKind::Name).unwrap(),
                Property::numeric("", NumericKind::Float),
            ),
        )
        .unwrap();
        let mut memory = Memory::new();
        let ptr = Ptr::start(memory.alloc(16));
        let tag = FieldTag::for_property(&map, 0, &memory, ptr).unwrap();

        let mut writer = ArchiveWriter::new();
        let size_at = tag.write(&mut writer).unwrap();
        assert_eq!(size_at, 4 + 7 + 4 + "MapProperty".len() as u64 + 1);

        let bytes = writer.into_inner();
        let mut reader = ArchiveReader::new(&bytes);
        let read = FieldTag::read(&mut reader).unwrap().unwrap();
        assert_eq!(read, tag);
        assert_eq!(read.extras, TagExtras::Map {
            key: WireType::Name,
            value: WireType::Float,
        });
        assert!(read.matches(&map));
    }

    #[test]
    fn byte_tags_distinguish_enums() {
        let def = Arc::new(EnumDef::new("EColor", [("Red", 0), ("Blue", 1)]));
        let plain = Property::numeric("Level", NumericKind::UInt8);
        let color = Property::new("Color", PropertyKind::enum_as_byte(def)).unwrap();
        let mut memory = Memory::new();
        let ptr = Ptr::start(memory.alloc(1));

        let plain_tag = FieldTag::for_property(&plain, 0, &memory, ptr).unwrap();
        let color_tag = FieldTag::for_property(&color, 0, &memory, ptr).unwrap();
        assert_eq!(plain_tag.enum_name(), None);
        assert_eq!(color_tag.enum_name(), Some("EColor"));

        assert!(plain_tag.matches(&plain));
        assert!(!plain_tag.matches(&color));
        assert!(color_tag.matches(&color));
        assert!(!color_tag.matches(&plain));
    }

    #[test]
    fn terminators_and_unknown_types() {
        let mut writer = ArchiveWriter::new();
        writer.write_string("None").unwrap();
        writer.write_string("").unwrap();
        writer.write_string("Health").unwrap();
        writer.write_string("TextProperty").unwrap();
        let bytes = writer.into_inner();

        let mut reader = ArchiveReader::new(&bytes);
        assert_eq!(FieldTag::read(&mut reader).unwrap(), None);
        assert_eq!(FieldTag::read(&mut reader).unwrap(), None);
        let err = FieldTag::read(&mut reader).unwrap_err();
        assert_eq!(err, SerialError::UnknownWireType {
            offset: 9 + 4 + 11,
            name: "TextProperty".to_string(),
        });
    }
}
