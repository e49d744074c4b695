use alloc::string::{String, ToString};

use vc_ptr::{Memory, Ptr};

use super::ConvertResult;
use crate::archive::{Archive, ArchiveExt};
use crate::codec::{FieldTag, SerialContext, TagExtras, read_count, resolve_enumerator};
use crate::containers::{ArrayView, HashedView, MapView, SetView};
use crate::error::{Diagnostic, SerialError};
use crate::info::{Property, PropertyKind, StructDef, WireType, text};
use crate::ops::{Number, write_bool};
use crate::refs::{ObjectHandle, ReferenceMode, set_identity};

/// A scalar payload read from a legacy tag.
enum Legacy {
    Number(Number),
    Enumerator(String),
}

impl Property {
    /// Loads the payload of a tag that does not match this property into
    /// the element at `dst`.
    ///
    /// Registered converters for the `(tag type, property type)` pair run
    /// first. The caller seeks past the payload afterwards, whatever the
    /// result.
    pub fn convert_from_legacy(
        &self,
        cx: &mut SerialContext<'_>,
        tag: &FieldTag,
        archive: &mut dyn Archive,
        memory: &mut Memory,
        dst: Ptr,
    ) -> Result<ConvertResult, SerialError> {
        if let Some(converter) = cx.conversions().and_then(|r| r.converter(tag.ty, self.wire_type())) {
            return converter.convert(cx, tag, archive, memory, self, dst);
        }

        match self.kind() {
            PropertyKind::Bool(_) | PropertyKind::Numeric(_) | PropertyKind::Enum(_) => {
                self.convert_scalar(cx, tag, archive, memory, dst)
            }
            PropertyKind::Name if tag.ty == WireType::Str => {
                let value = archive.read_string()?;
                text::write_name(memory, dst, &value)?;
                Ok(ConvertResult::Converted)
            }
            PropertyKind::String if tag.ty == WireType::Name => {
                let value = archive.read_string()?;
                text::write(memory, dst, if text::is_none(&value) { "" } else { &value })?;
                Ok(ConvertResult::Converted)
            }
            PropertyKind::Reference(to @ (ReferenceMode::Strong | ReferenceMode::Weak)) => {
                match tag.ty.reference() {
                    Some(from @ (ReferenceMode::Strong | ReferenceMode::Weak)) => {
                        let mut handle = ObjectHandle::NULL;
                        archive.serialize_object(from, &mut handle)?;
                        set_identity(memory, *to, dst, handle)?;
                        Ok(ConvertResult::Converted)
                    }
                    _ => Ok(ConvertResult::CannotConvert),
                }
            }
            PropertyKind::Array(inner) => match &tag.extras {
                TagExtras::Inner(from) if tag.ty == WireType::Array => {
                    let array = ArrayView::new(inner, dst, self.backing());
                    convert_array(cx, &array, *from, archive, memory)
                }
                _ => Ok(ConvertResult::CannotConvert),
            },
            PropertyKind::Set(element) => match &tag.extras {
                TagExtras::Inner(from) if tag.ty == WireType::Set => {
                    let set = *SetView::new(element, dst, self.backing());
                    convert_hashed(cx, &set, (*from, None), archive, memory)
                }
                _ => Ok(ConvertResult::CannotConvert),
            },
            PropertyKind::Map { key, value, layout } => match &tag.extras {
                TagExtras::Map { key: from_key, value: from_value } => {
                    let map = *MapView::new(key, value, *layout, dst, self.backing());
                    convert_hashed(cx, &map, (*from_key, Some(*from_value)), archive, memory)
                }
                _ => Ok(ConvertResult::CannotConvert),
            },
            PropertyKind::Struct(def) => Ok(convert_struct(cx, tag, def)),
            _ => Ok(ConvertResult::CannotConvert),
        }
    }

    fn convert_scalar(
        &self,
        cx: &mut SerialContext<'_>,
        tag: &FieldTag,
        archive: &mut dyn Archive,
        memory: &mut Memory,
        dst: Ptr,
    ) -> Result<ConvertResult, SerialError> {
        let Some(legacy) = read_scalar(tag, archive)? else {
            return Ok(ConvertResult::CannotConvert);
        };
        match (self.kind(), legacy) {
            (PropertyKind::Bool(layout), Legacy::Number(number)) => {
                write_bool(memory, dst, *layout, !number.is_zero())?;
            }
            (PropertyKind::Numeric(kind), Legacy::Number(number)) => {
                let exact = number.write(memory, dst, *kind)?;
                if !exact {
                    self.report_lossy(cx, tag);
                }
            }
            (PropertyKind::Numeric(kind), Legacy::Enumerator(name)) => {
                let def = tag
                    .enum_name()
                    .and_then(|enum_name| cx.conversions()?.find_enum(enum_name));
                let Some(def) = def else {
                    return Ok(ConvertResult::CannotConvert);
                };
                let value = resolve_enumerator(cx, def, &name);
                if !Number::Int(value).write(memory, dst, *kind)? {
                    self.report_lossy(cx, tag);
                }
            }
            (PropertyKind::Enum(binding), Legacy::Enumerator(name)) => {
                let value = resolve_enumerator(cx, &binding.def, &name);
                Number::Int(value).write(memory, dst, binding.underlying)?;
            }
            (PropertyKind::Enum(binding), Legacy::Number(number)) => {
                let def = &binding.def;
                let mut value = number.as_i64();
                if !def.contains_value(value) {
                    let sentinel = def.max_value();
                    cx.report(Diagnostic::UnknownEnumValue {
                        field: cx.field_path(),
                        enum_name: def.name().to_string(),
                        value,
                        sentinel,
                    });
                    value = sentinel;
                }
                Number::Int(value).write(memory, dst, binding.underlying)?;
            }
            _ => return Ok(ConvertResult::CannotConvert),
        }
        Ok(ConvertResult::Converted)
    }

    fn report_lossy(&self, cx: &mut SerialContext<'_>, tag: &FieldTag) {
        cx.report(Diagnostic::LossyConversion {
            field: cx.field_path(),
            from: tag.ty.to_string(),
            to: self.wire_type().to_string(),
        });
    }
}

/// Reads a boolean, numeric or enumerator payload, `None` for other types.
///
/// Tags of container elements carry no boolean value, the byte is read from
/// the payload instead.
fn read_scalar(tag: &FieldTag, archive: &mut dyn Archive) -> Result<Option<Legacy>, SerialError> {
    if let Some(value) = tag.bool_value() {
        return Ok(Some(Legacy::Number(Number::UInt(value.into()))));
    }
    let legacy = match tag.ty {
        WireType::Bool => Legacy::Number(Number::UInt((archive.read_u8()? != 0).into())),
        WireType::Enum => Legacy::Enumerator(archive.read_string()?),
        WireType::Byte if tag.enum_name().is_some() => Legacy::Enumerator(archive.read_string()?),
        ty => match ty.numeric() {
            Some(kind) => Legacy::Number(Number::load(archive, kind)?),
            None => return Ok(None),
        },
    };
    Ok(Some(legacy))
}

/// Renamed structs load through the generic path, anything else is dropped.
fn convert_struct(cx: &SerialContext<'_>, tag: &FieldTag, def: &StructDef) -> ConvertResult {
    let TagExtras::Struct { name, guid } = &tag.extras else {
        return ConvertResult::CannotConvert;
    };
    let renamed = cx
        .conversions()
        .and_then(|registry| registry.struct_rename(name))
        .is_some_and(|new| new.eq_ignore_ascii_case(def.name()));
    let same_guid = !guid.is_zero() && *guid == def.guid();
    if renamed || same_guid {
        log::debug!("loading struct `{name}` as `{}`", def.name());
        ConvertResult::UseGeneric
    } else {
        ConvertResult::CannotConvert
    }
}

// -----------------------------------------------------------------------------
// Containers

/// Loads one container element saved with type `tag`.
fn convert_element(
    cx: &mut SerialContext<'_>,
    property: &Property,
    tag: &FieldTag,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
) -> Result<bool, SerialError> {
    if tag.matches(property) {
        property.serialize_item(cx, archive, memory, ptr, None)?;
        return Ok(true);
    }
    Ok(match property.convert_from_legacy(cx, tag, archive, memory, ptr)? {
        ConvertResult::Converted => true,
        ConvertResult::UseGeneric => {
            property.serialize_item(cx, archive, memory, ptr, None)?;
            true
        }
        ConvertResult::CannotConvert => false,
    })
}

fn abort(cx: &mut SerialContext<'_>, from: WireType) -> ConvertResult {
    cx.report(Diagnostic::ContainerConversionAborted {
        field: cx.field_path(),
        from: from.to_string(),
    });
    ConvertResult::Converted
}

fn convert_array(
    cx: &mut SerialContext<'_>,
    array: &ArrayView<'_>,
    from: WireType,
    archive: &mut dyn Archive,
    memory: &mut Memory,
) -> Result<ConvertResult, SerialError> {
    array.backing().check_mutable()?;
    let element_tag = FieldTag::element(from);
    let count = read_count(cx, archive)?;
    array.empty(memory)?;
    array.add(memory, count)?;
    for index in 0..count {
        let element = array.element_ptr(memory, index)?;
        if !convert_element(cx, array.inner(), &element_tag, archive, memory, element)? {
            array.empty(memory)?;
            return Ok(abort(cx, from));
        }
    }
    Ok(ConvertResult::Converted)
}

/// Sets and maps. Saved deltas cannot be converted and abort the container.
fn convert_hashed(
    cx: &mut SerialContext<'_>,
    view: &HashedView<'_>,
    (from_key, from_value): (WireType, Option<WireType>),
    archive: &mut dyn Archive,
    memory: &mut Memory,
) -> Result<ConvertResult, SerialError> {
    let key_tag = FieldTag::element(from_key);
    view.backing().check_mutable()?;
    let value_tag = from_value.map(FieldTag::element);
    let removed = read_count(cx, archive)?;
    view.empty(memory)?;
    if removed > 0 {
        return Ok(abort(cx, from_key));
    }

    let count = read_count(cx, archive)?;
    for _ in 0..count {
        let index = view.add_default_invalid_needs_rehash(memory)?;
        let element = view.element_ptr(memory, index)?;
        let mut converted = convert_element(cx, view.key(), &key_tag, archive, memory, element)?;
        if converted
            && let (Some(tag), Some((value, offset))) = (&value_tag, view.value_entry())
        {
            converted = convert_element(cx, value, tag, archive, memory, element.byte_add(offset))?;
        }
        if !converted {
            view.empty(memory)?;
            return Ok(abort(cx, from_value.unwrap_or(from_key)));
        }
    }
    view.rehash(memory)?;
    Ok(ConvertResult::Converted)
}

// -----------------------------------------------------------------------------
// Tests
