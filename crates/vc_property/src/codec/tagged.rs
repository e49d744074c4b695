use alloc::format;
use alloc::string::ToString;

use vc_ptr::{Memory, Ptr};

use super::context::SerialContext;
use super::tag::{FieldTag, TagExtras};
use crate::archive::{Archive, ArchiveExt};
use crate::convert::ConvertResult;
use crate::error::{Diagnostic, SerialError};
use crate::info::{Property, PropertyKind, StructDef};
use crate::ops::{IdenticalFlags, write_bool};
use crate::schema::Schema;

// -----------------------------------------------------------------------------
// Save

/// Writes every field that differs from `defaults`, then the terminator.
pub(crate) fn save(
    cx: &mut SerialContext<'_>,
    schema: &Schema,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
) -> Result<(), SerialError> {
    for entry in schema.entries() {
        let property = schema.property(entry);
        let value = Schema::value_ptr(entry, ptr);
        let default = defaults.map(|d| Schema::value_ptr(entry, d));
        if let Some(default) = default
            && property.identical(memory, value, default, IdenticalFlags::empty())?
        {
            continue;
        }

        push_element(cx, property, entry.array_index);
        let result = save_field(cx, property, entry.array_index, archive, memory, value, default);
        cx.pop_field();
        result?;
    }
    archive.write_string("")
}

fn save_field(
    cx: &mut SerialContext<'_>,
    property: &Property,
    array_index: usize,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    value: Ptr,
    default: Option<Ptr>,
) -> Result<(), SerialError> {
    let tag = FieldTag::for_property(property, array_index, memory, value)?;
    let size_at = tag.write(archive)?;
    let start = archive.tell();
    if !matches!(property.kind(), PropertyKind::Bool(_)) {
        property.serialize_item(cx, archive, memory, value, default)?;
    }
    let end = archive.tell();

    let size = i32::try_from(end - start).map_err(|_| SerialError::InvalidLength {
        offset: start,
        len: (end - start) as i64,
    })?;
    archive.seek(size_at)?;
    archive.write_i32(size)?;
    archive.seek(end)
}

// -----------------------------------------------------------------------------
// Load

/// Reads tags until the terminator, matching them to fields by name.
///
/// Unknown fields, filtered editor-only fields and out-of-range static
/// array indices are skipped. Mismatched types go through the conversion
/// rules. A payload that does not consume exactly its declared size clears
/// the field and aborts the struct.
pub(crate) fn load(
    cx: &mut SerialContext<'_>,
    def: &StructDef,
    schema: &Schema,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
) -> Result<(), SerialError> {
    let mut hint = 0;
    while let Some(tag) = FieldTag::read(archive)? {
        let start = archive.tell();
        let end = start + tag.size as u64;
        if end > archive.total_size() {
            return Err(SerialError::UnexpectedEof {
                offset: start,
                needed: tag.size as usize,
                len: archive.total_size(),
            });
        }

        cx.push_field(&tag.name);
        let result = load_field(cx, def, schema, &tag, &mut hint, archive, memory, ptr, defaults, end);
        cx.pop_field();
        result?;
    }
    Ok(())
}

fn load_field(
    cx: &mut SerialContext<'_>,
    def: &StructDef,
    schema: &Schema,
    tag: &FieldTag,
    hint: &mut usize,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
    end: u64,
) -> Result<(), SerialError> {
    let layout = schema.layout();
    let found = match layout.property(*hint) {
        Some(property) if property.name() == tag.name => Some(*hint),
        _ => layout.find(&tag.name),
    };
    let Some(index) = found else {
        cx.report(Diagnostic::UnknownField {
            field: cx.field_path(),
            ty: def.name().to_string(),
            size: tag.size as u64,
        });
        return archive.seek(end);
    };
    let property = &layout.properties()[index];
    *hint = index + 1;

    if schema.filters_editor_only() && property.is_editor_only() {
        log::trace!("skipping editor-only field `{}` of `{}`", tag.name, def.name());
        return archive.seek(end);
    }
    let element = match usize::try_from(tag.array_index) {
        Ok(element) if element < property.array_dim() => element,
        _ => {
            cx.report(Diagnostic::ArrayIndexOutOfRange {
                field: cx.field_path(),
                index: tag.array_index,
                dim: property.array_dim(),
            });
            return archive.seek(end);
        }
    };
    if element + 1 < property.array_dim() {
        *hint = index;
    }

    let value = property.value_ptr(ptr, element);
    let default = defaults.map(|d| property.value_ptr(d, element));
    if tag.matches(property) {
        if let PropertyKind::Bool(layout) = property.kind() {
            return write_bool(memory, value, *layout, tag.bool_value().unwrap_or_default());
        }
        let start = archive.tell();
        let result = property.serialize_item(cx, archive, memory, value, default);
        let consumed = archive.tell().saturating_sub(start);
        let declared = tag.size as u64;
        match result {
            Ok(()) if consumed == declared => Ok(()),
            Err(SerialError::FrozenContainer) => {
                archive.seek(end)?;
                Err(SerialError::FrozenContainer)
            }
            result => {
                archive.seek(end)?;
                property.clear(memory, value)?;
                let field = cx.field_path();
                cx.report(Diagnostic::TruncatedStream {
                    field: field.clone(),
                    declared,
                    consumed,
                });
                match result {
                    Err(err) => Err(err),
                    Ok(()) => Err(SerialError::TruncatedStream {
                        field,
                        declared,
                        consumed,
                    }),
                }
            }
        }
    } else {
        match property.convert_from_legacy(cx, tag, archive, memory, value)? {
            ConvertResult::Converted => {}
            ConvertResult::UseGeneric => property.serialize_item(cx, archive, memory, value, default)?,
            ConvertResult::CannotConvert => {
                let diagnostic = match (&tag.extras, property.kind()) {
                    (TagExtras::Struct { name, .. }, PropertyKind::Struct(target)) => Diagnostic::StructDropped {
                        field: cx.field_path(),
                        from: name.clone(),
                        to: target.name().to_string(),
                    },
                    _ => Diagnostic::TypeConversionFailed {
                        field: cx.field_path(),
                        from: tag.ty.to_string(),
                        to: property.wire_type().to_string(),
                    },
                };
                cx.report(diagnostic);
            }
        }
        archive.seek(end)
    }
}

/// Enters a field, naming static array elements by index.
fn push_element(cx: &mut SerialContext<'_>, property: &Property, array_index: usize) {
    if property.array_dim() > 1 {
        cx.push_field(&format!("{}[{array_index}]", property.name()));
    } else {
        cx.push_field(property.name());
    }
}
