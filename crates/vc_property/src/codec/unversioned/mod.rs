//! The compact format: a fragment header over the schema, then the payloads
//! of included non-zero entries, in schema order. Reader and writer must
//! agree on the schema.

// -----------------------------------------------------------------------------
// Modules

mod header;

// -----------------------------------------------------------------------------
// Exports

pub use header::{Fragment, HeaderBuilder, Included, UnversionedHeader};

use alloc::string::ToString;
use alloc::vec::Vec;

use vc_ptr::{Memory, Ptr};

use super::context::SerialContext;
use crate::archive::Archive;
use crate::error::SerialError;
use crate::info::StructDef;
use crate::ops::IdenticalFlags;
use crate::schema::Schema;

pub(crate) fn save(
    cx: &mut SerialContext<'_>,
    schema: &Schema,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
) -> Result<(), SerialError> {
    let mut builder = HeaderBuilder::new();
    let mut payloads = Vec::new();
    for entry in schema.entries() {
        let property = schema.property(entry);
        let value = Schema::value_ptr(entry, ptr);
        let default = defaults.map(|d| Schema::value_ptr(entry, d));
        let include = match default {
            Some(default) => !property.identical(memory, value, default, IdenticalFlags::empty())?,
            None => true,
        };
        if !include {
            builder.exclude();
            continue;
        }
        let zero = property.is_zero(cx.config(), memory, value)?;
        builder.include(zero);
        if !zero {
            payloads.push((entry, default));
        }
    }

    builder.finish().save(archive)?;
    for (entry, default) in payloads {
        let property = schema.property(entry);
        cx.push_field(property.name());
        let result = property.serialize_item(cx, archive, memory, Schema::value_ptr(entry, ptr), default);
        cx.pop_field();
        result?;
    }
    Ok(())
}

pub(crate) fn load(
    cx: &mut SerialContext<'_>,
    def: &StructDef,
    schema: &Schema,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
) -> Result<(), SerialError> {
    let header = UnversionedHeader::load(archive)?;
    if header.covered_count() > schema.len() {
        return Err(SerialError::SchemaMismatch {
            ty: def.name().to_string(),
            expected: schema.len(),
            found: header.covered_count(),
        });
    }

    for (index, zero) in header.iter() {
        let entry = &schema.entries()[index];
        let property = schema.property(entry);
        let value = Schema::value_ptr(entry, ptr);
        if zero {
            property.clear(memory, value)?;
            continue;
        }
        let default = defaults.map(|d| Schema::value_ptr(entry, d));
        cx.push_field(property.name());
        let result = property.serialize_item(cx, archive, memory, value, default);
        cx.pop_field();
        result?;
    }
    Ok(())
}
