//! Struct codecs.
//!
//! [`serialize_struct`] drives one struct instance through an [`Archive`]:
//!
//! - [`Format::Tagged`]: every field carries a [`FieldTag`] (name, type id,
//!   size). Loading matches fields by name, skips unknown ones and converts
//!   mismatched types, so old data loads into newer layouts.
//! - [`Format::Unversioned`]: an [`UnversionedHeader`] says which schema
//!   entries follow. Compact, but both sides must share the schema.
//! - [`ArchiveMode::Collect`]: no bytes, references are reported to the
//!   archive's visitor.
//!
//! Fields identical to the supplied defaults are not written by either
//! format.
//!
//! # Examples
//!
//! ```
//! use vc_ptr::{Memory, Ptr};
//! use vc_property::codec::{self, Format, SerialContext};
//! use vc_property::config::SerialConfig;
//! use vc_property::info::{NumericKind, Property, PropertyKind, StructDef, StructLayout, text};
//!
//! let layout = StructLayout::builder("FPlayer")
//!     .field(Property::numeric("Level", NumericKind::Int32))
//!     .field(Property::new("Nick", PropertyKind::String).unwrap())
//!     .build()
//!     .unwrap();
//! let def = StructDef::new("FPlayer", layout);
//!
//! let mut memory = Memory::new();
//! let player = Ptr::start(memory.alloc(def.layout().size()));
//! memory.write_i32(player, 12).unwrap();
//! text::write(&mut memory, player.byte_add(4), "ada").unwrap();
//!
//! let config = SerialConfig::default();
//! let mut cx = SerialContext::new(&config, Format::Tagged);
//! let bytes = codec::save_tagged(&mut cx, &def, &mut memory, player, None).unwrap();
//!
//! let copy = Ptr::start(memory.alloc(def.layout().size()));
//! codec::load_tagged(&mut cx, &def, &mut memory, copy, None, &bytes).unwrap();
//! assert_eq!(memory.read_i32(copy).unwrap(), 12);
//! assert_eq!(text::read(&memory, copy.byte_add(4)).unwrap(), "ada");
//! ```

// -----------------------------------------------------------------------------
// Modules

mod context;
mod item;
mod tag;
mod tagged;

pub mod unversioned;

// -----------------------------------------------------------------------------
// Exports

pub use context::{Format, SerialContext};
pub use tag::{FieldTag, TagExtras};
pub use unversioned::UnversionedHeader;

pub(crate) use item::{read_count, resolve_enumerator};

use alloc::vec::Vec;

use vc_ptr::{Memory, Ptr};

use crate::archive::{Archive, ArchiveMode, ArchiveReader, ArchiveWriter, ReferenceCollector};
use crate::error::SerialError;
use crate::info::StructDef;
use crate::schema::Schema;

// -----------------------------------------------------------------------------
// Entry points

/// Saves, loads or walks the struct instance at `ptr`.
///
/// The direction follows the archive, the format follows `cx`. The schema
/// of the current layout generation is built on first use.
pub fn serialize_struct(
    cx: &mut SerialContext<'_>,
    def: &StructDef,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
) -> Result<(), SerialError> {
    let schema = def.schema(cx.config());
    match (archive.mode(), cx.format()) {
        (ArchiveMode::Collect, _) => {
            for entry in schema.entries() {
                let property = schema.property(entry);
                property.serialize_item(cx, archive, memory, Schema::value_ptr(entry, ptr), None)?;
            }
            Ok(())
        }
        (ArchiveMode::Save, Format::Tagged) => tagged::save(cx, &schema, archive, memory, ptr, defaults),
        (ArchiveMode::Load, Format::Tagged) => tagged::load(cx, def, &schema, archive, memory, ptr, defaults),
        (ArchiveMode::Save, Format::Unversioned) => unversioned::save(cx, &schema, archive, memory, ptr, defaults),
        (ArchiveMode::Load, Format::Unversioned) => {
            unversioned::load(cx, def, &schema, archive, memory, ptr, defaults)
        }
    }
}

fn save_with(
    cx: &mut SerialContext<'_>,
    format: Format,
    def: &StructDef,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
) -> Result<Vec<u8>, SerialError> {
    cx.set_format(format);
    let mut writer = ArchiveWriter::new();
    serialize_struct(cx, def, &mut writer, memory, ptr, defaults)?;
    Ok(writer.into_inner())
}

fn load_with(
    cx: &mut SerialContext<'_>,
    format: Format,
    def: &StructDef,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
    bytes: &[u8],
) -> Result<(), SerialError> {
    cx.set_format(format);
    let mut reader = ArchiveReader::new(bytes);
    serialize_struct(cx, def, &mut reader, memory, ptr, defaults)
}

/// Saves the instance at `ptr` in the tagged format.
#[inline]
pub fn save_tagged(
    cx: &mut SerialContext<'_>,
    def: &StructDef,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
) -> Result<Vec<u8>, SerialError> {
    save_with(cx, Format::Tagged, def, memory, ptr, defaults)
}

/// Loads tagged `bytes` into the instance at `ptr`.
///
/// Fields absent from the stream keep their current value. When `defaults`
/// is given the instance must already hold a copy of them.
#[inline]
pub fn load_tagged(
    cx: &mut SerialContext<'_>,
    def: &StructDef,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
    bytes: &[u8],
) -> Result<(), SerialError> {
    load_with(cx, Format::Tagged, def, memory, ptr, defaults, bytes)
}

#[inline]
pub fn save_unversioned(
    cx: &mut SerialContext<'_>,
    def: &StructDef,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
) -> Result<Vec<u8>, SerialError> {
    save_with(cx, Format::Unversioned, def, memory, ptr, defaults)
}

#[inline]
pub fn load_unversioned(
    cx: &mut SerialContext<'_>,
    def: &StructDef,
    memory: &mut Memory,
    ptr: Ptr,
    defaults: Option<Ptr>,
    bytes: &[u8],
) -> Result<(), SerialError> {
    load_with(cx, Format::Unversioned, def, memory, ptr, defaults, bytes)
}

/// Reports the references of the instance at `ptr` to the collector's
/// visitor. Handles rewritten by the visitor are stored back.
#[inline]
pub fn collect_references(
    cx: &mut SerialContext<'_>,
    def: &StructDef,
    memory: &mut Memory,
    ptr: Ptr,
    collector: &mut ReferenceCollector<'_>,
) -> Result<(), SerialError> {
    serialize_struct(cx, def, collector, memory, ptr, None)
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::string::{String, ToString};
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use alloc::{format, vec};

    use vc_ptr::{Memory, Ptr};

    use super::{Format, SerialContext};
    use crate::archive::{ArchiveExt, ArchiveFlags, ArchiveReader, ArchiveWriter, ReferenceCollector};
    use crate::config::SerialConfig;
    use crate::containers::{ArrayView, Backing};
    use crate::error::{Diagnostic, SerialError};
    use crate::info::{EnumDef, Guid, NumericKind, Property, PropertyKind, StructDef, StructLayout, text};
    use crate::ops::{IdenticalFlags, read_bool, write_bool};
    use crate::refs::{
        ObjectHandle, ObjectResolver, ReferenceMode, ReferenceVisitor, get_identity, lazy_guid, set_identity,
        set_lazy_guid, set_soft_path, soft_path,
    };

    fn vector() -> Arc<StructDef> {
        let layout = StructLayout::builder("FVector")
            .field(Property::numeric("X", NumericKind::Float))
            .field(Property::numeric("Y", NumericKind::Float))
            .build()
            .unwrap();
        StructDef::new("FVector", layout)
    }

    fn character() -> Arc<StructDef> {
        let mood = Arc::new(EnumDef::new("EMood", [("Calm", 0), ("Angry", 1)]));
        let layout = StructLayout::builder("FCharacter")
            .field(Property::numeric("Health", NumericKind::Int32))
            .field(Property::new("Alive", PropertyKind::bitfield(0)).unwrap())
            .field(Property::new("Hidden", PropertyKind::bitfield(1)).unwrap())
            .field(Property::new("Name", PropertyKind::Name).unwrap())
            .field(Property::new("Mood", PropertyKind::enum_as_byte(mood)).unwrap())
            .field(Property::new("Position", PropertyKind::Struct(vector())).unwrap())
            .field(Property::new("Tags", PropertyKind::array(Property::new("", PropertyKind::String).unwrap())).unwrap())
            .field(Property::numeric("Slots", NumericKind::UInt16).with_array_dim(3))
            .build()
            .unwrap();
        StructDef::new("FCharacter", layout)
    }

    fn alloc(memory: &mut Memory, def: &StructDef) -> Ptr {
        Ptr::start(memory.alloc(def.layout().size()))
    }

    fn field(def: &StructDef, name: &str, base: Ptr) -> (Property, Ptr) {
        let layout = def.layout();
        let property = layout.properties()[layout.find(name).unwrap()].clone();
        let ptr = property.value_ptr(base, 0);
        (property, ptr)
    }

    fn populate(memory: &mut Memory, def: &StructDef, base: Ptr) {
        let (_, at) = field(def, "Health", base);
        memory.write_i32(at, 75).unwrap();
        let (alive, at) = field(def, "Alive", base);
        let PropertyKind::Bool(layout) = alive.kind() else { unreachable!() };
        write_bool(memory, at, *layout, true).unwrap();
        let (_, at) = field(def, "Name", base);
        text::write_name(memory, at, "Brienne").unwrap();
        let (_, at) = field(def, "Mood", base);
        memory.write_u8(at, 1).unwrap();
        let (_, at) = field(def, "Position", base);
        memory.write_f32(at.byte_add(4), -2.5).unwrap();
        let (tags, at) = field(def, "Tags", base);
        let PropertyKind::Array(inner) = tags.kind() else { unreachable!() };
        let array = ArrayView::new(inner, at, Backing::Heap);
        array.add(memory, 2).unwrap();
        text::write(memory, array.element_ptr(memory, 0).unwrap(), "knight").unwrap();
        text::write(memory, array.element_ptr(memory, 1).unwrap(), "tall").unwrap();
        let (slots, _) = field(def, "Slots", base);
        memory.write_u16(slots.value_ptr(base, 2), 9).unwrap();
    }

    fn identical(memory: &Memory, def: &Arc<StructDef>, a: Ptr, b: Ptr) -> bool {
        let whole = Property::new("", PropertyKind::Struct(def.clone())).unwrap();
        whole.identical(memory, a, b, IdenticalFlags::empty()).unwrap()
    }

    #[test]
    fn tagged_round_trip() {
        let def = character();
        let mut memory = Memory::new();
        let (a, b) = (alloc(&mut memory, &def), alloc(&mut memory, &def));
        populate(&mut memory, &def, a);

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Tagged);
        let bytes = super::save_tagged(&mut cx, &def, &mut memory, a, None).unwrap();
        super::load_tagged(&mut cx, &def, &mut memory, b, None, &bytes).unwrap();

        assert!(cx.diagnostics().is_empty());
        assert!(identical(&memory, &def, a, b));
        let (hidden, at) = field(&def, "Hidden", b);
        let PropertyKind::Bool(layout) = hidden.kind() else { unreachable!() };
        assert!(!read_bool(&memory, at, *layout).unwrap());
    }

    #[test]
    fn defaults_are_not_written() {
        let def = character();
        let mut memory = Memory::new();
        let (defaults, value, loaded) = (alloc(&mut memory, &def), alloc(&mut memory, &def), alloc(&mut memory, &def));
        populate(&mut memory, &def, defaults);
        populate(&mut memory, &def, value);
        let (_, at) = field(&def, "Health", value);
        memory.write_i32(at, 10).unwrap();

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Tagged);
        let bytes = super::save_tagged(&mut cx, &def, &mut memory, value, Some(defaults)).unwrap();

        let mut reader = ArchiveReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "Health");
        reader.read_string().unwrap();
        assert_eq!(reader.read_i32().unwrap(), 4);
        reader.skip(8).unwrap();
        assert_eq!(reader.read_string().unwrap(), "");
        assert!(reader.remaining().is_empty());

        let whole = Property::new("", PropertyKind::Struct(def.clone())).unwrap();
        whole.copy(&mut memory, loaded, defaults).unwrap();
        super::load_tagged(&mut cx, &def, &mut memory, loaded, Some(defaults), &bytes).unwrap();
        assert!(identical(&memory, &def, loaded, value));
    }

    #[test]
    fn unknown_and_reordered_fields() {
        let old = StructDef::new(
            "FStats",
            StructLayout::builder("FStats")
                .field(Property::numeric("Legacy", NumericKind::Int64))
                .field(Property::numeric("Speed", NumericKind::Float))
                .field(Property::numeric("Armor", NumericKind::Int32))
                .build()
                .unwrap(),
        );
        let new = StructDef::new(
            "FStats",
            StructLayout::builder("FStats")
                .field(Property::numeric("Armor", NumericKind::Int32))
                .field(Property::numeric("Speed", NumericKind::Float))
                .build()
                .unwrap(),
        );

        let mut memory = Memory::new();
        let saved = alloc(&mut memory, &old);
        memory.write_i64(saved, -1).unwrap();
        memory.write_f32(saved.byte_add(8), 1.5).unwrap();
        memory.write_i32(saved.byte_add(12), 40).unwrap();

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Tagged);
        let bytes = super::save_tagged(&mut cx, &old, &mut memory, saved, None).unwrap();
        let loaded = alloc(&mut memory, &new);
        super::load_tagged(&mut cx, &new, &mut memory, loaded, None, &bytes).unwrap();

        assert_eq!(memory.read_i32(loaded).unwrap(), 40);
        assert_eq!(memory.read_f32(loaded.byte_add(4)).unwrap(), 1.5);
        assert_eq!(cx.take_diagnostics(), [Diagnostic::UnknownField {
            field: "Legacy".to_string(),
            ty: "FStats".to_string(),
            size: 8,
        }]);
    }

    #[test]
    fn size_mismatch_clears_the_field() {
        let def = StructDef::new(
            "FCounter",
            StructLayout::builder("FCounter")
                .field(Property::new("Label", PropertyKind::String).unwrap())
                .field(Property::numeric("Count", NumericKind::Int32))
                .build()
                .unwrap(),
        );
        // `Count` claims 8 bytes but an int payload is 4.
        let mut writer = ArchiveWriter::new();
        writer.write_string("Count").unwrap();
        writer.write_string("IntProperty").unwrap();
        writer.write_i32(8).unwrap();
        writer.write_i32(0).unwrap();
        writer.write_i32(5).unwrap();
        writer.write_i32(6).unwrap();
        writer.write_string("").unwrap();

        let mut memory = Memory::new();
        let ptr = alloc(&mut memory, &def);
        memory.write_i32(ptr.byte_add(4), 99).unwrap();
        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Tagged);
        let err = super::load_tagged(&mut cx, &def, &mut memory, ptr, None, writer.as_bytes()).unwrap_err();

        assert_eq!(err, SerialError::TruncatedStream {
            field: "Count".to_string(),
            declared: 8,
            consumed: 4,
        });
        assert_eq!(memory.read_i32(ptr.byte_add(4)).unwrap(), 0);
        assert!(matches!(cx.diagnostics(), [Diagnostic::TruncatedStream { .. }]));
    }

    #[test]
    fn static_array_index_out_of_range() {
        let def = StructDef::new(
            "FGrid",
            StructLayout::builder("FGrid")
                .field(Property::numeric("Cells", NumericKind::Int8).with_array_dim(2))
                .build()
                .unwrap(),
        );
        let mut writer = ArchiveWriter::new();
        for index in [1, 2] {
            writer.write_string("Cells").unwrap();
            writer.write_string("Int8Property").unwrap();
            writer.write_i32(1).unwrap();
            writer.write_i32(index).unwrap();
            writer.write_i8(7).unwrap();
        }
        writer.write_string("").unwrap();

        let mut memory = Memory::new();
        let ptr = alloc(&mut memory, &def);
        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Tagged);
        super::load_tagged(&mut cx, &def, &mut memory, ptr, None, writer.as_bytes()).unwrap();

        assert_eq!(memory.bytes(ptr, 2).unwrap(), [0, 7]);
        assert!(matches!(cx.diagnostics(), [Diagnostic::ArrayIndexOutOfRange { index: 2, dim: 2, .. }]));
    }

    #[test]
    fn editor_only_fields_are_filtered() {
        let def = StructDef::new(
            "FProp",
            StructLayout::builder("FProp")
                .field(Property::numeric("Mass", NumericKind::Float))
                .field(Property::new("Note", PropertyKind::String).unwrap().editor_only())
                .build()
                .unwrap(),
        );
        let mut memory = Memory::new();
        let (a, b) = (alloc(&mut memory, &def), alloc(&mut memory, &def));
        memory.write_f32(a, 3.0).unwrap();
        text::write(&mut memory, a.byte_add(4), "heavy").unwrap();

        let editor = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&editor, Format::Tagged);
        let bytes = super::save_tagged(&mut cx, &def, &mut memory, a, None).unwrap();

        let shipping = SerialConfig::SHIPPING;
        let mut cx = SerialContext::new(&shipping, Format::Tagged);
        super::load_tagged(&mut cx, &def, &mut memory, b, None, &bytes).unwrap();
        assert_eq!(memory.read_f32(b).unwrap(), 3.0);
        assert!(text::is_empty(&memory, b.byte_add(4)).unwrap());
        assert!(cx.diagnostics().is_empty());

        let shipped = super::save_tagged(&mut cx, &def, &mut memory, a, None).unwrap();
        assert!(shipped.len() < bytes.len());
    }

    #[test]
    fn unversioned_round_trip_is_stable() {
        let def = character();
        let mut memory = Memory::new();
        let (a, b) = (alloc(&mut memory, &def), alloc(&mut memory, &def));
        populate(&mut memory, &def, a);

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Unversioned);
        let bytes = super::save_unversioned(&mut cx, &def, &mut memory, a, None).unwrap();
        super::load_unversioned(&mut cx, &def, &mut memory, b, None, &bytes).unwrap();
        assert!(identical(&memory, &def, a, b));

        let again = super::save_unversioned(&mut cx, &def, &mut memory, b, None).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn unversioned_all_defaults_is_header_only() {
        let def = character();
        let mut memory = Memory::new();
        let (a, defaults) = (alloc(&mut memory, &def), alloc(&mut memory, &def));
        populate(&mut memory, &def, a);
        populate(&mut memory, &def, defaults);

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Unversioned);
        let bytes = super::save_unversioned(&mut cx, &def, &mut memory, a, Some(defaults)).unwrap();
        assert_eq!(bytes.len(), 2);

        let header = super::UnversionedHeader::load(&mut ArchiveReader::new(&bytes)).unwrap();
        assert!(!header.has_values());
        assert_eq!(header.included_count(), 0);
    }

    #[test]
    fn unversioned_many_fields() {
        let mut builder = StructLayout::builder("FWide");
        for index in 0..130 {
            builder = builder.field(Property::numeric(&format!("F{index}"), NumericKind::UInt8));
        }
        let def = StructDef::new("FWide", builder.build().unwrap());
        let mut memory = Memory::new();
        let (a, b) = (alloc(&mut memory, &def), alloc(&mut memory, &def));
        let values: Vec<u8> = (0..130u8).map(|i| i | 1).collect();
        memory.write(a, &values).unwrap();

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Unversioned);
        let bytes = super::save_unversioned(&mut cx, &def, &mut memory, a, None).unwrap();
        let header = super::UnversionedHeader::load(&mut ArchiveReader::new(&bytes)).unwrap();
        assert!(header.fragments().len() >= 2);
        assert!(header.fragments().iter().all(|f| f.values() <= 127));

        super::load_unversioned(&mut cx, &def, &mut memory, b, None, &bytes).unwrap();
        assert_eq!(memory.bytes(b, 130).unwrap(), &values[..]);
    }

    #[test]
    fn unversioned_zero_values_are_cleared() {
        let def = vector();
        let mut memory = Memory::new();
        let (a, b) = (alloc(&mut memory, &def), alloc(&mut memory, &def));
        memory.write_f32(a.byte_add(4), 8.0).unwrap();
        memory.write_f32(b, 3.0).unwrap();

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Unversioned);
        let bytes = super::save_unversioned(&mut cx, &def, &mut memory, a, None).unwrap();
        // One fragment, an 8-bit zero mask and a single float.
        assert_eq!(bytes.len(), 2 + 1 + 4);

        super::load_unversioned(&mut cx, &def, &mut memory, b, None, &bytes).unwrap();
        assert_eq!(memory.read_f32(b).unwrap(), 0.0);
        assert_eq!(memory.read_f32(b.byte_add(4)).unwrap(), 8.0);
    }

    #[test]
    fn unversioned_schema_mismatch() {
        let def = character();
        let small = vector();
        let mut memory = Memory::new();
        let a = alloc(&mut memory, &def);
        populate(&mut memory, &def, a);

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Unversioned);
        let bytes = super::save_unversioned(&mut cx, &def, &mut memory, a, None).unwrap();
        let b = alloc(&mut memory, &small);
        let err = super::load_unversioned(&mut cx, &small, &mut memory, b, None, &bytes).unwrap_err();
        assert!(matches!(err, SerialError::SchemaMismatch { expected: 2, .. }));
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(ReferenceMode, u64)>,
        paths: Vec<String>,
    }

    impl ReferenceVisitor for Recorder {
        fn visit(&mut self, mode: ReferenceMode, handle: &mut ObjectHandle) {
            self.seen.push((mode, handle.get()));
            if mode == ReferenceMode::Weak {
                *handle = ObjectHandle(handle.get() + 100);
            }
        }

        fn visit_soft_path(&mut self, path: &str) {
            self.paths.push(path.to_string());
        }
    }

    fn links() -> Arc<StructDef> {
        StructDef::new(
            "FLinks",
            StructLayout::builder("FLinks")
                .field(Property::new("Owner", PropertyKind::Reference(ReferenceMode::Strong)).unwrap())
                .field(Property::new("Target", PropertyKind::Reference(ReferenceMode::Weak)).unwrap())
                .field(Property::new("Asset", PropertyKind::Reference(ReferenceMode::Lazy)).unwrap())
                .field(Property::new("Icon", PropertyKind::Reference(ReferenceMode::Soft)).unwrap())
                .field(Property::new(
                    "Children",
                    PropertyKind::array(Property::new("", PropertyKind::Reference(ReferenceMode::Strong)).unwrap()),
                ).unwrap())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn reference_collection_policy() {
        let def = links();
        let layout = def.layout();
        let mut memory = Memory::new();
        let ptr = alloc(&mut memory, &def);
        let owner = layout.properties()[0].value_ptr(ptr, 0);
        let target = layout.properties()[1].value_ptr(ptr, 0);
        let icon = layout.properties()[3].value_ptr(ptr, 0);
        set_identity(&mut memory, ReferenceMode::Strong, owner, ObjectHandle(1)).unwrap();
        set_identity(&mut memory, ReferenceMode::Weak, target, ObjectHandle(2)).unwrap();
        set_soft_path(&mut memory, icon, "/Game/Icons/Sword").unwrap();
        let PropertyKind::Array(inner) = layout.properties()[4].kind() else { unreachable!() };
        let children = ArrayView::new(inner, layout.properties()[4].value_ptr(ptr, 0), Backing::Heap);
        children.add(&mut memory, 1).unwrap();
        let child = children.element_ptr(&memory, 0).unwrap();
        set_identity(&mut memory, ReferenceMode::Strong, child, ObjectHandle(3)).unwrap();

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Tagged);

        let mut recorder = Recorder::default();
        let mut collector = ReferenceCollector::new(&mut recorder);
        super::collect_references(&mut cx, &def, &mut memory, ptr, &mut collector).unwrap();
        assert_eq!(recorder.seen, [(ReferenceMode::Strong, 1), (ReferenceMode::Strong, 3)]);
        assert_eq!(recorder.paths, ["/Game/Icons/Sword"]);

        let mut recorder = Recorder::default();
        let mut collector = ReferenceCollector::new(&mut recorder).with_flags(ArchiveFlags::REWRITE_WEAK_AND_STRONG);
        super::collect_references(&mut cx, &def, &mut memory, ptr, &mut collector).unwrap();
        assert_eq!(recorder.seen, vec![
            (ReferenceMode::Strong, 1),
            (ReferenceMode::Weak, 2),
            (ReferenceMode::Strong, 3),
        ]);
        assert_eq!(get_identity(&memory, ReferenceMode::Weak, target).unwrap(), ObjectHandle(102));
    }

    struct Catalog;

    impl ObjectResolver for Catalog {
        fn resolve_guid(&self, _guid: Guid) -> Option<ObjectHandle> {
            Some(ObjectHandle(41))
        }

        fn resolve_path(&self, path: &str) -> Option<ObjectHandle> {
            (path == "/Game/Maps/Hogsmeade").then_some(ObjectHandle(42))
        }
    }

    #[test]
    fn references_round_trip() {
        let def = links();
        let layout = def.layout();
        let (target, asset, icon) = (&layout.properties()[1], &layout.properties()[2], &layout.properties()[3]);
        let mut memory = Memory::new();
        let a = alloc(&mut memory, &def);
        set_identity(&mut memory, ReferenceMode::Weak, target.value_ptr(a, 0), ObjectHandle(5)).unwrap();
        set_lazy_guid(&mut memory, asset.value_ptr(a, 0), Guid::from_u128(0xABCD)).unwrap();
        set_soft_path(&mut memory, icon.value_ptr(a, 0), "/Game/Maps/Hogsmeade").unwrap();

        let config = SerialConfig::DEFAULT;
        for format in [Format::Tagged, Format::Unversioned] {
            let mut cx = SerialContext::new(&config, format);
            let bytes = super::save_with(&mut cx, format, &def, &mut memory, a, None).unwrap();
            let b = alloc(&mut memory, &def);
            super::load_with(&mut cx, format, &def, &mut memory, b, None, &bytes).unwrap();

            assert!(cx.diagnostics().is_empty());
            let weak = get_identity(&memory, ReferenceMode::Weak, target.value_ptr(b, 0)).unwrap();
            assert_eq!(weak, ObjectHandle(5));
            assert_eq!(lazy_guid(&memory, asset.value_ptr(b, 0)).unwrap(), Guid::from_u128(0xABCD));
            let lazy = get_identity(&memory, ReferenceMode::Lazy, asset.value_ptr(b, 0)).unwrap();
            assert!(lazy.is_null());
            assert_eq!(soft_path(&memory, icon.value_ptr(b, 0)).unwrap(), "/Game/Maps/Hogsmeade");

            let mut recorder = Recorder::default();
            let mut collector = ReferenceCollector::new(&mut recorder);
            super::collect_references(&mut cx, &def, &mut memory, b, &mut collector).unwrap();
            assert_eq!(recorder.paths, ["/Game/Maps/Hogsmeade"]);
        }

        // Soft handles resolve at load only when asked to, lazy ones never do.
        let mut cx = SerialContext::new(&config, Format::Tagged);
        let bytes = super::save_tagged(&mut cx, &def, &mut memory, a, None).unwrap();
        let c = alloc(&mut memory, &def);
        let mut reader = ArchiveReader::new(&bytes)
            .with_flags(ArchiveFlags::RESOLVE_SOFT)
            .with_resolver(&Catalog);
        super::serialize_struct(&mut cx, &def, &mut reader, &mut memory, c, None).unwrap();
        assert_eq!(get_identity(&memory, ReferenceMode::Soft, icon.value_ptr(c, 0)).unwrap(), ObjectHandle(42));
        assert!(get_identity(&memory, ReferenceMode::Lazy, asset.value_ptr(c, 0)).unwrap().is_null());
    }

    #[test]
    fn frozen_arrays_survive_a_failed_load() {
        let def = StructDef::new(
            "FBaked",
            StructLayout::builder("FBaked")
                .field(Property::new("Bytes", PropertyKind::array(Property::numeric("", NumericKind::Int8))).unwrap().frozen())
                .build()
                .unwrap(),
        );
        let layout = def.layout();
        let PropertyKind::Array(inner) = layout.properties()[0].kind() else { unreachable!() };
        let mut memory = Memory::new();
        let mut bake = |values: &[u8]| {
            let ptr = alloc(&mut memory, &def);
            let image = memory.alloc_from(values);
            memory.write_slot(ptr, Some(image)).unwrap();
            memory.write_u32(ptr.byte_add(4), values.len() as u32).unwrap();
            (ptr, image)
        };
        let (a, _) = bake(&[1, 2, 3]);
        let (b, image) = bake(&[7, 8]);

        let config = SerialConfig::DEFAULT;
        let mut cx = SerialContext::new(&config, Format::Tagged);
        let bytes = super::save_tagged(&mut cx, &def, &mut memory, a, None).unwrap();
        let err = super::load_tagged(&mut cx, &def, &mut memory, b, None, &bytes).unwrap_err();
        assert_eq!(err, SerialError::FrozenContainer);

        let frozen = ArrayView::new(inner, b, Backing::Image);
        assert_eq!(frozen.len(&memory).unwrap(), 2);
        assert_eq!(memory.read_slot(b).unwrap(), Some(image));
        assert_eq!(memory.bytes(Ptr::start(image), 2).unwrap(), &[7, 8]);
        assert!(cx.diagnostics().is_empty());
    }
}
