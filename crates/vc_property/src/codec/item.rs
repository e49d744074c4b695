use alloc::vec;
use alloc::vec::Vec;

use vc_ptr::{Memory, Ptr};

use super::context::{Format, SerialContext};
use crate::archive::{Archive, ArchiveExt, ArchiveFlags, ArchiveMode};
use crate::containers::{ArrayView, HashedView, MapView, SetView};
use crate::error::{Diagnostic, SerialError};
use crate::info::{EnumBinding, EnumDef, Property, PropertyKind, text};
use crate::ops::{DELEGATE_NAME, IdenticalFlags, Number, read_bool, write_bool};
use crate::refs::{self, ObjectHandle, ReferenceMode};

impl Property {
    /// Saves, loads or walks one element of this property.
    ///
    /// The direction follows [`Archive::mode`]. `defaults` is the matching
    /// element of a default instance. Sets and maps use it to write only the
    /// difference, nested structs to skip unchanged fields. When loading
    /// against defaults the value must already hold a copy of them.
    pub fn serialize_item(
        &self,
        cx: &mut SerialContext<'_>,
        archive: &mut dyn Archive,
        memory: &mut Memory,
        ptr: Ptr,
        defaults: Option<Ptr>,
    ) -> Result<(), SerialError> {
        let mode = archive.mode();
        match self.kind() {
            PropertyKind::Bool(layout) => match mode {
                ArchiveMode::Save => archive.write_u8(read_bool(memory, ptr, *layout)? as u8),
                ArchiveMode::Load => {
                    let value = archive.read_u8()? != 0;
                    write_bool(memory, ptr, *layout, value)
                }
                ArchiveMode::Collect => Ok(()),
            },
            PropertyKind::Numeric(kind) => match mode {
                ArchiveMode::Save => Number::read(memory, ptr, *kind)?.save(archive, *kind),
                ArchiveMode::Load => Number::load(archive, *kind)?.write(memory, ptr, *kind).map(drop),
                ArchiveMode::Collect => Ok(()),
            },
            PropertyKind::Enum(binding) => serialize_enum(cx, binding, archive, memory, ptr),
            PropertyKind::Name => match mode {
                ArchiveMode::Save => {
                    let name = text::read(memory, ptr)?;
                    archive.write_string(if name.is_empty() { text::NONE } else { &name })
                }
                ArchiveMode::Load => {
                    let name = archive.read_string()?;
                    text::write_name(memory, ptr, &name)
                }
                ArchiveMode::Collect => Ok(()),
            },
            PropertyKind::String => match mode {
                ArchiveMode::Save => archive.write_string(&text::read(memory, ptr)?),
                ArchiveMode::Load => {
                    let value = archive.read_string()?;
                    text::write(memory, ptr, &value)
                }
                ArchiveMode::Collect => Ok(()),
            },
            PropertyKind::Reference(reference) => serialize_reference(*reference, archive, memory, ptr),
            PropertyKind::Delegate => serialize_delegate(archive, memory, ptr),
            PropertyKind::Array(_) | PropertyKind::MulticastDelegate => {
                self.with_array(ptr, |array| serialize_array(cx, &array, archive, memory))
            }
            PropertyKind::Set(element) => {
                let set = *SetView::new(element, ptr, self.backing());
                let defaults = defaults.map(|d| *SetView::new(element, d, self.backing()));
                serialize_hashed(cx, &set, defaults.as_ref(), archive, memory)
            }
            PropertyKind::Map { key, value, layout } => {
                let map = *MapView::new(key, value, *layout, ptr, self.backing());
                let defaults = defaults.map(|d| *MapView::new(key, value, *layout, d, self.backing()));
                serialize_hashed(cx, &map, defaults.as_ref(), archive, memory)
            }
            PropertyKind::Struct(def) => super::serialize_struct(cx, def, archive, memory, ptr, defaults),
        }
    }
}

// -----------------------------------------------------------------------------
// Scalars

fn serialize_enum(
    cx: &mut SerialContext<'_>,
    binding: &EnumBinding,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
) -> Result<(), SerialError> {
    let kind = binding.underlying;
    match (archive.mode(), cx.format()) {
        (ArchiveMode::Collect, _) => Ok(()),
        (ArchiveMode::Save, Format::Unversioned) => Number::read(memory, ptr, kind)?.save(archive, kind),
        (ArchiveMode::Load, Format::Unversioned) => Number::load(archive, kind)?.write(memory, ptr, kind).map(drop),
        (ArchiveMode::Save, Format::Tagged) => {
            let value = Number::read(memory, ptr, kind)?.as_i64();
            archive.write_string(binding.def.name_of(value).unwrap_or(text::NONE))
        }
        (ArchiveMode::Load, Format::Tagged) => {
            let name = archive.read_string()?;
            let value = resolve_enumerator(cx, &binding.def, &name);
            Number::Int(value).write(memory, ptr, kind).map(drop)
        }
    }
}

/// Looks up an enumerator by name, falling back to the sentinel value.
///
/// `None` maps to the sentinel silently, other unknown names are reported.
pub(crate) fn resolve_enumerator(cx: &mut SerialContext<'_>, def: &EnumDef, name: &str) -> i64 {
    if let Some(value) = def.value_of(name) {
        return value;
    }
    let sentinel = def.max_value();
    if !text::is_none(name) {
        cx.report(Diagnostic::UnresolvedEnumerator {
            field: cx.field_path(),
            enum_name: def.name().into(),
            name: name.into(),
            sentinel,
        });
    }
    sentinel
}

fn serialize_reference(
    mode: ReferenceMode,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
) -> Result<(), SerialError> {
    match mode {
        ReferenceMode::Strong | ReferenceMode::Weak => {
            let before = refs::get_identity(memory, mode, ptr)?;
            let mut handle = before;
            archive.serialize_object(mode, &mut handle)?;
            if handle != before {
                refs::set_identity(memory, mode, ptr, handle)?;
            }
            Ok(())
        }
        ReferenceMode::Lazy => match archive.mode() {
            ArchiveMode::Save => archive.write_guid(refs::lazy_guid(memory, ptr)?),
            ArchiveMode::Load => {
                let guid = archive.read_guid()?;
                refs::set_lazy_guid(memory, ptr, guid)
            }
            ArchiveMode::Collect => Ok(()),
        },
        ReferenceMode::Soft => {
            match archive.mode() {
                ArchiveMode::Save => return archive.write_string(&refs::soft_path(memory, ptr)?),
                ArchiveMode::Load => {
                    let path = archive.read_string()?;
                    refs::set_soft_path(memory, ptr, &path)?;
                }
                ArchiveMode::Collect => {
                    let path = refs::soft_path(memory, ptr)?;
                    if !path.is_empty() {
                        archive.visit_soft_path(&path);
                    }
                }
            }
            if archive.flags().contains(ArchiveFlags::RESOLVE_SOFT)
                && let Some(resolver) = archive.resolver()
            {
                refs::resolve_soft(memory, ptr, resolver)?;
            }
            Ok(())
        }
    }
}

/// A delegate is a weak object handle plus a function name.
fn serialize_delegate(archive: &mut dyn Archive, memory: &mut Memory, ptr: Ptr) -> Result<(), SerialError> {
    let before = ObjectHandle(memory.read_u64(ptr)?);
    let mut handle = before;
    archive.serialize_object(ReferenceMode::Weak, &mut handle)?;
    if handle != before {
        memory.write_u64(ptr, handle.0)?;
    }
    let name = ptr.byte_add(DELEGATE_NAME);
    match archive.mode() {
        ArchiveMode::Save => {
            let function = text::read(memory, name)?;
            archive.write_string(if function.is_empty() { text::NONE } else { &function })
        }
        ArchiveMode::Load => {
            let function = archive.read_string()?;
            text::write_name(memory, name, &function)
        }
        ArchiveMode::Collect => Ok(()),
    }
}

// -----------------------------------------------------------------------------
// Containers

/// Reads an element count and checks it against the configured limit and
/// the rest of the stream. Every element takes at least one byte.
pub(crate) fn read_count(cx: &SerialContext<'_>, archive: &mut dyn Archive) -> Result<usize, SerialError> {
    let offset = archive.tell();
    let count = archive.read_i32()?;
    let remaining = archive.total_size().saturating_sub(archive.tell());
    match usize::try_from(count) {
        Ok(count) if count <= cx.config().max_container_len && count as u64 <= remaining => Ok(count),
        _ => Err(SerialError::InvalidLength {
            offset,
            len: count.into(),
        }),
    }
}

fn write_count(archive: &mut dyn Archive, count: usize) -> Result<(), SerialError> {
    let len = i32::try_from(count).map_err(|_| SerialError::InvalidLength {
        offset: archive.tell(),
        len: count as i64,
    })?;
    archive.write_i32(len)
}

fn serialize_array(
    cx: &mut SerialContext<'_>,
    array: &ArrayView<'_>,
    archive: &mut dyn Archive,
    memory: &mut Memory,
) -> Result<(), SerialError> {
    let inner = array.inner();
    let raw = matches!(inner.kind(), PropertyKind::Numeric(_));
    match archive.mode() {
        ArchiveMode::Save => {
            let elements = array.elements(memory)?;
            write_count(archive, elements.len())?;
            if raw {
                return archive.write_bytes(memory.bytes(elements.base(), elements.byte_len())?);
            }
            for element in elements {
                inner.serialize_item(cx, archive, memory, element, None)?;
            }
            Ok(())
        }
        ArchiveMode::Load => {
            array.backing().check_mutable()?;
            let count = read_count(cx, archive)?;
            if raw {
                let needed = count * inner.element_size();
                let offset = archive.tell();
                if offset + needed as u64 > archive.total_size() {
                    return Err(SerialError::UnexpectedEof {
                        offset,
                        needed,
                        len: archive.total_size(),
                    });
                }
            }
            array.empty(memory)?;
            array.add(memory, count)?;
            let elements = array.elements(memory)?;
            if raw {
                let mut bytes = vec![0; elements.byte_len()];
                archive.read_bytes(&mut bytes)?;
                return Ok(memory.write(elements.base(), &bytes)?);
            }
            for element in elements {
                inner.serialize_item(cx, archive, memory, element, None)?;
            }
            Ok(())
        }
        ArchiveMode::Collect => {
            if raw {
                return Ok(());
            }
            for element in array.elements(memory)? {
                inner.serialize_item(cx, archive, memory, element, None)?;
            }
            Ok(())
        }
    }
}

/// Key, then value for maps.
fn serialize_element(
    cx: &mut SerialContext<'_>,
    view: &HashedView<'_>,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    ptr: Ptr,
) -> Result<(), SerialError> {
    view.key().serialize_item(cx, archive, memory, ptr, None)?;
    if let Some((value, offset)) = view.value_entry() {
        value.serialize_item(cx, archive, memory, ptr.byte_add(offset), None)?;
    }
    Ok(())
}

/// Sets and maps: removed keys, then elements.
///
/// Against defaults only the difference is written: default keys missing
/// from the value, then elements that are new or whose value changed.
fn serialize_hashed(
    cx: &mut SerialContext<'_>,
    view: &HashedView<'_>,
    defaults: Option<&HashedView<'_>>,
    archive: &mut dyn Archive,
    memory: &mut Memory,
) -> Result<(), SerialError> {
    match archive.mode() {
        ArchiveMode::Save => save_hashed(cx, view, defaults, archive, memory),
        ArchiveMode::Load => load_hashed(cx, view, defaults.is_some(), archive, memory),
        ArchiveMode::Collect => {
            for element in view.elements(memory)? {
                serialize_element(cx, view, archive, memory, element)?;
            }
            Ok(())
        }
    }
}

fn save_hashed(
    cx: &mut SerialContext<'_>,
    view: &HashedView<'_>,
    defaults: Option<&HashedView<'_>>,
    archive: &mut dyn Archive,
    memory: &mut Memory,
) -> Result<(), SerialError> {
    let mut removed = Vec::new();
    let mut added = Vec::new();
    match defaults {
        Some(defaults) => {
            for key in defaults.elements(memory)? {
                if view.find(memory, key)?.is_none() {
                    removed.push(key);
                }
            }
            for element in view.elements(memory)? {
                let changed = match defaults.find(memory, element)? {
                    None => true,
                    Some(index) => match view.value_entry() {
                        Some((value, offset)) => {
                            let old = defaults.element_ptr(memory, index)?.byte_add(offset);
                            !value.identical(memory, element.byte_add(offset), old, IdenticalFlags::empty())?
                        }
                        None => false,
                    },
                };
                if changed {
                    added.push(element);
                }
            }
        }
        None => added.extend(view.elements(memory)?),
    }

    write_count(archive, removed.len())?;
    for key in removed {
        view.key().serialize_item(cx, archive, memory, key, None)?;
    }
    write_count(archive, added.len())?;
    for element in added {
        serialize_element(cx, view, archive, memory, element)?;
    }
    Ok(())
}

fn load_hashed(
    cx: &mut SerialContext<'_>,
    view: &HashedView<'_>,
    has_defaults: bool,
    archive: &mut dyn Archive,
    memory: &mut Memory,
) -> Result<(), SerialError> {
    view.backing().check_mutable()?;
    let removed = read_count(cx, archive)?;
    if !has_defaults && removed == 0 {
        view.empty(memory)?;
        let count = read_count(cx, archive)?;
        for _ in 0..count {
            let index = view.add_default_invalid_needs_rehash(memory)?;
            let element = view.element_ptr(memory, index)?;
            serialize_element(cx, view, archive, memory, element)?;
        }
        return view.rehash(memory);
    }

    if view.needs_rehash(memory)? {
        view.rehash(memory)?;
    }
    let scratch = memory.alloc(view.stride());
    let result = load_delta(cx, view, removed, archive, memory, Ptr::start(scratch));
    memory.free(scratch)?;
    result
}

/// Applies removed keys and changed elements through a scratch element.
fn load_delta(
    cx: &mut SerialContext<'_>,
    view: &HashedView<'_>,
    removed: usize,
    archive: &mut dyn Archive,
    memory: &mut Memory,
    scratch: Ptr,
) -> Result<(), SerialError> {
    let key = view.key();
    for _ in 0..removed {
        key.init(memory, scratch)?;
        key.serialize_item(cx, archive, memory, scratch, None)?;
        view.remove(memory, scratch)?;
        key.destroy(memory, scratch)?;
    }

    let count = read_count(cx, archive)?;
    for _ in 0..count {
        key.init(memory, scratch)?;
        if let Some((value, offset)) = view.value_entry() {
            value.init(memory, scratch.byte_add(offset))?;
        }
        serialize_element(cx, view, archive, memory, scratch)?;
        let value = view.value_entry().map(|(_, offset)| scratch.byte_add(offset));
        view.insert(memory, scratch, value)?;

        key.destroy(memory, scratch)?;
        if let Some((value, offset)) = view.value_entry() {
            value.destroy(memory, scratch.byte_add(offset))?;
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use vc_ptr::{Memory, Ptr};

    use crate::archive::{ArchiveExt, ArchiveReader, ArchiveWriter};
    use crate::codec::{Format, SerialContext};
    use crate::config::SerialConfig;
    use crate::containers::{ArrayView, Backing, MapView, SetView};
    use crate::error::{Diagnostic, SerialError};
    use crate::info::{EnumDef, NumericKind, Property, PropertyKind, text};
    use crate::ops::{IdenticalFlags, Number};

    fn save(prop: &Property, memory: &mut Memory, ptr: Ptr, defaults: Option<Ptr>) -> Vec<u8> {
        let mut cx = SerialContext::new(&SerialConfig::DEFAULT, Format::Tagged);
        let mut writer = ArchiveWriter::new();
        prop.serialize_item(&mut cx, &mut writer, memory, ptr, defaults).unwrap();
        writer.into_inner()
    }

    fn load(prop: &Property, memory: &mut Memory, ptr: Ptr, defaults: Option<Ptr>, bytes: &[u8]) -> Vec<Diagnostic> {
        let mut cx = SerialContext::new(&SerialConfig::DEFAULT, Format::Tagged);
        let mut reader = ArchiveReader::new(bytes);
        prop.serialize_item(&mut cx, &mut reader, memory, ptr, defaults).unwrap();
        assert!(reader.remaining().is_empty());
        cx.take_diagnostics()
    }

    #[test]
    fn unknown_enumerator_loads_sentinel() {
        let def = Arc::new(EnumDef::new("EState", [("Idle", 0), ("Run", 1), ("Jump", 4)]));
        let prop = Property::new("State", PropertyKind::enumeration(def, NumericKind::Int32)).unwrap();
        let mut memory = Memory::new();
        let ptr = Ptr::start(memory.alloc(4));

        let mut writer = ArchiveWriter::new();
        writer.write_string("Fly").unwrap();
        let diagnostics = load(&prop, &mut memory, ptr, None, writer.as_bytes());
        assert_eq!(memory.read_i32(ptr).unwrap(), 5);
        assert!(matches!(&diagnostics[..], [Diagnostic::UnresolvedEnumerator { sentinel: 5, .. }]));

        // The sentinel has no name and saves as `None`, which loads silently.
        let bytes = save(&prop, &mut memory, ptr, None);
        let mut reader = ArchiveReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "None");
        memory.write_i32(ptr, 0).unwrap();
        assert!(load(&prop, &mut memory, ptr, None, &bytes).is_empty());
        assert_eq!(memory.read_i32(ptr).unwrap(), 5);

        let mut writer = ArchiveWriter::new();
        writer.write_string("EState::Run").unwrap();
        assert!(load(&prop, &mut memory, ptr, None, writer.as_bytes()).is_empty());
        assert_eq!(memory.read_i32(ptr).unwrap(), 1);
    }

    #[test]
    fn numeric_arrays_are_written_in_bulk() {
        let prop = Property::new("Samples", PropertyKind::array(Property::numeric("", NumericKind::Int16))).unwrap();
        let PropertyKind::Array(inner) = prop.kind() else { unreachable!() };
        let mut memory = Memory::new();
        let block = memory.alloc(16);
        let (a, b) = (Ptr::start(block), Ptr::new(block, 8));

        let array = ArrayView::new(inner, a, Backing::Heap);
        array.add(&mut memory, 3).unwrap();
        for (index, value) in [-1i16, 2, 300].into_iter().enumerate() {
            memory.write_i16(array.element_ptr(&memory, index).unwrap(), value).unwrap();
        }

        let bytes = save(&prop, &mut memory, a, None);
        assert_eq!(bytes, [3, 0, 0, 0, 0xFF, 0xFF, 2, 0, 0x2C, 1]);
        load(&prop, &mut memory, b, None, &bytes);
        assert!(prop.identical(&memory, a, b, IdenticalFlags::empty()).unwrap());
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let prop = Property::new("Names", PropertyKind::array(Property::new("", PropertyKind::Name).unwrap())).unwrap();
        let mut memory = Memory::new();
        let ptr = Ptr::start(memory.alloc(8));

        let mut writer = ArchiveWriter::new();
        writer.write_i32(-2).unwrap();
        let mut cx = SerialContext::new(&SerialConfig::DEFAULT, Format::Tagged);
        let mut reader = ArchiveReader::new(writer.as_bytes());
        let err = prop.serialize_item(&mut cx, &mut reader, &mut memory, ptr, None).unwrap_err();
        assert_eq!(err, SerialError::InvalidLength { offset: 0, len: -2 });
    }

    #[test]
    fn short_streams_leave_arrays_untouched() {
        let prop = Property::new("Scores", PropertyKind::array(Property::numeric("", NumericKind::Int32))).unwrap();
        let PropertyKind::Array(inner) = prop.kind() else { unreachable!() };
        let mut memory = Memory::new();
        let ptr = Ptr::start(memory.alloc(8));
        let array = ArrayView::new(inner, ptr, Backing::Heap);
        array.add(&mut memory, 1).unwrap();
        let first = array.element_ptr(&memory, 0).unwrap();
        memory.write_i32(first, 5).unwrap();
        let live = memory.live_blocks();

        let mut cx = SerialContext::new(&SerialConfig::DEFAULT, Format::Tagged);

        // More elements than bytes left.
        let mut writer = ArchiveWriter::new();
        writer.write_i32(1000).unwrap();
        writer.write_i32(7).unwrap();
        let mut reader = ArchiveReader::new(writer.as_bytes());
        let err = prop.serialize_item(&mut cx, &mut reader, &mut memory, ptr, None).unwrap_err();
        assert_eq!(err, SerialError::InvalidLength { offset: 0, len: 1000 });

        // Three ints announced, one present.
        let mut writer = ArchiveWriter::new();
        writer.write_i32(3).unwrap();
        writer.write_i32(7).unwrap();
        let mut reader = ArchiveReader::new(writer.as_bytes());
        let err = prop.serialize_item(&mut cx, &mut reader, &mut memory, ptr, None).unwrap_err();
        assert_eq!(err, SerialError::UnexpectedEof { offset: 4, needed: 12, len: 8 });

        assert_eq!(memory.live_blocks(), live);
        assert_eq!(array.len(&memory).unwrap(), 1);
        assert_eq!(memory.read_i32(array.element_ptr(&memory, 0).unwrap()).unwrap(), 5);
    }

    #[test]
    fn map_delta_against_defaults() {
        let prop = Property::new(
            "Stock",
            PropertyKind::map(
                Property::new("", PropertyKind::Name).unwrap(),
                Property::numeric("", NumericKind::Int32),
            ),
        )
        .unwrap();
        let PropertyKind::Map { key, value, layout } = prop.kind() else { unreachable!() };
        let mut memory = Memory::new();
        let block = memory.alloc(48);
        let (value_ptr, default_ptr, loaded_ptr) = (Ptr::start(block), Ptr::new(block, 16), Ptr::new(block, 32));
        let scratch = memory.alloc(8);
        let (k, v) = (Ptr::start(scratch), Ptr::new(scratch, 4));

        let put = |memory: &mut Memory, slot: Ptr, name: &str, count: i32| {
            text::write_name(memory, k, name).unwrap();
            memory.write_i32(v, count).unwrap();
            MapView::new(key, value, *layout, slot, Backing::Heap).add(memory, k, v).unwrap();
        };
        put(&mut memory, default_ptr, "Apple", 1);
        put(&mut memory, default_ptr, "Pear", 2);
        put(&mut memory, default_ptr, "Plum", 3);
        put(&mut memory, value_ptr, "Apple", 1);
        put(&mut memory, value_ptr, "Pear", 7);
        put(&mut memory, value_ptr, "Fig", 4);

        let bytes = save(&prop, &mut memory, value_ptr, Some(default_ptr));
        let mut reader = ArchiveReader::new(&bytes);
        assert_eq!(reader.read_i32().unwrap(), 1);
        assert_eq!(reader.read_string().unwrap(), "Plum");
        assert_eq!(reader.read_i32().unwrap(), 2);

        prop.copy(&mut memory, loaded_ptr, default_ptr).unwrap();
        load(&prop, &mut memory, loaded_ptr, Some(default_ptr), &bytes);
        assert!(prop.identical(&memory, loaded_ptr, value_ptr, IdenticalFlags::empty()).unwrap());
        let loaded = MapView::new(key, value, *layout, loaded_ptr, Backing::Heap);
        assert!(!loaded.needs_rehash(&memory).unwrap());
    }

    #[test]
    fn set_load_rehashes_once() {
        let prop = Property::new("Ids", PropertyKind::set(Property::numeric("", NumericKind::UInt32))).unwrap();
        let PropertyKind::Set(element) = prop.kind() else { unreachable!() };
        let mut writer = ArchiveWriter::new();
        writer.write_i32(0).unwrap();
        writer.write_i32(40).unwrap();
        for id in 0..40u32 {
            writer.write_u32(id * 7).unwrap();
        }

        let mut memory = Memory::new();
        let slot = Ptr::start(memory.alloc(16));
        load(&prop, &mut memory, slot, None, writer.as_bytes());

        let set = SetView::new(element, slot, Backing::Heap);
        assert_eq!(set.len(&memory).unwrap(), 40);
        assert!(!set.needs_rehash(&memory).unwrap());
        let probe = Ptr::start(memory.alloc(4));
        Number::UInt(21).write(&mut memory, probe, NumericKind::UInt32).unwrap();
        assert_eq!(set.find(&memory, probe).unwrap(), Some(3));
    }
}
