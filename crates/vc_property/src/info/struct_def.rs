use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use arc_swap::ArcSwap;

use crate::config::SerialConfig;
use crate::error::SerialError;
use crate::hash::{HashMap, new_map};
use crate::info::{Guid, Property, PropertyFlags, PropertyKind};
use crate::schema::{Schema, SchemaCache};

// -----------------------------------------------------------------------------
// StructLayout

/// The fields of a composite type and their placement.
///
/// Built with [`StructLayout::builder`]. A layout is immutable, hot-reload
/// replaces the whole layout through [`StructDef::redefine`].
#[derive(Debug, Clone)]
pub struct StructLayout {
    size: usize,
    align: usize,
    properties: Vec<Property>,
    by_name: HashMap<Arc<str>, usize>,
    flags: PropertyFlags,
    generation: u64,
}

impl StructLayout {
    /// Starts a layout for the type called `name`.
    #[inline]
    pub fn builder(name: &str) -> StructLayoutBuilder {
        StructLayoutBuilder {
            name: name.to_string(),
            fields: Vec::new(),
            cursor: 0,
            size: None,
        }
    }

    /// Size of one instance in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Fields in declaration order.
    #[inline]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[inline]
    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    /// Flags shared by every field, the flags of the struct kind.
    #[inline]
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    /// Layout revision, bumped on every [`StructDef::redefine`].
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Looks a field up by name, exact spelling first, then ignoring ASCII
    /// case.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied().or_else(|| {
            self.properties
                .iter()
                .position(|p| p.name().eq_ignore_ascii_case(name))
        })
    }
}

// -----------------------------------------------------------------------------
// StructLayoutBuilder

/// Builder of a [`StructLayout`].
///
/// Fields added with [`field`](Self::field) are placed after the previous
/// one at their natural alignment, [`field_at`](Self::field_at) places them
/// explicitly.
///
/// # Examples
///
/// ```
/// use vc_property::info::{NumericKind, Property, PropertyKind, StructLayout};
///
/// let layout = StructLayout::builder("FStats")
///     .field(Property::numeric("Level", NumericKind::UInt8))
///     .field(Property::numeric("Health", NumericKind::Int32))
///     .field_at(Property::new("Alive", PropertyKind::bitfield(0)).unwrap(), 1)
///     .field_at(Property::new("Boss", PropertyKind::bitfield(1)).unwrap(), 1)
///     .build()
///     .unwrap();
///
/// assert_eq!(layout.size(), 8);
/// assert_eq!(layout.properties()[1].offset(), 4);
/// assert_eq!(layout.find("health"), Some(1));
/// ```
#[derive(Debug)]
pub struct StructLayoutBuilder {
    name: String,
    fields: Vec<Property>,
    cursor: usize,
    size: Option<usize>,
}

impl StructLayoutBuilder {
    /// Appends a field at the next aligned offset.
    pub fn field(self, property: Property) -> Self {
        let offset = self.cursor.next_multiple_of(property.align());
        self.field_at_inner(property.with_offset(offset))
    }

    /// Appends a field at `offset`.
    pub fn field_at(self, property: Property, offset: usize) -> Self {
        self.field_at_inner(property.with_offset(offset))
    }

    fn field_at_inner(mut self, property: Property) -> Self {
        self.cursor = self.cursor.max(property.span().1);
        self.fields.push(property);
        self
    }

    /// Forces the instance size, it must cover every field.
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Validates the fields and builds the layout.
    pub fn build(self) -> Result<StructLayout, SerialError> {
        let invalid = |reason| SerialError::InvalidLayout {
            name: self.name.clone(),
            reason,
        };

        let align = self.fields.iter().map(Property::align).max().unwrap_or(1);
        let end = self.fields.iter().map(|p| p.span().1).max().unwrap_or(0);
        let size = match self.size {
            Some(size) if size < end => return Err(invalid("fields exceed the declared size")),
            Some(size) => size,
            None => end.next_multiple_of(align),
        };

        let mut by_name = new_map();
        for (index, property) in self.fields.iter().enumerate() {
            if property.name().is_empty() {
                return Err(invalid("field names cannot be empty"));
            }
            if let PropertyKind::Bool(bit) = property.kind()
                && !bit.is_native()
                && property.array_dim() > 1
            {
                return Err(invalid("bit-field booleans cannot be static arrays"));
            }
            let name: Arc<str> = Arc::from(property.name());
            if by_name.insert(name, index).is_some() {
                return Err(invalid("duplicate field name"));
            }
        }

        for (i, a) in self.fields.iter().enumerate() {
            for b in &self.fields[i + 1..] {
                if overlaps(a, b) {
                    return Err(invalid("overlapping fields"));
                }
            }
        }

        let kind_flags = PropertyFlags::PLAIN_OLD_DATA
            | PropertyFlags::ZERO_CONSTRUCTIBLE
            | PropertyFlags::NO_DESTRUCTOR
            | PropertyFlags::HAS_TYPE_HASH;
        let flags = self
            .fields
            .iter()
            .fold(kind_flags, |acc, p| acc & p.flags());

        Ok(StructLayout {
            size,
            align,
            properties: self.fields,
            by_name,
            flags,
            generation: 0,
        })
    }
}

fn overlaps(a: &Property, b: &Property) -> bool {
    let (a_start, a_end) = a.span();
    let (b_start, b_end) = b.span();
    if a_start >= b_end || b_start >= a_end {
        return false;
    }
    // Bit-field booleans may share a byte when their masks are disjoint.
    match (a.kind(), b.kind()) {
        (PropertyKind::Bool(x), PropertyKind::Bool(y)) => x.byte_mask & y.byte_mask != 0,
        _ => true,
    }
}

// -----------------------------------------------------------------------------
// StructDef

/// A composite type: name, stable guid, current layout and cached schemas.
///
/// The layout can be swapped while readers are active, see
/// [`redefine`](Self::redefine). Readers holding the previous layout or
/// schema keep a consistent snapshot.
#[derive(Debug)]
pub struct StructDef {
    name: String,
    guid: Guid,
    layout: ArcSwap<StructLayout>,
    schemas: SchemaCache,
}

impl StructDef {
    /// Creates a type without stable guid.
    #[inline]
    pub fn new(name: &str, layout: StructLayout) -> Arc<Self> {
        Self::with_guid(name, Guid::ZERO, layout)
    }

    /// Creates a type with a stable guid, used to match renamed types.
    pub fn with_guid(name: &str, guid: Guid, mut layout: StructLayout) -> Arc<Self> {
        layout.generation = 0;
        Arc::new(Self {
            name: name.to_string(),
            guid,
            layout: ArcSwap::from_pointee(layout),
            schemas: SchemaCache::new(),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// A snapshot of the current layout.
    #[inline]
    pub fn layout(&self) -> Arc<StructLayout> {
        self.layout.load_full()
    }

    /// Replaces the layout, cached schemas are rebuilt on next use.
    ///
    /// Descriptors of containing types capture the nested size when they are
    /// built and must be rebuilt when the size changes.
    ///
    /// Concurrent redefinitions are serialized, each one gets the generation
    /// after the layout it replaced.
    pub fn redefine(&self, layout: StructLayout) {
        let previous = self.layout.rcu(|current| {
            let mut next = layout.clone();
            next.generation = current.generation + 1;
            next
        });
        log::debug!(
            "redefined struct `{}` (generation {})",
            self.name,
            previous.generation + 1
        );
    }

    /// Returns the schema of the current layout for `config`.
    #[inline]
    pub fn schema(&self, config: &SerialConfig) -> Arc<Schema> {
        self.schemas
            .get_or_build(self.layout(), config.filter_editor_only)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::StructLayout;
    use crate::error::SerialError;
    use crate::info::{NumericKind, Property, PropertyKind};

    #[test]
    fn auto_offsets_respect_alignment() {
        let layout = StructLayout::builder("FMixed")
            .field(Property::boolean("Flag"))
            .field(Property::numeric("Big", NumericKind::Int64))
            .field(Property::numeric("Small", NumericKind::Int16).with_array_dim(3))
            .build()
            .unwrap();

        let offsets: alloc::vec::Vec<_> = layout.properties().iter().map(|p| p.offset()).collect();
        assert_eq!(offsets, [0, 8, 16]);
        assert_eq!(layout.size(), 24);
        assert_eq!(layout.align(), 8);
    }

    #[test]
    fn rejects_invalid_layouts() {
        let overlap = StructLayout::builder("FBad")
            .field_at(Property::numeric("A", NumericKind::Int32), 0)
            .field_at(Property::numeric("B", NumericKind::Int32), 2)
            .build();
        assert!(matches!(overlap, Err(SerialError::InvalidLayout { .. })));

        let duplicate = StructLayout::builder("FBad")
            .field(Property::numeric("A", NumericKind::Int32))
            .field(Property::numeric("A", NumericKind::Int32))
            .build();
        assert!(duplicate.is_err());

        let shared_bit = StructLayout::builder("FBad")
            .field_at(Property::new("A", PropertyKind::bitfield(3)).unwrap(), 0)
            .field_at(Property::new("B", PropertyKind::bitfield(3)).unwrap(), 0)
            .build();
        assert!(shared_bit.is_err());

        let too_small = StructLayout::builder("FBad")
            .field(Property::numeric("A", NumericKind::Int64))
            .size(4)
            .build();
        assert!(too_small.is_err());
    }

    #[test]
    fn concurrent_redefines_keep_the_newest_generation() {
        extern crate std;

        use crate::config::SerialConfig;
        use crate::info::StructDef;

        let build = |width: usize| {
            StructLayout::builder("FHot")
                .field(Property::numeric("Value", NumericKind::Int32).with_array_dim(width))
                .build()
                .unwrap()
        };
        let def = StructDef::new("FHot", build(1));

        std::thread::scope(|scope| {
            for width in 1..=8 {
                let def = &def;
                scope.spawn(move || def.redefine(build(width)));
            }
        });

        let layout = def.layout();
        assert_eq!(layout.generation(), 8);
        let schema = def.schema(&SerialConfig::DEFAULT);
        assert_eq!(schema.generation(), 8);
        assert_eq!(schema.entries().len(), 1);
    }
}
