//! Flattened, cached field lists of composite types.
//!
//! A [`Schema`] is the ordered list of serializable values of a struct: one
//! [`SchemaEntry`] per static array element, editor-only fields excluded in
//! shipping configurations. Both codecs iterate it, the unversioned codec
//! additionally addresses fields by their position in it.

mod cache;

pub use cache::SchemaCache;

use alloc::sync::Arc;
use alloc::vec::Vec;

use vc_ptr::Ptr;

use crate::info::{Property, StructLayout};

// -----------------------------------------------------------------------------
// SchemaEntry

/// One serializable value: a field element and its offset in the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaEntry {
    /// Index of the field in [`StructLayout::properties`].
    pub property: usize,
    /// Element of a static array, `0` for plain fields.
    pub array_index: usize,
    /// Offset of the element inside the instance.
    pub offset: usize,
}

// -----------------------------------------------------------------------------
// Schema

/// The immutable schema of one layout generation.
#[derive(Debug)]
pub struct Schema {
    layout: Arc<StructLayout>,
    entries: Vec<SchemaEntry>,
    filter_editor_only: bool,
}

impl Schema {
    /// Flattens `layout`, dropping editor-only fields if requested.
    pub fn build(layout: Arc<StructLayout>, filter_editor_only: bool) -> Self {
        let entries = layout
            .properties()
            .iter()
            .enumerate()
            .filter(|(_, p)| !(filter_editor_only && p.is_editor_only()))
            .flat_map(|(property, p)| {
                (0..p.array_dim()).map(move |array_index| SchemaEntry {
                    property,
                    array_index,
                    offset: p.offset() + array_index * p.element_size(),
                })
            })
            .collect();

        Self {
            layout,
            entries,
            filter_editor_only,
        }
    }

    #[inline]
    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The layout this schema was built from.
    #[inline]
    pub fn layout(&self) -> &Arc<StructLayout> {
        &self.layout
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.layout.generation()
    }

    #[inline]
    pub fn filters_editor_only(&self) -> bool {
        self.filter_editor_only
    }

    /// The descriptor of `entry`.
    #[inline]
    pub fn property(&self, entry: &SchemaEntry) -> &Property {
        &self.layout.properties()[entry.property]
    }

    /// Address of the value of `entry` inside the instance at `base`.
    #[inline]
    pub fn value_ptr(entry: &SchemaEntry, base: Ptr) -> Ptr {
        base.byte_add(entry.offset)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use super::Schema;
    use crate::info::{NumericKind, Property, StructLayout};

    #[test]
    fn flattens_and_filters() {
        let layout = StructLayout::builder("FScores")
            .field(Property::numeric("Best", NumericKind::Int32).with_array_dim(3))
            .field(Property::numeric("Debug", NumericKind::Int32).editor_only())
            .field(Property::numeric("Last", NumericKind::Int16))
            .build()
            .unwrap();
        let layout = Arc::new(layout);

        let editor = Schema::build(layout.clone(), false);
        let offsets: Vec<_> = editor.entries().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, [0, 4, 8, 12, 16]);

        let shipping = Schema::build(layout, true);
        let fields: Vec<_> = shipping
            .entries()
            .iter()
            .map(|e| (shipping.property(e).name(), e.array_index))
            .collect();
        assert_eq!(fields, [("Best", 0), ("Best", 1), ("Best", 2), ("Last", 0)]);
    }
}
