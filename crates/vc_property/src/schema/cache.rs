//! Lock-free storage of the schemas of one struct type.
//!
//! There is one slot per editor-filtering mode. The first reader of a slot
//! builds the schema and publishes it with a single compare-and-swap from
//! empty. Concurrent builders lose the race and adopt the published schema,
//! no reader ever observes a half-built schema.
//!
//! After [`StructDef::redefine`](crate::info::StructDef::redefine) the
//! published schema is stale (older generation) and is replaced the same way,
//! by a compare-and-swap against the stale value.

use alloc::sync::Arc;

use arc_swap::ArcSwapOption;

use super::Schema;
use crate::info::StructLayout;

/// Per-type schema cache, see the [module docs](self).
#[derive(Debug)]
pub struct SchemaCache {
    slots: [ArcSwapOption<Schema>; 2],
}

impl SchemaCache {
    #[inline]
    pub fn new() -> Self {
        Self {
            slots: [ArcSwapOption::empty(), ArcSwapOption::empty()],
        }
    }

    /// Returns the published schema for `layout`, building it if the slot is
    /// empty or holds an older generation.
    pub fn get_or_build(&self, layout: Arc<StructLayout>, filter_editor_only: bool) -> Arc<Schema> {
        let slot = &self.slots[filter_editor_only as usize];
        loop {
            let current = slot.load_full();
            if let Some(schema) = &current
                && schema.generation() >= layout.generation()
            {
                return schema.clone();
            }

            let candidate = Arc::new(Schema::build(layout.clone(), filter_editor_only));
            let previous = slot.compare_and_swap(&current, Some(candidate.clone()));
            let won = match (&*previous, &current) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            if won {
                log::trace!(
                    "published schema ({} entries, generation {}, editor filter {})",
                    candidate.len(),
                    candidate.generation(),
                    filter_editor_only,
                );
                return candidate;
            }
            // Lost the race, the winner is either current or newer.
        }
    }

    /// Drops every published schema.
    pub fn invalidate(&self) {
        for slot in &self.slots {
            slot.store(None);
        }
    }
}

impl Default for SchemaCache {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// Tests
