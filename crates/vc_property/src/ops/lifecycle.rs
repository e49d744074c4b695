use vc_ptr::{Memory, Ptr};

use super::{read_bool, write_bool};
use crate::containers::{ArrayView, HashedView, MapView, SetView};
use crate::error::SerialError;
use crate::info::{Property, PropertyFlags, PropertyKind, StructLayout, text};
use crate::refs::ReferenceMode;

/// Offset of the function name inside a delegate slot.
pub(crate) const DELEGATE_NAME: usize = 8;

impl Property {
    /// Constructs a default value in zeroed or uninitialized storage.
    ///
    /// Every kind defaults to all-zero bytes, a bit-field boolean only clears
    /// its own bits.
    pub fn init(&self, memory: &mut Memory, ptr: Ptr) -> Result<(), SerialError> {
        match self.kind() {
            PropertyKind::Bool(layout) => write_bool(memory, ptr, *layout, false),
            _ => Ok(memory.fill(ptr, self.element_size(), 0)?),
        }
    }

    /// Releases every block owned by the value and zeroes it.
    pub fn destroy(&self, memory: &mut Memory, ptr: Ptr) -> Result<(), SerialError> {
        if self.flags().contains(PropertyFlags::NO_DESTRUCTOR) {
            return self.init(memory, ptr);
        }
        match self.kind() {
            PropertyKind::Name | PropertyKind::String => text::clear(memory, ptr)?,
            PropertyKind::Reference(_) => text::clear(memory, ptr)?,
            PropertyKind::Delegate => text::clear(memory, ptr.byte_add(DELEGATE_NAME))?,
            PropertyKind::Array(_) | PropertyKind::MulticastDelegate => {
                self.with_array(ptr, |array| array.empty(memory))?;
            }
            PropertyKind::Set(element) => {
                SetView::new(element, ptr, self.backing()).empty(memory)?;
            }
            PropertyKind::Map { key, value, layout } => {
                MapView::new(key, value, *layout, ptr, self.backing()).empty(memory)?;
            }
            PropertyKind::Struct(def) => {
                let layout = def.layout();
                for_each_field(&layout, ptr, |field, at| field.destroy(memory, at))?;
            }
            PropertyKind::Bool(_) | PropertyKind::Numeric(_) | PropertyKind::Enum(_) => {}
        }
        self.init(memory, ptr)
    }

    /// Resets the value to its default, releasing owned blocks.
    #[inline]
    pub fn clear(&self, memory: &mut Memory, ptr: Ptr) -> Result<(), SerialError> {
        self.destroy(memory, ptr)
    }

    /// Deep-copies the value at `src` over the value at `dst`.
    pub fn copy(&self, memory: &mut Memory, dst: Ptr, src: Ptr) -> Result<(), SerialError> {
        if dst == src {
            return Ok(());
        }
        match self.kind() {
            PropertyKind::Bool(layout) => {
                let value = read_bool(memory, src, *layout)?;
                write_bool(memory, dst, *layout, value)
            }
            _ if self.is_pod() => Ok(memory.copy(dst, src, self.element_size())?),
            PropertyKind::Name | PropertyKind::String => text::copy(memory, dst, src),
            PropertyKind::Reference(mode) => {
                debug_assert_eq!(*mode, ReferenceMode::Soft);
                text::copy(memory, dst, src)?;
                Ok(memory.copy(dst.byte_add(8), src.byte_add(8), 8)?)
            }
            PropertyKind::Delegate => {
                memory.copy(dst, src, 8)?;
                text::copy(memory, dst.byte_add(DELEGATE_NAME), src.byte_add(DELEGATE_NAME))
            }
            PropertyKind::Array(_) | PropertyKind::MulticastDelegate => self.with_array(dst, |to| {
                self.with_array(src, |from| to.copy_from(memory, &from))
            }),
            PropertyKind::Set(element) => {
                let from = SetView::new(element, src, self.backing());
                SetView::new(element, dst, self.backing()).copy_from(memory, &from)
            }
            PropertyKind::Map { key, value, layout } => {
                let from: HashedView<'_> = *MapView::new(key, value, *layout, src, self.backing());
                MapView::new(key, value, *layout, dst, self.backing()).copy_from(memory, &from)
            }
            PropertyKind::Struct(def) => {
                let layout = def.layout();
                for field in layout.properties() {
                    for index in 0..field.array_dim() {
                        field.copy(memory, field.value_ptr(dst, index), field.value_ptr(src, index))?;
                    }
                }
                Ok(())
            }
            PropertyKind::Numeric(_) | PropertyKind::Enum(_) => {
                Ok(memory.copy(dst, src, self.element_size())?)
            }
        }
    }

    /// Runs `f` with an array view of the array or multicast slot at `ptr`.
    pub(crate) fn with_array<R>(&self, ptr: Ptr, f: impl FnOnce(ArrayView<'_>) -> R) -> R {
        match self.kind() {
            PropertyKind::Array(inner) => f(ArrayView::new(inner, ptr, self.backing())),
            _ => {
                let inner = delegate_element();
                f(ArrayView::new(&inner, ptr, self.backing()))
            }
        }
    }
}

/// The element descriptor of multicast delegates.
fn delegate_element() -> Property {
    Property::unchecked("", PropertyKind::Delegate)
}

/// Calls `f` for every element of every field of a struct instance.
fn for_each_field(
    layout: &StructLayout,
    base: Ptr,
    mut f: impl FnMut(&Property, Ptr) -> Result<(), SerialError>,
) -> Result<(), SerialError> {
    for field in layout.properties() {
        for index in 0..field.array_dim() {
            f(field, field.value_ptr(base, index))?;
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Tests
