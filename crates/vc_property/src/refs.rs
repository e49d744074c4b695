//! Object references and the policy for resolving them.
//!
//! The host object model is out of scope, references are opaque
//! [`ObjectHandle`]s. How a reference is stored, written and discovered
//! depends on its [`ReferenceMode`]:
//!
//! | mode | slot | on the wire | discovery |
//! |---|---|---|---|
//! | `Strong` | handle (8) | archive hook | always visited |
//! | `Weak` | handle (8) | archive hook | only with `REWRITE_WEAK_AND_STRONG` |
//! | `Lazy` | guid (16) + cached handle (8) | guid | never |
//! | `Soft` | path slot (4) + pad (4) + cached handle (8) | path | path reported |
//!
//! Lazy and soft references are resolved on first access through an
//! [`ObjectResolver`], never while loading (soft paths may opt in through
//! `RESOLVE_SOFT`).

use alloc::string::String;

use vc_ptr::{Memory, Ptr};

use crate::error::SerialError;
use crate::info::{Guid, text};

// -----------------------------------------------------------------------------
// ObjectHandle

/// An opaque handle to a host object, `0` is null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectHandle(pub u64);

impl ObjectHandle {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

// -----------------------------------------------------------------------------
// ReferenceMode

/// Ownership strength of an object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceMode {
    Strong,
    Weak,
    Lazy,
    Soft,
}

impl ReferenceMode {
    const LAZY_CACHE: usize = 16;
    const SOFT_CACHE: usize = 8;

    /// Size of a reference slot of this mode.
    #[inline]
    pub const fn slot_size(self) -> usize {
        match self {
            Self::Strong | Self::Weak => 8,
            Self::Lazy => 24,
            Self::Soft => 16,
        }
    }

    /// Offset of the live handle inside the slot.
    #[inline]
    const fn handle_offset(self) -> usize {
        match self {
            Self::Strong | Self::Weak => 0,
            Self::Lazy => Self::LAZY_CACHE,
            Self::Soft => Self::SOFT_CACHE,
        }
    }
}

// -----------------------------------------------------------------------------
// Collaborators

/// Maps persistent identities back to live objects.
pub trait ObjectResolver {
    /// Resolves the stable id of a lazy reference.
    fn resolve_guid(&self, guid: Guid) -> Option<ObjectHandle>;

    /// Resolves the path of a soft reference.
    fn resolve_path(&self, path: &str) -> Option<ObjectHandle>;
}

/// Receives the references found by a discovery pass.
///
/// The visitor may replace `handle`, the new value is written back.
pub trait ReferenceVisitor {
    fn visit(&mut self, mode: ReferenceMode, handle: &mut ObjectHandle);

    /// Called with the path of every non-empty soft reference.
    fn visit_soft_path(&mut self, path: &str) {
        let _ = path;
    }
}

// -----------------------------------------------------------------------------
// Identity access

/// Reads the live handle of the reference at `ptr`.
///
/// For lazy and soft references this is the cached handle, which stays
/// null until [`resolve_lazy`] or [`resolve_soft`] runs.
#[inline]
pub fn get_identity(
    memory: &Memory,
    mode: ReferenceMode,
    ptr: Ptr,
) -> Result<ObjectHandle, SerialError> {
    let raw = memory.read_u64(ptr.byte_add(mode.handle_offset()))?;
    Ok(ObjectHandle(raw))
}

/// Writes the live handle of the reference at `ptr`.
#[inline]
pub fn set_identity(
    memory: &mut Memory,
    mode: ReferenceMode,
    ptr: Ptr,
    handle: ObjectHandle,
) -> Result<(), SerialError> {
    memory.write_u64(ptr.byte_add(mode.handle_offset()), handle.0)?;
    Ok(())
}

/// Reads the stable id of a lazy reference.
#[inline]
pub fn lazy_guid(memory: &Memory, ptr: Ptr) -> Result<Guid, SerialError> {
    Ok(Guid::from_bytes(memory.read_array(ptr)?))
}

/// Points a lazy reference at `guid` and drops the cached handle.
pub fn set_lazy_guid(memory: &mut Memory, ptr: Ptr, guid: Guid) -> Result<(), SerialError> {
    memory.write(ptr, &guid.to_bytes())?;
    set_identity(memory, ReferenceMode::Lazy, ptr, ObjectHandle::NULL)
}

/// Reads the path of a soft reference, empty if unset.
#[inline]
pub fn soft_path(memory: &Memory, ptr: Ptr) -> Result<String, SerialError> {
    text::read(memory, ptr)
}

/// Points a soft reference at `path` and drops the cached handle.
pub fn set_soft_path(memory: &mut Memory, ptr: Ptr, path: &str) -> Result<(), SerialError> {
    text::write(memory, ptr, path)?;
    set_identity(memory, ReferenceMode::Soft, ptr, ObjectHandle::NULL)
}

/// Returns the object a lazy reference points to, resolving it on first
/// access.
///
/// A resolved handle is cached in the slot, later calls do not consult the
/// resolver again.
pub fn resolve_lazy(
    memory: &mut Memory,
    ptr: Ptr,
    resolver: &dyn ObjectResolver,
) -> Result<ObjectHandle, SerialError> {
    let cached = get_identity(memory, ReferenceMode::Lazy, ptr)?;
    if !cached.is_null() {
        return Ok(cached);
    }
    let guid = lazy_guid(memory, ptr)?;
    if guid.is_zero() {
        return Ok(ObjectHandle::NULL);
    }
    let handle = resolver.resolve_guid(guid).unwrap_or_default();
    set_identity(memory, ReferenceMode::Lazy, ptr, handle)?;
    Ok(handle)
}

/// Returns the object a soft reference points to, resolving and caching it
/// on first access.
pub fn resolve_soft(
    memory: &mut Memory,
    ptr: Ptr,
    resolver: &dyn ObjectResolver,
) -> Result<ObjectHandle, SerialError> {
    let cached = get_identity(memory, ReferenceMode::Soft, ptr)?;
    if !cached.is_null() {
        return Ok(cached);
    }
    let path = soft_path(memory, ptr)?;
    if path.is_empty() {
        return Ok(ObjectHandle::NULL);
    }
    let handle = resolver.resolve_path(&path).unwrap_or_default();
    set_identity(memory, ReferenceMode::Soft, ptr, handle)?;
    Ok(handle)
}

// -----------------------------------------------------------------------------
// Tests
