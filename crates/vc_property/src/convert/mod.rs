//! Loading tagged fields whose saved type differs from the current one.
//!
//! When a [`FieldTag`] does not match its property, the tagged codec calls
//! [`Property::convert_from_legacy`] with the archive positioned at the
//! saved payload. Whatever the outcome, the codec then seeks to the end of
//! the declared payload.
//!
//! Built-in rules cover numeric widening and narrowing, booleans, enum names,
//! names and strings, strong and weak references, containers whose element
//! types changed and renamed structs. A [`ConversionRegistry`] supplies the
//! struct rename table, the enums used to resolve names into plain numbers and
//! user [`Converter`]s, which run before the built-in rules.
//!
//! [`FieldTag`]: crate::codec::FieldTag
//! [`Property::convert_from_legacy`]: crate::info::Property::convert_from_legacy

// -----------------------------------------------------------------------------
// Modules

mod legacy;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use vc_ptr::{Memory, Ptr};

use crate::archive::Archive;
use crate::codec::{FieldTag, SerialContext};
use crate::error::SerialError;
use crate::hash::{HashMap, new_map};
use crate::info::{EnumDef, Property, WireType};

// -----------------------------------------------------------------------------
// ConvertResult

/// Outcome of a conversion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertResult {
    /// The destination holds the converted value.
    Converted,
    /// The payload cannot be converted, the destination is unchanged.
    CannotConvert,
    /// The payload is readable by the generic path of the property.
    UseGeneric,
}

// -----------------------------------------------------------------------------
// Converter

/// A user conversion between two tag types.
///
/// The archive is positioned at the saved payload of `tag`. Implementations
/// read it and store the result at `dst`, an element of `property`.
pub trait Converter: Send + Sync {
    fn convert(
        &self,
        cx: &mut SerialContext<'_>,
        tag: &FieldTag,
        archive: &mut dyn Archive,
        memory: &mut Memory,
        property: &Property,
        dst: Ptr,
    ) -> Result<ConvertResult, SerialError>;
}

// -----------------------------------------------------------------------------
// ConversionRegistry

/// Host-supplied tables consulted while converting legacy fields.
///
/// Names are matched case-insensitively.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use vc_property::convert::ConversionRegistry;
/// use vc_property::info::EnumDef;
///
/// let mut registry = ConversionRegistry::new();
/// registry.rename_struct("FOldTransform", "FTransform");
/// registry.register_enum(Arc::new(EnumDef::new("EFaction", [("Red", 0), ("Blue", 1)])));
///
/// assert_eq!(registry.struct_rename("foldtransform"), Some("FTransform"));
/// assert!(registry.find_enum("EFaction").is_some());
/// ```
pub struct ConversionRegistry {
    renames: HashMap<String, String>,
    enums: HashMap<String, Arc<EnumDef>>,
    converters: HashMap<(WireType, WireType), Box<dyn Converter>>,
}

impl Default for ConversionRegistry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self {
            renames: new_map(),
            enums: new_map(),
            converters: new_map(),
        }
    }

    /// Loads structs saved as `old` into fields of struct `new`.
    pub fn rename_struct(&mut self, old: &str, new: &str) {
        self.renames.insert(old.to_ascii_lowercase(), String::from(new));
    }

    /// The current name of a struct saved as `old`.
    pub fn struct_rename(&self, old: &str) -> Option<&str> {
        self.renames.get(&old.to_ascii_lowercase()).map(String::as_str)
    }

    /// Makes `def` available to resolve enumerator names saved into fields
    /// that are now plain numbers.
    pub fn register_enum(&mut self, def: Arc<EnumDef>) {
        self.enums.insert(def.name().to_ascii_lowercase(), def);
    }

    pub fn find_enum(&self, name: &str) -> Option<&Arc<EnumDef>> {
        self.enums.get(&name.to_ascii_lowercase())
    }

    /// Registers a converter from tags of type `from` into properties of
    /// type `to`, replacing any previous one.
    pub fn register_converter(&mut self, from: WireType, to: WireType, converter: impl Converter + 'static) {
        if self.converters.insert((from, to), Box::new(converter)).is_some() {
            log::debug!("replaced converter from {from} to {to}");
        }
    }

    #[inline]
    pub fn converter(&self, from: WireType, to: WireType) -> Option<&dyn Converter> {
        self.converters.get(&(from, to)).map(Box::as_ref)
    }
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRegistry")
            .field("renames", &self.renames)
            .field("enums", &self.enums.keys())
            .field("converters", &self.converters.keys())
            .finish()
    }
}
