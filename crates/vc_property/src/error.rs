//! Hard failures ([`SerialError`]) and recovered problems ([`Diagnostic`]).
//!
//! A [`SerialError`] aborts the enclosing struct read and is returned to the
//! caller. A [`Diagnostic`] is contained to a single field: the field keeps a
//! well-defined value, the problem is logged and collected in the
//! [`SerialContext`](crate::codec::SerialContext).

use alloc::string::String;

use thiserror::Error;
use vc_ptr::MemoryError;

// -----------------------------------------------------------------------------
// SerialError

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SerialError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("unexpected end of archive: {needed} bytes requested at offset {offset}, archive holds {len}")]
    UnexpectedEof { offset: u64, needed: usize, len: u64 },

    #[error("cannot seek to {pos}, archive holds {len} bytes")]
    Seek { pos: u64, len: u64 },

    #[error("unknown field type `{name}` at archive offset {offset}")]
    UnknownWireType { offset: u64, name: String },

    #[error("malformed string at archive offset {offset}")]
    InvalidString { offset: u64 },

    #[error("invalid length {len} at archive offset {offset}")]
    InvalidLength { offset: u64, len: i64 },

    #[error("unversioned header of `{ty}` addresses {found} fields, the schema has {expected}")]
    SchemaMismatch {
        ty: String,
        expected: usize,
        found: usize,
    },

    #[error("field `{field}` declared {declared} bytes but {consumed} were consumed")]
    TruncatedStream {
        field: String,
        declared: u64,
        consumed: u64,
    },

    #[error("container is backed by a frozen memory image")]
    FrozenContainer,

    #[error("index {index} is out of range for a container of {len} elements")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid layout for `{name}`: {reason}")]
    InvalidLayout { name: String, reason: &'static str },

    #[error("operation not supported by this archive: {0}")]
    Unsupported(&'static str),
}

// -----------------------------------------------------------------------------
// Diagnostic

/// A recovered, per-field problem found while loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Diagnostic {
    #[error("`{field}`: `{name}` is not an enumerator of `{enum_name}`, loaded as {sentinel}")]
    UnresolvedEnumerator {
        field: String,
        enum_name: String,
        name: String,
        sentinel: i64,
    },

    #[error("`{field}`: {value} is not a value of `{enum_name}`, loaded as {sentinel}")]
    UnknownEnumValue {
        field: String,
        enum_name: String,
        value: i64,
        sentinel: i64,
    },

    #[error("`{field}`: cannot convert {from} into {to}, value left unchanged")]
    TypeConversionFailed {
        field: String,
        from: String,
        to: String,
    },

    #[error("`{field}`: conversion from {from} into {to} lost information")]
    LossyConversion {
        field: String,
        from: String,
        to: String,
    },

    #[error("`{field}` does not exist in `{ty}`, skipped {size} bytes")]
    UnknownField {
        field: String,
        ty: String,
        size: u64,
    },

    #[error("`{field}`: array index {index} is out of range for dimension {dim}")]
    ArrayIndexOutOfRange {
        field: String,
        index: i32,
        dim: usize,
    },

    #[error("`{field}` declared {declared} bytes but {consumed} were consumed, field cleared (data model regression?)")]
    TruncatedStream {
        field: String,
        declared: u64,
        consumed: u64,
    },

    #[error("`{field}`: saved struct `{from}` does not match `{to}`, field dropped")]
    StructDropped {
        field: String,
        from: String,
        to: String,
    },

    #[error("`{field}`: element conversion from {from} failed, container emptied")]
    ContainerConversionAborted { field: String, from: String },
}

impl Diagnostic {
    /// Returns the field path this diagnostic refers to.
    pub fn field(&self) -> &str {
        match self {
            Self::UnresolvedEnumerator { field, .. }
            | Self::UnknownEnumValue { field, .. }
            | Self::TypeConversionFailed { field, .. }
            | Self::LossyConversion { field, .. }
            | Self::UnknownField { field, .. }
            | Self::ArrayIndexOutOfRange { field, .. }
            | Self::TruncatedStream { field, .. }
            | Self::StructDropped { field, .. }
            | Self::ContainerConversionAborted { field, .. } => field,
        }
    }

    /// Returns the `log` level this diagnostic is reported with.
    pub const fn level(&self) -> log::Level {
        match self {
            Self::TruncatedStream { .. } => log::Level::Error,
            Self::UnknownField { .. } => log::Level::Debug,
            _ => log::Level::Warn,
        }
    }
}
