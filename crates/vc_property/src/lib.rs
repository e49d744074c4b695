//! Schema-driven serialization of opaque property memory.
//!
//! Values live in a [`Memory`](vc_ptr::Memory) arena and are described at
//! runtime by [`Property`] descriptors grouped into [`StructDef`]s. No Rust
//! type of the described value is ever known; every operation walks the
//! descriptors.
//!
//! **Descriptors**
//!
//! - [`info`]: property kinds, struct layouts, enum tables and wire type ids.
//! - [`schema`]: the ordered, optionally editor-filtered field list of a
//!   struct, built lazily and cached per struct.
//!
//! **Values**
//!
//! - [`ops`]: init, destroy, copy, clear, identity, hashing, zero tests.
//! - [`containers`]: arrays, sets and maps over opaque elements.
//! - [`refs`]: object handles, lazy ids and soft paths.
//!
//! **Streams**
//!
//! - [`archive`]: the byte stream abstraction, buffers and the reference
//!   collector.
//! - [`codec`]: the tagged and unversioned struct formats.
//! - [`convert`]: loading fields whose saved type no longer matches.
//!
//! Recoverable problems met while loading are collected as
//! [`Diagnostic`]s on the [`SerialContext`] and logged through `log`,
//! hard failures are returned as [`SerialError`].
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod archive;
pub mod codec;
pub mod config;
pub mod containers;
pub mod convert;
pub mod error;
pub mod hash;
pub mod info;
pub mod ops;
pub mod refs;
pub mod schema;

// -----------------------------------------------------------------------------
// Top-level exports

pub use archive::{Archive, ArchiveExt, ArchiveMode};
pub use codec::{Format, SerialContext};
pub use config::SerialConfig;
pub use convert::ConversionRegistry;
pub use error::{Diagnostic, SerialError};
pub use info::{Property, PropertyKind, StructDef, StructLayout};
