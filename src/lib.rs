//! Reflective property serialization.
//!
//! This crate re-exports the workspace members:
//!
//! - [`ptr`]: the bounds-checked memory arena that holds opaque values.
//! - [`property`]: property descriptors, containers, schemas and the
//!   tagged and unversioned codecs.
//!
//! # Examples
//!
//! ```
//! use vc_serial::property::codec::{self, Format, SerialContext};
//! use vc_serial::property::config::SerialConfig;
//! use vc_serial::property::info::{NumericKind, Property, StructDef, StructLayout};
//! use vc_serial::ptr::{Memory, Ptr};
//!
//! let def = StructDef::new(
//!     "FStats",
//!     StructLayout::builder("FStats")
//!         .field(Property::numeric("Speed", NumericKind::Float))
//!         .field(Property::boolean("Boosted"))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let mut memory = Memory::new();
//! let stats = Ptr::start(memory.alloc(def.layout().size()));
//! memory.write_f32(stats, 2.5).unwrap();
//!
//! let config = SerialConfig::default();
//! let mut cx = SerialContext::new(&config, Format::Unversioned);
//! let bytes = codec::save_unversioned(&mut cx, &def, &mut memory, stats, None).unwrap();
//!
//! let copy = Ptr::start(memory.alloc(def.layout().size()));
//! codec::load_unversioned(&mut cx, &def, &mut memory, copy, None, &bytes).unwrap();
//! assert_eq!(memory.read_f32(copy).unwrap(), 2.5);
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

pub use vc_property as property;
pub use vc_ptr as ptr;
