//! Byte archives and the discovery pass.
//!
//! An [`Archive`] is a seekable byte stream with a direction
//! ([`ArchiveMode`]) and policy flags. The codecs are bidirectional: the same
//! code path saves or loads depending on the mode. [`ArchiveMode::Collect`]
//! moves no bytes, it walks the value graph and reports object references.
//!
//! - [`ArchiveWriter`]: growable in-memory output, seekable for backpatching.
//! - [`ArchiveReader`]: input over a borrowed byte slice.
//! - [`ReferenceCollector`]: forwards references to a [`ReferenceVisitor`].
//!
//! [`ArchiveExt`] adds typed helpers (fixed-width numbers, strings, guids) to
//! every archive.
//!
//! [`ReferenceVisitor`]: crate::refs::ReferenceVisitor

// -----------------------------------------------------------------------------
// Modules

mod buffer;
mod collector;

// -----------------------------------------------------------------------------
// Exports

pub use buffer::{ArchiveReader, ArchiveWriter};
pub use collector::ReferenceCollector;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::SerialError;
use crate::info::Guid;
use crate::refs::{ObjectHandle, ObjectResolver, ReferenceMode};

// -----------------------------------------------------------------------------
// ArchiveMode & ArchiveFlags

/// Direction of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveMode {
    Save,
    Load,
    /// Reference discovery, no bytes are moved.
    Collect,
}

bitflags::bitflags! {
    /// Reference policy of an archive.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ArchiveFlags: u32 {
        /// Discovery also visits weak references, visitors may rewrite them.
        const REWRITE_WEAK_AND_STRONG = 1 << 0;
        /// Soft references are resolved to live handles while visited or
        /// loaded.
        const RESOLVE_SOFT = 1 << 1;
    }
}

// -----------------------------------------------------------------------------
// Archive

/// A bidirectional, seekable byte stream.
///
/// Reading past the end fails with [`SerialError::UnexpectedEof`].
pub trait Archive {
    fn mode(&self) -> ArchiveMode;

    #[inline]
    fn flags(&self) -> ArchiveFlags {
        ArchiveFlags::empty()
    }

    /// Fills `buf` from the current position.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), SerialError>;

    /// Writes `bytes` at the current position, overwriting or extending.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// Current position.
    fn tell(&self) -> u64;

    fn seek(&mut self, pos: u64) -> Result<(), SerialError>;

    /// Length of the stream in bytes.
    fn total_size(&self) -> u64;

    /// Saves, loads or reports a strong or weak object handle.
    ///
    /// The default encoding is the raw `u64` handle, collection is a no-op.
    fn serialize_object(
        &mut self,
        mode: ReferenceMode,
        handle: &mut ObjectHandle,
    ) -> Result<(), SerialError> {
        let _ = mode;
        match self.mode() {
            ArchiveMode::Save => self.write_bytes(&handle.0.to_le_bytes()),
            ArchiveMode::Load => {
                let mut raw = [0; 8];
                self.read_bytes(&mut raw)?;
                *handle = ObjectHandle(u64::from_le_bytes(raw));
                Ok(())
            }
            ArchiveMode::Collect => Ok(()),
        }
    }

    /// Called with every non-empty soft path met during discovery.
    #[inline]
    fn visit_soft_path(&mut self, path: &str) {
        let _ = path;
    }

    /// Resolver for lazy ids and soft paths, if the host supplied one.
    #[inline]
    fn resolver(&self) -> Option<&dyn ObjectResolver> {
        None
    }

    #[inline]
    fn is_saving(&self) -> bool {
        self.mode() == ArchiveMode::Save
    }

    #[inline]
    fn is_loading(&self) -> bool {
        self.mode() == ArchiveMode::Load
    }
}

// -----------------------------------------------------------------------------
// ArchiveExt

macro_rules! impl_fixed_io {
    ($($read:ident, $write:ident => $ty:ty;)*) => {$(
        #[doc = concat!("Reads a little-endian `", stringify!($ty), "`.")]
        #[inline]
        fn $read(&mut self) -> Result<$ty, SerialError> {
            let mut raw = [0; size_of::<$ty>()];
            self.read_bytes(&mut raw)?;
            Ok(<$ty>::from_le_bytes(raw))
        }

        #[doc = concat!("Writes a little-endian `", stringify!($ty), "`.")]
        #[inline]
        fn $write(&mut self, value: $ty) -> Result<(), SerialError> {
            self.write_bytes(&value.to_le_bytes())
        }
    )*};
}

/// Typed helpers over [`Archive`], implemented for every archive.
///
/// # Examples
///
/// ```
/// use vc_property::archive::{ArchiveExt, ArchiveReader, ArchiveWriter};
///
/// let mut writer = ArchiveWriter::new();
/// writer.write_i32(-7).unwrap();
/// writer.write_string("Hero").unwrap();
///
/// let bytes = writer.into_inner();
/// assert_eq!(bytes.len(), 4 + 4 + 5);
///
/// let mut reader = ArchiveReader::new(&bytes);
/// assert_eq!(reader.read_i32().unwrap(), -7);
/// assert_eq!(reader.read_string().unwrap(), "Hero");
/// ```
pub trait ArchiveExt: Archive {
    impl_fixed_io! {
        read_u8, write_u8 => u8;
        read_u16, write_u16 => u16;
        read_u32, write_u32 => u32;
        read_u64, write_u64 => u64;
        read_i8, write_i8 => i8;
        read_i16, write_i16 => i16;
        read_i32, write_i32 => i32;
        read_i64, write_i64 => i64;
        read_f32, write_f32 => f32;
        read_f64, write_f64 => f64;
    }

    /// Reads a wire string.
    ///
    /// The `i32` length counts the trailing NUL, `0` is the empty string. A
    /// negative length announces UTF-16LE code units.
    fn read_string(&mut self) -> Result<String, SerialError> {
        let offset = self.tell();
        let len = self.read_i32()?;
        if len == 0 {
            return Ok(String::new());
        }
        let units = len.unsigned_abs() as usize;
        let width = if len < 0 { 2 } else { 1 };
        let remaining = self.total_size().saturating_sub(self.tell());
        if (units * width) as u64 > remaining {
            return Err(SerialError::InvalidLength {
                offset,
                len: len.into(),
            });
        }

        let mut raw = vec![0; units * width];
        self.read_bytes(&mut raw)?;
        let invalid = || SerialError::InvalidString { offset };

        if len > 0 {
            let Some((&0, text)) = raw.split_last() else {
                return Err(invalid());
            };
            String::from_utf8(text.to_vec()).map_err(|_| invalid())
        } else {
            let mut wide: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            if wide.pop() != Some(0) {
                return Err(invalid());
            }
            String::from_utf16(&wide).map_err(|_| invalid())
        }
    }

    /// Writes a wire string, UTF-8 with trailing NUL.
    fn write_string(&mut self, value: &str) -> Result<(), SerialError> {
        if value.is_empty() {
            return self.write_i32(0);
        }
        let len = i32::try_from(value.len() + 1).map_err(|_| SerialError::InvalidLength {
            offset: self.tell(),
            len: value.len() as i64,
        })?;
        self.write_i32(len)?;
        self.write_bytes(value.as_bytes())?;
        self.write_u8(0)
    }

    #[inline]
    fn read_guid(&mut self) -> Result<Guid, SerialError> {
        let mut raw = [0; 16];
        self.read_bytes(&mut raw)?;
        Ok(Guid::from_bytes(raw))
    }

    #[inline]
    fn write_guid(&mut self, guid: Guid) -> Result<(), SerialError> {
        self.write_bytes(&guid.to_bytes())
    }

    /// Moves the position by `count` bytes.
    #[inline]
    fn skip(&mut self, count: u64) -> Result<(), SerialError> {
        let pos = self.tell() + count;
        self.seek(pos)
    }
}

impl<A: Archive + ?Sized> ArchiveExt for A {}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{ArchiveExt, ArchiveReader, ArchiveWriter};
    use crate::error::SerialError;

    #[test]
    fn empty_string_is_length_zero() {
        let mut writer = ArchiveWriter::new();
        writer.write_string("").unwrap();
        assert_eq!(writer.as_bytes(), &[0, 0, 0, 0]);
    }

    #[test]
    fn utf16_strings() {
        let mut bytes = (-3i32).to_le_bytes().to_vec();
        for unit in "Hi\0".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let mut reader = ArchiveReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "Hi");
    }

    #[test]
    fn rejects_oversized_lengths() {
        let bytes = 1000i32.to_le_bytes();
        let mut reader = ArchiveReader::new(&bytes);
        assert_eq!(
            reader.read_string(),
            Err(SerialError::InvalidLength { offset: 0, len: 1000 })
        );
    }

    #[test]
    fn missing_terminator() {
        let mut bytes = 2i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"ab");
        let mut reader = ArchiveReader::new(&bytes);
        assert_eq!(
            reader.read_string(),
            Err(SerialError::InvalidString { offset: 0 })
        );
    }
}
