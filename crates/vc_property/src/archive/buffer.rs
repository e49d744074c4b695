use alloc::vec::Vec;

use super::{Archive, ArchiveFlags, ArchiveMode};
use crate::error::SerialError;
use crate::refs::ObjectResolver;

// -----------------------------------------------------------------------------
// ArchiveWriter

/// A saving archive over a growable byte buffer.
///
/// Writes at the current position overwrite existing bytes and extend the
/// buffer at the end, so the tag codec can seek back to patch sizes.
#[derive(Debug, Default, Clone)]
pub struct ArchiveWriter {
    bytes: Vec<u8>,
    pos: usize,
    flags: ArchiveFlags,
}

impl ArchiveWriter {
    #[inline]
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            pos: 0,
            flags: ArchiveFlags::empty(),
        }
    }

    #[inline]
    pub fn with_flags(mut self, flags: ArchiveFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

impl Archive for ArchiveWriter {
    #[inline]
    fn mode(&self) -> ArchiveMode {
        ArchiveMode::Save
    }

    #[inline]
    fn flags(&self) -> ArchiveFlags {
        self.flags
    }

    fn read_bytes(&mut self, _buf: &mut [u8]) -> Result<(), SerialError> {
        Err(SerialError::Unsupported("reading from a saving archive"))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let end = self.pos + bytes.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    #[inline]
    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) -> Result<(), SerialError> {
        let len = self.bytes.len() as u64;
        if pos > len {
            return Err(SerialError::Seek { pos, len });
        }
        self.pos = pos as usize;
        Ok(())
    }

    #[inline]
    fn total_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// -----------------------------------------------------------------------------
// ArchiveReader

/// A loading archive over borrowed bytes.
#[derive(Clone, Copy)]
pub struct ArchiveReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    flags: ArchiveFlags,
    resolver: Option<&'a dyn ObjectResolver>,
}

impl<'a> ArchiveReader<'a> {
    #[inline]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            flags: ArchiveFlags::empty(),
            resolver: None,
        }
    }

    #[inline]
    pub fn with_flags(mut self, flags: ArchiveFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Supplies the resolver used for soft references under
    /// [`ArchiveFlags::RESOLVE_SOFT`].
    #[inline]
    pub fn with_resolver(mut self, resolver: &'a dyn ObjectResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Bytes not read yet.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

impl core::fmt::Debug for ArchiveReader<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("len", &self.bytes.len())
            .field("pos", &self.pos)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl Archive for ArchiveReader<'_> {
    #[inline]
    fn mode(&self) -> ArchiveMode {
        ArchiveMode::Load
    }

    #[inline]
    fn flags(&self) -> ArchiveFlags {
        self.flags
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), SerialError> {
        let end = self.pos + buf.len();
        let Some(src) = self.bytes.get(self.pos..end) else {
            return Err(SerialError::UnexpectedEof {
                offset: self.pos as u64,
                needed: buf.len(),
                len: self.bytes.len() as u64,
            });
        };
        buf.copy_from_slice(src);
        self.pos = end;
        Ok(())
    }

    fn write_bytes(&mut self, _bytes: &[u8]) -> Result<(), SerialError> {
        Err(SerialError::Unsupported("writing to a loading archive"))
    }

    #[inline]
    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) -> Result<(), SerialError> {
        let len = self.bytes.len() as u64;
        if pos > len {
            return Err(SerialError::Seek { pos, len });
        }
        self.pos = pos as usize;
        Ok(())
    }

    #[inline]
    fn total_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[inline]
    fn resolver(&self) -> Option<&dyn ObjectResolver> {
        self.resolver
    }
}

// -----------------------------------------------------------------------------
// Tests
