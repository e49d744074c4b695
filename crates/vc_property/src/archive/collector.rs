use super::{Archive, ArchiveFlags, ArchiveMode};
use crate::error::SerialError;
use crate::refs::{ObjectHandle, ObjectResolver, ReferenceMode, ReferenceVisitor};

// -----------------------------------------------------------------------------
// ReferenceCollector

/// A discovery archive: every reference the codecs report is forwarded to a
/// [`ReferenceVisitor`].
///
/// Which references are reported depends on the flags, see
/// [`refs`](crate::refs). Strong references are always reported, weak ones
/// only with [`ArchiveFlags::REWRITE_WEAK_AND_STRONG`], lazy ones never.
pub struct ReferenceCollector<'a> {
    visitor: &'a mut dyn ReferenceVisitor,
    flags: ArchiveFlags,
    resolver: Option<&'a dyn ObjectResolver>,
}

impl<'a> ReferenceCollector<'a> {
    #[inline]
    pub fn new(visitor: &'a mut dyn ReferenceVisitor) -> Self {
        Self {
            visitor,
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
}

impl Archive for ReferenceCollector<'_> {
    #[inline]
    fn mode(&self) -> ArchiveMode {
        ArchiveMode::Collect
    }

    #[inline]
    fn flags(&self) -> ArchiveFlags {
        self.flags
    }

    fn read_bytes(&mut self, _buf: &mut [u8]) -> Result<(), SerialError> {
        Err(SerialError::Unsupported("reading from a reference collector"))
    }

    fn write_bytes(&mut self, _bytes: &[u8]) -> Result<(), SerialError> {
        Err(SerialError::Unsupported("writing to a reference collector"))
    }

    #[inline]
    fn tell(&self) -> u64 {
        0
    }

    fn seek(&mut self, _pos: u64) -> Result<(), SerialError> {
        Err(SerialError::Unsupported("seeking a reference collector"))
    }

    #[inline]
    fn total_size(&self) -> u64 {
        0
    }

    fn serialize_object(
        &mut self,
        mode: ReferenceMode,
        handle: &mut ObjectHandle,
    ) -> Result<(), SerialError> {
        let visible = match mode {
            ReferenceMode::Strong => true,
            ReferenceMode::Weak => self.flags.contains(ArchiveFlags::REWRITE_WEAK_AND_STRONG),
            ReferenceMode::Lazy | ReferenceMode::Soft => false,
        };
        if visible {
            self.visitor.visit(mode, handle);
        }
        Ok(())
    }

    #[inline]
    fn visit_soft_path(&mut self, path: &str) {
        self.visitor.visit_soft_path(path);
    }

    #[inline]
    fn resolver(&self) -> Option<&dyn ObjectResolver> {
        self.resolver
    }
}
