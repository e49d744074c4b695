use core::fmt;

// -----------------------------------------------------------------------------
// Guid

/// A 16-byte identifier, stable across sessions.
///
/// Used as the stable identity of struct types (rename detection) and as the
/// persistent id of lazy object references.
///
/// # Examples
///
/// ```
/// use vc_property::info::Guid;
///
/// assert!(Guid::ZERO.is_zero());
/// let id = Guid::from_u128(0x1234);
/// assert!(!id.is_zero());
/// assert_eq!(Guid::from_bytes(id.to_bytes()), id);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid([u8; 16]);

impl Guid {
    /// The all-zero guid, meaning "no identity".
    pub const ZERO: Self = Self([0; 16]);

    /// Creates a guid from raw bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a guid from a little-endian `u128`.
    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_le_bytes())
    }

    /// Returns the raw bytes.
    #[inline]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    /// Returns `true` for [`Guid::ZERO`].
    #[inline]
    pub const fn is_zero(&self) -> bool {
        u128::from_le_bytes(self.0) == 0
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({self})")
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
