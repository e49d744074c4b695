//! Numeric values independent of their storage width.

use core::fmt;

use vc_ptr::{Memory, Ptr};

use crate::archive::{Archive, ArchiveExt};
use crate::error::SerialError;
use crate::info::NumericKind;

// -----------------------------------------------------------------------------
// Number

/// A numeric value widened to 64 bits.
///
/// Conversions between kinds follow the `as` casts of the language: integer
/// narrowing wraps, float to integer saturates.
///
/// # Examples
///
/// ```
/// use vc_property::info::NumericKind;
/// use vc_property::ops::Number;
///
/// let (value, exact) = Number::Int(-1).cast(NumericKind::UInt16);
/// assert_eq!(value, Number::UInt(0xFFFF));
/// assert!(!exact);
///
/// let (value, exact) = Number::Int(5).cast(NumericKind::Int64);
/// assert_eq!(value, Number::Int(5));
/// assert!(exact);
///
/// assert_eq!(Number::Float(1e10).cast(NumericKind::Int32).0, Number::Int(i32::MAX as i64));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    /// Reads a value of `kind` from memory.
    pub fn read(memory: &Memory, ptr: Ptr, kind: NumericKind) -> Result<Self, SerialError> {
        Ok(match kind {
            NumericKind::Int8 => Self::Int(memory.read_i8(ptr)?.into()),
            NumericKind::Int16 => Self::Int(memory.read_i16(ptr)?.into()),
            NumericKind::Int32 => Self::Int(memory.read_i32(ptr)?.into()),
            NumericKind::Int64 => Self::Int(memory.read_i64(ptr)?),
            NumericKind::UInt8 => Self::UInt(memory.read_u8(ptr)?.into()),
            NumericKind::UInt16 => Self::UInt(memory.read_u16(ptr)?.into()),
            NumericKind::UInt32 => Self::UInt(memory.read_u32(ptr)?.into()),
            NumericKind::UInt64 => Self::UInt(memory.read_u64(ptr)?),
            NumericKind::Float => Self::Float(memory.read_f32(ptr)?.into()),
            NumericKind::Double => Self::Float(memory.read_f64(ptr)?),
        })
    }

    /// Converts to `kind` and writes the result. Returns whether the value
    /// was represented exactly.
    pub fn write(self, memory: &mut Memory, ptr: Ptr, kind: NumericKind) -> Result<bool, SerialError> {
        let (value, exact) = self.cast(kind);
        match value {
            Self::Int(v) => match kind {
                NumericKind::Int8 => memory.write_i8(ptr, v as i8)?,
                NumericKind::Int16 => memory.write_i16(ptr, v as i16)?,
                NumericKind::Int32 => memory.write_i32(ptr, v as i32)?,
                _ => memory.write_i64(ptr, v)?,
            },
            Self::UInt(v) => match kind {
                NumericKind::UInt8 => memory.write_u8(ptr, v as u8)?,
                NumericKind::UInt16 => memory.write_u16(ptr, v as u16)?,
                NumericKind::UInt32 => memory.write_u32(ptr, v as u32)?,
                _ => memory.write_u64(ptr, v)?,
            },
            Self::Float(v) => match kind {
                NumericKind::Float => memory.write_f32(ptr, v as f32)?,
                _ => memory.write_f64(ptr, v)?,
            },
        }
        Ok(exact)
    }

    /// Reads a raw value of `kind` from an archive.
    pub fn load(archive: &mut dyn Archive, kind: NumericKind) -> Result<Self, SerialError> {
        Ok(match kind {
            NumericKind::Int8 => Self::Int(archive.read_i8()?.into()),
            NumericKind::Int16 => Self::Int(archive.read_i16()?.into()),
            NumericKind::Int32 => Self::Int(archive.read_i32()?.into()),
            NumericKind::Int64 => Self::Int(archive.read_i64()?),
            NumericKind::UInt8 => Self::UInt(archive.read_u8()?.into()),
            NumericKind::UInt16 => Self::UInt(archive.read_u16()?.into()),
            NumericKind::UInt32 => Self::UInt(archive.read_u32()?.into()),
            NumericKind::UInt64 => Self::UInt(archive.read_u64()?),
            NumericKind::Float => Self::Float(archive.read_f32()?.into()),
            NumericKind::Double => Self::Float(archive.read_f64()?),
        })
    }

    /// Converts to `kind` and writes the raw value to an archive.
    pub fn save(self, archive: &mut dyn Archive, kind: NumericKind) -> Result<(), SerialError> {
        match (self.cast(kind).0, kind) {
            (Self::Int(v), NumericKind::Int8) => archive.write_i8(v as i8),
            (Self::Int(v), NumericKind::Int16) => archive.write_i16(v as i16),
            (Self::Int(v), NumericKind::Int32) => archive.write_i32(v as i32),
            (Self::Int(v), _) => archive.write_i64(v),
            (Self::UInt(v), NumericKind::UInt8) => archive.write_u8(v as u8),
            (Self::UInt(v), NumericKind::UInt16) => archive.write_u16(v as u16),
            (Self::UInt(v), NumericKind::UInt32) => archive.write_u32(v as u32),
            (Self::UInt(v), _) => archive.write_u64(v),
            (Self::Float(v), NumericKind::Float) => archive.write_f32(v as f32),
            (Self::Float(v), _) => archive.write_f64(v),
        }
    }

    /// Converts to the representation of `kind`.
    ///
    /// The flag is `false` when the result is not the same number, for
    /// example after wrapping, saturation or float rounding.
    pub fn cast(self, kind: NumericKind) -> (Self, bool) {
        let out = match kind {
            NumericKind::Int8 => Self::Int(self.to_int::<i8>()),
            NumericKind::Int16 => Self::Int(self.to_int::<i16>()),
            NumericKind::Int32 => Self::Int(self.to_int::<i32>()),
            NumericKind::Int64 => Self::Int(self.to_int::<i64>()),
            NumericKind::UInt8 => Self::UInt(self.to_uint::<u8>()),
            NumericKind::UInt16 => Self::UInt(self.to_uint::<u16>()),
            NumericKind::UInt32 => Self::UInt(self.to_uint::<u32>()),
            NumericKind::UInt64 => Self::UInt(self.to_uint::<u64>()),
            NumericKind::Float => Self::Float(f64::from(self.as_f64() as f32)),
            NumericKind::Double => Self::Float(self.as_f64()),
        };
        (out, self.same_value(out))
    }

    fn to_int<T: Narrow>(self) -> i64 {
        match self {
            Self::Int(v) => T::wrap_i64(v),
            Self::UInt(v) => T::wrap_i64(v as i64),
            Self::Float(v) => T::saturate(v),
        }
    }

    fn to_uint<T: Narrow>(self) -> u64 {
        match self {
            Self::Int(v) => T::wrap_u64(v as u64),
            Self::UInt(v) => T::wrap_u64(v),
            Self::Float(v) => T::saturate(v) as u64,
        }
    }

    /// The value as `i64`, wrapping unsigned values and truncating floats.
    #[inline]
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Int(v) => v,
            Self::UInt(v) => v as i64,
            Self::Float(v) => v as i64,
        }
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        match self {
            Self::Int(v) => v == 0,
            Self::UInt(v) => v == 0,
            Self::Float(v) => v == 0.0,
        }
    }

    /// Mathematical equality across representations.
    fn same_value(self, other: Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Int(a), Self::UInt(b)) | (Self::UInt(b), Self::Int(a)) => {
                a >= 0 && a as u64 == b
            }
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Float(f), Self::Int(i)) | (Self::Int(i), Self::Float(f)) => {
                f.is_finite() && f.fract() == 0.0 && f as i128 == i128::from(i)
            }
            (Self::Float(f), Self::UInt(u)) | (Self::UInt(u), Self::Float(f)) => {
                f.is_finite() && f.fract() == 0.0 && f as i128 == i128::from(u)
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => fmt::Display::fmt(v, f),
            Self::UInt(v) => fmt::Display::fmt(v, f),
            Self::Float(v) => fmt::Display::fmt(v, f),
        }
    }
}

// -----------------------------------------------------------------------------
// Narrow

/// Integer widths a [`Number`] can be narrowed to.
trait Narrow {
    fn wrap_i64(v: i64) -> i64;
    fn wrap_u64(v: u64) -> u64;
    fn saturate(v: f64) -> i64;
}

macro_rules! impl_narrow {
    ($($signed:ty, $unsigned:ty;)*) => {$(
        impl Narrow for $signed {
            #[inline]
            fn wrap_i64(v: i64) -> i64 { v as $signed as i64 }
            #[inline]
            fn wrap_u64(v: u64) -> u64 { v as $signed as u64 }
            #[inline]
            fn saturate(v: f64) -> i64 { v as $signed as i64 }
        }

        impl Narrow for $unsigned {
            #[inline]
            fn wrap_i64(v: i64) -> i64 { v as $unsigned as i64 }
            #[inline]
            fn wrap_u64(v: u64) -> u64 { v as $unsigned as u64 }
            #[inline]
            fn saturate(v: f64) -> i64 { v as $unsigned as i64 }
        }
    )*};
}

impl_narrow! {
    i8, u8;
    i16, u16;
    i32, u32;
    i64, u64;
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use vc_ptr::{Memory, Ptr};

    use super::Number;
    use crate::archive::{ArchiveReader, ArchiveWriter};
    use crate::info::NumericKind;

    fn samples(kind: NumericKind) -> [Number; 4] {
        match kind {
            NumericKind::Int8 => [i8::MIN, i8::MAX, 0, 42].map(|v| Number::Int(v.into())),
            NumericKind::Int16 => [i16::MIN, i16::MAX, 0, -1234].map(|v| Number::Int(v.into())),
            NumericKind::Int32 => [i32::MIN, i32::MAX, 0, 77_777].map(|v| Number::Int(v.into())),
            NumericKind::Int64 => [i64::MIN, i64::MAX, 0, -9_000_000_000].map(Number::Int),
            NumericKind::UInt8 => [u8::MIN, u8::MAX, 0, 128].map(|v| Number::UInt(v.into())),
            NumericKind::UInt16 => [u16::MIN, u16::MAX, 0, 4321].map(|v| Number::UInt(v.into())),
            NumericKind::UInt32 => [u32::MIN, u32::MAX, 0, 1 << 31].map(|v| Number::UInt(v.into())),
            NumericKind::UInt64 => [u64::MIN, u64::MAX, 0, 1 << 40].map(Number::UInt),
            NumericKind::Float => [f32::MIN, f32::MAX, 0.0, 0.5].map(|v| Number::Float(v.into())),
            NumericKind::Double => [f64::MIN, f64::MAX, 0.0, -2.25].map(Number::Float),
        }
    }

    #[test]
    fn memory_and_archive_round_trip() {
        let mut memory = Memory::new();
        let ptr = Ptr::start(memory.alloc(8));

        for kind in NumericKind::ALL {
            for value in samples(kind) {
                assert!(value.write(&mut memory, ptr, kind).unwrap());
                assert_eq!(Number::read(&memory, ptr, kind).unwrap(), value);

                let mut writer = ArchiveWriter::new();
                value.save(&mut writer, kind).unwrap();
                assert_eq!(writer.as_bytes().len(), kind.size());

                let bytes = writer.into_inner();
                let mut reader = ArchiveReader::new(&bytes);
                assert_eq!(Number::load(&mut reader, kind).unwrap(), value);
            }
        }
    }

    #[test]
    fn lossy_casts() {
        assert_eq!(Number::UInt(300).cast(NumericKind::UInt8), (Number::UInt(44), false));
        assert!(!Number::Int(-3).cast(NumericKind::UInt64).1);
        assert_eq!(Number::Float(2.5).cast(NumericKind::Int32), (Number::Int(2), false));
        assert_eq!(Number::Float(-1.0).cast(NumericKind::UInt8), (Number::UInt(0), false));
        assert_eq!(Number::Int(16).cast(NumericKind::Float), (Number::Float(16.0), true));
        assert!(!Number::Float(0.1).cast(NumericKind::Float).1);
        assert_eq!(Number::UInt(7).cast(NumericKind::Int16), (Number::Int(7), true));
    }
}
