use alloc::vec::Vec;

use fixedbitset::FixedBitSet;

use crate::archive::{Archive, ArchiveExt};
use crate::error::SerialError;

// -----------------------------------------------------------------------------
// Fragment

/// A run of skipped schema entries followed by a run of included ones.
///
/// Packed into a little-endian `u16`: bits 0-6 skip count, bit 7 "has zero
/// mask", bit 8 "is last", bits 9-15 value count.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    skip: u8,
    values: u8,
    has_zero: bool,
    is_last: bool,
}

impl Fragment {
    /// Largest skip or value count of one fragment.
    pub const MAX: u8 = 0x7F;

    const HAS_ZERO: u16 = 1 << 7;
    const IS_LAST: u16 = 1 << 8;
    const VALUE_SHIFT: u16 = 9;

    #[inline]
    pub fn skip(&self) -> usize {
        self.skip as usize
    }

    #[inline]
    pub fn values(&self) -> usize {
        self.values as usize
    }

    /// Some included values of this fragment have a zero mask bit.
    #[inline]
    pub fn has_zero(&self) -> bool {
        self.has_zero
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    #[inline]
    fn pack(self) -> u16 {
        let mut raw = self.skip as u16 | (self.values as u16) << Self::VALUE_SHIFT;
        if self.has_zero {
            raw |= Self::HAS_ZERO;
        }
        if self.is_last {
            raw |= Self::IS_LAST;
        }
        raw
    }

    #[inline]
    fn unpack(raw: u16) -> Self {
        Self {
            skip: (raw & Self::MAX as u16) as u8,
            values: (raw >> Self::VALUE_SHIFT) as u8,
            has_zero: raw & Self::HAS_ZERO != 0,
            is_last: raw & Self::IS_LAST != 0,
        }
    }
}

// -----------------------------------------------------------------------------
// HeaderBuilder

/// Accumulates include/exclude decisions in schema order.
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    fragments: Vec<Fragment>,
    zero_mask: Vec<bool>,
}

impl Default for HeaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self {
            fragments: alloc::vec![Fragment::default()],
            zero_mask: Vec::new(),
        }
    }

    #[inline]
    fn last(&mut self) -> &mut Fragment {
        let index = self.fragments.len() - 1;
        &mut self.fragments[index]
    }

    /// Drops the mask bits of the last fragment if none of them is set.
    fn trim_zero_mask(&mut self) {
        let last = *self.last();
        if !last.has_zero {
            let len = self.zero_mask.len() - last.values();
            self.zero_mask.truncate(len);
        }
    }

    /// The next schema entry is written, `is_zero` if only its mask bit is.
    pub fn include(&mut self, is_zero: bool) {
        if self.last().values == Fragment::MAX {
            self.trim_zero_mask();
            self.fragments.push(Fragment::default());
        }
        self.zero_mask.push(is_zero);
        let last = self.last();
        last.values += 1;
        last.has_zero |= is_zero;
    }

    /// The next schema entry is left at its default.
    pub fn exclude(&mut self) {
        let last = *self.last();
        if last.values > 0 || last.skip == Fragment::MAX {
            self.trim_zero_mask();
            self.fragments.push(Fragment::default());
        }
        self.last().skip += 1;
    }

    pub fn finish(mut self) -> UnversionedHeader {
        self.trim_zero_mask();
        while self.fragments.len() > 1 && self.last().values == 0 {
            self.fragments.pop();
        }
        self.last().is_last = true;

        let mut zero_mask = FixedBitSet::with_capacity(self.zero_mask.len());
        for (index, zero) in self.zero_mask.into_iter().enumerate() {
            zero_mask.set(index, zero);
        }
        UnversionedHeader {
            fragments: self.fragments,
            zero_mask,
        }
    }
}

// -----------------------------------------------------------------------------
// UnversionedHeader

/// Which schema entries an unversioned payload carries, and which of them
/// are zero.
///
/// The zero mask holds one bit per included value of fragments with
/// [`Fragment::has_zero`]. It is written as one `u8` up to 8 bits, one `u16`
/// up to 16 bits, `u32` words otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnversionedHeader {
    fragments: Vec<Fragment>,
    zero_mask: FixedBitSet,
}

impl UnversionedHeader {
    #[inline]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Returns `true` if any schema entry is included.
    pub fn has_values(&self) -> bool {
        self.fragments.iter().any(|f| f.values > 0)
    }

    /// Returns `true` if some included entry has a payload.
    pub fn has_non_zero_values(&self) -> bool {
        self.included_count() > self.zero_mask.count_ones(..)
    }

    /// Number of included schema entries.
    pub fn included_count(&self) -> usize {
        self.fragments.iter().map(Fragment::values).sum()
    }

    /// Number of schema entries addressed, skipped or included.
    pub fn covered_count(&self) -> usize {
        self.fragments.iter().map(|f| f.skip() + f.values()).sum()
    }

    /// Included entries as `(schema index, is zero)`, in schema order.
    pub fn iter(&self) -> Included<'_> {
        Included {
            header: self,
            fragment: 0,
            value: 0,
            schema_index: self.fragments.first().map_or(0, Fragment::skip),
            zero_index: 0,
        }
    }

    pub fn save(&self, archive: &mut dyn Archive) -> Result<(), SerialError> {
        for fragment in &self.fragments {
            archive.write_u16(fragment.pack())?;
        }
        let bits = self.zero_mask.len();
        let word = |index: usize| -> u32 {
            (0..32)
                .filter(|bit| self.zero_mask.contains(index * 32 + bit))
                .fold(0, |word, bit| word | 1 << bit)
        };
        match bits {
            0 => Ok(()),
            1..=8 => archive.write_u8(word(0) as u8),
            9..=16 => archive.write_u16(word(0) as u16),
            _ => {
                for index in 0..bits.div_ceil(32) {
                    archive.write_u32(word(index))?;
                }
                Ok(())
            }
        }
    }

    pub fn load(archive: &mut dyn Archive) -> Result<Self, SerialError> {
        let mut fragments = Vec::new();
        loop {
            let fragment = Fragment::unpack(archive.read_u16()?);
            fragments.push(fragment);
            if fragment.is_last {
                break;
            }
        }

        let bits = fragments
            .iter()
            .filter(|f| f.has_zero)
            .map(Fragment::values)
            .sum::<usize>();
        let mut zero_mask = FixedBitSet::with_capacity(bits);
        let mut set_word = |index: usize, word: u32| {
            for bit in 0..32 {
                let at = index * 32 + bit;
                if at < bits && word & (1 << bit) != 0 {
                    zero_mask.insert(at);
                }
            }
        };
        match bits {
            0 => {}
            1..=8 => set_word(0, archive.read_u8()?.into()),
            9..=16 => set_word(0, archive.read_u16()?.into()),
            _ => {
                for index in 0..bits.div_ceil(32) {
                    set_word(index, archive.read_u32()?);
                }
            }
        }
        Ok(Self { fragments, zero_mask })
    }
}

// -----------------------------------------------------------------------------
// Included

/// Iterator returned by [`UnversionedHeader::iter`].
#[derive(Debug, Clone)]
pub struct Included<'a> {
    header: &'a UnversionedHeader,
    fragment: usize,
    value: usize,
    schema_index: usize,
    zero_index: usize,
}

impl Iterator for Included<'_> {
    type Item = (usize, bool);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let fragment = self.header.fragments.get(self.fragment)?;
            if self.value < fragment.values() {
                let zero = fragment.has_zero && self.header.zero_mask.contains(self.zero_index);
                if fragment.has_zero {
                    self.zero_index += 1;
                }
                let item = (self.schema_index, zero);
                self.value += 1;
                self.schema_index += 1;
                return Some(item);
            }
            self.fragment += 1;
            self.value = 0;
            if let Some(next) = self.header.fragments.get(self.fragment) {
                self.schema_index += next.skip();
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
