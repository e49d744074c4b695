//! String and name slots.
//!
//! A text slot is a 4-byte block id. The block holds the UTF-8 bytes of the
//! value, without terminator. The empty string owns no block and is stored as
//! slot `0`, so a zeroed slot is a valid empty value.
//!
//! Names share the representation but compare ASCII case-insensitively, the
//! empty name is the "None" name.

use alloc::string::String;

use vc_ptr::{Memory, Ptr};

use crate::error::SerialError;

/// Wire spelling of the empty name.
pub const NONE: &str = "None";

/// Returns `true` if `name` spells the "None" name.
#[inline]
pub fn is_none(name: &str) -> bool {
    name.is_empty() || name.eq_ignore_ascii_case(NONE)
}

#[inline]
fn raw(memory: &Memory, ptr: Ptr) -> Result<&[u8], SerialError> {
    match memory.read_slot(ptr)? {
        Some(block) => {
            let len = memory.block_len(block)?;
            Ok(memory.bytes(Ptr::start(block), len)?)
        }
        None => Ok(&[]),
    }
}

/// Reads the text at `ptr`.
pub fn read(memory: &Memory, ptr: Ptr) -> Result<String, SerialError> {
    Ok(String::from_utf8_lossy(raw(memory, ptr)?).into_owned())
}

/// Returns `true` if the slot holds the empty string.
#[inline]
pub fn is_empty(memory: &Memory, ptr: Ptr) -> Result<bool, SerialError> {
    Ok(memory.read_slot(ptr)?.is_none())
}

/// Replaces the text at `ptr`, releasing the previous block.
pub fn write(memory: &mut Memory, ptr: Ptr, value: &str) -> Result<(), SerialError> {
    clear(memory, ptr)?;
    if !value.is_empty() {
        let block = memory.alloc_from(value.as_bytes());
        memory.write_slot(ptr, Some(block))?;
    }
    Ok(())
}

/// Writes a name, the "None" spelling is stored as empty.
#[inline]
pub fn write_name(memory: &mut Memory, ptr: Ptr, value: &str) -> Result<(), SerialError> {
    write(memory, ptr, if is_none(value) { "" } else { value })
}

/// Releases the block of the slot and leaves it empty.
pub fn clear(memory: &mut Memory, ptr: Ptr) -> Result<(), SerialError> {
    if let Some(block) = memory.read_slot(ptr)? {
        memory.write_slot(ptr, None)?;
        memory.free(block)?;
    }
    Ok(())
}

/// Compares two slots, names ignore ASCII case.
pub fn eq(memory: &Memory, a: Ptr, b: Ptr, ignore_case: bool) -> Result<bool, SerialError> {
    let (a, b) = (raw(memory, a)?, raw(memory, b)?);
    Ok(if ignore_case {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    })
}

/// Deep-copies the text of `src` into `dst`.
pub fn copy(memory: &mut Memory, dst: Ptr, src: Ptr) -> Result<(), SerialError> {
    if dst == src {
        return Ok(());
    }
    let value = read(memory, src)?;
    write(memory, dst, &value)
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use vc_ptr::{Memory, Ptr};

    #[test]
    fn write_releases_previous_block() {
        let mut memory = Memory::new();
        let slot = Ptr::start(memory.alloc(4));

        super::write(&mut memory, slot, "hello").unwrap();
        assert_eq!(memory.live_blocks(), 2);
        super::write(&mut memory, slot, "world").unwrap();
        assert_eq!(memory.live_blocks(), 2);
        assert_eq!(super::read(&memory, slot).unwrap(), "world");

        super::write(&mut memory, slot, "").unwrap();
        assert_eq!(memory.live_blocks(), 1);
        assert!(super::is_empty(&memory, slot).unwrap());
    }

    #[test]
    fn names_ignore_case() {
        let mut memory = Memory::new();
        let block = memory.alloc(8);
        let (a, b) = (Ptr::start(block), Ptr::new(block, 4));

        super::write_name(&mut memory, a, "Player").unwrap();
        super::write_name(&mut memory, b, "PLAYER").unwrap();
        assert!(super::eq(&memory, a, b, true).unwrap());
        assert!(!super::eq(&memory, a, b, false).unwrap());

        super::write_name(&mut memory, b, "none").unwrap();
        assert!(super::is_empty(&memory, b).unwrap());
    }
}
