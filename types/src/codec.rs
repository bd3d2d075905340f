use bytes::{Buf, BufMut};
use commonware_codec::{Error, ReadExt, Write};

/// Helper to write a string as length-prefixed UTF-8 bytes.
pub fn write_string(s: &str, writer: &mut impl BufMut) {
    let bytes = s.as_bytes();
    (bytes.len() as u32).write(writer);
    writer.put_slice(bytes);
}

/// Helper to read a string from length-prefixed UTF-8 bytes, rejecting
/// values longer than `max_len`.
pub fn read_string(reader: &mut impl Buf, max_len: usize) -> Result<String, Error> {
    let len = u32::read(reader)? as usize;
    if len > max_len {
        return Err(Error::Invalid("String", "too long"));
    }
    if reader.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    let mut bytes = vec![0u8; len];
    reader.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| Error::Invalid("String", "invalid UTF-8"))
}

/// Helper to get encode size of a string.
pub fn string_encode_size(s: &str) -> usize {
    4 + s.len()
}

/// Helper to write an optional string as a presence byte plus payload.
pub fn write_opt_string(value: &Option<String>, writer: &mut impl BufMut) {
    match value {
        Some(s) => {
            true.write(writer);
            write_string(s, writer);
        }
        None => false.write(writer),
    }
}

/// Helper to read an optional string written by [`write_opt_string`].
pub fn read_opt_string(reader: &mut impl Buf, max_len: usize) -> Result<Option<String>, Error> {
    if bool::read(reader)? {
        Ok(Some(read_string(reader, max_len)?))
    } else {
        Ok(None)
    }
}

/// Helper to get encode size of an optional string.
pub fn opt_string_encode_size(value: &Option<String>) -> usize {
    1 + value.as_deref().map(string_encode_size).unwrap_or(0)
}
