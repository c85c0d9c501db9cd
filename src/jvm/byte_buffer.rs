use super::Error;
use byteorder::{BigEndian, ByteOrder};
use std::io;

/// Append-only byte sink for class file contents
///
/// Everything in a class file is big-endian. Most of the file is written strictly front to back,
/// but some fields (eg. the length of an attribute or the offset of a forward jump) are only known
/// once the bytes after them have been written. For those, reserve space with a placeholder and
/// come back to it with one of the `patch_*` methods.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
}

impl ByteBuffer {
    pub fn new() -> ByteBuffer {
        ByteBuffer { bytes: vec![] }
    }

    pub fn with_capacity(capacity: usize) -> ByteBuffer {
        ByteBuffer {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far (which is also the position of the next byte)
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        let mut buf = [0; 2];
        BigEndian::write_u16(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn put_i16(&mut self, value: i16) {
        let mut buf = [0; 2];
        BigEndian::write_i16(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn put_u32(&mut self, value: u32) {
        let mut buf = [0; 4];
        BigEndian::write_u32(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Overwrite two already written bytes at `offset`
    pub fn patch_u16(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        let slot = self.slot_mut(offset, 2)?;
        BigEndian::write_u16(slot, value);
        Ok(())
    }

    /// Overwrite two already written bytes at `offset`
    pub fn patch_i16(&mut self, offset: usize, value: i16) -> Result<(), Error> {
        let slot = self.slot_mut(offset, 2)?;
        BigEndian::write_i16(slot, value);
        Ok(())
    }

    /// Overwrite four already written bytes at `offset`
    pub fn patch_u32(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        let slot = self.slot_mut(offset, 4)?;
        BigEndian::write_u32(slot, value);
        Ok(())
    }

    /// Read back two bytes at `offset`
    pub fn u16_at(&self, offset: usize) -> Option<u16> {
        let end = offset.checked_add(2)?;
        self.bytes.get(offset..end).map(BigEndian::read_u16)
    }

    fn slot_mut(&mut self, offset: usize, width: usize) -> Result<&mut [u8], Error> {
        let len = self.bytes.len();
        match offset.checked_add(width) {
            Some(end) if end <= len => Ok(&mut self.bytes[offset..end]),
            _ => Err(Error::PatchOutOfBounds { offset, len }),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

/// Lets [`super::Serialize`] implementations write straight into the buffer
impl io::Write for ByteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteBuffer({} bytes)", self.bytes.len())
    }
}
