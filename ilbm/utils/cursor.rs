use std::io;

use crate::utils::error::IlbmResult;

fn eof(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, format!("buffer exhausted reading {}", what))
}

/// Bounds-checked read cursor over an immutable byte slice.
///
/// All primitive reads are big-endian (IFF is a big-endian format) and fail
/// with an I/O error instead of reading past the end. A bounded sub-cursor
/// over the next `len` bytes can be carved out with [`Cursor::sub_reader`],
/// which is how chunk payloads are isolated from the outer chunk list.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Carves out a cursor over the next `len` bytes without advancing this
    /// one. The sub-cursor is clamped to the bytes that are actually there;
    /// a truncated chunk then fails inside its own decoder.
    pub fn sub_reader(&self, len: usize) -> Cursor<'a> {
        let start = self.pos.min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());
        Cursor {
            data: &self.data[start..end],
            pos: 0,
        }
    }

    /// Advances by `len` bytes, clamped to the end of the buffer. Used to
    /// skip unread chunk payloads and alignment padding.
    pub fn seek_relative(&mut self, len: usize) {
        self.pos = self.pos.saturating_add(len).min(self.data.len());
    }

    pub fn read_u8(&mut self) -> IlbmResult<u8> {
        let byte = *self.data.get(self.pos).ok_or_else(|| eof("u8"))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_i8(&mut self) -> IlbmResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> IlbmResult<u16> {
        let bytes = self.read_bytes(2).map_err(|_| eof("u16"))?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&mut self) -> IlbmResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> IlbmResult<u32> {
        let bytes = self.read_bytes(4).map_err(|_| eof("u32"))?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_fourcc(&mut self) -> IlbmResult<[u8; 4]> {
        let bytes = self.read_bytes(4).map_err(|_| eof("fourcc"))?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn read_bytes(&mut self, len: usize) -> IlbmResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_else(|| eof("byte run"))?;
        let bytes = self.data.get(self.pos..end).ok_or_else(|| eof("byte run"))?;
        self.pos = end;
        Ok(bytes)
    }

    /// Returns the rest of the buffer and leaves the cursor exhausted.
    pub fn read_to_end(&mut self) -> &'a [u8] {
        let start = self.pos.min(self.data.len());
        self.pos = self.data.len();
        &self.data[start..]
    }
}
