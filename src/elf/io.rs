use crate::elf::ElfClass;
use std::error::Error;

/// Bounds-checked reads over an attached ELF byte slice.
///
/// Every accessor returns a `Result` because the tables a read was derived
/// from may be malformed or truncated; callers degrade a failed read to
/// "table absent" or "symbol not found" rather than propagating it out of
/// the crate.
pub struct Reader<'a> {
    pub little_endian: bool,
    pub sixty_four_bit: bool,
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Validates the ELF container: minimum size and the `\x7fELF` magic.
    /// The class byte is *not* validated here; an unrecognized class leaves
    /// the caller with an invalid view rather than an error.
    pub fn new(bytes: &'a [u8]) -> Result<Self, Box<dyn Error>> {
        // see https://en.wikipedia.org/wiki/Executable_and_Linkable_Format
        crate::utils::require(bytes.len() >= 64, "ELF image is much too small")?;
        let magic = &bytes[0..4];
        crate::utils::require(
            magic[0] == 0x7f && magic[1] == b'E' && magic[2] == b'L' && magic[3] == b'F',
            "not an ELF image (bad magic)",
        )?;

        let ei_class = bytes[0x04];
        let ei_data = bytes[0x05];
        Ok(Reader {
            bytes,
            sixty_four_bit: ei_class == 2,
            little_endian: ei_data != 2,
        })
    }

    /// Rebuilds a reader for a slice that was already validated at attach
    /// time, e.g. when answering a query against a parsed [`crate::ElfInfo`].
    pub fn from_parts(bytes: &'a [u8], class: ElfClass, little_endian: bool) -> Self {
        Reader {
            bytes,
            sixty_four_bit: class == ElfClass::Elf64,
            little_endian,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn slice(&self, offset: usize, size: usize) -> Result<&'a [u8], Box<dyn Error>> {
        match offset.checked_add(size) {
            Some(end) if end <= self.bytes.len() => Ok(&self.bytes[offset..end]),
            _ => Err("slice out of bounds".into()),
        }
    }

    pub fn read_byte(&self, offset: usize) -> Result<u8, Box<dyn Error>> {
        self.bytes
            .get(offset)
            .ok_or("couldn't read byte at offset".into())
            .copied()
    }

    pub fn read_half(&self, offset: usize) -> Result<u16, Box<dyn Error>> {
        let slice = self.slice(offset, 2)?;
        if self.little_endian {
            Ok(u16::from_le_bytes(slice.try_into()?))
        } else {
            Ok(u16::from_be_bytes(slice.try_into()?))
        }
    }

    pub fn read_word(&self, offset: usize) -> Result<u32, Box<dyn Error>> {
        let slice = self.slice(offset, 4)?;
        if self.little_endian {
            Ok(u32::from_le_bytes(slice.try_into()?))
        } else {
            Ok(u32::from_be_bytes(slice.try_into()?))
        }
    }

    pub fn read_xword(&self, offset: usize) -> Result<u64, Box<dyn Error>> {
        let slice = self.slice(offset, 8)?;
        if self.little_endian {
            Ok(u64::from_le_bytes(slice.try_into()?))
        } else {
            Ok(u64::from_be_bytes(slice.try_into()?))
        }
    }

    /// Read either a u32 or u64 word depending on the ELF class. For sanity
    /// the result is always returned as 64 bits.
    pub fn read_addr(&self, offset: usize) -> Result<u64, Box<dyn Error>> {
        if self.sixty_four_bit {
            self.read_xword(offset)
        } else {
            Ok(self.read_word(offset)? as u64)
        }
    }

    /// Null-terminated byte string starting at `offset`. The terminator must
    /// lie inside the slice.
    pub fn read_str_bytes(&self, offset: usize) -> Result<&'a [u8], Box<dyn Error>> {
        let tail = self
            .bytes
            .get(offset..)
            .ok_or("string offset out of bounds")?;
        match tail.iter().position(|&b| b == 0) {
            Some(end) => Ok(&tail[..end]),
            None => Err("unterminated string".into()),
        }
    }

    /// Like [`Reader::read_str_bytes`] but converted to an owned `String`.
    /// ELF files don't declare a string encoding so non-UTF-8 bytes are
    /// replaced rather than treated as errors.
    pub fn read_string(&self, offset: usize) -> Result<String, Box<dyn Error>> {
        Ok(String::from_utf8_lossy(self.read_str_bytes(offset)?).into_owned())
    }
}

/// A cursor over a [`Reader`] for records that are read field by field.
pub struct Stream<'a, 'b> {
    pub reader: &'b Reader<'a>,
    pub offset: usize,
}

impl<'a, 'b> Stream<'a, 'b> {
    pub fn new(reader: &'b Reader<'a>, offset: usize) -> Self {
        Stream { reader, offset }
    }

    pub fn read_byte(&mut self) -> Result<u8, Box<dyn Error>> {
        let byte = self.reader.read_byte(self.offset)?;
        self.offset += 1;
        Ok(byte)
    }

    pub fn read_half(&mut self) -> Result<u16, Box<dyn Error>> {
        let half = self.reader.read_half(self.offset)?;
        self.offset += 2;
        Ok(half)
    }

    pub fn read_word(&mut self) -> Result<u32, Box<dyn Error>> {
        let word = self.reader.read_word(self.offset)?;
        self.offset += 4;
        Ok(word)
    }

    pub fn read_xword(&mut self) -> Result<u64, Box<dyn Error>> {
        let xword = self.reader.read_xword(self.offset)?;
        self.offset += 8;
        Ok(xword)
    }

    pub fn read_addr(&mut self) -> Result<u64, Box<dyn Error>> {
        let addr = self.reader.read_addr(self.offset)?;
        self.offset += if self.reader.sixty_four_bit { 8 } else { 4 };
        Ok(addr)
    }

    /// Offsets have the same width as addresses in both classes.
    pub fn read_offset(&mut self) -> Result<u64, Box<dyn Error>> {
        self.read_addr()
    }
}
