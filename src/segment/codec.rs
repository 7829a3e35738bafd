//! Fixed-endian binary codec for all index files
//!
//! Integers are little-endian fixed width, strings are a u32 length followed
//! by raw UTF-8 bytes. No framing, no checksums. Every `.bin` file in the
//! index goes through these helpers; a read that hits end-of-stream mid-field
//! fails with `UnexpectedEof`.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

pub fn write_u32<W: Write>(out: &mut W, v: u32) -> io::Result<()> {
    out.write_u32::<LittleEndian>(v)
}

pub fn write_u64<W: Write>(out: &mut W, v: u64) -> io::Result<()> {
    out.write_u64::<LittleEndian>(v)
}

pub fn write_f32<W: Write>(out: &mut W, v: f32) -> io::Result<()> {
    out.write_f32::<LittleEndian>(v)
}

pub fn read_u32<R: Read>(input: &mut R) -> io::Result<u32> {
    input.read_u32::<LittleEndian>()
}

pub fn read_u64<R: Read>(input: &mut R) -> io::Result<u64> {
    input.read_u64::<LittleEndian>()
}

pub fn read_f32<R: Read>(input: &mut R) -> io::Result<f32> {
    input.read_f32::<LittleEndian>()
}

/// Write a length-prefixed string
pub fn write_string<W: Write>(out: &mut W, s: &str) -> io::Result<()> {
    write_u32(out, s.len() as u32)?;
    out.write_all(s.as_bytes())
}

/// Read a length-prefixed string
pub fn read_string<R: Read>(input: &mut R) -> io::Result<String> {
    let len = read_u32(input)? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_integers_are_little_endian() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0x0102_0304).unwrap();
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01]);

        write_u64(&mut buf, 1).unwrap();
        assert_eq!(&buf[4..], [1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "coronavirus").unwrap();
        write_f32(&mut buf, 4.5).unwrap();

        let mut cur = Cursor::new(buf);
        assert_eq!(read_string(&mut cur).unwrap(), "coronavirus");
        assert_eq!(read_f32(&mut cur).unwrap(), 4.5);
    }

    #[test]
    fn test_short_read_fails_cleanly() {
        let mut cur = Cursor::new(vec![0x01, 0x02]);
        let err = read_u32(&mut cur).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        // Length prefix promises more bytes than the stream holds
        let mut buf = Vec::new();
        write_u32(&mut buf, 100).unwrap();
        buf.extend_from_slice(b"short");
        let err = read_string(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
