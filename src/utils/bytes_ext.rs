//! Extension traits for `std::io::Read`/`Write` to add helpers for the
//! composite values stored in the reference cache.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::image::geom::Rect;
use crate::image::matrix32::Matrix32;

/// Extends `std::io::Write` with big-endian writers for cache values.
pub trait WriteCacheExt: Write {
    /// Writes a length-prefixed UTF-8 string.
    fn write_string(&mut self, s: &str) -> io::Result<()>;
    /// Writes the 32 rows of a matrix.
    fn write_matrix(&mut self, m: &Matrix32) -> io::Result<()>;
    fn write_rect(&mut self, r: &Rect) -> io::Result<()>;
}

impl<W: Write> WriteCacheExt for W {
    fn write_string(&mut self, s: &str) -> io::Result<()> {
        let len = u16::try_from(s.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "string too long for u16 length")
        })?;
        self.write_u16::<BigEndian>(len)?;
        self.write_all(s.as_bytes())
    }

    fn write_matrix(&mut self, m: &Matrix32) -> io::Result<()> {
        for row in m.rows() {
            self.write_u32::<BigEndian>(*row)?;
        }
        Ok(())
    }

    fn write_rect(&mut self, r: &Rect) -> io::Result<()> {
        self.write_i32::<BigEndian>(r.x)?;
        self.write_i32::<BigEndian>(r.y)?;
        self.write_i32::<BigEndian>(r.width)?;
        self.write_i32::<BigEndian>(r.height)
    }
}

/// Extends `std::io::Read` with the readers matching [`WriteCacheExt`].
pub trait ReadCacheExt: Read {
    fn read_string(&mut self) -> io::Result<String>;
    fn read_matrix(&mut self) -> io::Result<Matrix32>;
    fn read_rect(&mut self) -> io::Result<Rect>;
}

impl<R: Read> ReadCacheExt for R {
    fn read_string(&mut self) -> io::Result<String> {
        let len = self.read_u16::<BigEndian>()? as usize;
        let mut buf = vec![0; len];
        self.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read_matrix(&mut self) -> io::Result<Matrix32> {
        let mut rows = [0u32; 32];
        self.read_u32_into::<BigEndian>(&mut rows)?;
        Ok(Matrix32::from_rows(rows))
    }

    fn read_rect(&mut self) -> io::Result<Rect> {
        let x = self.read_i32::<BigEndian>()?;
        let y = self.read_i32::<BigEndian>()?;
        let width = self.read_i32::<BigEndian>()?;
        let height = self.read_i32::<BigEndian>()?;
        Ok(Rect::new(x, y, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_string_and_rect() {
        let mut buf = Vec::new();
        buf.write_string("MS Gothic").unwrap();
        buf.write_rect(&Rect::new(-1, 2, 3, 4)).unwrap();
        assert_eq!(&buf[..2], &[0, 9]);
        let mut cursor = Cursor::new(buf);
        assert_eq!(cursor.read_string().unwrap(), "MS Gothic");
        assert_eq!(cursor.read_rect().unwrap(), Rect::new(-1, 2, 3, 4));
    }

    #[test]
    fn test_truncated_matrix() {
        let mut cursor = Cursor::new(vec![0u8; 100]);
        let err = cursor.read_matrix().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
