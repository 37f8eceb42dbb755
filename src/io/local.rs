use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::{ReadAt, resolve_seek};
use crate::error::Result;

/// Local file reader with the same bounds rules as the HTTP reader
pub struct LocalFileReader {
    file: File,
    size: u64,
    offset: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            offset: 0,
        })
    }
}

impl Read for LocalFileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl Seek for LocalFileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = resolve_seek(pos, self.offset, self.size)?;
        self.offset = self.file.seek(SeekFrom::Start(target))?;
        Ok(self.offset)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.offset)
    }
}

impl ReadAt for LocalFileReader {
    fn size(&self) -> u64 {
        self.size
    }

    // The descriptor is released on drop.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn alphabet_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_at() {
        let file = alphabet_file();
        let mut reader = LocalFileReader::new(file.path()).unwrap();
        assert_eq!(reader.size(), 26);

        let mut buf = [0u8; 3];
        assert_eq!(reader.read_at(23, &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"XYZ");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_seek_bounds_match_http_reader() {
        let file = alphabet_file();
        let mut reader = LocalFileReader::new(file.path()).unwrap();
        assert_eq!(reader.seek(SeekFrom::End(0)).unwrap(), 26);
        let err = reader.seek(SeekFrom::Start(27)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(reader.stream_position().unwrap(), 26);
    }
}
