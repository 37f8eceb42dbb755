//! Fixed-layout ZIP records.

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Other(u16),
}

impl From<u16> for CompressionMethod {
    fn from(code: u16) -> Self {
        match code {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Other(other),
        }
    }
}

impl CompressionMethod {
    pub fn code(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Other(code) => code,
        }
    }
}

/// Split off the 4-byte signature and return a cursor over the rest.
fn expect_signature<'a>(
    data: &'a [u8],
    signature: &[u8; 4],
    what: &str,
) -> Result<Cursor<&'a [u8]>> {
    match data.split_first_chunk::<4>() {
        Some((found, rest)) if found == signature => Ok(Cursor::new(rest)),
        _ => Err(Error::archive(format!("bad {what} signature"))),
    }
}

/// End of central directory record, without its trailing comment.
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8; 4] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::archive("end of central directory is truncated"));
        }
        let mut cursor = expect_signature(data, Self::SIGNATURE, "end of central directory")?;

        let _disk_number = cursor.read_u16::<LittleEndian>()?;
        let _disk_with_cd = cursor.read_u16::<LittleEndian>()?;
        Ok(Self {
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Saturated fields mean the real values live in the ZIP64 record.
    pub fn needs_zip64(&self) -> bool {
        self.disk_entries == u16::MAX
            || self.total_entries == u16::MAX
            || self.cd_size == u32::MAX
            || self.cd_offset == u32::MAX
    }
}

/// ZIP64 end of central directory locator, directly before the classic record.
#[derive(Debug, Clone)]
pub struct Zip64Locator {
    pub eocd64_offset: u64,
}

impl Zip64Locator {
    pub const SIGNATURE: &'static [u8; 4] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::archive("ZIP64 locator is truncated"));
        }
        let mut cursor = expect_signature(data, Self::SIGNATURE, "ZIP64 locator")?;

        let _disk_with_eocd64 = cursor.read_u32::<LittleEndian>()?;
        Ok(Self {
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Zip64EndOfCentralDirectory {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8; 4] = b"PK\x06\x06";
    pub const SIZE: usize = 56;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::archive("ZIP64 end of central directory is truncated"));
        }
        let mut cursor = expect_signature(data, Self::SIGNATURE, "ZIP64 end of central directory")?;

        // record size, versions, disk numbers, entries on this disk
        cursor.set_position(8 + 2 + 2 + 4 + 4 + 8);
        Ok(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Local file header: fixed part only.
pub(crate) struct LocalHeader;

impl LocalHeader {
    pub const SIGNATURE: &'static [u8; 4] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    /// Read the fixed header and return how many variable bytes follow it.
    pub fn read_variable_len<R: Read>(reader: &mut R) -> Result<u64> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf)?;
        let mut cursor = expect_signature(&buf, Self::SIGNATURE, "local file header")?;

        cursor.set_position(22);
        let name_len = cursor.read_u16::<LittleEndian>()?;
        let extra_len = cursor.read_u16::<LittleEndian>()?;
        Ok(u64::from(name_len) + u64::from(extra_len))
    }
}

/// One central directory entry.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub name: String,
    pub method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub header_offset: u64,
    pub mod_time: u16,
    pub mod_date: u16,
    pub is_dir: bool,
}

const ZIP64_EXTRA_ID: u16 = 0x0001;

impl ZipEntry {
    pub const SIGNATURE: &'static [u8; 4] = b"PK\x01\x02";
    pub const FIXED_SIZE: usize = 46;

    /// Parse the next central directory header from a sequential stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; Self::FIXED_SIZE];
        reader.read_exact(&mut fixed)?;
        let mut cursor = expect_signature(&fixed, Self::SIGNATURE, "central directory header")?;

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let method = CompressionMethod::from(cursor.read_u16::<LittleEndian>()?);
        let mod_time = cursor.read_u16::<LittleEndian>()?;
        let mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = u64::from(cursor.read_u32::<LittleEndian>()?);
        let mut uncompressed_size = u64::from(cursor.read_u32::<LittleEndian>()?);
        let name_len = cursor.read_u16::<LittleEndian>()?;
        let extra_len = cursor.read_u16::<LittleEndian>()?;
        let comment_len = cursor.read_u16::<LittleEndian>()?;
        let _disk_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut header_offset = u64::from(cursor.read_u32::<LittleEndian>()?);

        let mut name = vec![0u8; usize::from(name_len)];
        reader.read_exact(&mut name)?;
        let name = String::from_utf8_lossy(&name).into_owned();

        let mut extra = vec![0u8; usize::from(extra_len)];
        reader.read_exact(&mut extra)?;

        // ZIP64 values appear only for the header fields that are saturated,
        // always in this order.
        let mut fields = Cursor::new(extra.as_slice());
        while let (Ok(id), Ok(len)) = (
            fields.read_u16::<LittleEndian>(),
            fields.read_u16::<LittleEndian>(),
        ) {
            let next = fields.position() + u64::from(len);
            if id == ZIP64_EXTRA_ID {
                for value in [
                    &mut uncompressed_size,
                    &mut compressed_size,
                    &mut header_offset,
                ] {
                    if *value == u64::from(u32::MAX) && fields.position() + 8 <= next {
                        *value = fields.read_u64::<LittleEndian>()?;
                    }
                }
            }
            fields.set_position(next);
        }

        io::copy(&mut reader.by_ref().take(u64::from(comment_len)), &mut io::sink())?;

        Ok(Self {
            is_dir: name.ends_with('/'),
            name,
            method,
            compressed_size,
            uncompressed_size,
            crc32,
            header_offset,
            mod_time,
            mod_date,
        })
    }

    /// Modification date as (year, month, day)
    pub fn date(&self) -> (u16, u8, u8) {
        let day = (self.mod_date & 0x1F) as u8;
        let month = ((self.mod_date >> 5) & 0x0F) as u8;
        let year = ((self.mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Modification time as (hour, minute, second)
    pub fn time(&self) -> (u8, u8, u8) {
        let second = ((self.mod_time & 0x1F) * 2) as u8;
        let minute = ((self.mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Percentage of space saved by compression.
    pub fn savings(&self) -> u64 {
        match self.uncompressed_size {
            0 => 0,
            total => 100u64.saturating_sub(self.compressed_size.saturating_mul(100) / total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eocd_parse() {
        let mut data = Vec::new();
        data.extend_from_slice(b"PK\x05\x06");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&120u32.to_le_bytes());
        data.extend_from_slice(&400u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());

        let eocd = EndOfCentralDirectory::parse(&data).unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.cd_size, 120);
        assert_eq!(eocd.cd_offset, 400);
        assert!(!eocd.needs_zip64());
    }

    #[test]
    fn test_bad_signature() {
        let data = [0u8; EndOfCentralDirectory::SIZE];
        assert!(matches!(
            EndOfCentralDirectory::parse(&data),
            Err(Error::InvalidArchive(_))
        ));
    }

    #[test]
    fn test_dos_date_time() {
        let entry = ZipEntry {
            name: "a.txt".into(),
            method: CompressionMethod::Stored,
            compressed_size: 25,
            uncompressed_size: 100,
            crc32: 0,
            header_offset: 0,
            // 13:45:20 on 2024-03-17
            mod_time: (13 << 11) | (45 << 5) | 10,
            mod_date: (44 << 9) | (3 << 5) | 17,
            is_dir: false,
        };
        assert_eq!(entry.date(), (2024, 3, 17));
        assert_eq!(entry.time(), (13, 45, 20));
        assert_eq!(entry.savings(), 75);
    }

    #[test]
    fn test_compression_method_codes() {
        assert_eq!(CompressionMethod::from(8), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from(12).code(), 12);
    }
}
