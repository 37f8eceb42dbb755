use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};

use flate2::read::DeflateDecoder;
use tracing::debug;

use super::records::*;
use crate::error::{Error, Result};

/// Longest archive comment the format allows.
const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// Read-ahead used while walking the central directory.
const DIRECTORY_BUFFER: u64 = 64 * 1024;

/// A ZIP archive read through any seekable stream.
///
/// Opening reads the end-of-central-directory record from the tail, then
/// the central directory in one sequential pass, so a remote archive is
/// listed with a handful of range requests. Entry data is fetched only when
/// copied out.
pub struct ZipArchive<R> {
    reader: R,
    size: u64,
    entries: Vec<ZipEntry>,
}

impl<R: Read + Seek> ZipArchive<R> {
    pub fn open(mut reader: R) -> Result<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        let (eocd, eocd_offset) = find_eocd(&mut reader, size)?;

        let (cd_offset, cd_size, total_entries) = if eocd.needs_zip64() {
            let eocd64 = read_zip64_eocd(&mut reader, eocd_offset)?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                u64::from(eocd.cd_offset),
                u64::from(eocd.cd_size),
                u64::from(eocd.total_entries),
            )
        };

        if cd_offset.checked_add(cd_size).is_none_or(|end| end > eocd_offset) {
            return Err(Error::archive("central directory overlaps its end record"));
        }

        reader.seek(SeekFrom::Start(cd_offset))?;
        let capacity = cd_size.clamp(1, DIRECTORY_BUFFER) as usize;
        let mut directory = BufReader::with_capacity(capacity, (&mut reader).take(cd_size));

        let mut entries = Vec::new();
        for _ in 0..total_entries {
            entries.push(ZipEntry::read_from(&mut directory)?);
        }
        drop(directory);

        debug!(entries = entries.len(), cd_offset, cd_size, "read central directory");
        Ok(Self {
            reader,
            size,
            entries,
        })
    }

    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn by_name(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Size of the whole archive in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Offset of the entry's data, past its local header.
    pub fn data_offset(&mut self, entry: &ZipEntry) -> Result<u64> {
        self.reader.seek(SeekFrom::Start(entry.header_offset))?;
        let skip = LocalHeader::read_variable_len(&mut self.reader)?;
        let skip = i64::try_from(skip).map_err(|_| Error::archive("local header too large"))?;
        Ok(self.reader.seek(SeekFrom::Current(skip))?)
    }

    /// Decompress `entry` into `writer`, returning the number of bytes written.
    pub fn copy_to<W: Write + ?Sized>(&mut self, entry: &ZipEntry, writer: &mut W) -> Result<u64> {
        if entry.is_dir {
            return Ok(0);
        }
        if let CompressionMethod::Other(code) = entry.method {
            return Err(Error::UnsupportedCompression(code));
        }

        self.data_offset(entry)?;
        let mut data = (&mut self.reader).take(entry.compressed_size);
        let written = match entry.method {
            CompressionMethod::Deflate => io::copy(&mut DeflateDecoder::new(data), writer)?,
            _ => io::copy(&mut data, writer)?,
        };

        if written != entry.uncompressed_size {
            return Err(Error::archive(format!(
                "{} produced {written} bytes, expected {}",
                entry.name, entry.uncompressed_size
            )));
        }
        Ok(written)
    }

    /// Extract file data to memory
    pub fn read_entry(&mut self, entry: &ZipEntry) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.copy_to(entry, &mut out)?;
        Ok(out)
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Locate the end-of-central-directory record, returning it and its offset.
fn find_eocd<R: Read + Seek>(reader: &mut R, size: u64) -> Result<(EndOfCentralDirectory, u64)> {
    let record = EndOfCentralDirectory::SIZE as u64;
    if size < record {
        return Err(Error::archive("file too small"));
    }

    // Without a comment the record is the last 22 bytes.
    let mut tail = [0u8; EndOfCentralDirectory::SIZE];
    reader.seek(SeekFrom::Start(size - record))?;
    reader.read_exact(&mut tail)?;
    if &tail[0..4] == EndOfCentralDirectory::SIGNATURE && tail[20..22] == [0, 0] {
        return Ok((EndOfCentralDirectory::parse(&tail)?, size - record));
    }

    let window = (MAX_COMMENT_SIZE + record).min(size);
    let start = size - window;
    let mut buf = vec![0u8; window as usize];
    reader.seek(SeekFrom::Start(start))?;
    reader.read_exact(&mut buf)?;

    for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
        if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            continue;
        }
        // The comment must run exactly to the end of the file.
        let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
        if i + EndOfCentralDirectory::SIZE + comment_len == buf.len() {
            let eocd = EndOfCentralDirectory::parse(&buf[i..])?;
            return Ok((eocd, start + i as u64));
        }
    }

    Err(Error::archive("end of central directory not found"))
}

fn read_zip64_eocd<R: Read + Seek>(
    reader: &mut R,
    eocd_offset: u64,
) -> Result<Zip64EndOfCentralDirectory> {
    let locator_offset = eocd_offset
        .checked_sub(Zip64Locator::SIZE as u64)
        .ok_or_else(|| Error::archive("missing ZIP64 locator"))?;

    let mut buf = [0u8; Zip64Locator::SIZE];
    reader.seek(SeekFrom::Start(locator_offset))?;
    reader.read_exact(&mut buf)?;
    let locator = Zip64Locator::parse(&buf)?;

    let mut buf = [0u8; Zip64EndOfCentralDirectory::SIZE];
    reader.seek(SeekFrom::Start(locator.eocd64_offset))?;
    reader.read_exact(&mut buf)?;
    Zip64EndOfCentralDirectory::parse(&buf)
}
