mod http;
mod local;
#[cfg(test)]
pub(crate) mod mock;
mod options;
mod transport;

pub use http::{HEAD_SIZE, HttpRangeReader};
pub use local::LocalFileReader;
pub use options::{DEFAULT_DISCARD, ReaderOptions};
pub use transport::{RangeResponse, ReqwestTransport, Transport};

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Random access reading from a sized, seekable data source.
pub trait ReadAt: Read + Seek {
    /// Read into `buf` starting at `offset`; a seek followed by a read.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.seek(SeekFrom::Start(offset))?;
        self.read(buf)
    }

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Release any held connection or handle. Calling it twice is harmless.
    fn close(&mut self) -> io::Result<()>;
}

impl<R: ReadAt + ?Sized> ReadAt for &mut R {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Turn a `SeekFrom` into an absolute offset within `[0, size]`.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
        SeekFrom::End(delta) => size.checked_add_signed(delta),
    };

    target
        .filter(|&t| t <= size)
        .ok_or(Error::OutOfBounds {
            position: pos,
            size,
        })
}
