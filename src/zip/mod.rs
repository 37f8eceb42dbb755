//! ZIP archive listing and extraction over any seekable stream.
//!
//! ZIP files are read from the end: the End of Central Directory (EOCD)
//! record points at the Central Directory, which describes every entry.
//! Listing therefore touches only the archive's tail, which is what makes
//! browsing a remote archive through [`HttpRangeReader`](crate::HttpRangeReader)
//! cheap.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 end records and extra fields
//! - STORED and DEFLATE entries
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - CRC-32 values are reported but not verified

mod archive;
mod records;

pub use archive::ZipArchive;
pub use records::{
    CompressionMethod, EndOfCentralDirectory, Zip64EndOfCentralDirectory, Zip64Locator, ZipEntry,
};
