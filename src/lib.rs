//! # httpseek
//!
//! Random-access reads of remote resources over HTTP Range requests.
//!
//! [`HttpRangeReader`] turns a URL into a `std::io::Read + Seek` stream. It
//! fetches only the bytes that are actually read: a probe request learns the
//! size and a validator, reads stream from one open ranged response, short
//! forward seeks drain that response instead of reconnecting, and every
//! further request is guarded with `If-Range` so a resource that changes
//! mid-stream is reported rather than read inconsistently.
//!
//! Anything that parses a seekable stream works on top of it; the bundled
//! [`zip`] module lists and extracts remote ZIP archives this way.
//!
//! ## Example
//!
//! ```no_run
//! use httpseek::{HttpRangeReader, ReadAt, ReaderOptions, ZipArchive};
//!
//! fn main() -> httpseek::Result<()> {
//!     let options = ReaderOptions::new().with_discard(16 * 1024);
//!     let mut reader = HttpRangeReader::with_options("https://example.com/archive.zip", options)?;
//!
//!     let archive = ZipArchive::open(&mut reader)?;
//!     for entry in archive.entries() {
//!         println!("{}", entry.name);
//!     }
//!
//!     println!("{} of {} bytes over {} requests",
//!         reader.transferred_bytes(), reader.size(), reader.request_count());
//!     reader.close()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt, ReaderOptions, ReqwestTransport, Transport};
pub use zip::{ZipArchive, ZipEntry};
