//! Error types for ranged stream reading.

use std::io;
use std::io::SeekFrom;

use reqwest::StatusCode;
use reqwest::header::InvalidHeaderValue;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while probing, seeking or reading a remote resource.
#[derive(Debug, Error)]
pub enum Error {
    /// The probe request did not return a 2xx status.
    #[error("unexpected response from {url} (status {status})")]
    UnexpectedStatus { url: String, status: StatusCode },

    /// The server did not advertise `Accept-Ranges: bytes`.
    #[error("{url} does not support byte-ranged requests")]
    RangesUnsupported { url: String },

    /// Neither a strong ETag nor Last-Modified was offered.
    #[error("{url} did not offer a strong-enough validator for subsequent requests")]
    NoValidator { url: String },

    /// `Content-Range` was missing or not of the form `bytes X-Y/TOTAL`.
    #[error("{url} returned an invalid Content-Range header: {value:?}")]
    InvalidContentRange { url: String, value: String },

    /// A seek target fell outside `[0, size]`.
    #[error("seek to {position:?} is outside the resource (size {size})")]
    OutOfBounds { position: SeekFrom, size: u64 },

    /// A ranged request was not answered with 206 Partial Content.
    #[error("resource {url} changed or refused the range at offset {offset} (status {status})")]
    ResourceChanged {
        url: String,
        offset: u64,
        status: StatusCode,
    },

    /// The response body ended before the resource size was reached.
    #[error("response body ended at offset {offset}, expected {size} bytes")]
    Truncated { offset: u64, size: u64 },

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    /// Malformed ZIP structure.
    #[error("invalid ZIP archive: {0}")]
    InvalidArchive(String),

    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl Error {
    pub(crate) fn archive(message: impl Into<String>) -> Self {
        Error::InvalidArchive(message.into())
    }

    /// Recover a crate error that travelled through `std::io` traits, or wrap
    /// a plain I/O error.
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
            None => Error::Io(kind.into()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::from_io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            Error::OutOfBounds { .. } | Error::InvalidOption(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            Error::Truncated { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            Error::InvalidArchive(_) => io::Error::new(io::ErrorKind::InvalidData, err),
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_maps_to_invalid_input() {
        let err: io::Error = Error::OutOfBounds {
            position: SeekFrom::Start(27),
            size: 26,
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_round_trip_through_io_error() {
        let original = Error::Truncated {
            offset: 10,
            size: 26,
        };
        let err: io::Error = original.into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        match Error::from_io(err) {
            Error::Truncated { offset, size } => {
                assert_eq!(offset, 10);
                assert_eq!(size, 26);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_io_error_stays_io() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            Error::from_io(err),
            Error::Io(e) if e.kind() == io::ErrorKind::ConnectionReset
        ));
    }
}
