use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use reqwest::header::{
    ACCEPT_RANGES, CONTENT_RANGE, ETAG, HeaderMap, HeaderValue, IF_RANGE, LAST_MODIFIED, RANGE,
};
use reqwest::{StatusCode, Url};
use tracing::{debug, trace, warn};

use super::options::ReaderOptions;
use super::transport::{ReqwestTransport, Transport};
use super::{ReadAt, resolve_seek};
use crate::error::{Error, Result};

/// Number of leading bytes captured by the probe request.
pub const HEAD_SIZE: usize = 512;

/// Chunk size used when draining bytes for a short forward seek.
const DISCARD_CHUNK: usize = 4096;

/// The single response body a reader may hold.
enum Connection<B> {
    Closed,
    Open(B),
}

impl<B> Connection<B> {
    fn close(&mut self) {
        *self = Connection::Closed;
    }

    fn is_open(&self) -> bool {
        matches!(self, Connection::Open(_))
    }
}

/// Parsed `Content-Range: bytes START-END/TOTAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    start: u64,
    end: u64,
    total: u64,
}

fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    let range = ContentRange {
        start: start.trim().parse().ok()?,
        end: end.trim().parse().ok()?,
        total: total.trim().parse().ok()?,
    };
    (range.start <= range.end && range.end < range.total).then_some(range)
}

/// A quoted (strong) ETag, else Last-Modified.
fn validator_from(headers: &HeaderMap) -> Option<HeaderValue> {
    headers
        .get(ETAG)
        .filter(|etag| etag.as_bytes().starts_with(b"\""))
        .or_else(|| headers.get(LAST_MODIFIED).filter(|v| !v.is_empty()))
        .cloned()
}

/// What the probe learns about the resource.
struct Probe {
    size: u64,
    head_bytes: Vec<u8>,
    validator: HeaderValue,
}

impl Probe {
    fn run<T: Transport>(transport: &T, url: &Url, extra: &HeaderMap) -> Result<Self> {
        let mut headers = extra.clone();
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-511"));

        let resp = transport.get(url, headers)?;

        let mut head_bytes = Vec::with_capacity(HEAD_SIZE);
        resp.body
            .take(HEAD_SIZE as u64)
            .read_to_end(&mut head_bytes)?;

        if !resp.status.is_success() {
            return Err(Error::UnexpectedStatus {
                url: url.to_string(),
                status: resp.status,
            });
        }

        let accepts_bytes = resp
            .headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("bytes"));
        if !accepts_bytes {
            return Err(Error::RangesUnsupported {
                url: url.to_string(),
            });
        }

        let validator = validator_from(&resp.headers).ok_or_else(|| Error::NoValidator {
            url: url.to_string(),
        })?;

        let raw_range = resp
            .headers
            .get(CONTENT_RANGE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        let range = parse_content_range(&raw_range).ok_or_else(|| Error::InvalidContentRange {
            url: url.to_string(),
            value: raw_range.clone(),
        })?;

        Ok(Self {
            size: range.total,
            head_bytes,
            validator,
        })
    }
}

/// Seekable reader over a remote resource, backed by HTTP Range requests.
///
/// Construction probes the first 512 bytes to learn the total size and a
/// validator. After that, reads stream from one open `bytes=N-` response.
/// Forward seeks of at most [`discard_budget`](Self::discard_budget) bytes
/// drain the open response; any other seek opens a new request. Every ranged
/// request carries `If-Range`, so a resource rewritten mid-stream surfaces as
/// [`Error::ResourceChanged`] instead of spliced bytes.
///
/// The reader is not thread-safe: all operations take `&mut self`.
///
/// # Example
///
/// ```no_run
/// use std::io::{Read, Seek, SeekFrom};
/// use httpseek::{HttpRangeReader, ReadAt};
///
/// # fn main() -> httpseek::Result<()> {
/// let mut reader = HttpRangeReader::new("https://example.com/archive.zip")?;
/// let mut tail = [0u8; 22];
/// reader.seek(SeekFrom::End(-22))?;
/// reader.read_exact(&mut tail)?;
/// println!("{} bytes, {} requests", reader.size(), reader.request_count());
/// # Ok(())
/// # }
/// ```
pub struct HttpRangeReader<T: Transport = ReqwestTransport> {
    transport: T,
    url: Url,
    headers: HeaderMap,
    size: u64,
    offset: u64,
    head_bytes: Vec<u8>,
    validator: HeaderValue,
    discard: u64,
    request_count: u64,
    transferred_bytes: u64,
    connection: Connection<T::Body>,
}

impl HttpRangeReader {
    /// Probe `url` with the default client and options.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_options(url, ReaderOptions::default())
    }

    pub fn with_options(url: &str, options: ReaderOptions) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Self::with_transport(url, ReqwestTransport::new()?, options)
    }
}

impl<T: Transport> HttpRangeReader<T> {
    /// Probe `url` through a caller-supplied transport.
    pub fn with_transport(url: Url, transport: T, options: ReaderOptions) -> Result<Self> {
        options.validate()?;

        let probe = Probe::run(&transport, &url, &options.headers)?;
        debug!(
            url = %url,
            size = probe.size,
            validator = ?probe.validator,
            "probed remote resource"
        );

        Ok(Self {
            transport,
            url,
            headers: options.headers,
            size: probe.size,
            offset: 0,
            transferred_bytes: probe.head_bytes.len() as u64,
            head_bytes: probe.head_bytes,
            validator: probe.validator,
            discard: options.discard,
            request_count: 1,
            connection: Connection::Closed,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// First bytes of the resource (at most 512), for format sniffing.
    pub fn head_bytes(&self) -> &[u8] {
        &self.head_bytes
    }

    /// The ETag or Last-Modified value sent as `If-Range`.
    pub fn validator(&self) -> &HeaderValue {
        &self.validator
    }

    /// HTTP requests issued so far, the probe included.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Body bytes pulled from the network, including discarded ones.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    pub fn discard_budget(&self) -> u64 {
        self.discard
    }

    pub fn position(&self) -> u64 {
        self.offset
    }

    /// True once the cursor has reached the end of the resource.
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.size
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// Open `bytes=<offset>-` guarded by the validator, replacing any open body.
    fn request(&mut self) -> Result<T::Body> {
        self.connection.close();

        let mut headers = self.headers.clone();
        headers.insert(
            RANGE,
            HeaderValue::from_str(&format!("bytes={}-", self.offset))?,
        );
        headers.insert(IF_RANGE, self.validator.clone());

        self.request_count += 1;
        debug!(
            url = %self.url,
            offset = self.offset,
            requests = self.request_count,
            "opening ranged request"
        );
        let resp = self.transport.get(&self.url, headers)?;

        let moved = resp
            .headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .is_some_and(|range| range.start != self.offset || range.total != self.size);

        if resp.status != StatusCode::PARTIAL_CONTENT || moved {
            warn!(
                url = %self.url,
                offset = self.offset,
                status = %resp.status,
                "ranged request rejected, resource changed"
            );
            return Err(Error::ResourceChanged {
                url: self.url.to_string(),
                offset: self.offset,
                status: resp.status,
            });
        }

        Ok(resp.body)
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.offset >= self.size || buf.is_empty() {
            return Ok(0);
        }

        let mut body = match std::mem::replace(&mut self.connection, Connection::Closed) {
            Connection::Open(body) => body,
            Connection::Closed => self.request()?,
        };

        let remaining = self.size - self.offset;
        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));

        // A failed body read leaves the slot closed.
        let n = body.read(&mut buf[..want])?;
        self.connection = Connection::Open(body);

        if n == 0 {
            return Err(Error::Truncated {
                offset: self.offset,
                size: self.size,
            });
        }

        self.offset += n as u64;
        self.transferred_bytes += n as u64;
        Ok(n)
    }

    /// Drain exactly `count` bytes from the open response.
    fn discard_bytes(&mut self, count: u64) -> Result<()> {
        trace!(offset = self.offset, count, "reusing open response");

        let mut scratch = [0u8; DISCARD_CHUNK];
        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(DISCARD_CHUNK as u64) as usize;
            let n = self.read_inner(&mut scratch[..chunk])?;
            if n == 0 {
                return Err(Error::Truncated {
                    offset: self.offset,
                    size: self.size,
                });
            }
            remaining -= n as u64;
        }
        Ok(())
    }

    fn seek_inner(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.offset, self.size)?;

        match target.checked_sub(self.offset) {
            Some(0) => {}
            Some(delta) if delta <= self.discard => {
                if self.connection.is_open() {
                    self.discard_bytes(delta)?;
                } else {
                    // The next read opens at the new offset.
                    self.offset = target;
                }
            }
            _ => {
                self.offset = target;
                self.connection.close();
                // Nothing is left to fetch at the very end.
                if target < self.size {
                    let body = self.request()?;
                    self.connection = Connection::Open(body);
                }
            }
        }

        Ok(self.offset)
    }
}

impl<T: Transport> Read for HttpRangeReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_inner(buf)?)
    }
}

impl<T: Transport> Seek for HttpRangeReader<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_inner(pos)?)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.offset)
    }
}

impl<T: Transport> ReadAt for HttpRangeReader<T> {
    fn size(&self) -> u64 {
        self.size
    }

    fn close(&mut self) -> io::Result<()> {
        self.connection.close();
        Ok(())
    }
}

impl<T: Transport> fmt::Debug for HttpRangeReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRangeReader")
            .field("url", &self.url.as_str())
            .field("size", &self.size)
            .field("offset", &self.offset)
            .field("connected", &self.connection.is_open())
            .field("request_count", &self.request_count)
            .finish()
    }
}
