use reqwest::header::{HeaderMap, HeaderName, HeaderValue, IF_RANGE, RANGE};

use crate::error::{Error, Result};

/// Default number of bytes a forward seek may discard before reconnecting.
pub const DEFAULT_DISCARD: u64 = 4096;

/// Construction-time settings for [`HttpRangeReader`](super::HttpRangeReader).
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Extra headers merged into every request, including the probe.
    pub headers: HeaderMap,
    /// Largest forward seek served by draining the open response.
    pub discard: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            discard: DEFAULT_DISCARD,
        }
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header, keeping any earlier values under the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_discard(mut self, discard: u64) -> Self {
        self.discard = discard;
        self
    }

    /// Add a header given as `Name: value`, the form accepted on the command line.
    pub fn parse_header(self, raw: &str) -> Result<Self> {
        let (name, value) = raw.split_once(':').ok_or_else(|| {
            Error::InvalidOption(format!("header {raw:?} is not of the form 'Name: value'"))
        })?;

        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| {
            Error::InvalidOption(format!("invalid header name {:?}: {e}", name.trim()))
        })?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| Error::InvalidOption(format!("invalid value for header {name}: {e}")))?;

        Ok(self.with_header(name, value))
    }

    /// Reject settings the reader cannot honour.
    ///
    /// `Range` and `If-Range` are written by the reader on every request, so
    /// callers may not supply them.
    pub fn validate(&self) -> Result<()> {
        for reserved in [RANGE, IF_RANGE] {
            if self.headers.contains_key(&reserved) {
                return Err(Error::InvalidOption(format!(
                    "the {reserved} header is managed by the reader"
                )));
            }
        }
        Ok(())
    }
}
