//! In-memory range server for unit tests.

use std::io::{self, Cursor};
use std::sync::{Arc, Mutex};

use reqwest::header::{
    ACCEPT_RANGES, CONTENT_RANGE, ETAG, HeaderMap, HeaderValue, IF_RANGE, LAST_MODIFIED, RANGE,
};
use reqwest::{StatusCode, Url};

use super::transport::{RangeResponse, Transport};
use crate::error::{Error, Result};

pub(crate) const MOCK_URL: &str = "http://mock.test/resource.bin";
const MOCK_LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

struct State {
    content: Vec<u8>,
    etag: Option<String>,
    last_modified: Option<String>,
    accept_ranges: bool,
    ignore_ranges: bool,
    offline: bool,
    status: Option<StatusCode>,
    cut_bodies_at: Option<usize>,
    requests: Vec<HeaderMap>,
}

/// Serves one resource, honouring `Range` and `If-Range` like a static file server.
#[derive(Clone)]
pub(crate) struct MockServer {
    state: Arc<Mutex<State>>,
}

impl MockServer {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                content: content.into(),
                etag: Some("\"v1\"".to_string()),
                last_modified: Some(MOCK_LAST_MODIFIED.to_string()),
                accept_ranges: true,
                ignore_ranges: false,
                offline: false,
                status: None,
                cut_bodies_at: None,
                requests: Vec::new(),
            })),
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(MOCK_URL).unwrap()
    }

    fn update(self, f: impl FnOnce(&mut State)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn without_accept_ranges(self) -> Self {
        self.update(|s| s.accept_ranges = false)
    }

    /// Advertise ranges but answer every request with the full body.
    pub fn ignoring_ranges(self) -> Self {
        self.update(|s| s.ignore_ranges = true)
    }

    pub fn with_etag(self, etag: Option<&str>) -> Self {
        self.update(|s| s.etag = etag.map(str::to_string))
    }

    pub fn with_last_modified(self, last_modified: Option<&str>) -> Self {
        self.update(|s| s.last_modified = last_modified.map(str::to_string))
    }

    pub fn with_status(self, status: StatusCode) -> Self {
        self.update(|s| s.status = Some(status))
    }

    /// Replace the resource, as if it were rewritten on the server.
    pub fn replace_content(&self, content: impl Into<Vec<u8>>, etag: &str) {
        let mut state = self.state.lock().unwrap();
        state.content = content.into();
        state.etag = Some(etag.to_string());
        state.last_modified = Some("Thu, 22 Oct 2015 07:28:00 GMT".to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Send at most `limit` body bytes per response, as if the connection dropped.
    pub fn cut_bodies_at(&self, limit: usize) {
        self.state.lock().unwrap().cut_bodies_at = Some(limit);
    }

    pub fn requests(&self) -> Vec<HeaderMap> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// `Range` header values of every request received so far.
    pub fn ranges(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|h| {
                h.get(RANGE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }
}

impl State {
    fn validator_matches(&self, value: &HeaderValue) -> bool {
        let Ok(value) = value.to_str() else {
            return false;
        };
        self.etag.as_deref() == Some(value) || self.last_modified.as_deref() == Some(value)
    }
}

fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some((start, end))
}

impl Transport for MockServer {
    type Body = Cursor<Vec<u8>>;

    fn get(&self, _url: &Url, headers: HeaderMap) -> Result<RangeResponse<Self::Body>> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(headers.clone());

        if state.offline {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "mock server offline",
            )));
        }

        let len = state.content.len() as u64;
        let mut resp_headers = HeaderMap::new();
        if state.accept_ranges {
            resp_headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }
        if let Some(etag) = &state.etag {
            resp_headers.insert(ETAG, HeaderValue::from_str(etag).unwrap());
        }
        if let Some(last_modified) = &state.last_modified {
            resp_headers.insert(LAST_MODIFIED, HeaderValue::from_str(last_modified).unwrap());
        }

        let range = headers
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range);
        let fresh = headers
            .get(IF_RANGE)
            .is_none_or(|v| state.validator_matches(v));

        let (status, mut body) = match (state.status, range) {
            (Some(status), _) => (status, Vec::new()),
            (None, Some((start, _))) if state.accept_ranges && !state.ignore_ranges && fresh => {
                if start >= len {
                    resp_headers.insert(
                        CONTENT_RANGE,
                        HeaderValue::from_str(&format!("bytes */{len}")).unwrap(),
                    );
                    (StatusCode::RANGE_NOT_SATISFIABLE, Vec::new())
                } else {
                    let end = range
                        .and_then(|(_, end)| end)
                        .unwrap_or(len - 1)
                        .min(len - 1);
                    resp_headers.insert(
                        CONTENT_RANGE,
                        HeaderValue::from_str(&format!("bytes {start}-{end}/{len}")).unwrap(),
                    );
                    let body = state.content[start as usize..=end as usize].to_vec();
                    (StatusCode::PARTIAL_CONTENT, body)
                }
            }
            (None, _) => (StatusCode::OK, state.content.clone()),
        };

        if let Some(limit) = state.cut_bodies_at {
            body.truncate(limit);
        }

        Ok(RangeResponse {
            status,
            headers: resp_headers,
            body: Cursor::new(body),
        })
    }
}
