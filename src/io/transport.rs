//! Blocking HTTP collaborator used by the range reader.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};

use crate::error::Result;

/// Default request timeout for [`ReqwestTransport`].
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status line, headers and streaming body of a GET response.
pub struct RangeResponse<B> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: B,
}

/// A blocking "send GET, get response" capability.
///
/// The reader only ever issues GETs; connection pooling, TLS and timeouts
/// are the implementation's business.
pub trait Transport {
    type Body: Read;

    fn get(&self, url: &Url, headers: HeaderMap) -> Result<RangeResponse<Self::Body>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    type Body = T::Body;

    fn get(&self, url: &Url, headers: HeaderMap) -> Result<RangeResponse<Self::Body>> {
        (**self).get(url, headers)
    }
}

/// Transport backed by `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured client (proxies, custom TLS, ...).
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    type Body = reqwest::blocking::Response;

    fn get(&self, url: &Url, headers: HeaderMap) -> Result<RangeResponse<Self::Body>> {
        let resp = self.client.get(url.clone()).headers(headers).send()?;
        Ok(RangeResponse {
            status: resp.status(),
            headers: resp.headers().clone(),
            body: resp,
        })
    }
}
