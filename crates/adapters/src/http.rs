// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP probe used by health checks and warm-ups

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    /// Value for the `Host` header, when it must differ from the URL
    pub host: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            host: None,
            timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait HttpProbe: Send + Sync + 'static {
    /// Issue the request and return the response status code
    async fn request(&self, req: HttpRequest) -> Result<u16, HttpError>;
}

/// Probe backed by a shared `reqwest` client. Redirects are not followed so
/// that the status seen is the one the session returned.
#[derive(Clone, Debug)]
pub struct ReqwestHttpProbe {
    client: reqwest::Client,
}

impl ReqwestHttpProbe {
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestHttpProbe {
    async fn request(&self, req: HttpRequest) -> Result<u16, HttpError> {
        let method = reqwest::Method::from_bytes(req.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| HttpError::InvalidRequest(format!("method {}", req.method)))?;
        let mut builder = self.client.request(method, &req.url).timeout(req.timeout);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(host) = &req.host {
            builder = builder.header(reqwest::header::HOST, host.as_str());
        }
        match builder.send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) if e.is_timeout() => Err(HttpError::Timeout(req.timeout)),
            Err(e) if e.is_builder() => Err(HttpError::InvalidRequest(e.to_string())),
            Err(e) => Err(HttpError::Transport(e.to_string())),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{HttpError, HttpProbe, HttpRequest};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct FakeHttpState {
        default: Result<u16, HttpError>,
        scripted: VecDeque<Result<u16, HttpError>>,
        requests: Vec<HttpRequest>,
    }

    /// Fake probe: answers scripted results first, then the default (200).
    #[derive(Clone)]
    pub struct FakeHttpProbe {
        inner: Arc<Mutex<FakeHttpState>>,
    }

    impl Default for FakeHttpProbe {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeHttpState {
                    default: Ok(200),
                    scripted: VecDeque::new(),
                    requests: Vec::new(),
                })),
            }
        }
    }

    impl FakeHttpProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_status(&self, status: u16) {
            self.inner.lock().default = Ok(status);
        }

        /// Every request without a scripted answer fails to connect
        pub fn set_unreachable(&self) {
            self.inner.lock().default = Err(HttpError::Transport("connection refused".into()));
        }

        /// Queue one answer
        pub fn push(&self, result: Result<u16, HttpError>) {
            self.inner.lock().scripted.push_back(result);
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.inner.lock().requests.clone()
        }
    }

    #[async_trait]
    impl HttpProbe for FakeHttpProbe {
        async fn request(&self, req: HttpRequest) -> Result<u16, HttpError> {
            let mut state = self.inner.lock();
            state.requests.push(req);
            match state.scripted.pop_front() {
                Some(result) => result,
                None => state.default.clone(),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeHttpProbe;

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
