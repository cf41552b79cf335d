// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Free TCP port allocation for session processes

use async_trait::async_trait;
use thiserror::Error;

const MAX_ATTEMPTS: u32 = 64;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("no free port found after {0} attempts")]
    Exhausted(u32),
    #[error("failed to probe for a free port: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait PortRetriever: Send + Sync + 'static {
    /// A currently unused port that is not in `except`
    async fn get_free_port(&self, except: &[u16]) -> Result<u16, PortError>;
}

/// Asks the OS for an ephemeral port on the loopback interface
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpPortRetriever;

#[async_trait]
impl PortRetriever for TcpPortRetriever {
    async fn get_free_port(&self, except: &[u16]) -> Result<u16, PortError> {
        for _ in 0..MAX_ATTEMPTS {
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
            let port = listener.local_addr()?.port();
            if !except.contains(&port) {
                return Ok(port);
            }
        }
        Err(PortError::Exhausted(MAX_ATTEMPTS))
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{PortError, PortRetriever};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Hands out sequential ports starting at 4000
    #[derive(Clone)]
    pub struct FakePortRetriever {
        next: Arc<Mutex<u16>>,
    }

    impl Default for FakePortRetriever {
        fn default() -> Self {
            Self { next: Arc::new(Mutex::new(4000)) }
        }
    }

    impl FakePortRetriever {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PortRetriever for FakePortRetriever {
        async fn get_free_port(&self, except: &[u16]) -> Result<u16, PortError> {
            let mut next = self.next.lock();
            while except.contains(&*next) {
                *next += 1;
            }
            let port = *next;
            *next += 1;
            Ok(port)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePortRetriever;

#[cfg(test)]
#[path = "port_tests.rs"]
mod tests;
