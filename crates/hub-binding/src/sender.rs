use std::error::Error as StdError;
use std::future::Future;
use std::io;

use once_cell::sync::OnceCell;
use reqwest::{Request, Response};

use crate::error::{Error, NetworkError, Result};
use crate::options::PoolOptions;

/// Sends a single HTTP request.
///
/// Implementations report transient failures (refused, reset, timed out)
/// as [`Error::Network`]; the client retries only those.
///
/// # Implementations
///
/// - [`ReqwestSender`]: pooled `reqwest` client
/// - Scripted mocks in tests
pub trait HttpSend: Send + Sync {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Production sender; the pool is built on first use and reused.
pub struct ReqwestSender {
    pool: PoolOptions,
    client: OnceCell<reqwest::Client>,
}

impl ReqwestSender {
    pub fn new(pool: PoolOptions) -> Self {
        Self {
            pool,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::Client> {
        self.client
            .get_or_try_init(|| self.pool.build())
            .map_err(|e| Error::Config(format!("HTTP client: {}", chain(&e))))
    }
}

impl Default for ReqwestSender {
    fn default() -> Self {
        Self::new(PoolOptions::default())
    }
}

impl HttpSend for ReqwestSender {
    async fn send(&self, request: Request) -> Result<Response> {
        let method = request.method().to_string();
        let path = request.url().path().to_string();
        self.client()?
            .execute(request)
            .await
            .map_err(|e| classify(e, &method, &path))
    }
}

/// Split reqwest failures into transient network errors and the rest.
pub(crate) fn classify(err: reqwest::Error, method: &str, path: &str) -> Error {
    if err.is_connect() || err.is_timeout() || transient_io(&err) {
        Error::Network(NetworkError::new(method, path, chain(&err)))
    } else {
        Error::Request(chain(&err))
    }
}

fn transient_io(err: &(dyn StdError + 'static)) -> bool {
    let mut next = Some(err);
    while let Some(e) = next {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            return matches!(
                io.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::BrokenPipe
            );
        }
        next = e.source();
    }
    false
}

/// Render an error with its sources, `outer: inner: root`.
pub(crate) fn chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut next = err.source();
    while let Some(e) = next {
        let msg = e.to_string();
        if !out.ends_with(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        next = e.source();
    }
    out
}
