use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

pub const ENV_BASE_URL: &str = "HUB_BASE_URL";
pub const ENV_TOKEN: &str = "HUB_TOKEN";
pub const ENV_RETRY: &str = "HUB_RETRY";

pub const DEFAULT_RETRY: u32 = 60;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Client configuration.
///
/// # Examples
///
/// ```
/// use hub_binding::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("http://localhost:8080")
///     .token("Bearer abc")
///     .retry(3)
///     .retry_delay(Duration::from_millis(50));
/// assert_eq!(options.retry, 3);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Scheme, host and optional root path every route is joined onto.
    pub base_url: String,

    /// Opaque `Authorization` header value.
    pub token: String,

    /// Refresh token used to renew `token` after a 401.
    pub refresh: Option<String>,

    /// Retries after the first attempt, for network failures and 504.
    pub retry: u32,

    #[serde(deserialize_with = "seconds")]
    pub retry_delay: Duration,

    /// Treat an empty 2xx body as [`ErrorKind::EmptyBody`](crate::ErrorKind::EmptyBody)
    /// when a body is expected.
    pub strict_body: bool,

    pub pool: PoolOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            refresh: None,
            retry: DEFAULT_RETRY,
            retry_delay: DEFAULT_RETRY_DELAY,
            strict_body: false,
            pool: PoolOptions::default(),
        }
    }
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Read `HUB_BASE_URL`, `HUB_TOKEN` and `HUB_RETRY`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(ENV_BASE_URL)
            .map_err(|_| Error::Config(format!("{ENV_BASE_URL} not set")))?;
        let mut options = Self::new(base_url);
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            options.token = token;
        }
        if let Ok(retry) = std::env::var(ENV_RETRY) {
            options.retry = retry
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_RETRY}: not a count: {retry}")))?;
        }
        Ok(options)
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn refresh(mut self, refresh: impl Into<String>) -> Self {
        self.refresh = Some(refresh.into());
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn strict_body(mut self, strict: bool) -> Self {
        self.strict_body = strict;
        self
    }

    pub fn pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }
}

/// Connection pool settings for the reqwest client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    #[serde(deserialize_with = "seconds")]
    pub connect_timeout: Duration,
    #[serde(deserialize_with = "seconds")]
    pub keep_alive: Duration,
    #[serde(deserialize_with = "seconds")]
    pub idle_timeout: Duration,
    pub max_idle_per_host: usize,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`.
    pub env_proxy: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            keep_alive: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(10),
            max_idle_per_host: 3,
            env_proxy: true,
        }
    }
}

impl PoolOptions {
    pub fn build(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(self.keep_alive)
            .pool_idle_timeout(self.idle_timeout)
            .pool_max_idle_per_host(self.max_idle_per_host.max(1));
        if !self.env_proxy {
            builder = builder.no_proxy();
        }
        builder.build()
    }
}

fn seconds<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
    let secs = f64::deserialize(d)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
