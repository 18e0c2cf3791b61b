//! REST client for the hub API.
//!
//! # Architecture
//!
//! - [`path`] - Route templates and named parameter injection
//! - [`filter`] - Query filter builder for list endpoints
//! - [`error`] - Status-derived error taxonomy
//! - [`Client`] - Retrying transport over an [`HttpSend`] implementation
//! - `file` - Bucket and file content protocol (multipart uploads,
//!   tar+gzip directory streaming, directory expansion on download)
//!
//! # Failure model
//!
//! Non-2xx responses are translated, never retried (504 aside). Network
//! failures are retried up to the configured limit, after which the client
//! latches the failure and refuses to send until [`Client::reset`].

pub mod api;
pub mod filter;
pub mod path;

mod bucket;
mod client;
mod error;
mod file;
mod multipart;
mod options;
mod pipe;
mod sender;

pub use bucket::{BucketContent, ensure};
pub use client::{Client, Login};
pub use error::{Error, ErrorKind, NetworkError, RestError, Result};
pub use filter::Filter;
pub use multipart::{Field, Source};
pub use options::{ClientOptions, PoolOptions};
pub use path::{Param, Params, Path};
pub use sender::{HttpSend, ReqwestSender};
