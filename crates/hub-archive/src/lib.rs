//! Streaming tar+gzip packing and expansion of directory trees.
//!
//! # Architecture
//!
//! - `writer.rs` - Gzip-compressed tar producer over any `Write` sink
//! - `extract.rs` - Gzip-compressed tar consumer with path sanitization
//! - `sanitize.rs` - Entry path validation (traversal prevention)
//!
//! Both halves are synchronous and pull/push through plain `Read`/`Write`
//! so they can sit on either end of a pipe without buffering the archive.

pub use error::{Error, Result};
pub use extract::{Report, extract};
pub use writer::Writer;

mod error;
mod extract;
mod sanitize;
mod writer;
