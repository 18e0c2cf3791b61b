//! Source repository drivers and the process-wide mirror cache.
//!
//! # Architecture
//!
//! - [`command`] - External command description and runner seam
//! - [`Scm`] - Driver contract, implemented by [`Git`] and [`Subversion`]
//! - [`Factory`] - Builds drivers from a [`Remote`] plus settings and proxies
//! - [`mirror`] - Digest-keyed working copies, one lock per mirror
//!
//! Drivers write their configuration and credentials under a per-driver
//! HOME (`<home>/<uuid>`) so concurrent drivers never share files.
//! Everything here is blocking; run it on threads or a blocking pool.

pub mod command;
pub mod mirror;

mod driver;
mod error;
mod fs;
mod git;
mod model;
mod settings;
mod subversion;

pub use command::{Command, CommandRunner, SystemRunner};
pub use driver::{Factory, Scm, ScmOption, ScmOptions};
pub use error::{Error, Result};
pub use fs::copy_dir_all;
pub use git::{Git, GitUrl};
pub use mirror::{Mirror, MirrorMap, digest, get_mirror, registry};
pub use model::{Identity, Proxy, ProxyKind, ProxyMap, Remote, RemoteKind};
pub use settings::{GIT_INSECURE, SVN_INSECURE, Settings, SettingsMap};
pub use subversion::{Subversion, SvnUrl};
