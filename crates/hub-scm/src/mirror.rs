//! Process-wide mirror cache.
//!
//! A mirror is a working copy under `<home>/.mirror/<digest>` shared by every
//! caller asking for the same (kind, URL). Operations on one mirror are
//! serialized; distinct mirrors proceed in parallel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::driver::{Factory, Scm};
use crate::error::Result;
use crate::fs::copy_dir_all;
use crate::model::{Remote, RemoteKind};

static MIRRORS: Lazy<MirrorMap> = Lazy::new(MirrorMap::default);

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a of kind and URL, in lowercase hex.
pub fn digest(kind: RemoteKind, url: &str) -> String {
    let hash = kind
        .as_str()
        .bytes()
        .chain(url.bytes())
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    format!("{hash:x}")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The mirror for `remote` from the process-wide registry.
pub fn get_mirror(remote: &Remote, factory: &Arc<Factory>) -> Arc<Mirror> {
    MIRRORS.find(remote, factory)
}

/// The process-wide registry.
pub fn registry() -> &'static MirrorMap {
    &MIRRORS
}

/// Mirrors keyed by digest.
#[derive(Default)]
pub struct MirrorMap {
    content: Mutex<HashMap<String, Arc<Mirror>>>,
}

impl MirrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mirror for `remote`, created on first use.
    ///
    /// The first caller's factory is kept for the life of the entry.
    pub fn find(&self, remote: &Remote, factory: &Arc<Factory>) -> Arc<Mirror> {
        let digest = digest(remote.kind, &remote.url);
        let mut content = lock(&self.content);
        content
            .entry(digest)
            .or_insert_with_key(|digest| Arc::new(Mirror::new(digest.clone(), factory.clone())))
            .clone()
    }

    /// Forget all entries. Working copies stay on disk.
    pub fn clear(&self) {
        lock(&self.content).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.content).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Mirror {
    digest: String,
    path: PathBuf,
    factory: Arc<Factory>,
    lock: Mutex<()>,
}

impl Mirror {
    pub fn new(digest: String, factory: Arc<Factory>) -> Self {
        let path = factory.options().mirror_root().join(&digest);
        Self {
            digest,
            path,
            factory,
            lock: Mutex::new(()),
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Working copy location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch or update the working copy, then select the remote's branch.
    pub fn update(&self, remote: &Remote) -> Result<()> {
        let _guard = lock(&self.lock);
        self.sync(remote)
    }

    /// Update, then copy the remote's sub-path (or the whole tree) to `dest`.
    pub fn copy_to(&self, remote: &Remote, dest: impl AsRef<Path>) -> Result<()> {
        let _guard = lock(&self.lock);
        self.sync(remote)?;
        let src = match remote.path.trim_matches('/') {
            "" => self.path.clone(),
            sub => self.path.join(sub),
        };
        copy_dir_all(&src, dest)
    }

    fn sync(&self, remote: &Remote) -> Result<()> {
        let base = Remote {
            branch: String::new(),
            path: String::new(),
            ..remote.clone()
        };
        let mut driver = self.factory.new_driver(&base, &self.path)?;
        let result = self.run(driver.as_mut(), &remote.branch);
        if let Err(e) = driver.clean_home() {
            warn!("[MIRROR] {}: home not removed: {e}", self.digest);
        }
        result
    }

    fn run(&self, driver: &mut dyn Scm, branch: &str) -> Result<()> {
        if self.path.exists() {
            info!("[MIRROR] Updating: {}", self.path.display());
            driver.update()?;
        } else {
            info!("[MIRROR] Fetching: {} => {}", driver.remote().url, self.path.display());
            if let Err(e) = driver.fetch() {
                if let Err(clean) = driver.clean() {
                    warn!("[MIRROR] {}: clean failed: {clean}", self.digest);
                }
                return Err(e);
            }
        }
        if !branch.is_empty() {
            driver.branch(branch)?;
        }
        Ok(())
    }
}
