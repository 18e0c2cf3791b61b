use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;
use url::Url;

use crate::command::{Command, CommandRunner};
use crate::driver::{Base, Scm, ScmOption, ScmOptions};
use crate::error::{Error, Result};
use crate::fs;
use crate::model::{Remote, select_proxy};
use crate::settings::SVN_INSECURE;

static REVISION: Lazy<Regex> = Lazy::new(|| Regex::new(r"Revision:\s+(\d+)").unwrap());

pub struct Subversion {
    base: Base,
}

impl Subversion {
    pub fn new(
        remote: Remote,
        path: impl Into<PathBuf>,
        options: ScmOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            base: Base::new(remote, path.into(), options, runner),
        }
    }

    pub fn url(&self) -> Result<SvnUrl> {
        SvnUrl::new(&self.base.remote)
    }

    fn svn(&self) -> Command {
        let home = self.home();
        let mut cmd = Command::new(&self.base.options.svn)
            .env("HOME", home.to_string_lossy())
            .arg("--non-interactive");
        if self.base.insecure {
            cmd = cmd.arg("--trust-server-cert");
        }
        if let Some(ssh) = self.base.ssh_command(&home) {
            cmd = cmd.env("SVN_SSH", ssh);
        }
        cmd
    }

    /// Local directory holding the checkout of the remote sub-path.
    fn root(&self) -> PathBuf {
        let sub = self.base.remote.path.trim_matches('/');
        if sub.is_empty() {
            self.base.path.clone()
        } else {
            self.base.path.join(sub)
        }
    }

    fn init_home(&self) -> Result<()> {
        let home = self.home();
        fs::make_dir(&home)?;
        let url = self.url()?;
        self.write_config(&home, &url)?;
        self.base.write_key(&home)?;
        self.write_password(&home, &url)?;
        Ok(())
    }

    fn write_config(&self, home: &Path, url: &SvnUrl) -> Result<()> {
        let path = home.join(".subversion").join("servers");
        fs::write_file(&path, &self.proxy(url), None)?;
        info!("[SVN] Created: {}", path.display());
        Ok(())
    }

    /// Prime the credential store, then add the password to the cached entry.
    fn write_password(&self, home: &Path, url: &SvnUrl) -> Result<()> {
        let Some(identity) = self.base.identity().filter(|id| id.has_password()) else {
            return Ok(());
        };
        info!("[SVN] Using identity: (id={}) {}", identity.id, identity.name);
        let cmd = self
            .svn()
            .args(["--username", identity.user.as_str()])
            .args(["--password", identity.password.as_str()])
            .arg("info")
            .arg(url.to_string());
        self.base.run(&cmd)?;

        let dir = home.join(".subversion").join("auth").join("svn.simple");
        let path = first_entry(&dir)?;
        let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let mut s: String = [
            ("passtype", "simple"),
            ("username", identity.user.as_str()),
            ("password", identity.password.as_str()),
        ]
        .iter()
        .map(|(key, value)| format!("K {}\n{key}\nV {}\n{value}\n", key.len(), value.len()))
        .collect();
        s.push_str(&content);
        fs::write_file(&path, &s, Some(0o600))?;
        info!("[SVN] Created: {}", path.display());
        Ok(())
    }

    /// `servers` content; empty when no proxy applies.
    fn proxy(&self, url: &SvnUrl) -> String {
        let Some(proxy) = select_proxy(&self.base.proxies, &url.scheme, &url.host) else {
            return String::new();
        };
        info!("[SVN] Using proxy: (id={}) {}", proxy.id, proxy.kind);
        let mut s = format!("[global]\nhttp-proxy-host = {}\n", proxy.host);
        if proxy.port > 0 {
            s.push_str(&format!("http-proxy-port = {}\n", proxy.port));
        }
        if let Some(id) = &proxy.identity {
            s.push_str(&format!(
                "http-proxy-username = {}\nhttp-proxy-password = {}\n",
                id.user, id.password
            ));
        }
        if !proxy.excluded.is_empty() {
            s.push_str(&format!(
                "http-proxy-exceptions = {}\n",
                proxy.excluded.join(" ")
            ));
        }
        s
    }

    fn checkout(&self) -> Result<()> {
        let root = self.root();
        fs::remove_dir(&self.base.path)?;
        fs::make_dir(&root)?;
        let cmd = self
            .svn()
            .arg("checkout")
            .arg(self.url()?.to_string())
            .arg(root.to_string_lossy());
        self.base.run(&cmd).map(drop)
    }

    /// Remote for `reference`: a full URL, or a branch path under the remote.
    fn branch_remote(&self, reference: &str) -> Remote {
        let current = &self.base.remote;
        if Url::parse(reference).is_ok() {
            Remote {
                url: reference.to_string(),
                branch: String::new(),
                path: String::new(),
                ..current.clone()
            }
        } else {
            Remote {
                branch: reference.to_string(),
                ..current.clone()
            }
        }
    }
}

fn first_entry(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|_| Error::CredentialStore(dir.to_path_buf()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
        .into_iter()
        .next()
        .ok_or_else(|| Error::CredentialStore(dir.to_path_buf()))
}

impl Scm for Subversion {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn validate(&self) -> Result<()> {
        let url = self.url()?;
        if url.scheme == "http" && !self.base.insecure {
            return Err(Error::Insecure {
                url: url.raw,
                setting: SVN_INSECURE,
            });
        }
        Ok(())
    }

    fn fetch(&mut self) -> Result<()> {
        fs::must_empty_dir(&self.base.path)?;
        self.init_home()?;
        self.checkout()
    }

    fn update(&mut self) -> Result<()> {
        self.init_home()?;
        let cmd = self.svn().dir(self.root()).arg("update");
        self.base.run(&cmd).map(drop)
    }

    fn branch(&mut self, reference: &str) -> Result<()> {
        self.init_home()?;
        let base_url = self.base.remote.url.clone();
        let remote = self.branch_remote(reference);
        let previous = std::mem::replace(&mut self.base.remote, remote);
        let result = self.checkout().or_else(|_| {
            let target = SvnUrl::new(&Remote {
                path: String::new(),
                ..self.base.remote.clone()
            })?
            .to_string();
            let cmd = self
                .svn()
                .arg("copy")
                .arg(base_url.as_str())
                .arg(target.as_str())
                .arg("-m")
                .arg(format!("Create branch: {target}"));
            self.base.run(&cmd)?;
            self.checkout()
        });
        if result.is_err() {
            self.base.remote = previous;
        }
        result
    }

    fn commit(&mut self, files: &[String], msg: &str) -> Result<()> {
        self.init_home()?;
        let add = self
            .svn()
            .dir(self.root())
            .args(["add", "--force"])
            .args(files.iter().cloned());
        self.base.run(&add)?;
        let commit = self.svn().dir(self.root()).args(["commit", "-m", msg]);
        self.base.run(&commit).map(drop)
    }

    fn head(&mut self) -> Result<String> {
        self.init_home()?;
        let cmd = self.svn().dir(self.root()).args(["info", "-r", "HEAD"]);
        let out = self.base.run(&cmd)?;
        REVISION
            .captures(&out)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(Error::Revision(out))
    }

    fn use_option(&mut self, option: ScmOption) {
        self.base.use_option(option);
    }

    fn clean(&self) -> Result<()> {
        self.base.clean()
    }

    fn clean_home(&self) -> Result<()> {
        self.base.clean_home()
    }

    fn home(&self) -> PathBuf {
        self.base.home_root()
    }

    fn path(&self) -> &Path {
        &self.base.path
    }

    fn remote(&self) -> &Remote {
        &self.base.remote
    }
}

/// A subversion URL with the branch and sub-path appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvnUrl {
    pub raw: String,
    pub scheme: String,
    pub host: String,
    pub branch: String,
    pub root_path: String,
    url: Url,
}

impl SvnUrl {
    pub fn new(remote: &Remote) -> Result<Self> {
        let url = Url::parse(&remote.url).map_err(|_| Error::InvalidUrl(remote.url.clone()))?;
        let mut joined = url.clone();
        let segments: Vec<&str> = [url.path(), remote.branch.as_str(), remote.path.as_str()]
            .into_iter()
            .flat_map(|p| p.split('/'))
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        joined.set_path(&format!("/{}", segments.join("/")));
        Ok(Self {
            raw: remote.url.clone(),
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            branch: remote.branch.clone(),
            root_path: remote.path.clone(),
            url: joined,
        })
    }
}

impl std::fmt::Display for SvnUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}
