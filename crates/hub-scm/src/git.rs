use std::path::{Path, PathBuf};
use std::sync::Arc;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::info;
use url::Url;

use crate::command::{Command, CommandRunner};
use crate::driver::{Base, Scm, ScmOption, ScmOptions};
use crate::error::{Error, Result};
use crate::fs;
use crate::model::{Remote, select_proxy};
use crate::settings::GIT_INSECURE;

/// Characters kept verbatim in URL userinfo.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub struct Git {
    base: Base,
}

impl Git {
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

    pub fn url(&self) -> Result<GitUrl> {
        GitUrl::parse(&self.base.remote.url)
    }

    fn git(&self) -> Command {
        let home = self.home();
        let mut cmd = Command::new(&self.base.options.git)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("HOME", home.to_string_lossy());
        if let Some(ssh) = self.base.ssh_command(&home) {
            cmd = cmd.env("GIT_SSH_COMMAND", ssh);
        }
        cmd
    }

    /// git command run inside the working copy.
    fn git_in(&self) -> Command {
        self.git().dir(&self.base.path)
    }

    fn init_home(&self) -> Result<()> {
        let home = self.home();
        fs::make_dir(&home)?;
        let url = self.url()?;
        self.write_config(&home, &url)?;
        self.write_creds(&home, &url)?;
        self.base.write_key(&home)?;
        Ok(())
    }

    fn write_config(&self, home: &Path, url: &GitUrl) -> Result<()> {
        let path = home.join(".gitconfig");
        let options = &self.base.options;
        let mut s = format!(
            "[user]\nname = {}\nemail = {}\n\
             [credential]\nhelper = store --file={}\n\
             [http]\nsslVerify = {}\n",
            options.user_name,
            options.user_email,
            home.join(".git-credentials").display(),
            !self.base.insecure,
        );
        if let Some(proxy) = self.proxy(url) {
            s.push_str(&format!("proxy = {proxy}\n"));
        }
        fs::write_file(&path, &s, None)?;
        info!("[GIT] Created: {}", path.display());
        Ok(())
    }

    fn write_creds(&self, home: &Path, url: &GitUrl) -> Result<()> {
        let Some(identity) = self.base.identity().filter(|id| id.has_password()) else {
            return Ok(());
        };
        info!("[GIT] Using identity: (id={}) {}", identity.id, identity.name);
        let path = home.join(".git-credentials");
        let user = utf8_percent_encode(&identity.user, USERINFO);
        let password = utf8_percent_encode(&identity.password, USERINFO);
        let s: String = ["https", "http"]
            .iter()
            .map(|scheme| format!("{scheme}://{user}:{password}@{}\n", url.host))
            .collect();
        fs::write_file(&path, &s, Some(0o600))?;
        info!("[GIT] Created: {}", path.display());
        Ok(())
    }

    /// Proxy URL for the remote, if one applies.
    fn proxy(&self, url: &GitUrl) -> Option<String> {
        let proxy = select_proxy(&self.base.proxies, &url.scheme, url.hostname())?;
        info!("[GIT] Using proxy: (id={}) {}", proxy.id, proxy.kind);
        let auth = match &proxy.identity {
            Some(id) => format!(
                "{}:{}@",
                utf8_percent_encode(&id.user, USERINFO),
                utf8_percent_encode(&id.password, USERINFO)
            ),
            None => String::new(),
        };
        let port = match proxy.port {
            0 => String::new(),
            port => format!(":{port}"),
        };
        Some(format!("http://{auth}{}{port}", proxy.host))
    }

    fn is_tag(&self, reference: &str) -> Result<bool> {
        let cmd = self
            .git_in()
            .args(["show-ref", "--verify", "--quiet"])
            .arg(format!("refs/tags/{reference}"));
        succeeded(self.base.run(&cmd))
    }

    /// HEAD is on a branch (not detached at a tag or commit).
    fn on_branch(&self) -> Result<bool> {
        let cmd = self.git_in().args(["symbolic-ref", "--quiet", "HEAD"]);
        succeeded(self.base.run(&cmd))
    }

    fn default_branch(&self) -> Result<String> {
        let cmd = self
            .git_in()
            .args(["rev-parse", "--abbrev-ref", "origin/HEAD"]);
        let out = self.base.run(&cmd)?;
        let name = out.trim();
        Ok(name.rsplit('/').next().unwrap_or(name).to_string())
    }

    fn fetch_refs(&self) -> Result<()> {
        let cmd = self.git_in().args(["fetch", "--tags", "--prune"]);
        self.base.run(&cmd).map(drop)
    }

    fn checkout(&self, reference: &str) -> Result<()> {
        if self.is_tag(reference)? {
            let cmd = self.git_in().args(["checkout", reference]);
            return self.base.run(&cmd).map(drop);
        }
        let tracking = self
            .git_in()
            .args(["checkout", "-B", reference])
            .arg(format!("origin/{reference}"));
        if self.base.run(&tracking).is_ok() {
            return Ok(());
        }
        let existing = self.git_in().args(["checkout", reference]);
        if self.base.run(&existing).is_ok() {
            return Ok(());
        }
        let created = self.git_in().args(["checkout", "-b", reference]);
        self.base.run(&created).map(drop)
    }
}

/// Map a yes/no command's outcome to a boolean; only a non-zero exit is `false`.
fn succeeded(result: Result<String>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(Error::Command { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

impl Scm for Git {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn validate(&self) -> Result<()> {
        let url = self.url()?;
        if url.scheme == "http" && !self.base.insecure {
            return Err(Error::Insecure {
                url: url.raw,
                setting: GIT_INSECURE,
            });
        }
        Ok(())
    }

    fn fetch(&mut self) -> Result<()> {
        fs::must_empty_dir(&self.base.path)?;
        self.init_home()?;
        let branch = &self.base.remote.branch;
        let mut cmd = self.git().args(["clone", "--depth", "1"]);
        cmd = if branch.is_empty() {
            cmd.arg("--no-single-branch")
        } else {
            cmd.args(["--single-branch", "--branch"]).arg(branch.as_str())
        };
        let cmd = cmd
            .arg(self.base.remote.url.as_str())
            .arg(self.base.path.to_string_lossy());
        self.base.run(&cmd)?;
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        self.init_home()?;
        self.fetch_refs()?;
        if self.on_branch()? {
            let cmd = self.git_in().arg("pull");
            self.base.run(&cmd)?;
        }
        Ok(())
    }

    fn branch(&mut self, reference: &str) -> Result<()> {
        self.init_home()?;
        self.fetch_refs()?;
        let reference = if reference.is_empty() {
            self.default_branch()?
        } else {
            reference.to_string()
        };
        self.checkout(&reference)?;
        self.base.remote.branch = reference;
        Ok(())
    }

    fn commit(&mut self, files: &[String], msg: &str) -> Result<()> {
        self.init_home()?;
        let add = self.git_in().arg("add").args(files.iter().cloned());
        self.base.run(&add)?;
        let commit = self
            .git_in()
            .args(["commit", "--allow-empty", "-m", msg]);
        self.base.run(&commit)?;
        let push = self.git_in().args(["push", "origin", "HEAD"]);
        self.base.run(&push)?;
        Ok(())
    }

    fn head(&mut self) -> Result<String> {
        let cmd = self.git_in().args(["rev-parse", "HEAD"]);
        Ok(self.base.run(&cmd)?.trim().to_string())
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
        self.base.home_root().join(".git")
    }

    fn path(&self) -> &Path {
        &self.base.path
    }

    fn remote(&self) -> &Remote {
        &self.base.remote
    }
}

/// A git remote URL: standard URL or scp-like `user@host:path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUrl {
    pub raw: String,
    pub scheme: String,
    /// Host with the port, when one is given.
    pub host: String,
    pub path: String,
}

impl GitUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(raw) {
            if let Some(host) = url.host_str() {
                let host = match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
                return Ok(Self {
                    raw: raw.to_string(),
                    scheme: url.scheme().to_string(),
                    host,
                    path: url.path().to_string(),
                });
            }
        }
        let (user_host, path) = raw
            .split_once(':')
            .filter(|(user_host, path)| !user_host.contains('/') && !path.is_empty())
            .ok_or_else(|| Error::InvalidUrl(raw.to_string()))?;
        let host = user_host.rsplit('@').next().unwrap_or(user_host);
        if host.is_empty() {
            return Err(Error::InvalidUrl(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            scheme: "ssh".to_string(),
            host: host.to_string(),
            path: path.to_string(),
        })
    }

    /// Host without the port.
    pub fn hostname(&self) -> &str {
        self.host.split(':').next().unwrap_or(&self.host)
    }
}
