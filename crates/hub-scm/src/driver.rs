//! Driver contract and construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::command::{Command, CommandRunner, SystemRunner};
use crate::error::Result;
use crate::fs;
use crate::git::Git;
use crate::model::{Identity, ProxyMap, Remote, RemoteKind};
use crate::settings::{GIT_INSECURE, SVN_INSECURE, Settings};
use crate::subversion::Subversion;

/// A source repository working copy.
///
/// Drivers are cheap; build one per operation through [`Factory::new_driver`].
/// Every driver owns a private HOME under `<home>/<id>` for configuration
/// and credentials.
pub trait Scm: Send {
    /// Unique id, assigned on first use.
    fn id(&self) -> &str;

    /// Check the remote URL against the insecure setting.
    fn validate(&self) -> Result<()>;

    /// Create the working copy. The path must be absent or empty.
    fn fetch(&mut self) -> Result<()>;

    /// Bring an existing working copy up to date.
    fn update(&mut self) -> Result<()>;

    /// Switch to `reference`, creating it when missing.
    fn branch(&mut self, reference: &str) -> Result<()>;

    /// Record `files` and publish them to the remote.
    fn commit(&mut self, files: &[String], msg: &str) -> Result<()>;

    /// Current revision.
    fn head(&mut self) -> Result<String>;

    fn use_option(&mut self, option: ScmOption);

    /// Remove the HOME and the working copy. Idempotent.
    fn clean(&self) -> Result<()>;

    /// Remove only the HOME.
    fn clean_home(&self) -> Result<()>;

    /// HOME passed to the tool.
    fn home(&self) -> PathBuf;

    /// Working copy location.
    fn path(&self) -> &Path;

    fn remote(&self) -> &Remote;
}

#[derive(Debug, Clone)]
pub enum ScmOption {
    Identity(Identity),
    Proxies(ProxyMap),
    Insecure(bool),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScmOptions {
    /// Root for `.mirror` and driver homes.
    pub home: PathBuf,
    pub git: PathBuf,
    pub svn: PathBuf,
    /// Committer recorded in the git configuration.
    pub user_name: String,
    pub user_email: String,
}

impl Default for ScmOptions {
    fn default() -> Self {
        Self {
            home: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            git: PathBuf::from("/usr/bin/git"),
            svn: PathBuf::from("/usr/bin/svn"),
            user_name: "Hub".to_string(),
            user_email: "hub@localhost".to_string(),
        }
    }
}

impl ScmOptions {
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            ..Default::default()
        }
    }

    pub fn mirror_root(&self) -> PathBuf {
        self.home.join(".mirror")
    }
}

/// State shared by both drivers.
pub(crate) struct Base {
    id: OnceCell<String>,
    pub(crate) options: ScmOptions,
    pub(crate) remote: Remote,
    pub(crate) path: PathBuf,
    pub(crate) insecure: bool,
    pub(crate) proxies: ProxyMap,
    runner: Arc<dyn CommandRunner>,
}

impl Base {
    pub(crate) fn new(
        remote: Remote,
        path: PathBuf,
        options: ScmOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            id: OnceCell::new(),
            options,
            remote,
            path,
            insecure: false,
            proxies: ProxyMap::new(),
            runner,
        }
    }

    pub(crate) fn id(&self) -> &str {
        self.id.get_or_init(|| Uuid::new_v4().simple().to_string())
    }

    /// `<home>/<id>`, removed by clean.
    pub(crate) fn home_root(&self) -> PathBuf {
        self.options.home.join(self.id())
    }

    pub(crate) fn identity(&self) -> Option<&Identity> {
        self.remote.identity.as_ref()
    }

    pub(crate) fn run(&self, command: &Command) -> Result<String> {
        self.runner.run(command)
    }

    pub(crate) fn use_option(&mut self, option: ScmOption) {
        match option {
            ScmOption::Identity(identity) => self.remote.identity = Some(identity),
            ScmOption::Proxies(proxies) => self.proxies = proxies,
            ScmOption::Insecure(insecure) => self.insecure = insecure,
        }
    }

    /// Write the identity key under `<home>/.ssh`, returning its path.
    pub(crate) fn write_key(&self, home: &Path) -> Result<Option<PathBuf>> {
        let Some(identity) = self.identity().filter(|id| id.has_key()) else {
            return Ok(None);
        };
        let path = self.key_path(home, identity);
        fs::write_file(&path, &identity.key, Some(0o600))?;
        info!("Using key: (id={}) {}", identity.id, identity.name);
        Ok(Some(path))
    }

    pub(crate) fn key_path(&self, home: &Path, identity: &Identity) -> PathBuf {
        home.join(".ssh").join(format!("id_{}", identity.id))
    }

    /// ssh invocation using the identity key, if any.
    pub(crate) fn ssh_command(&self, home: &Path) -> Option<String> {
        let identity = self.identity().filter(|id| id.has_key())?;
        let key = self.key_path(home, identity);
        Some(format!(
            "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new -o UserKnownHostsFile={}",
            key.display(),
            home.join(".ssh").join("known_hosts").display()
        ))
    }

    pub(crate) fn clean(&self) -> Result<()> {
        self.clean_home()?;
        fs::remove_dir(&self.path)
    }

    pub(crate) fn clean_home(&self) -> Result<()> {
        let home = self.home_root();
        debug!("Removing: {}", home.display());
        fs::remove_dir(&home)
    }
}

/// Builds validated drivers.
pub struct Factory {
    options: ScmOptions,
    settings: Arc<dyn Settings>,
    proxies: ProxyMap,
    runner: Arc<dyn CommandRunner>,
}

impl Factory {
    pub fn new(options: ScmOptions, settings: Arc<dyn Settings>) -> Self {
        Self {
            options,
            settings,
            proxies: ProxyMap::new(),
            runner: Arc::new(SystemRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_proxies(mut self, proxies: ProxyMap) -> Self {
        self.proxies = proxies;
        self
    }

    pub fn options(&self) -> &ScmOptions {
        &self.options
    }

    /// Driver for `remote` with its working copy at `path`.
    pub fn new_driver(&self, remote: &Remote, path: impl Into<PathBuf>) -> Result<Box<dyn Scm>> {
        let path = path.into();
        let mut driver: Box<dyn Scm> = match remote.kind {
            RemoteKind::Subversion => {
                let insecure = self.settings.bool(SVN_INSECURE)?;
                let mut svn =
                    Subversion::new(remote.clone(), path, self.options.clone(), self.runner.clone());
                svn.use_option(ScmOption::Insecure(insecure));
                Box::new(svn)
            }
            RemoteKind::Git => {
                let insecure = self.settings.bool(GIT_INSECURE)?;
                let mut git =
                    Git::new(remote.clone(), path, self.options.clone(), self.runner.clone());
                git.use_option(ScmOption::Insecure(insecure));
                Box::new(git)
            }
        };
        let proxies: ProxyMap = self
            .proxies
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(k, p)| (*k, p.clone()))
            .collect();
        driver.use_option(ScmOption::Proxies(proxies));
        driver.validate()?;
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::settings::SettingsMap;

    fn factory(git_insecure: bool) -> Factory {
        let settings = SettingsMap::new()
            .with(GIT_INSECURE, git_insecure)
            .with(SVN_INSECURE, false);
        let runner = |_: &Command| -> Result<String> { Ok(String::new()) };
        Factory::new(ScmOptions::with_home("/tmp/hub-scm"), Arc::new(settings))
            .with_runner(Arc::new(runner))
    }

    #[test]
    fn test_new_driver_kind() {
        let f = factory(false);
        let git = f.new_driver(&Remote::git("https://github.com/org/repo.git"), "/tmp/w").unwrap();
        assert!(git.home().ends_with(".git"));
        assert_eq!(git.home().parent().unwrap(), Path::new("/tmp/hub-scm").join(git.id()));

        let svn = f.new_driver(&Remote::subversion("https://svn.example/repo"), "/tmp/w").unwrap();
        assert_eq!(svn.home(), Path::new("/tmp/hub-scm").join(svn.id()));
        assert_eq!(svn.path(), Path::new("/tmp/w"));
    }

    #[test]
    fn test_new_driver_validates() {
        let err = factory(false)
            .new_driver(&Remote::git("http://github.com/org/repo.git"), "/tmp/w")
            .err()
            .unwrap();
        assert!(matches!(err, Error::Insecure { setting: GIT_INSECURE, .. }));

        factory(true)
            .new_driver(&Remote::git("http://github.com/org/repo.git"), "/tmp/w")
            .unwrap();

        let err = factory(true)
            .new_driver(&Remote::subversion("http://svn.example/repo"), "/tmp/w")
            .err()
            .unwrap();
        assert!(matches!(err, Error::Insecure { setting: SVN_INSECURE, .. }));
    }

    #[test]
    fn test_missing_setting() {
        let f = Factory::new(ScmOptions::with_home("/tmp"), Arc::new(SettingsMap::new()));
        let err = f
            .new_driver(&Remote::git("https://github.com/org/repo.git"), "/tmp/w")
            .err()
            .unwrap();
        assert!(matches!(err, Error::SettingNotFound(key) if key == GIT_INSECURE));
    }

    #[test]
    fn test_id_stable_and_unique() {
        let f = factory(false);
        let remote = Remote::git("https://github.com/org/repo.git");
        let a = f.new_driver(&remote, "/tmp/a").unwrap();
        let b = f.new_driver(&remote, "/tmp/a").unwrap();
        assert_eq!(a.id(), a.id());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_options_deserialize() {
        let options: ScmOptions = serde_json::from_str(r#"{"home":"/data","git":"/opt/git"}"#).unwrap();
        assert_eq!(options.home, Path::new("/data"));
        assert_eq!(options.git, Path::new("/opt/git"));
        assert_eq!(options.svn, Path::new("/usr/bin/svn"));
        assert_eq!(options.mirror_root(), Path::new("/data/.mirror"));
    }
}
