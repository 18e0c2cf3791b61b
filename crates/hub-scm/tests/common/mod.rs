#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hub_scm::{
    Command, CommandRunner, Error, Factory, GIT_INSECURE, Result, SVN_INSECURE, ScmOptions,
    SettingsMap,
};

type Hook = Box<dyn Fn(&Command) -> Result<()> + Send + Sync>;

/// Stands in for git and svn: checkouts materialize a small tree.
#[derive(Default)]
pub struct FakeTool {
    pub calls: Mutex<Vec<Command>>,
    pub fail_checkout: AtomicBool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub tags: Mutex<Vec<String>>,
    hook: Option<Hook>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called before every command.
    pub fn with_hook(hook: impl Fn(&Command) -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, args: &[&str]) -> usize {
        self.calls().iter().filter(|c| c.has_args(args)).count()
    }

    fn checkout(&self, command: &Command) -> Result<String> {
        let dest = PathBuf::from(command.get_args().last().unwrap());
        std::fs::create_dir_all(dest.join("sub")).unwrap();
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(Error::Command {
                command: command.to_string(),
                status: Some(128),
                output: "fatal: repository not found".into(),
            });
        }
        std::fs::write(dest.join("README"), "readme").unwrap();
        std::fs::write(dest.join("sub/a.txt"), "A").unwrap();
        Ok(String::new())
    }
}

impl CommandRunner for FakeTool {
    fn run(&self, command: &Command) -> Result<String> {
        self.calls.lock().unwrap().push(command.clone());
        let n = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(n, Ordering::SeqCst);
        let result = match &self.hook {
            Some(hook) => hook(command).and_then(|()| self.respond(command)),
            None => self.respond(command),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FakeTool {
    fn respond(&self, command: &Command) -> Result<String> {
        let svn = command.program().ends_with("svn");
        if command.has_args(&["clone"]) || (svn && command.has_args(&["checkout"])) {
            return self.checkout(command);
        }
        if command.has_args(&["show-ref"]) {
            let tag = command.get_args().last().unwrap().trim_start_matches("refs/tags/");
            if self.tags.lock().unwrap().iter().any(|t| t == tag) {
                return Ok(String::new());
            }
            return Err(failed(command));
        }
        if command.has_args(&["rev-parse", "HEAD"]) {
            return Ok("0123abcd\n".into());
        }
        Ok(String::new())
    }
}

pub fn failed(command: &Command) -> Error {
    Error::Command {
        command: command.to_string(),
        status: Some(1),
        output: String::new(),
    }
}

pub fn factory(home: &Path, tool: Arc<FakeTool>) -> Arc<Factory> {
    let settings = SettingsMap::new()
        .with(GIT_INSECURE, false)
        .with(SVN_INSECURE, false);
    Arc::new(
        Factory::new(ScmOptions::with_home(home), Arc::new(settings)).with_runner(tool),
    )
}

/// Entries of `home` other than `.mirror`: driver homes left behind.
pub fn leftover_homes(home: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(home) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.file_name().is_some_and(|n| n != ".mirror"))
            .collect(),
        Err(_) => Vec::new(),
    }
}
