//! External commands.
//!
//! A [`Command`] is a plain description (program, arguments, environment,
//! working directory); a [`CommandRunner`] executes it. Drivers only build
//! commands, which keeps them testable without git or svn installed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use tracing::debug;

use crate::error::{Error, Result};

/// Arguments whose following value is never displayed.
const SECRET_FLAGS: &[&str] = &["--password"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    dir: Option<PathBuf>,
}

impl Command {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, val.into()));
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Whether the arguments contain `needle` as a contiguous run.
    pub fn has_args(&self, needle: &[&str]) -> bool {
        self.args
            .windows(needle.len().max(1))
            .any(|w| w.iter().zip(needle).all(|(a, b)| a == b))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        let mut redact = false;
        for arg in &self.args {
            if redact {
                f.write_str(" ********")?;
            } else {
                write!(f, " {arg}")?;
            }
            redact = SECRET_FLAGS.contains(&arg.as_str());
        }
        Ok(())
    }
}

/// Executes commands; returns stdout on a zero exit.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &Command) -> Result<String>;
}

impl<F> CommandRunner for F
where
    F: Fn(&Command) -> Result<String> + Send + Sync,
{
    fn run(&self, command: &Command) -> Result<String> {
        self(command)
    }
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &Command) -> Result<String> {
        debug!("[CMD] {command}");
        let mut inner = StdCommand::new(&command.program);
        inner.args(&command.args);
        inner.envs(command.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &command.dir {
            inner.current_dir(dir);
        }
        let output = inner.output().map_err(|e| Error::Spawn {
            command: command.to_string(),
            source: e,
        })?;
        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stdout));
            return Err(Error::Command {
                command: command.to_string(),
                status: output.status.code(),
                output: text.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
