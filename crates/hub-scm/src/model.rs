use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Credentials for a remote or a proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub id: u64,
    pub name: String,
    pub kind: String,
    pub user: String,
    pub password: String,
    /// SSH private key.
    pub key: String,
}

impl Identity {
    /// Both user and password are set.
    pub fn has_password(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }

    pub fn has_key(&self) -> bool {
        !self.key.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Http,
    Https,
}

impl ProxyKind {
    /// Proxy family serving a URL scheme.
    pub fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(Self::Http),
            "https" | "ssh" => Some(Self::Https),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    #[serde(default)]
    pub id: u64,
    pub kind: ProxyKind,
    pub host: String,
    /// Zero when unset.
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub excluded: Vec<String>,
    #[serde(default)]
    pub identity: Option<Identity>,
}

impl Proxy {
    pub fn new(kind: ProxyKind, host: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind,
            host: host.into(),
            port: 0,
            enabled: true,
            excluded: Vec::new(),
            identity: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn exclude(mut self, host: impl Into<String>) -> Self {
        self.excluded.push(host.into());
        self
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Enabled and `host` not excluded.
    pub fn applies_to(&self, host: &str) -> bool {
        self.enabled && !self.excluded.iter().any(|h| h == host)
    }
}

/// Proxies keyed by the URL family they serve.
pub type ProxyMap = HashMap<ProxyKind, Proxy>;

/// Select the proxy for a remote, if any.
pub(crate) fn select_proxy<'a>(proxies: &'a ProxyMap, scheme: &str, host: &str) -> Option<&'a Proxy> {
    let kind = ProxyKind::for_scheme(scheme)?;
    proxies.get(&kind).filter(|p| p.applies_to(host))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    #[default]
    Git,
    Subversion,
}

impl RemoteKind {
    /// Anything other than `subversion` is git.
    pub fn parse(kind: &str) -> Self {
        match kind {
            "subversion" => Self::Subversion,
            _ => Self::Git,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Subversion => "subversion",
        }
    }
}

impl fmt::Display for RemoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Remote {
    pub kind: RemoteKind,
    pub url: String,
    pub branch: String,
    /// Sub-path within the repository.
    pub path: String,
    pub identity: Option<Identity>,
}

impl Remote {
    pub fn new(kind: RemoteKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn git(url: impl Into<String>) -> Self {
        Self::new(RemoteKind::Git, url)
    }

    pub fn subversion(url: impl Into<String>) -> Self {
        Self::new(RemoteKind::Subversion, url)
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }
}
