use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ResolveError;

/// Where a source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Usb,
    Network,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Local => write!(f, "local"),
            SourceKind::Usb => write!(f, "usb"),
            SourceKind::Network => write!(f, "network"),
        }
    }
}

/// Username/password pair for a network share. Either may be empty.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A resolved input location. Read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    kind: SourceKind,
    path: String,
    credential: Option<Credential>,
}

impl Source {
    /// Builds a source, rejecting an empty path.
    pub fn new(
        kind: SourceKind,
        path: impl Into<String>,
        credential: Option<Credential>,
    ) -> Result<Self, ResolveError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(ResolveError::EmptyPath);
        }
        Ok(Self {
            kind,
            path,
            credential,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Filesystem path, or `\\host\share` for network sources.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}
