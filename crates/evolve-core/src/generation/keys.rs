//! Round-robin credential rotation.

use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

/// Opaque API credential. Never printed in full.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({self})")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if self.0.chars().count() > 8 {
            write!(f, "***{tail}")
        } else {
            f.write_str("***")
        }
    }
}

/// Ordered, de-duplicated credentials handed out in round-robin order.
pub struct KeyRotator {
    credentials: Vec<Credential>,
    cursor: Mutex<usize>,
}

impl KeyRotator {
    /// Empty and duplicate tokens are dropped; first occurrence wins.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut credentials: Vec<Credential> = Vec::new();
        for token in tokens {
            let token = token.into();
            let token = token.trim();
            if token.is_empty() || credentials.iter().any(|c| c.expose() == token) {
                continue;
            }
            credentials.push(Credential::new(token));
        }
        Self {
            credentials,
            cursor: Mutex::new(0),
        }
    }

    /// Explicit tokens first, then the value of each named variable as
    /// returned by `lookup`, in order.
    pub fn from_sources<F>(tokens: &[String], env_names: &[String], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = env_names.iter().filter_map(|name| lookup(name));
        let rotator = Self::new(tokens.iter().cloned().chain(from_env));
        debug!(credentials = rotator.len(), "loaded credentials");
        rotator
    }

    /// Read credentials from the process environment.
    pub fn from_env(env_names: &[String]) -> Self {
        Self::from_sources(&[], env_names, |name| std::env::var(name).ok())
    }

    /// The credential at the cursor; advances the cursor. `None` when no
    /// credentials are configured.
    pub fn next_credential(&self) -> Option<Credential> {
        if self.credentials.is_empty() {
            return None;
        }
        let mut cursor = self.cursor.lock();
        let credential = self.credentials[*cursor].clone();
        *cursor = (*cursor + 1) % self.credentials.len();
        Some(credential)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl fmt::Debug for KeyRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRotator")
            .field("credentials", &self.credentials)
            .field("cursor", &*self.cursor.lock())
            .finish()
    }
}
