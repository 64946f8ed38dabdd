use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// Per-session secrets keyed by credential name.
///
/// Values never appear in `Debug` output.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Credentials(HashMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Read the credentials named in `keys` from the process environment.
    pub fn from_env(keys: &[&str]) -> Self {
        keys.iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect()
    }

    /// Look up a non-empty credential.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl FromIterator<(String, String)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.0.keys().collect();
        keys.sort();
        f.debug_struct("Credentials").field("keys", &keys).finish()
    }
}
