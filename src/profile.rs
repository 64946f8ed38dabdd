//! Selectable chat profiles.
//!
//! A profile names the model provider a session talks to. The set is closed:
//! names outside it are rejected instead of falling back to a default.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// A profile shown to the user before a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

static PROFILES: [Profile; 2] = [
    Profile {
        name: "OpenAI",
        description: "This is using OpenAI model.",
        icon: "https://picsum.photos/id/180/200",
    },
    Profile {
        name: "Gemini",
        description: "This is using Gemini model.",
        icon: "https://picsum.photos/id/181/200",
    },
];

/// All selectable profiles, in display order.
pub fn profiles() -> &'static [Profile] {
    &PROFILES
}

/// The model provider behind a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProviderKind {
    OpenAI,
    Gemini,
}

impl ProviderKind {
    pub fn profile(self) -> &'static Profile {
        match self {
            ProviderKind::OpenAI => &PROFILES[0],
            ProviderKind::Gemini => &PROFILES[1],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().name)
    }
}

impl FromStr for ProviderKind {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OpenAI" => Ok(ProviderKind::OpenAI),
            "Gemini" => Ok(ProviderKind::Gemini),
            other => Err(ProfileError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("unknown profile '{0}' (expected one of: OpenAI, Gemini)")]
    Unknown(String),
}
