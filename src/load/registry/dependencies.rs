//! Dependency tokens
//!
//! Manifest dependency strings carry a sigil: none for a Hard dependency, `>`
//! for a Weak one and `@` for a raw file. They are parsed once, on ingestion,
//! into [`DependencyToken`]; the resolver never looks at sigils again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::load::traits::LoadError;

const WEAK_SIGIL: char = '>';
const RAW_FILE_SIGIL: char = '@';

/// A single declared dependency
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DependencyToken {
    /// Blocks batching until the named package is provided
    Hard(String),
    /// Requested alongside, but never blocks batching
    Weak(String),
    /// Literal fetch target; bypasses package lookup
    RawFile(String),
}

impl DependencyToken {
    /// Parse a sigil-prefixed token
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        let token = if let Some(name) = raw.strip_prefix(WEAK_SIGIL) {
            DependencyToken::Weak(name.to_string())
        } else if let Some(path) = raw.strip_prefix(RAW_FILE_SIGIL) {
            DependencyToken::RawFile(path.to_string())
        } else {
            DependencyToken::Hard(raw.to_string())
        };

        if token.target().is_empty() {
            return Err(LoadError::InvalidToken(raw.to_string()));
        }
        Ok(token)
    }

    /// Package name or file path, without sigil
    pub fn target(&self) -> &str {
        match self {
            DependencyToken::Hard(name)
            | DependencyToken::Weak(name)
            | DependencyToken::RawFile(name) => name,
        }
    }

    /// Package name for Hard/Weak tokens
    pub fn package(&self) -> Option<&str> {
        match self {
            DependencyToken::Hard(name) | DependencyToken::Weak(name) => Some(name),
            DependencyToken::RawFile(_) => None,
        }
    }

    pub fn is_hard(&self) -> bool {
        matches!(self, DependencyToken::Hard(_))
    }
}

impl FromStr for DependencyToken {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DependencyToken::parse(s)
    }
}

impl TryFrom<String> for DependencyToken {
    type Error = LoadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DependencyToken::parse(&value)
    }
}

impl From<DependencyToken> for String {
    fn from(token: DependencyToken) -> Self {
        token.to_string()
    }
}

impl fmt::Display for DependencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyToken::Hard(name) => write!(f, "{}", name),
            DependencyToken::Weak(name) => write!(f, "{}{}", WEAK_SIGIL, name),
            DependencyToken::RawFile(path) => write!(f, "{}{}", RAW_FILE_SIGIL, path),
        }
    }
}
