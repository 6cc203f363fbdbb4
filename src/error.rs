use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkstepError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Step failed: {0}")]
    StepFailed(Fault),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Hierarchical failure tag, e.g. `io.timeout`.
///
/// Dot-separated segments form the tag's ancestry: `io.timeout` is within
/// `io`, so a classification rule registered for `io` also matches faults
/// tagged `io.timeout`. This is the explicit, language-neutral replacement
/// for matching on an exception type hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaultTag(String);

impl FaultTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of dot-separated segments. Deeper tags are more specific.
    pub fn depth(&self) -> usize {
        self.0.split('.').count()
    }

    /// True when `self` equals `ancestor` or sits below it in the tag tree.
    pub fn is_within(&self, ancestor: &FaultTag) -> bool {
        self.0 == ancestor.0
            || (self.0.len() > ancestor.0.len()
                && self.0.starts_with(ancestor.0.as_str())
                && self.0.as_bytes()[ancestor.0.len()] == b'.')
    }
}

impl std::fmt::Display for FaultTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FaultTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for FaultTag {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

/// A classified failure raised by a reader, processor or writer.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{tag}: {message}")]
pub struct Fault {
    pub tag: FaultTag,
    pub message: String,
}

impl Fault {
    pub fn new(tag: impl Into<FaultTag>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
        }
    }
}
