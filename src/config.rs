//! Step configuration loaded from `chunkstep.toml`.
//!
//! [`StepConfig`] holds every configurable bound plus the classification
//! rule table. Values missing from the file fall back to safe defaults:
//! no retry, no skip, every fault fatal.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Result, bail};
use serde::Deserialize;

use crate::engine::{Classifier, Decision, RetryPolicy, SkipPolicy};
use crate::orchestrator::StepPolicies;

/// Top-level configuration loaded from `chunkstep.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Maximum number of items per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Total whole-chunk commit attempts; 1 means no retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum items excluded from commit per run; 0 disables skipping.
    #[serde(default)]
    pub skip_limit: u32,

    /// Classification rules: fault tag → skippable | retryable | fatal.
    /// Unregistered tags are fatal.
    #[serde(default)]
    pub rules: BTreeMap<String, Decision>,
}

// Default chunk size: 10 items.
fn default_chunk_size() -> usize {
    10
}

// Default attempts: 1, i.e. no retry.
fn default_max_attempts() -> u32 {
    1
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_attempts: default_max_attempts(),
            skip_limit: 0,
            rules: BTreeMap::new(),
        }
    }
}

impl StepConfig {
    /// Loads `chunkstep.toml` from the current directory, falling back to
    /// defaults if the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Path::new("chunkstep.toml");
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads and validates a configuration file at an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: StepConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be at least 1");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        Ok(())
    }

    /// Builds the engine-level policy set from this configuration.
    pub fn policies(&self) -> StepPolicies {
        let mut classifier = Classifier::new();
        for (tag, decision) in &self.rules {
            classifier.add_rule(tag.as_str(), *decision);
        }
        StepPolicies {
            chunk_size: self.chunk_size,
            retry: RetryPolicy::new(self.max_attempts),
            skip: SkipPolicy::new(self.skip_limit),
            classifier,
        }
    }
}
