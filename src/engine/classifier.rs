//! Failure classification: maps a fault to a skip/retry/fatal verdict.
//!
//! Rules form an explicit ranked lookup table keyed by [`FaultTag`]. The most
//! specific matching rule decides, with one hard override: any matching
//! `Fatal` rule wins regardless of specificity. Unmatched faults are `Fatal`
//! (fail closed).

use serde::{Deserialize, Serialize};

use crate::error::{Fault, FaultTag};

/// The verdict the engine assigns to a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The item is defective; the run can proceed without it.
    Skippable,
    /// Retrying the identical operation may succeed.
    Retryable,
    /// The run cannot proceed at all.
    Fatal,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Skippable => write!(f, "SKIPPABLE"),
            Decision::Retryable => write!(f, "RETRYABLE"),
            Decision::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    tag: FaultTag,
    decision: Decision,
}

/// Ranked rule table mapping fault tags to decisions.
///
/// A rule registered for `io` matches every fault tagged `io` or below
/// (`io.timeout`, `io.timeout.read`, ...). When several rules match, the
/// deepest tag wins unless a `Fatal` rule matched at any depth.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule, consuming and returning the classifier for chaining.
    pub fn rule(mut self, tag: impl Into<FaultTag>, decision: Decision) -> Self {
        self.add_rule(tag, decision);
        self
    }

    pub fn add_rule(&mut self, tag: impl Into<FaultTag>, decision: Decision) {
        self.rules.push(Rule {
            tag: tag.into(),
            decision,
        });
    }

    /// Classifies a fault. Pure: no state is read or advanced here.
    pub fn classify(&self, fault: &Fault) -> Decision {
        let mut best: Option<(usize, Decision)> = None;
        for rule in &self.rules {
            if !fault.tag.is_within(&rule.tag) {
                continue;
            }
            if rule.decision == Decision::Fatal {
                return Decision::Fatal;
            }
            let depth = rule.tag.depth();
            if best.is_none_or(|(d, _)| depth > d) {
                best = Some((depth, rule.decision));
            }
        }
        match best {
            Some((_, decision)) => decision,
            None => Decision::Fatal,
        }
    }
}
