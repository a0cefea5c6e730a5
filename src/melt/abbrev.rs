//! Shortening of verbose `Record` type identifiers

use crate::error::{MeltError, Result};
use crate::melt::types::DEFAULT_PREFIX_PATTERN;
use once_cell::sync::Lazy;
use regex::Regex;

static DEFAULT_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(DEFAULT_PREFIX_PATTERN).unwrap()
});

/// Prefix-stripping rule applied to discriminator values
#[derive(Debug, Clone)]
pub struct AbbreviationRule {
    enabled: bool,
    patterns: Vec<Regex>,
}

impl AbbreviationRule {
    /// Compile a rule from pattern strings. Each pattern needs exactly one
    /// capture group, which holds the shortened name.
    pub fn new<S: AsRef<str>>(patterns: &[S], enabled: bool) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern == DEFAULT_PREFIX_PATTERN {
                compiled.push(DEFAULT_PREFIX_REGEX.clone());
                continue;
            }
            let regex = Regex::new(pattern).map_err(|e| MeltError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            // captures_len counts the implicit whole-match group
            if regex.captures_len() != 2 {
                return Err(MeltError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: format!("expected 1 capture group, found {}", regex.captures_len() - 1),
                });
            }
            compiled.push(regex);
        }
        Ok(AbbreviationRule { enabled, patterns: compiled })
    }

    /// A rule that passes every name through unchanged
    pub fn disabled() -> Self {
        AbbreviationRule { enabled: false, patterns: Vec::new() }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Abbreviate a name, repeating until no pattern applies.
    ///
    /// Running to a fixpoint makes the rule idempotent whatever patterns are
    /// configured. Each step yields a strictly shorter capture, so it ends.
    pub fn apply(&self, name: &str) -> String {
        let mut current = name.to_string();
        if !self.enabled {
            return current;
        }
        while let Some(shorter) = self.strip_once(&current) {
            current = shorter;
        }
        current
    }

    fn strip_once(&self, name: &str) -> Option<String> {
        self.patterns.iter().find_map(|regex| {
            let captured = regex.captures(name)?.get(1)?.as_str();
            if captured.is_empty() || captured == name {
                None
            } else {
                Some(captured.to_string())
            }
        })
    }
}
