//! Environment-driven matcher configuration.
//!
//! The only knob is the abort pattern: a regular expression over node
//! names that makes `match_value` fail at matching nodes. It exists so a
//! misbehaving fusion can be bisected from the outside (`WEFT_FAIL_MATCH_AT`)
//! without rebuilding; it must never change semantics when unset.
//!
//! The environment is read once per process. Matchers hold their own
//! [`MatchConfig`], so tests inject abort patterns through
//! [`Matcher::with_config`](crate::Matcher::with_config) instead of
//! mutating process state.

use once_cell::sync::Lazy;
use regex::Regex;

/// Environment variable holding the abort pattern.
pub const FAIL_MATCH_AT_VAR: &str = "WEFT_FAIL_MATCH_AT";

static GLOBAL: Lazy<MatchConfig> = Lazy::new(MatchConfig::from_env);

/// Per-matcher diagnostic configuration.
#[derive(Debug, Clone, Default)]
pub struct MatchConfig {
    abort_pattern: Option<Regex>,
}

impl MatchConfig {
    /// Configuration with no abort pattern.
    pub fn none() -> Self {
        Self::default()
    }

    /// Read `WEFT_FAIL_MATCH_AT`. An unparsable pattern is ignored with a
    /// warning so a typo cannot change matching behavior.
    pub fn from_env() -> Self {
        let abort_pattern = match std::env::var(FAIL_MATCH_AT_VAR) {
            Ok(raw) => match Regex::new(&raw) {
                Ok(re) => Some(re),
                Err(error) => {
                    tracing::warn!(%error, pattern = %raw, "ignoring invalid {FAIL_MATCH_AT_VAR}");
                    None
                }
            },
            Err(_) => None,
        };
        Self { abort_pattern }
    }

    /// Process-wide configuration, read from the environment on first use
    /// and cached afterwards.
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Configuration with an explicit abort pattern (test hook).
    pub fn with_abort_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self { abort_pattern: Some(Regex::new(pattern)?) })
    }

    /// Whether matching should fail at a node with this name.
    pub fn should_abort_at(&self, node_name: &str) -> bool {
        self.abort_pattern.as_ref().is_some_and(|re| re.is_match(node_name))
    }
}
