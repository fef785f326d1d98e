//! Command safety filter.
//!
//! Free-form `send_command` strings are checked against a configured
//! blacklist before any device session is opened. Rules come from the
//! `[blacklist]` section of the config file and are compiled once at load
//! time; a rule with an invalid regex is a configuration error at startup,
//! never at call time.
//!
//! An empty rule set fails closed: every command is blocked with an explicit
//! "no rules configured" reason, distinct from a rule match.

use regex::Regex;
use serde::Deserialize;

use crate::error::FleetError;

/// How a blacklist rule's pattern is matched against a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Command equals the pattern after normalization.
    Exact,
    /// Pattern occurs anywhere in the normalized command.
    Substring,
    /// Regex applied to the normalized command.
    Regex,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Substring => "substring",
            Self::Regex => "regex",
        }
    }
}

/// A single configured blacklist rule.
#[derive(Debug, Clone, Deserialize)]
pub struct BlacklistRule {
    pub pattern: String,
    pub match_kind: MatchKind,
}

/// Verdict returned by [`CommandFilter::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked(BlockReason),
}

/// Why a command was blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// The filter was built from zero rules; the policy is unstated.
    NoRulesConfigured,
    /// A configured rule matched; cited so the operator can see which fired.
    RuleMatch {
        pattern: String,
        match_kind: MatchKind,
    },
}

impl BlockReason {
    pub fn describe(&self) -> String {
        match self {
            Self::NoRulesConfigured => {
                "no blacklist rules configured; command execution is disabled until a policy is stated".to_string()
            }
            Self::RuleMatch {
                pattern,
                match_kind,
            } => format!(
                "matched blacklist rule '{}' ({})",
                pattern,
                match_kind.as_str()
            ),
        }
    }
}

#[derive(Debug)]
enum Matcher {
    Exact(String),
    Substring(String),
    Regex(Regex),
}

#[derive(Debug)]
struct CompiledRule {
    pattern: String,
    match_kind: MatchKind,
    matcher: Matcher,
}

impl CompiledRule {
    fn matches(&self, normalized: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(pattern) => normalized == pattern,
            Matcher::Substring(pattern) => normalized.contains(pattern.as_str()),
            Matcher::Regex(regex) => regex.is_match(normalized),
        }
    }
}

/// Compiled blacklist, immutable for the process lifetime.
#[derive(Debug)]
pub struct CommandFilter {
    rules: Vec<CompiledRule>,
}

impl CommandFilter {
    /// Compile a rule set. Regex patterns compile here; a pattern that fails
    /// to compile is a [`FleetError::Configuration`] at load time.
    pub fn new(rules: &[BlacklistRule]) -> Result<Self, FleetError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let matcher = match rule.match_kind {
                MatchKind::Exact => Matcher::Exact(normalize(&rule.pattern)),
                MatchKind::Substring => Matcher::Substring(normalize(&rule.pattern)),
                MatchKind::Regex => Matcher::Regex(Regex::new(&rule.pattern).map_err(|e| {
                    FleetError::Configuration(format!(
                        "invalid blacklist regex '{}': {}",
                        rule.pattern, e
                    ))
                })?),
            };
            compiled.push(CompiledRule {
                pattern: rule.pattern.clone(),
                match_kind: rule.match_kind,
                matcher,
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Number of configured rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate `command` against the rule set.
    ///
    /// The command is trimmed and lowercased, then checked against rules in
    /// configured order; the first match wins and is cited in the verdict.
    /// The whole string is evaluated as given — compound commands are never
    /// split, since any separator heuristic could be bypassed by obfuscated
    /// separators. Operators who need separator policing can express it as a
    /// `regex` rule.
    pub fn check(&self, command: &str) -> Verdict {
        if self.rules.is_empty() {
            return Verdict::Blocked(BlockReason::NoRulesConfigured);
        }
        let normalized = normalize(command);
        for rule in &self.rules {
            if rule.matches(&normalized) {
                return Verdict::Blocked(BlockReason::RuleMatch {
                    pattern: rule.pattern.clone(),
                    match_kind: rule.match_kind,
                });
            }
        }
        Verdict::Allowed
    }
}

fn normalize(command: &str) -> String {
    command.trim().to_lowercase()
}
