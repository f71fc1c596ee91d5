//! Action resolution: turn matches into a verdict and replacements
//!
//! Every masking transform is a pure function of the matched text, so a
//! replacement never depends on other matches in the same segment.

use crate::rules::Action;
use crate::scanner::Match;
use crate::types::Verdict;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Masking transform applied to a single match
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    /// Leave the text as is
    Keep,
    /// Drop the first `-` separator (`sk-123` -> `sk123`)
    StripSeparator,
    /// Substitute a fixed value
    Replace { value: String },
    /// Lowercase hex SHA-256 of the text
    Hash,
}

impl Transform {
    pub fn apply(&self, text: &str) -> String {
        match self {
            Self::Keep => text.to_string(),
            Self::StripSeparator => text.replacen('-', "", 1),
            Self::Replace { value } => value.clone(),
            Self::Hash => format!("{:x}", Sha256::digest(text.as_bytes())),
        }
    }

    /// False when distinct inputs collapse onto one output, which makes
    /// the output useless as a restore key
    pub fn is_reversible(&self) -> bool {
        !matches!(self, Self::Replace { .. })
    }
}

/// One masked span of a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub original: String,
    pub text: String,
    /// Reverse this replacement in the exchange's response
    pub restore: bool,
}

/// Verdict for one segment plus the replacements to apply when masked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub verdict: Verdict,
    pub replacements: Vec<Replacement>,
    /// Rule that caused a denial
    pub denied_by: Option<String>,
}

impl Resolution {
    pub fn allow() -> Self {
        Self {
            verdict: Verdict::Allow,
            replacements: Vec::new(),
            denied_by: None,
        }
    }

    /// Apply the replacements to the segment they were resolved from
    pub fn apply(&self, text: &str) -> String {
        if self.verdict != Verdict::Masked {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for rep in &self.replacements {
            // Spans are disjoint and sorted; guard anyway against a stale segment
            if rep.start < cursor || rep.end > text.len() {
                continue;
            }
            out.push_str(&text[cursor..rep.start]);
            out.push_str(&rep.text);
            cursor = rep.end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

/// Resolve the matches of one segment
///
/// Any deny match wins outright; otherwise mask matches produce a
/// `Masked` verdict; no matches means `Allow`.
pub fn resolve(matches: &[Match]) -> Resolution {
    if let Some(deny) = matches.iter().find(|m| m.action == Action::Deny) {
        return Resolution {
            verdict: Verdict::Denied,
            replacements: Vec::new(),
            denied_by: Some(deny.rule_name.clone()),
        };
    }

    let mut replacements: Vec<Replacement> = matches
        .iter()
        .filter_map(|m| match &m.action {
            Action::Mask { transform, restore } => Some(Replacement {
                start: m.start,
                end: m.end,
                original: m.matched_text.clone(),
                text: transform.apply(&m.matched_text),
                restore: *restore,
            }),
            _ => None,
        })
        .collect();

    if replacements.is_empty() {
        return Resolution::allow();
    }

    replacements.sort_by_key(|r| r.start);
    Resolution {
        verdict: Verdict::Masked,
        replacements,
        denied_by: None,
    }
}
