//! Detector rules and the layered rule set
//!
//! A [`RuleSet`] is ordered by [`Category`]: the route-level block first,
//! then built-in PII detectors, route replacement rules, the system
//! denylist, custom deny words, and finally custom allow words.

use crate::error::{MaskingError, Result};
use crate::resolver::Transform;
use crate::types::Category;
use regex::Regex;

/// Dotted-quad IPv4 address, each octet 0-255
pub const IP_PATTERN: &str = r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b";

/// `local@domain.tld`
pub const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";

/// `sk-` followed by an alphanumeric run
pub const API_KEY_PATTERN: &str = r"\bsk-[A-Za-z0-9]+";

/// Built-in system denylist
pub const SYSTEM_DENY_WORDS: &[&str] = &[
    "fuck",
    "shit",
    "motherfucker",
    "bitch",
    "cunt",
    "法轮功",
    "六四事件",
];

/// What happens when a rule matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Replace the matched text; `restore` marks it for reversal on the response
    Mask { transform: Transform, restore: bool },
    /// Block the exchange
    Deny,
    /// Carve the covered span out of deny matches
    Allow,
}

/// How a rule finds its matches
#[derive(Debug, Clone)]
pub enum Matcher {
    Regex(Regex),
    Word { text: String, whole_token: bool },
    /// Matches every input, including empty ones
    Any,
}

impl Matcher {
    /// Byte spans of every match in `text`
    ///
    /// Word matchers report overlapping occurrences; an `Any` matcher
    /// reports a single empty span at offset 0.
    pub fn find_spans(&self, text: &str) -> Vec<(usize, usize)> {
        match self {
            Self::Regex(regex) => regex.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            Self::Word { text: word, whole_token } => find_word(text, word, *whole_token),
            Self::Any => vec![(0, 0)],
        }
    }
}

// ASCII only: CJK text has no spaces, so any ideograph would otherwise
// count as part of the surrounding token
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn find_word(text: &str, word: &str, whole_token: bool) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    if word.is_empty() {
        return spans;
    }

    let mut offset = 0;
    while let Some(pos) = text[offset..].find(word) {
        let start = offset + pos;
        let end = start + word.len();
        let bounded = !whole_token
            || (!text[..start].chars().next_back().is_some_and(is_word_char)
                && !text[end..].chars().next().is_some_and(is_word_char));
        if bounded {
            spans.push((start, end));
        }
        // Step one char so overlapping occurrences are seen
        offset = start + text[start..].chars().next().map_or(1, char::len_utf8);
    }
    spans
}

/// A named detector
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub category: Category,
    pub matcher: Matcher,
    pub action: Action,
}

impl Rule {
    /// Regex rule; fails if the pattern does not compile
    pub fn regex(
        name: impl Into<String>,
        category: Category,
        pattern: &str,
        action: Action,
    ) -> Result<Self> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|e| MaskingError::InvalidPattern {
            rule: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name,
            category,
            matcher: Matcher::Regex(regex),
            action,
        })
    }

    /// Word-list rule; the action follows from the category
    pub fn word(category: Category, word: impl Into<String>, whole_token: bool) -> Self {
        let text = word.into();
        let action = if category == Category::CustomAllowWord {
            Action::Allow
        } else {
            Action::Deny
        };
        Self {
            name: format!("{}:{}", category, text),
            category,
            matcher: Matcher::Word { text, whole_token },
            action,
        }
    }

    /// Host-level block, independent of content
    pub fn always_deny() -> Self {
        Self {
            name: "always_deny".to_string(),
            category: Category::Route,
            matcher: Matcher::Any,
            action: Action::Deny,
        }
    }
}

/// Default masking transform for a built-in PII category
pub fn default_pii_transform(category: Category) -> Transform {
    match category {
        Category::ApiKey => Transform::StripSeparator,
        _ => Transform::Keep,
    }
}

/// Built-in IP, email and API-key detectors with their default transforms
pub fn builtin_pii_rules() -> Vec<Rule> {
    [
        (Category::Ip, IP_PATTERN),
        (Category::Email, EMAIL_PATTERN),
        (Category::ApiKey, API_KEY_PATTERN),
    ]
    .into_iter()
    .filter_map(|(category, pattern)| {
        Rule::regex(
            category.as_str(),
            category,
            pattern,
            Action::Mask {
                transform: default_pii_transform(category),
                restore: false,
            },
        )
        .ok()
    })
    .collect()
}

/// Ordered, immutable collection of rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build from rules in any order; layers are sorted by category,
    /// preserving configured order within a layer
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|rule| rule.category);
        Self { rules }
    }

    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// True when a route-level block is present
    pub fn blocks_all(&self) -> bool {
        self.rules.iter().any(|rule| rule.category == Category::Route)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Incremental construction of a [`RuleSet`]
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: Vec<Rule>,
}

impl RuleSetBuilder {
    /// Add the built-in PII detectors, overriding transforms per category
    pub fn builtin_pii(mut self, overrides: &[(Category, Transform)]) -> Self {
        for mut rule in builtin_pii_rules() {
            if let Some((_, transform)) = overrides.iter().find(|(c, _)| *c == rule.category) {
                rule.action = Action::Mask {
                    transform: transform.clone(),
                    restore: false,
                };
            }
            self.rules.push(rule);
        }
        self
    }

    /// Add the built-in system denylist plus any deployment extras
    pub fn system_words<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        for word in SYSTEM_DENY_WORDS {
            self.rules.push(Rule::word(Category::SystemWord, *word, false));
        }
        for (word, whole_token) in extra {
            self.rules.push(Rule::word(Category::SystemWord, word, whole_token));
        }
        self
    }

    pub fn deny_word(mut self, word: impl Into<String>, whole_token: bool) -> Self {
        self.rules.push(Rule::word(Category::CustomDenyWord, word, whole_token));
        self
    }

    pub fn allow_word(mut self, word: impl Into<String>, whole_token: bool) -> Self {
        self.rules.push(Rule::word(Category::CustomAllowWord, word, whole_token));
        self
    }

    /// Add a route replacement rule
    pub fn replace(
        mut self,
        name: impl Into<String>,
        pattern: &str,
        transform: Transform,
        restore: bool,
    ) -> Result<Self> {
        let name = name.into();
        if restore && !transform.is_reversible() {
            return Err(MaskingError::Config(format!(
                "Replace rule '{}' cannot restore a fixed-value transform",
                name
            )));
        }
        self.rules.push(Rule::regex(
            name,
            Category::Replace,
            pattern,
            Action::Mask { transform, restore },
        )?);
        Ok(self)
    }

    pub fn always_deny(mut self) -> Self {
        self.rules.push(Rule::always_deny());
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn build(self) -> RuleSet {
        RuleSet::new(self.rules)
    }
}
