//! Scanner: run a rule set over one text segment
//!
//! Rules are evaluated in layer order in a single pass:
//!
//! 1. Mask rules claim spans; a later mask match overlapping a claimed
//!    span is dropped, so the first rule at a position wins.
//! 2. Deny matches are collected as candidates.
//! 3. Allow matches build a suppression set. A system or custom deny
//!    candidate whose span is covered by an allow span is dropped.
//!
//! The returned matches are sorted left to right.

use crate::rules::{Action, RuleSet};
use crate::types::Category;

/// A single rule hit inside a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub rule_name: String,
    pub category: Category,
    pub action: Action,
    /// Byte offset of the match start
    pub start: usize,
    /// Byte offset one past the match end
    pub end: usize,
    pub matched_text: String,
}

impl Match {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Byte ranges claimed by allow rules
#[derive(Debug, Default)]
struct SuppressionSet {
    spans: Vec<(usize, usize)>,
}

impl SuppressionSet {
    fn insert(&mut self, start: usize, end: usize) {
        self.spans.push((start, end));
    }

    fn covers(&self, m: &Match) -> bool {
        self.spans
            .iter()
            .any(|&(start, end)| start <= m.start && m.end <= end)
    }
}

/// Scan `text` with `rules`, returning unsuppressed matches in order
pub fn scan(text: &str, rules: &RuleSet) -> Vec<Match> {
    let mut masks: Vec<Match> = Vec::new();
    let mut denies: Vec<Match> = Vec::new();
    let mut allowed = SuppressionSet::default();

    for rule in rules.rules() {
        for (start, end) in rule.matcher.find_spans(text) {
            match rule.action {
                Action::Allow => allowed.insert(start, end),
                Action::Mask { .. } => {
                    if masks.iter().any(|m| m.overlaps(start, end)) {
                        continue;
                    }
                    masks.push(Match {
                        rule_name: rule.name.clone(),
                        category: rule.category,
                        action: rule.action.clone(),
                        start,
                        end,
                        matched_text: text[start..end].to_string(),
                    });
                }
                Action::Deny => denies.push(Match {
                    rule_name: rule.name.clone(),
                    category: rule.category,
                    action: Action::Deny,
                    start,
                    end,
                    matched_text: text[start..end].to_string(),
                }),
            }
        }
    }

    let before = denies.len();
    denies.retain(|m| !(m.category.is_suppressible() && allowed.covers(m)));
    if denies.len() < before {
        tracing::debug!(suppressed = before - denies.len(), "Deny matches carved out by allow words");
    }

    let mut matches = masks;
    matches.extend(denies);
    matches.sort_by_key(|m| (m.start, m.category));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Transform;
    use crate::rules::{Matcher, Rule};

    fn pii_rules() -> RuleSet {
        RuleSet::builder().builtin_pii(&[]).build()
    }

    #[test]
    fn test_scan_pii_left_to_right() {
        let matches = scan("127.0.0.1 admin@gmail.com sk-12345", &pii_rules());
        let cats: Vec<Category> = matches.iter().map(|m| m.category).collect();
        assert_eq!(cats, vec![Category::Ip, Category::Email, Category::ApiKey]);
        assert_eq!(matches[2].matched_text, "sk-12345");
        assert_eq!((matches[2].start, matches[2].end), (26, 34));
    }

    #[test]
    fn test_scan_no_matches() {
        assert!(scan("nothing sensitive here", &pii_rules()).is_empty());
    }

    #[test]
    fn test_scan_is_deterministic() {
        let rules = RuleSet::builder()
            .builtin_pii(&[])
            .system_words(Vec::<(String, bool)>::new())
            .build();
        let text = "fuck 10.0.0.1 sk-abc";
        assert_eq!(scan(text, &rules), scan(text, &rules));
    }

    #[test]
    fn test_first_mask_rule_wins_overlap() {
        let rules = RuleSet::new(vec![
            Rule::regex(
                "first",
                Category::Replace,
                "abc",
                Action::Mask {
                    transform: Transform::Keep,
                    restore: false,
                },
            )
            .unwrap(),
            Rule::regex(
                "second",
                Category::Replace,
                "bcd",
                Action::Mask {
                    transform: Transform::Keep,
                    restore: false,
                },
            )
            .unwrap(),
        ]);
        let matches = scan("abcd", &rules);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_name, "first");
    }

    #[test]
    fn test_allow_suppresses_equal_span() {
        let rules = RuleSet::builder()
            .deny_word("costom_word", false)
            .allow_word("costom_word", false)
            .build();
        assert!(scan("costom_word", &rules).is_empty());
    }

    #[test]
    fn test_allow_does_not_cover_longer_deny() {
        let rules = RuleSet::builder()
            .deny_word("costom_word1", false)
            .allow_word("costom_word", false)
            .build();
        let matches = scan("costom_word1", &rules);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, Category::CustomDenyWord);
        assert_eq!(matches[0].matched_text, "costom_word1");
    }

    #[test]
    fn test_allow_covers_inner_deny() {
        let rules = RuleSet::builder()
            .deny_word("ass", false)
            .allow_word("class", false)
            .build();
        assert!(scan("a class act", &rules).is_empty());
        assert_eq!(scan("an ass", &rules).len(), 1);
    }

    #[test]
    fn test_allow_never_suppresses_route_block() {
        let rules = RuleSet::new(vec![
            Rule::always_deny(),
            Rule {
                name: "allow-all".to_string(),
                category: Category::CustomAllowWord,
                matcher: Matcher::Any,
                action: Action::Allow,
            },
        ]);
        let matches = scan("test", &rules);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, Category::Route);
    }

    #[test]
    fn test_always_deny_matches_empty_text() {
        let rules = RuleSet::builder().always_deny().build();
        assert_eq!(scan("", &rules).len(), 1);
    }
}
