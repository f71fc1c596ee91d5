//! Policies and host resolution
//!
//! A [`PolicySet`] is an immutable snapshot mapping hosts to per-direction
//! [`Policy`] values. [`PolicyProvider`] is the seam the filter resolves
//! through; the snapshot itself implements it, and so does the
//! hot-swappable [`PolicyStore`](crate::store::PolicyStore).

use crate::error::{MaskingError, Result};
use crate::format::PayloadFormat;
use crate::rewrite::{DenySettings, DenyStyle};
use crate::rules::RuleSet;
use crate::types::Direction;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything needed to evaluate one direction of a route
#[derive(Debug, Clone)]
pub struct Policy {
    pub format: PayloadFormat,
    pub rules: RuleSet,
    pub deny: DenySettings,
    /// Deny bodies that fail to parse instead of passing them through
    pub strict: bool,
    /// Deny bodies where no configured field resolves
    pub deny_on_missing_field: bool,
}

impl Policy {
    /// Policy with the default denial style for `format`
    pub fn new(format: PayloadFormat, rules: RuleSet) -> Self {
        let style = match format {
            PayloadFormat::Chat => DenyStyle::ChatCompletion,
            _ => DenyStyle::ErrMsg,
        };
        Self {
            format,
            rules,
            deny: DenySettings::new(style),
            strict: false,
            deny_on_missing_field: false,
        }
    }

    pub fn with_deny(mut self, deny: DenySettings) -> Self {
        self.deny = deny;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn deny_on_missing_field(mut self, deny: bool) -> Self {
        self.deny_on_missing_field = deny;
        self
    }
}

/// Policies for both directions of a route; `None` means not scanned
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    pub request: Option<Arc<Policy>>,
    pub response: Option<Arc<Policy>>,
}

impl RoutePolicy {
    /// Same policy for both directions
    pub fn both(policy: Policy) -> Self {
        let policy = Arc::new(policy);
        Self {
            request: Some(policy.clone()),
            response: Some(policy),
        }
    }

    pub fn get(&self, direction: Direction) -> Option<&Arc<Policy>> {
        match direction {
            Direction::Request => self.request.as_ref(),
            Direction::Response => self.response.as_ref(),
        }
    }
}

/// Resolves the policy that applies to a host and direction
pub trait PolicyProvider: Send + Sync {
    /// `Ok(None)` when the route exists but does not scan this direction;
    /// `Err(PolicyResolution)` when no route is bound to the host.
    fn resolve(&self, host: &str, direction: Direction) -> Result<Option<Arc<Policy>>>;
}

/// Lowercase a host and drop any port and trailing dot
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let bare = if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        rest.split(']').next().unwrap_or(rest)
    } else {
        match host.rsplit_once(':') {
            Some((name, port))
                if !name.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
            {
                name
            }
            _ => host,
        }
    };
    bare.trim_end_matches('.').to_ascii_lowercase()
}

/// Immutable host → route binding
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    exact: HashMap<String, Arc<RoutePolicy>>,
    /// (`.suffix`, route), longest suffix first
    wildcard: Vec<(String, Arc<RoutePolicy>)>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a host pattern: an exact name or `*.suffix`
    pub fn insert(&mut self, pattern: &str, route: Arc<RoutePolicy>) -> Result<()> {
        let pattern = normalize_host(pattern);
        if pattern.is_empty() {
            return Err(MaskingError::Config("Host pattern cannot be empty".to_string()));
        }

        if let Some(suffix) = pattern.strip_prefix('*') {
            if !suffix.starts_with('.') || suffix.len() < 2 {
                return Err(MaskingError::Config(format!(
                    "Wildcard host must look like '*.example.com', got '{}'",
                    pattern
                )));
            }
            if self.wildcard.iter().any(|(s, _)| s == suffix) {
                return Err(MaskingError::Config(format!("Duplicate host pattern '{}'", pattern)));
            }
            self.wildcard.push((suffix.to_string(), route));
            self.wildcard.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        } else {
            if self.exact.contains_key(&pattern) {
                return Err(MaskingError::Config(format!("Duplicate host pattern '{}'", pattern)));
            }
            self.exact.insert(pattern, route);
        }
        Ok(())
    }

    /// Route for a host: exact match first, then the longest wildcard suffix
    pub fn route(&self, host: &str) -> Option<&Arc<RoutePolicy>> {
        let host = normalize_host(host);
        self.exact.get(&host).or_else(|| {
            self.wildcard
                .iter()
                .find(|(suffix, _)| host.len() > suffix.len() && host.ends_with(suffix.as_str()))
                .map(|(_, route)| route)
        })
    }

    /// Number of bound host patterns
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PolicyProvider for PolicySet {
    fn resolve(&self, host: &str, direction: Direction) -> Result<Option<Arc<Policy>>> {
        let route = self.route(host).ok_or_else(|| MaskingError::PolicyResolution {
            host: host.to_string(),
        })?;
        Ok(route.get(direction).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Arc<RoutePolicy> {
        Arc::new(RoutePolicy::both(Policy::new(PayloadFormat::Raw, RuleSet::default())))
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("OK.OpenAI.com:8080"), "ok.openai.com");
        assert_eq!(normalize_host("ok.raw.com."), "ok.raw.com");
        assert_eq!(normalize_host("[::1]:443"), "::1");
        assert_eq!(normalize_host("::1"), "::1");
    }

    #[test]
    fn test_exact_before_wildcard() {
        let exact = route();
        let wild = route();
        let mut set = PolicySet::new();
        set.insert("*.openai.com", wild.clone()).unwrap();
        set.insert("ok.openai.com", exact.clone()).unwrap();

        assert!(Arc::ptr_eq(set.route("ok.openai.com").unwrap(), &exact));
        assert!(Arc::ptr_eq(set.route("other.openai.com").unwrap(), &wild));
        assert!(set.route("openai.com").is_none());
    }

    #[test]
    fn test_longest_wildcard_wins() {
        let short = route();
        let long = route();
        let mut set = PolicySet::new();
        set.insert("*.com", short).unwrap();
        set.insert("*.raw.com", long.clone()).unwrap();
        assert!(Arc::ptr_eq(set.route("ok.raw.com").unwrap(), &long));
    }

    #[test]
    fn test_duplicate_and_bad_patterns() {
        let mut set = PolicySet::new();
        set.insert("a.com", route()).unwrap();
        assert!(set.insert("A.com", route()).is_err());
        assert!(set.insert("*com", route()).is_err());
        assert!(set.insert("", route()).is_err());
    }

    #[test]
    fn test_resolve_unknown_host() {
        let set = PolicySet::new();
        let err = set.resolve("nope.com", Direction::Request).unwrap_err();
        assert!(matches!(err, MaskingError::PolicyResolution { ref host } if host == "nope.com"));
    }

    #[test]
    fn test_resolve_unscanned_direction() {
        let mut set = PolicySet::new();
        let policy = Arc::new(Policy::new(PayloadFormat::Raw, RuleSet::default()));
        set.insert(
            "req.only",
            Arc::new(RoutePolicy {
                request: Some(policy),
                response: None,
            }),
        )
        .unwrap();
        assert!(set.resolve("req.only", Direction::Request).unwrap().is_some());
        assert!(set.resolve("req.only", Direction::Response).unwrap().is_none());
    }

    #[test]
    fn test_default_deny_style_follows_format() {
        assert_eq!(
            Policy::new(PayloadFormat::Chat, RuleSet::default()).deny.style,
            DenyStyle::ChatCompletion
        );
        assert_eq!(
            Policy::new(PayloadFormat::Raw, RuleSet::default()).deny.style,
            DenyStyle::ErrMsg
        );
    }
}
