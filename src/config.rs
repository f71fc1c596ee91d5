//! Filter configuration
//!
//! Deserialized from JSON or YAML and compiled into a [`PolicySet`].
//!
//! ```yaml
//! deny_message: "提问或回答中包含敏感词，已被屏蔽"
//! routes:
//!   - hosts: ["ok.openai.com"]
//!     format: chat
//!     deny_words: ["costom_word1"]
//!     allow_words: ["costom_word"]
//!   - hosts: ["*.raw.com"]
//!     format:
//!       jsonpath: ["$.test[*].test"]
//!     replace_rules:
//!       - name: phone
//!         pattern: "1[3-9][0-9]{9}"
//!         transform: { type: hash }
//!         restore: true
//! ```

use crate::error::{MaskingError, Result};
use crate::format::PayloadFormat;
use crate::jsonpath::JsonPath;
use crate::policy::{Policy, PolicySet, RoutePolicy};
use crate::resolver::Transform;
use crate::rewrite::{DenySettings, DenyStyle, DENY_MESSAGE};
use crate::rules::RuleSet;
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Top-level filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Message placed in denial bodies
    #[serde(default = "default_deny_message")]
    pub deny_message: String,

    /// Status code for denial responses
    #[serde(default = "default_deny_code")]
    pub deny_code: u16,

    /// Deployment additions to the built-in system denylist
    #[serde(default)]
    pub system_deny_words: Vec<WordEntry>,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

fn default_deny_message() -> String {
    DENY_MESSAGE.to_string()
}

fn default_deny_code() -> u16 {
    200
}

fn default_true() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            deny_message: default_deny_message(),
            deny_code: default_deny_code(),
            system_deny_words: Vec::new(),
            routes: Vec::new(),
        }
    }
}

/// A word-list entry: a bare string, or a word with options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WordEntry {
    Plain(String),
    Detailed {
        word: String,
        #[serde(default)]
        whole_token: bool,
    },
}

impl WordEntry {
    pub fn word(&self) -> &str {
        match self {
            Self::Plain(word) => word,
            Self::Detailed { word, .. } => word,
        }
    }

    pub fn whole_token(&self) -> bool {
        matches!(self, Self::Detailed { whole_token: true, .. })
    }
}

/// Payload format as written in config
///
/// Accepts `chat`, `raw`, or a single-key map `{ jsonpath: [...] }` in
/// both JSON and YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FormatRepr", into = "FormatRepr")]
pub enum FormatConfig {
    Chat,
    Raw,
    Jsonpath(Vec<String>),
}

/// Wire shape of [`FormatConfig`]
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FormatRepr {
    Named(String),
    Paths { jsonpath: Vec<String> },
}

impl TryFrom<FormatRepr> for FormatConfig {
    type Error = String;

    fn try_from(repr: FormatRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            FormatRepr::Named(name) => match name.as_str() {
                "chat" => Ok(Self::Chat),
                "raw" => Ok(Self::Raw),
                other => Err(format!(
                    "unknown format '{}', expected chat, raw or {{ jsonpath: [...] }}",
                    other
                )),
            },
            FormatRepr::Paths { jsonpath } => Ok(Self::Jsonpath(jsonpath)),
        }
    }
}

impl From<FormatConfig> for FormatRepr {
    fn from(format: FormatConfig) -> Self {
        match format {
            FormatConfig::Chat => Self::Named("chat".to_string()),
            FormatConfig::Raw => Self::Named("raw".to_string()),
            FormatConfig::Jsonpath(jsonpath) => Self::Paths { jsonpath },
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self::Chat
    }
}

impl FormatConfig {
    fn compile(&self) -> Result<PayloadFormat> {
        match self {
            Self::Chat => Ok(PayloadFormat::Chat),
            Self::Raw => Ok(PayloadFormat::Raw),
            Self::Jsonpath(paths) => {
                if paths.is_empty() {
                    return Err(MaskingError::Config(
                        "jsonpath format needs at least one path".to_string(),
                    ));
                }
                let paths = paths
                    .iter()
                    .map(|p| JsonPath::parse(p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PayloadFormat::JsonPath(paths))
            }
        }
    }
}

/// Which directions of a route are scanned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionScope {
    Request,
    Response,
    #[default]
    Both,
}

/// Route-defined regex replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceRuleConfig {
    pub name: String,
    pub pattern: String,
    pub transform: Transform,
    /// Restore the original text in this exchange's response
    #[serde(default)]
    pub restore: bool,
}

/// Policy for a group of hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Exact host names or `*.suffix` wildcards
    pub hosts: Vec<String>,

    #[serde(default)]
    pub format: FormatConfig,

    /// Response format when it differs from the request
    #[serde(default)]
    pub response_format: Option<FormatConfig>,

    #[serde(default)]
    pub directions: DirectionScope,

    /// Apply the system denylist
    #[serde(default = "default_true")]
    pub system_deny: bool,

    /// Apply the built-in IP/email/API-key detectors
    #[serde(default = "default_true")]
    pub builtin_pii: bool,

    /// Per-category override of the built-in PII transforms
    #[serde(default)]
    pub pii_transforms: BTreeMap<Category, Transform>,

    #[serde(default)]
    pub deny_words: Vec<WordEntry>,

    #[serde(default)]
    pub allow_words: Vec<WordEntry>,

    #[serde(default)]
    pub replace_rules: Vec<ReplaceRuleConfig>,

    /// Deny every exchange on these hosts
    #[serde(default)]
    pub always_deny: bool,

    /// Denial body shape; defaults by format
    #[serde(default)]
    pub deny_style: Option<DenyStyle>,

    /// Route-specific denial message
    #[serde(default)]
    pub deny_message: Option<String>,

    /// Deny unparseable bodies instead of passing them through
    #[serde(default)]
    pub strict: bool,

    /// Deny bodies where no configured JSON path resolves
    #[serde(default)]
    pub deny_on_missing_field: bool,
}

impl RouteConfig {
    /// Route for `hosts` with every option at its default
    pub fn new<I, S>(hosts: I, format: FormatConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            format,
            response_format: None,
            directions: DirectionScope::Both,
            system_deny: true,
            builtin_pii: true,
            pii_transforms: BTreeMap::new(),
            deny_words: Vec::new(),
            allow_words: Vec::new(),
            replace_rules: Vec::new(),
            always_deny: false,
            deny_style: None,
            deny_message: None,
            strict: false,
            deny_on_missing_field: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(MaskingError::Config("Route must list at least one host".to_string()));
        }
        if let Some(category) = self.pii_transforms.keys().find(|c| !c.is_pii()) {
            return Err(MaskingError::Config(format!(
                "pii_transforms only accepts ip, email and api_key, got '{}'",
                category
            )));
        }
        let mut names = HashSet::new();
        for rule in &self.replace_rules {
            if rule.name.is_empty() {
                return Err(MaskingError::Config("Replace rule name cannot be empty".to_string()));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(MaskingError::Config(format!(
                    "Duplicate replace rule '{}'",
                    rule.name
                )));
            }
        }
        Ok(())
    }

    fn rule_set(&self, system_extra: &[WordEntry]) -> Result<RuleSet> {
        let mut builder = RuleSet::builder();
        if self.always_deny {
            builder = builder.always_deny();
        }
        if self.builtin_pii {
            let overrides: Vec<(Category, Transform)> = self
                .pii_transforms
                .iter()
                .map(|(c, t)| (*c, t.clone()))
                .collect();
            builder = builder.builtin_pii(&overrides);
        }
        for rule in &self.replace_rules {
            builder = builder.replace(&rule.name, &rule.pattern, rule.transform.clone(), rule.restore)?;
        }
        if self.system_deny {
            builder = builder.system_words(
                system_extra
                    .iter()
                    .map(|w| (w.word().to_string(), w.whole_token())),
            );
        }
        for entry in &self.deny_words {
            builder = builder.deny_word(entry.word(), entry.whole_token());
        }
        for entry in &self.allow_words {
            builder = builder.allow_word(entry.word(), entry.whole_token());
        }
        Ok(builder.build())
    }

    fn policy(&self, format: &FormatConfig, rules: &RuleSet, global: &FilterConfig) -> Result<Policy> {
        let format = format.compile()?;
        let mut policy = Policy::new(format, rules.clone())
            .strict(self.strict)
            .deny_on_missing_field(self.deny_on_missing_field);
        policy.deny = DenySettings {
            style: self.deny_style.unwrap_or(policy.deny.style),
            message: self
                .deny_message
                .clone()
                .unwrap_or_else(|| global.deny_message.clone()),
            status: global.deny_code,
        };
        Ok(policy)
    }

    fn compile(&self, global: &FilterConfig) -> Result<RoutePolicy> {
        self.validate()?;
        let rules = self.rule_set(&global.system_deny_words)?;

        let request = match self.directions {
            DirectionScope::Response => None,
            _ => Some(Arc::new(self.policy(&self.format, &rules, global)?)),
        };
        let response = match self.directions {
            DirectionScope::Request => None,
            _ => {
                let format = self.response_format.as_ref().unwrap_or(&self.format);
                Some(Arc::new(self.policy(format, &rules, global)?))
            }
        };
        Ok(RoutePolicy { request, response })
    }
}

impl FilterConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| MaskingError::Config(format!("Failed to parse JSON config: {}", e)))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| MaskingError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    /// Load from a file; `.yaml`/`.yml` parse as YAML, anything else as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MaskingError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            Self::from_yaml(&content)?
        } else {
            Self::from_json(&content)?
        };

        tracing::debug!(
            path = %path.display(),
            routes = config.routes.len(),
            "Masking config loaded"
        );
        Ok(config)
    }

    /// Validate and compile into an immutable policy snapshot
    pub fn compile(&self) -> Result<PolicySet> {
        let mut set = PolicySet::new();
        for route in &self.routes {
            let compiled = Arc::new(route.compile(self)?);
            for host in &route.hosts {
                set.insert(host, compiled.clone())?;
            }
        }
        Ok(set)
    }
}
