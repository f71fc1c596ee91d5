//! Core types shared by the masking pipeline
//!
//! Config-facing enums use snake_case serialization so the same names
//! appear in JSON and YAML policy files.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Which half of an exchange a body belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Request,
    Response,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Response => write!(f, "response"),
        }
    }
}

/// Detector category a rule belongs to
///
/// The declaration order is the evaluation order of rule layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Host-level block that matches any input
    Route,
    Ip,
    Email,
    ApiKey,
    /// Route-defined regex replacement
    Replace,
    SystemWord,
    CustomDenyWord,
    CustomAllowWord,
}

impl Category {
    /// Built-in PII detectors
    pub fn is_pii(&self) -> bool {
        matches!(self, Self::Ip | Self::Email | Self::ApiKey)
    }

    /// Word-list categories an allow entry may carve out of
    pub fn is_suppressible(&self) -> bool {
        matches!(self, Self::SystemWord | Self::CustomDenyWord)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::Ip => "ip",
            Self::Email => "email",
            Self::ApiKey => "api_key",
            Self::Replace => "replace",
            Self::SystemWord => "system_word",
            Self::CustomDenyWord => "custom_deny_word",
            Self::CustomAllowWord => "custom_allow_word",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-way result of evaluating a body against a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Forward the original body unchanged
    Allow,
    /// Forward the rewritten body
    Masked,
    /// Short-circuit with the denial body
    Denied,
}

/// Extraction failed but the policy chose not to escalate it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    /// Body did not parse as the configured structure
    MalformedBody,
    /// Configured JSON path resolved to nothing scannable
    NoFieldToScan,
}

/// Final decision for one direction of an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub verdict: Verdict,

    /// Body to forward, or the denial body
    pub body: Bytes,

    /// Status code the host should answer with (denials only)
    pub status: Option<u16>,

    /// Content type of a denial body, if it has one
    pub content_type: Option<&'static str>,

    /// Set when extraction failed and the body passed (or was denied) without scanning
    pub degraded: Option<Degradation>,

    /// Distinct categories that matched, in evaluation order
    pub categories: Vec<Category>,
}

impl Outcome {
    /// Forward `body` untouched
    pub fn pass_through(body: &[u8]) -> Self {
        Self {
            verdict: Verdict::Allow,
            body: Bytes::copy_from_slice(body),
            status: None,
            content_type: None,
            degraded: None,
            categories: Vec::new(),
        }
    }

    pub fn is_denied(&self) -> bool {
        self.verdict == Verdict::Denied
    }

    /// Body as UTF-8 text, lossily decoded
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
