//! # a3s-data-masking
//!
//! Content-masking filter for API gateways carrying AI chat-completion and
//! raw-text traffic.
//!
//! ## Overview
//!
//! The gateway hands the filter a body, a direction, and the host the
//! exchange was routed for. The filter resolves the host's policy, scans the
//! body for PII and configured words, and answers with an [`Outcome`]:
//! forward unchanged, forward a masked body, or short-circuit with a denial.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_data_masking::{Direction, FilterConfig, MaskingFilter, PolicyStore, Verdict};
//!
//! # fn example() -> a3s_data_masking::Result<()> {
//! let config = FilterConfig::from_yaml(r#"
//! routes:
//!   - hosts: ["ok.openai.com"]
//!     format: chat
//!     deny_words: ["costom_word1"]
//! "#)?;
//! let filter = MaskingFilter::new(PolicyStore::from_config(&config)?);
//!
//! let outcome = filter.filter(
//!     Direction::Request,
//!     "ok.openai.com",
//!     br#"{"messages":[{"role":"user","content":"key sk-12345"}]}"#,
//! )?;
//! assert_eq!(outcome.verdict, Verdict::Masked);
//! assert!(outcome.body_text().contains("sk12345"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Pipeline
//!
//! - **Extractor** ([`format`]): body + [`PayloadFormat`] → text segments with locators
//! - **Rule Set** ([`rules`]): layered detectors (PII, replacements, system and custom words)
//! - **Scanner** ([`scanner`]): ordered pass with allow-word suppression
//! - **Action Resolver** ([`resolver`]): verdict plus per-match replacements
//! - **Rewriter** ([`rewrite`]): reinjected body or canonical denial payload
//! - **Policy Provider** ([`policy`], [`store`], [`config`]): host → policy snapshots

pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod jsonpath;
pub mod policy;
pub mod resolver;
pub mod rewrite;
pub mod rules;
pub mod scanner;
pub mod store;
pub mod types;

// Re-export core types
pub use config::{DirectionScope, FilterConfig, FormatConfig, ReplaceRuleConfig, RouteConfig, WordEntry};
pub use error::{ExtractionError, MaskingError, Result};
pub use filter::{evaluate, Exchange, MaskingFilter, RestoreLog};
pub use format::{extract, Extracted, Locator, PayloadFormat, Segment};
pub use jsonpath::JsonPath;
pub use policy::{Policy, PolicyProvider, PolicySet, RoutePolicy};
pub use resolver::{resolve, Resolution, Transform};
pub use rewrite::{chat_envelope, DenySettings, DenyStyle, DENY_MESSAGE};
pub use rules::{Action, Matcher, Rule, RuleSet};
pub use scanner::{scan, Match};
pub use store::PolicyStore;
pub use types::{Category, Degradation, Direction, Outcome, Verdict};
