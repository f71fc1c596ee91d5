//! Filter entry point
//!
//! `MaskingFilter` resolves a policy for the host and runs the pipeline
//! extract -> scan -> resolve -> rewrite over one body. `Exchange` pairs
//! the request and response passes so values masked with `restore`
//! can be put back into the response.

use crate::error::{ExtractionError, MaskingError, Result};
use crate::format::extract;
use crate::policy::{Policy, PolicyProvider};
use crate::resolver::{resolve, Resolution};
use crate::rewrite::{deny_body, rewrite};
use crate::scanner::scan;
use crate::types::{Category, Degradation, Direction, Outcome, Verdict};
use bytes::Bytes;
use std::sync::Arc;

/// Masked values recorded on the request, restored on the response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreLog {
    /// (masked, original), longest masked text first
    entries: Vec<(String, String)>,
    /// Masked values seen for more than one original; never restored
    ambiguous: Vec<String>,
}

impl RestoreLog {
    fn record(&mut self, resolution: &Resolution) {
        for rep in resolution.replacements.iter().filter(|r| r.restore) {
            if rep.text.is_empty() || rep.text == rep.original || self.ambiguous.contains(&rep.text) {
                continue;
            }
            match self.entries.iter().position(|(masked, _)| *masked == rep.text) {
                Some(i) if self.entries[i].1 != rep.original => {
                    let (masked, _) = self.entries.remove(i);
                    tracing::debug!("Masked value maps to several originals, not restoring it");
                    self.ambiguous.push(masked);
                }
                Some(_) => {}
                None => self.entries.push((rep.text.clone(), rep.original.clone())),
            }
        }
        self.entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Replace every recorded masked value in `text` with its original
    ///
    /// One left-to-right pass; the longest masked value at a position wins
    /// and restored text is never scanned again.
    pub fn restore(&self, text: &str) -> String {
        if self.entries.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        'scan: while let Some(c) = rest.chars().next() {
            for (masked, original) in &self.entries {
                if rest.starts_with(masked.as_str()) {
                    out.push_str(original);
                    rest = &rest[masked.len()..];
                    continue 'scan;
                }
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the pipeline does with the restore log for one pass
enum RestoreMode<'a> {
    None,
    Record(&'a mut RestoreLog),
    Apply(&'a RestoreLog),
}

/// Content-masking filter bound to a policy provider
pub struct MaskingFilter {
    provider: Arc<dyn PolicyProvider>,
}

impl MaskingFilter {
    pub fn new(provider: impl PolicyProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Share a provider that is also held elsewhere (e.g. for reloads)
    pub fn with_provider(provider: Arc<dyn PolicyProvider>) -> Self {
        Self { provider }
    }

    /// Evaluate one body for `host`
    ///
    /// Unknown hosts are an error; a route that does not scan `direction`
    /// passes the body through.
    pub fn filter(&self, direction: Direction, host: &str, body: &[u8]) -> Result<Outcome> {
        self.run(direction, host, body, RestoreMode::None)
    }

    /// Start an exchange for `host`
    pub fn exchange(&self, host: impl Into<String>) -> Exchange<'_> {
        Exchange {
            filter: self,
            host: host.into(),
            restore: RestoreLog::default(),
        }
    }

    fn run(&self, direction: Direction, host: &str, body: &[u8], mode: RestoreMode<'_>) -> Result<Outcome> {
        let Some(policy) = self.provider.resolve(host, direction)? else {
            tracing::debug!(host = %host, direction = %direction, "Direction not scanned");
            if let RestoreMode::Apply(log) = mode {
                return Ok(restore_unscanned(log, body));
            }
            return Ok(Outcome::pass_through(body));
        };
        let outcome = evaluate_with(&policy, direction, body, mode)?;
        tracing::debug!(
            host = %host,
            direction = %direction,
            verdict = ?outcome.verdict,
            categories = ?outcome.categories,
            "Exchange evaluated"
        );
        Ok(outcome)
    }
}

/// Request/response pair for one host
pub struct Exchange<'a> {
    filter: &'a MaskingFilter,
    host: String,
    restore: RestoreLog,
}

impl Exchange<'_> {
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Filter the request body, recording restorable replacements
    pub fn on_request(&mut self, body: &[u8]) -> Result<Outcome> {
        self.filter.run(
            Direction::Request,
            &self.host,
            body,
            RestoreMode::Record(&mut self.restore),
        )
    }

    /// Filter the response body, restoring values masked in the request
    pub fn on_response(&mut self, body: &[u8]) -> Result<Outcome> {
        self.filter
            .run(Direction::Response, &self.host, body, RestoreMode::Apply(&self.restore))
    }

    pub fn restore_log(&self) -> &RestoreLog {
        &self.restore
    }
}

/// Evaluate one body against a resolved policy
pub fn evaluate(policy: &Policy, direction: Direction, body: &[u8]) -> Result<Outcome> {
    evaluate_with(policy, direction, body, RestoreMode::None)
}

/// Restore masked values in a body no policy scans
///
/// Non-UTF-8 bodies pass through untouched.
fn restore_unscanned(log: &RestoreLog, body: &[u8]) -> Outcome {
    let mut outcome = Outcome::pass_through(body);
    if log.is_empty() {
        return outcome;
    }
    if let Ok(text) = std::str::from_utf8(body) {
        let restored = log.restore(text);
        if restored != text {
            outcome.verdict = Verdict::Masked;
            outcome.body = Bytes::from(restored);
        }
    }
    outcome
}

fn denied(policy: &Policy, categories: Vec<Category>, degraded: Option<Degradation>) -> Result<Outcome> {
    Ok(Outcome {
        verdict: Verdict::Denied,
        body: deny_body(&policy.deny)?,
        status: Some(policy.deny.status),
        content_type: policy.deny.content_type(),
        degraded,
        categories,
    })
}

fn degrade(policy: &Policy, direction: Direction, body: &[u8], err: ExtractionError) -> Result<Outcome> {
    let (degradation, escalate) = match &err {
        ExtractionError::Malformed(_) => (Degradation::MalformedBody, policy.strict),
        ExtractionError::NoField(_) => (
            Degradation::NoFieldToScan,
            policy.strict || policy.deny_on_missing_field,
        ),
    };
    tracing::warn!(
        direction = %direction,
        error = %err,
        escalate,
        "Body could not be extracted for scanning"
    );
    if escalate {
        return denied(policy, Vec::new(), Some(degradation));
    }
    let mut outcome = Outcome::pass_through(body);
    outcome.degraded = Some(degradation);
    Ok(outcome)
}

fn evaluate_with(policy: &Policy, direction: Direction, body: &[u8], mut mode: RestoreMode<'_>) -> Result<Outcome> {
    // Host-level blocks do not depend on the body parsing
    if policy.rules.blocks_all() {
        tracing::debug!(direction = %direction, "Route always denies");
        return denied(policy, vec![Category::Route], None);
    }

    let extracted = match extract(body, &policy.format) {
        Ok(extracted) => extracted,
        Err(err) => return degrade(policy, direction, body, err),
    };
    tracing::debug!(segments = extracted.segments.len(), "Body extracted");

    let mut categories: Vec<Category> = Vec::new();
    let mut masked = false;
    let mut texts: Vec<Option<String>> = Vec::with_capacity(extracted.segments.len());

    for segment in &extracted.segments {
        let matches = scan(&segment.text, &policy.rules);
        for m in &matches {
            if !categories.contains(&m.category) {
                categories.push(m.category);
            }
        }

        let resolution = resolve(&matches);
        if resolution.verdict == Verdict::Denied {
            tracing::debug!(rule = ?resolution.denied_by, "Segment denied");
            categories.sort();
            return denied(policy, categories, None);
        }
        masked |= resolution.verdict == Verdict::Masked;

        let mut text = resolution.apply(&segment.text);
        match &mut mode {
            RestoreMode::Record(log) => log.record(&resolution),
            RestoreMode::Apply(log) => text = log.restore(&text),
            RestoreMode::None => {}
        }
        texts.push((text != segment.text).then_some(text));
    }

    let changed = texts.iter().any(Option::is_some);
    let verdict = if masked || changed {
        Verdict::Masked
    } else {
        Verdict::Allow
    };
    let body = rewrite(body, extracted, texts, direction, verdict).map_err(|e| {
        tracing::warn!(error = %e, "Rewrite failed");
        match e {
            MaskingError::Serialization(inner) => MaskingError::Rewrite(inner.to_string()),
            other => other,
        }
    })?;

    categories.sort();
    Ok(Outcome {
        verdict,
        body,
        status: None,
        content_type: None,
        degraded: None,
        categories,
    })
}
