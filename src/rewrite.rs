//! Rewriter: build the outbound body from a resolved segment set
//!
//! Structured bodies are re-serialized through `serde_json` with key
//! order preserved, so fields untouched by masking survive as they were.

use crate::error::{MaskingError, Result};
use crate::format::{ChatShape, Document, Extracted, Locator};
use crate::types::{Direction, Verdict};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Canonical denial message
pub const DENY_MESSAGE: &str = "提问或回答中包含敏感词，已被屏蔽";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Shape of the body returned when an exchange is denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyStyle {
    /// `{"errmsg": <message>}`
    ErrMsg,
    /// Chat-completion envelope whose assistant content is the message
    ChatCompletion,
    /// No body; the host does not forward anything
    Empty,
}

/// How a policy answers a denied exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenySettings {
    pub style: DenyStyle,
    pub message: String,
    pub status: u16,
}

impl DenySettings {
    pub fn new(style: DenyStyle) -> Self {
        Self {
            style,
            message: DENY_MESSAGE.to_string(),
            status: 200,
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match self.style {
            DenyStyle::Empty => None,
            _ => Some(JSON_CONTENT_TYPE),
        }
    }
}

/// Canonical single-message chat-completion reply
pub fn chat_envelope(content: &str) -> Value {
    json!({
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content }
            }
        ],
        "usage": {}
    })
}

/// Denial body for the configured style
pub fn deny_body(settings: &DenySettings) -> Result<Bytes> {
    let body = match settings.style {
        DenyStyle::Empty => return Ok(Bytes::new()),
        DenyStyle::ErrMsg => serde_json::to_vec(&json!({ "errmsg": settings.message }))?,
        DenyStyle::ChatCompletion => serde_json::to_vec(&chat_envelope(&settings.message))?,
    };
    Ok(Bytes::from(body))
}

/// Write transformed segment texts back into the body
///
/// `texts` is parallel to `extracted.segments`; `None` means the segment
/// is unchanged. If nothing changed the original bytes are returned, except
/// that a masked response echoing a chat request is always answered with
/// the reply envelope.
pub fn rewrite(
    original: &[u8],
    extracted: Extracted,
    texts: Vec<Option<String>>,
    direction: Direction,
    verdict: Verdict,
) -> Result<Bytes> {
    let echoed = direction == Direction::Response && extracted.chat_shape == Some(ChatShape::Request);
    let unchanged = texts.iter().all(Option::is_none);
    if unchanged && !(echoed && verdict == Verdict::Masked) {
        return Ok(Bytes::copy_from_slice(original));
    }

    let Extracted {
        document,
        segments,
        ..
    } = extracted;

    match document {
        Document::Text => {
            let text = texts.into_iter().flatten().last().ok_or_else(|| {
                MaskingError::Rewrite("raw body has no segment to write".to_string())
            })?;
            Ok(Bytes::from(text))
        }
        Document::Json(mut doc) => {
            // A response that echoes a chat request is answered as a reply
            if echoed {
                let last = segments
                    .iter()
                    .zip(texts.iter())
                    .last()
                    .map(|(segment, text)| text.clone().unwrap_or_else(|| segment.text.clone()))
                    .unwrap_or_default();
                return Ok(Bytes::from(serde_json::to_vec(&chat_envelope(&last))?));
            }

            for (segment, text) in segments.iter().zip(texts) {
                let Some(text) = text else { continue };
                let Locator::Pointer(pointer) = &segment.locator else {
                    return Err(MaskingError::Rewrite(
                        "structured segment without a pointer".to_string(),
                    ));
                };
                let slot = doc.pointer_mut(pointer).ok_or_else(|| {
                    MaskingError::Rewrite(format!("pointer {} no longer resolves", pointer))
                })?;
                *slot = Value::String(text);
            }
            serde_json::to_vec(&doc)
                .map(Bytes::from)
                .map_err(|e| MaskingError::Rewrite(e.to_string()))
        }
    }
}
