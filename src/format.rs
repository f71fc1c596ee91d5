//! Payload formats and segment extraction
//!
//! A [`PayloadFormat`] tells the extractor where the scannable text lives
//! in a body. Each extracted [`Segment`] carries a [`Locator`] so the
//! rewriter can put transformed text back where it came from.

use crate::error::ExtractionError;
use crate::jsonpath::JsonPath;
use serde_json::Value;

/// How a body is interpreted for scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadFormat {
    /// OpenAI-style chat: `messages[*].content` or `choices[*].message.content`
    Chat,
    /// String leaves at the configured paths of an arbitrary JSON document
    JsonPath(Vec<JsonPath>),
    /// The whole body as text
    Raw,
}

impl PayloadFormat {
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Raw)
    }
}

/// Where a segment is written back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// RFC 6901 pointer into the parsed document
    Pointer(String),
    /// Replace the entire body
    WholeBody,
}

/// One unit of text to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub locator: Locator,
}

/// Which side of the chat protocol a body looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatShape {
    /// Has a `messages` array
    Request,
    /// Has a `choices` array
    Response,
}

/// Parsed form of the body that segments point into
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Json(Value),
    Text,
}

/// Result of extraction
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub document: Document,
    pub segments: Vec<Segment>,
    pub chat_shape: Option<ChatShape>,
}

/// Split `body` into segments according to `format`
pub fn extract(body: &[u8], format: &PayloadFormat) -> Result<Extracted, ExtractionError> {
    match format {
        PayloadFormat::Raw => Ok(Extracted {
            document: Document::Text,
            segments: vec![Segment {
                text: String::from_utf8_lossy(body).into_owned(),
                locator: Locator::WholeBody,
            }],
            chat_shape: None,
        }),
        PayloadFormat::Chat => {
            let doc = parse_json(body)?;
            let (shape, segments) = chat_segments(&doc)?;
            Ok(Extracted {
                document: Document::Json(doc),
                segments,
                chat_shape: Some(shape),
            })
        }
        PayloadFormat::JsonPath(paths) => {
            let doc = parse_json(body)?;
            let segments: Vec<Segment> = paths
                .iter()
                .flat_map(|path| path.string_leaves(&doc))
                .map(|(pointer, text)| Segment {
                    text: text.to_string(),
                    locator: Locator::Pointer(pointer),
                })
                .collect();
            if segments.is_empty() {
                let joined = paths.iter().map(JsonPath::as_str).collect::<Vec<_>>().join(", ");
                return Err(ExtractionError::NoField(joined));
            }
            Ok(Extracted {
                document: Document::Json(doc),
                segments,
                chat_shape: None,
            })
        }
    }
}

fn parse_json(body: &[u8]) -> Result<Value, ExtractionError> {
    serde_json::from_slice(body).map_err(|e| ExtractionError::Malformed(e.to_string()))
}

fn chat_segments(doc: &Value) -> Result<(ChatShape, Vec<Segment>), ExtractionError> {
    if let Some(messages) = doc.get("messages").and_then(Value::as_array) {
        let mut segments = Vec::new();
        for (i, message) in messages.iter().enumerate() {
            content_segments(message.get("content"), format!("/messages/{}/content", i), &mut segments);
        }
        return Ok((ChatShape::Request, segments));
    }

    if let Some(choices) = doc.get("choices").and_then(Value::as_array) {
        let mut segments = Vec::new();
        for (i, choice) in choices.iter().enumerate() {
            content_segments(
                choice.get("message").and_then(|m| m.get("content")),
                format!("/choices/{}/message/content", i),
                &mut segments,
            );
        }
        return Ok((ChatShape::Response, segments));
    }

    Err(ExtractionError::Malformed(
        "expected a 'messages' or 'choices' array".to_string(),
    ))
}

fn content_segments(content: Option<&Value>, pointer: String, out: &mut Vec<Segment>) {
    match content {
        Some(Value::String(text)) => out.push(Segment {
            text: text.clone(),
            locator: Locator::Pointer(pointer),
        }),
        // Multimodal content: only text parts are scanned
        Some(Value::Array(parts)) => {
            for (j, part) in parts.iter().enumerate() {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    out.push(Segment {
                        text: text.to_string(),
                        locator: Locator::Pointer(format!("{}/{}/text", pointer, j)),
                    });
                }
            }
        }
        _ => {}
    }
}
