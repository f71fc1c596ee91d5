//! Minimal JSON path support for field extraction
//!
//! Accepts two notations:
//! - JSONPath subset: `$.messages[*].content`, `$['key'][0]`, `$.a.*`
//! - RFC 6901 pointer: `/messages/0/content`
//!
//! Resolution yields the string leaves a path reaches, each tagged with
//! the concrete JSON pointer used to write a value back.

use crate::error::{MaskingError, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
    Wildcard,
}

/// Parsed JSON path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    steps: Vec<Step>,
}

impl JsonPath {
    pub fn parse(source: &str) -> Result<Self> {
        let steps = if source.starts_with('/') {
            parse_pointer(source)
        } else if let Some(rest) = source.strip_prefix('$') {
            parse_dotted(source, rest)?
        } else {
            return Err(invalid(source, "must start with '$' or '/'"));
        };
        Ok(Self {
            source: source.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Every string leaf the path reaches, as `(pointer, text)`
    pub fn string_leaves<'a>(&self, root: &'a Value) -> Vec<(String, &'a str)> {
        let mut out = Vec::new();
        walk(root, &self.steps, String::new(), &mut out);
        out
    }
}

impl std::fmt::Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn invalid(source: &str, reason: &str) -> MaskingError {
    MaskingError::Config(format!("Invalid JSON path '{}': {}", source, reason))
}

fn parse_pointer(source: &str) -> Vec<Step> {
    source[1..]
        .split('/')
        .map(|token| {
            let token = token.replace("~1", "/").replace("~0", "~");
            match token.parse::<usize>() {
                Ok(index) => Step::Index(index),
                Err(_) => Step::Key(token),
            }
        })
        .collect()
}

fn parse_dotted(source: &str, rest: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    let chars: Vec<char> = rest.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                let key: String = chars[start..i].iter().collect();
                match key.as_str() {
                    "" => return Err(invalid(source, "empty key")),
                    "*" => steps.push(Step::Wildcard),
                    _ => steps.push(Step::Key(key)),
                }
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| invalid(source, "unclosed '['"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let inner = inner.trim();
                if inner == "*" {
                    steps.push(Step::Wildcard);
                } else if let Some(quoted) = inner
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
                {
                    steps.push(Step::Key(quoted.to_string()));
                } else {
                    let index = inner
                        .parse::<usize>()
                        .map_err(|_| invalid(source, "bracket must hold an index, '*' or a quoted key"))?;
                    steps.push(Step::Index(index));
                }
                i = close + 1;
            }
            _ => return Err(invalid(source, "expected '.' or '['")),
        }
    }

    Ok(steps)
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn walk<'a>(value: &'a Value, steps: &[Step], pointer: String, out: &mut Vec<(String, &'a str)>) {
    let Some((step, rest)) = steps.split_first() else {
        if let Value::String(s) = value {
            out.push((pointer, s.as_str()));
        }
        return;
    };

    match (step, value) {
        (Step::Key(key), Value::Object(map)) => {
            if let Some(child) = map.get(key) {
                walk(child, rest, format!("{}/{}", pointer, escape_token(key)), out);
            }
        }
        (Step::Index(index), Value::Array(items)) => {
            if let Some(child) = items.get(*index) {
                walk(child, rest, format!("{}/{}", pointer, index), out);
            }
        }
        (Step::Wildcard, Value::Array(items)) => {
            for (index, child) in items.iter().enumerate() {
                walk(child, rest, format!("{}/{}", pointer, index), out);
            }
        }
        (Step::Wildcard, Value::Object(map)) => {
            for (key, child) in map {
                walk(child, rest, format!("{}/{}", pointer, escape_token(key)), out);
            }
        }
        _ => {}
    }
}
