//! Structured asset format.
//!
//! Text is attempted as strict JSON first. Only when strict parsing fails is
//! a relaxed pass tried, with line/block comments and trailing commas
//! stripped outside string literals; taking the relaxed path logs a warning,
//! never an error. Writing supports compact output or pretty output with a
//! caller-controlled indent.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{ForgeError, Result};

/// Output style for [`to_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStyle {
    Compact,
    Pretty { indent: String },
}

impl WriteStyle {
    /// Pretty output indented with `width` spaces.
    pub fn width(width: usize) -> Self {
        WriteStyle::Pretty {
            indent: " ".repeat(width),
        }
    }
}

/// Parse structured text, strict first, relaxed as a fallback.
///
/// Failure of both modes reports the strict error, which carries the
/// position serde_json saw.
pub fn parse(path: &str, text: &str) -> Result<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            let relaxed = strip_relaxed_syntax(text);
            match serde_json::from_str(&relaxed) {
                Ok(value) => {
                    warn!(path, "structured asset needed relaxed parsing");
                    Ok(value)
                }
                Err(_) => Err(ForgeError::Parse {
                    path: path.to_string(),
                    detail: strict_err.to_string(),
                }),
            }
        }
    }
}

/// Serialize a value in the given style.
pub fn to_text(path: &str, value: &Value, style: &WriteStyle) -> Result<String> {
    let rendered = match style {
        WriteStyle::Compact => serde_json::to_string(value),
        WriteStyle::Pretty { indent } => {
            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value
                .serialize(&mut serializer)
                .map(|()| String::from_utf8_lossy(&buf).into_owned())
        }
    };
    rendered.map_err(|e| ForgeError::Parse {
        path: path.to_string(),
        detail: e.to_string(),
    })
}

/// Strip `//`/`/* */` comments and trailing commas outside string literals.
///
/// Newlines inside block comments are kept so serde_json's reported
/// positions stay close to the original text.
fn strip_relaxed_syntax(text: &str) -> String {
    let without_comments = strip_comments(text);
    strip_trailing_commas(&without_comments)
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        chars.next();
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        if next == '\n' {
                            out.push('\n');
                        }
                        prev = next;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            continue;
        }
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_parse() {
        let value = parse("a.json", r#"{"a": 1, "b": [true, null]}"#).unwrap();
        assert_eq!(value, json!({"a": 1, "b": [true, null]}));
    }

    #[test]
    fn test_relaxed_trailing_comma() {
        let value = parse("a.json", r#"{"a": 1,}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_relaxed_comments() {
        let text = r#"
// generated by hand
{
    "a": 1, /* inline note */
    "list": [1, 2, 3,],
}
"#;
        let value = parse("a.json", text).unwrap();
        assert_eq!(value, json!({"a": 1, "list": [1, 2, 3]}));
    }

    #[test]
    fn test_comment_markers_inside_strings_survive() {
        let value = parse("a.json", r#"{"url": "http://example.com", "note": "a,b"}"#).unwrap();
        assert_eq!(value["url"], "http://example.com");
        assert_eq!(value["note"], "a,b");
    }

    #[test]
    fn test_both_modes_fail_reports_strict_position() {
        let err = parse("a.json", "{broken").unwrap_err();
        match err {
            ForgeError::Parse { path, detail } => {
                assert_eq!(path, "a.json");
                assert!(detail.contains("line"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_compact() {
        let text = to_text("a.json", &json!({"a": 1}), &WriteStyle::Compact).unwrap();
        assert_eq!(text, r#"{"a":1}"#);
    }

    #[test]
    fn test_write_pretty_with_width() {
        let text = to_text("a.json", &json!({"a": 1}), &WriteStyle::width(4)).unwrap();
        assert_eq!(text, "{\n    \"a\": 1\n}");
    }

    #[test]
    fn test_write_pretty_with_indent_string() {
        let style = WriteStyle::Pretty {
            indent: "\t".to_string(),
        };
        let text = to_text("a.json", &json!({"a": 1}), &style).unwrap();
        assert_eq!(text, "{\n\t\"a\": 1\n}");
    }
}
