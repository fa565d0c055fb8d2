//! Script preprocessor.
//!
//! Splits a mod's raw script text into ordered segments using comment-style
//! block directives:
//!
//! ```text
//! /// #pragma lib-begin textutil
//! ...replaced by the named library...
//! /// #pragma lib-end
//! ```
//!
//! Lines strictly between a begin/end pair are excised and replaced by one
//! library-reference segment; the surrounding lines coalesce into maximal
//! contiguous inline segments, each carrying its accurate 1-based starting
//! line. Blocks do not nest, and an unterminated block is fatal.

use crate::error::{ForgeError, Result};

/// One ordered piece of a preprocessed script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Inline code with its 1-based starting line in the original file.
    Inline { text: String, line: usize },
    /// Reference to a named external library, resolved lazily at execution.
    Library { name: String },
}

enum Directive<'a> {
    Begin(&'a str),
    End,
}

/// Recognize a directive line. The comment marker may be `///` (matching the
/// original scripts this format grew out of) or `--` so the directive reads
/// as a comment to Lua tooling. A `lib-begin` without a name comes back as
/// `Begin("")` for the caller to reject with the line attached.
fn parse_directive(line: &str) -> Option<Directive<'_>> {
    let trimmed = line.trim();
    let body = trimmed
        .strip_prefix("///")
        .or_else(|| trimmed.strip_prefix("--"))?
        .trim();

    if let Some(rest) = body.strip_prefix("#pragma lib-begin") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(Directive::Begin(rest.trim()));
        }
        return None;
    }
    if body.strip_prefix("#pragma lib-end").is_some_and(|r| r.trim().is_empty()) {
        return Some(Directive::End);
    }
    None
}

/// Split `source` into ordered segments.
///
/// `script` names the source for diagnostics. No directives yield one inline
/// segment spanning the whole file; only directives yield zero inline
/// segments. Whitespace-only inline runs are not emitted.
pub fn split_segments(script: &str, source: &str) -> Result<Vec<Segment>> {
    fn flush_inline(segments: &mut Vec<Segment>, inline: &mut Vec<&str>, start: usize) {
        if inline.iter().any(|l| !l.trim().is_empty()) {
            segments.push(Segment::Inline {
                text: inline.join("\n"),
                line: start,
            });
        }
        inline.clear();
    }

    let mut segments = Vec::new();
    let mut inline: Vec<&str> = Vec::new();
    let mut inline_start = 0usize;
    let mut open: Option<(String, usize)> = None;

    for (index, raw_line) in source.lines().enumerate() {
        let line_no = index + 1;
        match parse_directive(raw_line) {
            Some(Directive::Begin(name)) => {
                if name.is_empty() {
                    return Err(ForgeError::Directive {
                        script: script.to_string(),
                        line: line_no,
                        detail: "lib-begin directive is missing a library name".to_string(),
                    });
                }
                if let Some((open_name, open_line)) = &open {
                    return Err(ForgeError::Directive {
                        script: script.to_string(),
                        line: line_no,
                        detail: format!(
                            "lib-begin '{name}' while '{open_name}' from line {open_line} is still open"
                        ),
                    });
                }
                flush_inline(&mut segments, &mut inline, inline_start);
                segments.push(Segment::Library {
                    name: name.to_string(),
                });
                open = Some((name.to_string(), line_no));
            }
            Some(Directive::End) => {
                if open.take().is_none() {
                    return Err(ForgeError::Directive {
                        script: script.to_string(),
                        line: line_no,
                        detail: "lib-end without a matching lib-begin".to_string(),
                    });
                }
            }
            None => {
                if open.is_none() {
                    if inline.is_empty() {
                        inline_start = line_no;
                    }
                    inline.push(raw_line);
                }
                // Lines inside an open block are excised.
            }
        }
    }

    if let Some((name, line)) = open {
        return Err(ForgeError::Directive {
            script: script.to_string(),
            line,
            detail: format!("lib-begin '{name}' is never closed"),
        });
    }
    flush_inline(&mut segments, &mut inline, inline_start);

    Ok(segments)
}
