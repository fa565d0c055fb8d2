//! Id-ledger text handling.
//!
//! The ledger is free-form text containing exactly one meaningful decimal
//! integer. Reading locates the first such run anywhere in the text; writing
//! replaces only that run in place, leaving all other text untouched.

use std::sync::OnceLock;

use regex::Regex;

fn counter_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\d+").expect("counter regex"))
}

/// Find the counter value in ledger text.
///
/// Returns `None` when the text contains no decimal run, or the run does not
/// fit in a `u64`.
pub fn find_counter(text: &str) -> Option<u64> {
    counter_regex().find(text)?.as_str().parse().ok()
}

/// Replace the first decimal run in `text` with `value`.
///
/// Text without any decimal run becomes just the value.
pub fn replace_counter(text: &str, value: u64) -> String {
    match counter_regex().find(text) {
        Some(m) => format!("{}{}{}", &text[..m.start()], value, &text[m.end()..]),
        None => value.to_string(),
    }
}
