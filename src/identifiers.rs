//! SQL identifier helpers shared by the query builder and the operations engine.

use regex::Regex;
use std::sync::OnceLock;

static BARE_IDENTIFIER: OnceLock<Regex> = OnceLock::new();

fn bare_identifier_regex() -> &'static Regex {
    BARE_IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("bare identifier pattern is valid")
    })
}

/// Wrap an identifier in double quotes, doubling any embedded quote.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote each identifier and join with `, `.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// True for identifiers that need no quoting: a letter or underscore followed by
/// letters, digits or underscores.
pub fn is_bare_identifier(name: &str) -> bool {
    bare_identifier_regex().is_match(name)
}
