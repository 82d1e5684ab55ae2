//! String escaping utilities for SQLite statements.

use super::value::SqlValue;

/// Quote a string as an SQLite string literal.
///
/// # Arguments
/// * `s` - The string to quote
/// * `quote_char` - The quote character; embedded occurrences are doubled
pub fn quote_string_for(s: &str, quote_char: char) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push(quote_char);
    for c in s.chars() {
        if c == quote_char {
            result.push(c);
        }
        result.push(c);
    }
    result.push(quote_char);
    result
}

/// Quote a string as a single-quoted SQLite string literal
#[inline]
pub fn quote_string(s: &str) -> String {
    quote_string_for(s, '\'')
}

/// Quote an identifier (table or column name) with double quotes
#[inline]
pub fn quote_identifier(s: &str) -> String {
    quote_string_for(s, '"')
}

/// Format any supported value as a literal that is safe to splice into a statement.
pub fn escape<V: SqlValue + ?Sized>(value: &V) -> String {
    value.to_literal()
}
