//! Statement builder that interleaves literal SQL text with escaped values.

use std::fmt;

use super::value::{NULL_LITERAL, SqlValue};

/// A pre-built statement ready to be passed to [`Client::run`](crate::Client::run).
///
/// Values are escaped at construction time; nested `Query` values are
/// embedded verbatim.
///
/// # Examples
///
/// ```
/// use sqlite_shell::sql::Query;
///
/// let name = "O'Brien";
/// let query = Query::new(&["SELECT * FROM users WHERE name = ", " AND age > ", ""], &[&name, &30]);
/// assert_eq!(query.sql(), "SELECT * FROM users WHERE name = 'O''Brien' AND age > 30");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Query {
    sql: String,
}

impl Query {
    /// Build a statement from literal parts and the values between them.
    ///
    /// `parts` is expected to hold one more element than `values`. A part
    /// with no matching value is followed by `null`; surplus values are ignored.
    pub fn new(parts: &[&str], values: &[&dyn SqlValue]) -> Self {
        let mut sql = String::new();
        for (idx, part) in parts.iter().enumerate() {
            if idx > 0 {
                match values.get(idx - 1) {
                    Some(value) => sql.push_str(&value.to_literal()),
                    None => sql.push_str(NULL_LITERAL),
                }
            }
            sql.push_str(part);
        }
        Self { sql }
    }

    /// Wrap trusted statement text without escaping.
    pub fn raw(text: impl Into<String>) -> Self {
        Self { sql: text.into() }
    }

    /// The empty statement fragment.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Escape each item and join them with `separator`.
    pub fn join<I>(items: I, separator: &str) -> Self
    where
        I: IntoIterator,
        I::Item: SqlValue,
    {
        let sql = items
            .into_iter()
            .map(|item| item.to_literal())
            .collect::<Vec<_>>()
            .join(separator);
        Self { sql }
    }

    /// Append literal statement text.
    pub fn push_sql(mut self, text: &str) -> Self {
        self.sql.push_str(text);
        self
    }

    /// Append an escaped value.
    pub fn push_value<V: SqlValue + ?Sized>(mut self, value: &V) -> Self {
        self.sql.push_str(&value.to_literal());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn into_sql(self) -> String {
        self.sql
    }
}

impl SqlValue for Query {
    fn to_literal(&self) -> String {
        self.sql.clone()
    }
}

impl AsRef<str> for Query {
    fn as_ref(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl From<Query> for String {
    fn from(query: Query) -> Self {
        query.sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_new_interleaves_values() {
        let query = Query::new(&["INSERT INTO t VALUES (", ", ", ")"], &[&1, &"two"]);
        assert_eq!(query.sql(), "INSERT INTO t VALUES (1, 'two')");
    }

    #[rstest]
    fn test_new_missing_value_renders_null() {
        let query = Query::new(&["SELECT ", ", ", ""], &[&1]);
        assert_eq!(query.sql(), "SELECT 1, null");
    }

    #[rstest]
    fn test_nested_query_is_embedded_verbatim() {
        let filter = Query::raw("id > 3");
        let query = Query::new(&["SELECT * FROM t WHERE ", ""], &[&filter]);
        assert_eq!(query.sql(), "SELECT * FROM t WHERE id > 3");
    }

    #[rstest]
    fn test_empty() {
        assert!(Query::empty().is_empty());
        assert_eq!(Query::empty().sql(), "");
    }

    #[rstest]
    fn test_join_default_separator() {
        let query = Query::join([1, 2, 3], ", ");
        assert_eq!(query.sql(), "1, 2, 3");
    }

    #[rstest]
    fn test_join_strings_are_escaped() {
        let query = Query::join(["a", "b'c"], " | ");
        assert_eq!(query.sql(), "'a' | 'b''c'");
    }

    #[rstest]
    fn test_join_inside_new() {
        let ids = Query::join([4, 5], ", ");
        let query = Query::new(&["SELECT * FROM t WHERE id IN (", ")"], &[&ids]);
        assert_eq!(query.sql(), "SELECT * FROM t WHERE id IN (4, 5)");
    }

    #[rstest]
    fn test_builder_methods() {
        let query = Query::raw("SELECT * FROM t WHERE name = ")
            .push_value("x")
            .push_sql(" LIMIT ")
            .push_value(&10);
        assert_eq!(query.to_string(), "SELECT * FROM t WHERE name = 'x' LIMIT 10");
    }
}
