//! Trait abstraction for values that can be rendered as SQLite literals.
//!
//! The shell only ever receives statement text, so every parameter has to be
//! turned into a literal before it is spliced in. `SqlValue` is the single
//! conversion point used by [`Query`](super::Query) and [`escape`](super::escape).

use serde_json::Value;

use super::escape::quote_string;

/// Literal used for SQL `NULL`.
pub const NULL_LITERAL: &str = "null";

/// Trait for values that can be formatted as an SQLite literal.
pub trait SqlValue {
    /// Render the value as literal statement text.
    fn to_literal(&self) -> String;
}

impl SqlValue for str {
    fn to_literal(&self) -> String {
        quote_string(self)
    }
}

impl SqlValue for String {
    fn to_literal(&self) -> String {
        quote_string(self)
    }
}

impl<T: SqlValue + ?Sized> SqlValue for &T {
    fn to_literal(&self) -> String {
        (**self).to_literal()
    }
}

impl SqlValue for bool {
    fn to_literal(&self) -> String {
        let literal = if *self { "1" } else { "0" };
        literal.to_string()
    }
}

macro_rules! integer_literal {
    ($($ty:ty),*) => {
        $(
            impl SqlValue for $ty {
                fn to_literal(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

integer_literal!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl SqlValue for f64 {
    /// Non-finite floats have no SQLite literal and render as `null`.
    fn to_literal(&self) -> String {
        if self.is_finite() {
            self.to_string()
        } else {
            NULL_LITERAL.to_string()
        }
    }
}

impl SqlValue for f32 {
    fn to_literal(&self) -> String {
        f64::from(*self).to_literal()
    }
}

impl<T: SqlValue> SqlValue for Option<T> {
    fn to_literal(&self) -> String {
        match self {
            Some(value) => value.to_literal(),
            None => NULL_LITERAL.to_string(),
        }
    }
}

/// Arrays and objects are stored as quoted JSON text, which SQLite's JSON
/// functions accept directly.
impl SqlValue for Value {
    fn to_literal(&self) -> String {
        match self {
            Value::Null => NULL_LITERAL.to_string(),
            Value::Bool(b) => b.to_literal(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_string(s),
            Value::Array(_) | Value::Object(_) => quote_string(&self.to_string()),
        }
    }
}
