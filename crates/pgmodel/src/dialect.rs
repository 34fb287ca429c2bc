//! Driver escaping rules.
//!
//! A [`Dialect`] is the only authority on how a literal is quoted and which
//! values count as SQL constants. The constant list is fixed per dialect and
//! matched against the whole value; caller input never widens it.

/// Escaping rules of a database driver.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    /// Quote and escape a string literal.
    fn escape_literal(&self, value: &str) -> String;

    /// Constant/function forms that may be emitted unquoted.
    fn sql_constants(&self) -> &[&'static str];

    /// Quote an identifier (used for result aliases).
    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Whether `value` is one of [`Dialect::sql_constants`].
    ///
    /// Comparison is ASCII case-insensitive over the trimmed value.
    fn is_sql_constant(&self, value: &str) -> bool {
        let value = value.trim();
        self.sql_constants()
            .iter()
            .any(|c| c.eq_ignore_ascii_case(value))
    }
}

/// Constant forms PostgreSQL evaluates server-side.
pub const POSTGRES_CONSTANTS: &[&str] = &[
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "LOCALTIMESTAMP",
    "LOCALTIME",
    "NOW()",
    "NULL",
];

/// PostgreSQL literal rules (`standard_conforming_strings = on`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn escape_literal(&self, value: &str) -> String {
        let has_backslash = value.contains('\\');
        let mut out = String::with_capacity(value.len() + 3);
        if has_backslash {
            out.push('E');
        }
        out.push('\'');
        for c in value.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                // text values cannot hold NUL
                '\0' => {}
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    fn sql_constants(&self) -> &[&'static str] {
        POSTGRES_CONSTANTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_values() {
        assert_eq!(Postgres.escape_literal("foo"), "'foo'");
        assert_eq!(Postgres.escape_literal(""), "''");
    }

    #[test]
    fn doubles_single_quotes() {
        assert_eq!(Postgres.escape_literal("O'Reilly"), "'O''Reilly'");
        assert_eq!(
            Postgres.escape_literal("'; DROP TABLE item; --"),
            "'''; DROP TABLE item; --'"
        );
    }

    #[test]
    fn backslashes_use_escape_string_form() {
        assert_eq!(Postgres.escape_literal(r"a\b"), r"E'a\\b'");
        assert_eq!(Postgres.escape_literal(r"\'"), r"E'\\'''");
    }

    #[test]
    fn drops_nul() {
        assert_eq!(Postgres.escape_literal("a\0b"), "'ab'");
    }

    #[test]
    fn recognizes_only_listed_constants() {
        assert!(Postgres.is_sql_constant("CURRENT_TIMESTAMP"));
        assert!(Postgres.is_sql_constant(" now() "));
        assert!(Postgres.is_sql_constant("null"));
        assert!(!Postgres.is_sql_constant("NOW() ; DROP TABLE item"));
        assert!(!Postgres.is_sql_constant("pg_sleep(10)"));
        assert!(!Postgres.is_sql_constant("CURRENT_TIMESTAMP - INTERVAL '1 day'"));
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(Postgres.quote_ident("category_title"), "\"category_title\"");
        assert_eq!(Postgres.quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
