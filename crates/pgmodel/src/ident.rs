//! Identifiers supplied by a request.
//!
//! Field names arriving through the projection, sort and group selectors are
//! translated through the entity mapping first. A name the mapping does not
//! know passes through unchanged, so it has to be a plain SQL identifier:
//!
//! - Unquoted parts must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL and escape `"` as `""`
//! - Parts are joined by `.` (`table.column`)
//!
//! ```ignore
//! use pgmodel::Ident;
//!
//! let c = Ident::parse("item.created_at")?;
//! assert!(Ident::parse("id; DROP TABLE item").is_err());
//! # Ok::<(), pgmodel::ModelError>(())
//! ```

use crate::error::{ModelError, ModelResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    Unquoted(String),
    Quoted(String),
}

impl IdentPart {
    /// The bare name of this part, without quotes.
    pub fn name(&self) -> &str {
        match self {
            Self::Unquoted(s) | Self::Quoted(s) => s,
        }
    }
}

/// A SQL identifier (column, or table-qualified column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

fn reject(message: impl Into<String>) -> ModelError {
    ModelError::bad_request(message)
}

impl Ident {
    /// Parse an identifier string, supporting dotted and quoted forms.
    pub fn parse(s: &str) -> ModelResult<Self> {
        if s.is_empty() {
            return Err(reject("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(reject("Identifier cannot contain NUL character"));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') if chars.peek().is_none() => {
                        return Err(reject(format!("Trailing '.' in identifier '{s}'")));
                    }
                    Some('.') => {}
                    Some(c) => {
                        return Err(reject(format!(
                            "Expected '.' between identifier parts in '{s}', got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            name.push('"');
                        }
                        Some('"') => break,
                        Some(c) => name.push(c),
                        None => return Err(reject(format!("Unclosed quoted identifier '{s}'"))),
                    }
                }
                if name.is_empty() {
                    return Err(reject("Empty quoted identifier"));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    return Err(reject(format!("Invalid character '{c}' in identifier '{s}'")));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(reject(format!("Empty identifier segment in '{s}'")));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        if parts.is_empty() {
            return Err(reject("Empty identifier"));
        }
        Ok(Self { parts })
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => {
                    out.push('"');
                    out.push_str(&s.replace('"', "\"\""));
                    out.push('"');
                }
            }
        }
        out
    }

    /// The last part of the identifier (the column for `table.column`).
    pub fn column(&self) -> &str {
        self.parts.last().map(IdentPart::name).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        assert_eq!(Ident::parse("item_name").unwrap().to_sql(), "item_name");
    }

    #[test]
    fn ident_dotted() {
        let ident = Ident::parse("category.title").unwrap();
        assert_eq!(ident.to_sql(), "category.title");
        assert_eq!(ident.column(), "title");
    }

    #[test]
    fn ident_quoted_with_escape() {
        let ident = Ident::parse(r#""has""quote""#).unwrap();
        assert_eq!(ident.to_sql(), r#""has""quote""#);
        assert_eq!(ident.column(), r#"has"quote"#);
    }

    #[test]
    fn ident_mixed_quoted_unquoted() {
        let ident = Ident::parse(r#"public."Item".id"#).unwrap();
        assert_eq!(ident.to_sql(), r#"public."Item".id"#);
    }

    #[test]
    fn ident_rejects_injection() {
        assert!(Ident::parse("id; DROP TABLE item").is_err());
        assert!(Ident::parse("id DESC").is_err());
        assert!(Ident::parse("1=1").is_err());
        assert!(Ident::parse("(SELECT 1)").is_err());
    }

    #[test]
    fn ident_rejects_malformed() {
        assert!(Ident::parse("").is_err());
        assert!(Ident::parse("1table").is_err());
        assert!(Ident::parse("schema..table").is_err());
        assert!(Ident::parse("schema.").is_err());
        assert!(Ident::parse(r#""unclosed"#).is_err());
    }

    #[test]
    fn ident_errors_are_client_errors() {
        let err = Ident::parse("a b").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
