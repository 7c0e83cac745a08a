//! Named parameter binding
//!
//! Statements are assembled with `:name` placeholders. Before they reach the
//! driver, each placeholder is replaced with `?` and its value is appended to
//! the positional parameter list in order of occurrence, so a name used twice
//! is bound twice.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::error::Result;
use crate::value::Value;

/// Rewrite `:name` placeholders into positional `?` placeholders
///
/// Text inside single quotes, double quotes, backticks and square brackets is
/// copied unchanged, as is `::`.
pub fn bind_named(sql: &str, params: &BTreeMap<String, Value>) -> Result<(String, Vec<Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut closing: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(end) = closing {
            out.push(c);
            if c == end {
                closing = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                closing = Some(c);
                out.push(c);
            }
            '[' => {
                closing = Some(']');
                out.push(c);
            }
            ':' if chars.peek() == Some(&':') => {
                out.push_str("::");
                chars.next();
            }
            ':' if chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let value = params.get(&name).ok_or_else(|| Error::MissingParameter(name.clone()))?;
                values.push(value.clone());
                out.push('?');
            }
            _ => out.push(c),
        }
    }

    Ok((out, values))
}
