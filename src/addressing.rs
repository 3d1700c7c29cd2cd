//! The four token prefixes: `$texts`, `&routines`, `#tables`, `%runners`.

use crate::error::{ShellError, ShellResult};

/// `$sub` or `$sub:key` -> (sub, key).
pub fn parse_dollar(tok: &str) -> ShellResult<(String, Option<String>)> {
    let body = strip_prefix(tok, '$', "Expected $<sub> or $<sub>:<key>")?;
    match body.split_once(':') {
        Some((sub, key)) => {
            if sub.is_empty() || key.is_empty() {
                return Err(ShellError::Parse("Expected $<sub>:<key>".into()));
            }
            Ok((sub.to_string(), Some(key.to_string())))
        }
        None => Ok((body.to_string(), None)),
    }
}

/// `&name` -> name, rejecting an index suffix.
pub fn parse_amp(tok: &str) -> ShellResult<String> {
    let body = strip_prefix(tok, '&', "Expected &<name>")?;
    Ok(body.to_string())
}

/// `&name` or `&name:idx` -> (name, idx).
pub fn parse_amp_idx(tok: &str) -> ShellResult<(String, Option<usize>)> {
    let body = strip_prefix(tok, '&', "Expected &<name> or &<name>:<idx>")?;
    match body.split_once(':') {
        Some((name, idx_s)) => {
            let idx = idx_s
                .parse::<usize>()
                .map_err(|_| ShellError::Parse("Index must be integer".into()))?;
            Ok((name.to_string(), Some(idx)))
        }
        None => Ok((body.to_string(), None)),
    }
}

/// `#a:b:c` -> `["a", "b", "c"]`. Empty segments are invalid.
pub fn parse_hash(tok: &str) -> ShellResult<Vec<String>> {
    let body = strip_prefix(tok, '#', "Expected #<path>")?;
    let parts: Vec<String> = body.split(':').map(|s| s.to_string()).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ShellError::Parse("Invalid # path".into()));
    }
    Ok(parts)
}

/// `%name` -> name.
pub fn parse_pct(tok: &str) -> ShellResult<String> {
    let body = strip_prefix(tok, '%', "Expected %<name>")?;
    Ok(body.to_string())
}

fn strip_prefix<'a>(tok: &'a str, prefix: char, msg: &str) -> ShellResult<&'a str> {
    if !tok.starts_with(prefix) || tok.len() <= 1 {
        return Err(ShellError::Parse(msg.to_string()));
    }
    Ok(&tok[1..])
}

/// Does this symbol qualify as a trigger (ends in `.trg`)?
pub fn is_trg_symbol(sym: &str) -> bool {
    sym.ends_with(".trg")
}

/// Best-effort integer coercion: `""` and unparsable text both become `0`.
pub fn coerce_int(s: &str) -> i64 {
    s.trim().parse::<i64>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_sub_only() {
        assert_eq!(parse_dollar("$t").unwrap(), ("t".to_string(), None));
    }

    #[test]
    fn dollar_sub_key() {
        assert_eq!(
            parse_dollar("$t:greeting").unwrap(),
            ("t".to_string(), Some("greeting".to_string()))
        );
    }

    #[test]
    fn hash_rejects_empty_segment() {
        assert!(parse_hash("#a::b").is_err());
    }

    #[test]
    fn coerce_int_defaults_to_zero() {
        assert_eq!(coerce_int(""), 0);
        assert_eq!(coerce_int("nope"), 0);
        assert_eq!(coerce_int("  7"), 7);
    }
}
