//! Head-token alias rewrite: the user-facing surface never invokes `sys.*`
//! primitives directly.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Surface alias -> internal primitive name (splits on whitespace).
const ALIASES: &[(&str, &str)] = &[
    ("mk", "sys.mk"),
    ("rm", "sys.rm"),
    ("ls", "sys.ls"),
    ("add.item", "sys.add.item"),
    ("cat", "sys.cat"),
    ("cp", "sys.cp"),
    ("mv", "sys.mv"),
    ("import.file", "sys.io.import.file"),
    ("import.many", "sys.io.import.many"),
    ("export.file", "sys.io.export.file"),
    ("export.many", "sys.io.export.many"),
    ("run", "sys.run"),
    ("status", "sys.status"),
    ("pause", "sys.pause"),
    ("stop", "sys.stop"),
    ("ON", "sys.ev.on"),
    ("ON.show", "sys.ev.show"),
    ("ON.reset", "sys.ev.reset"),
    ("Q", "sys.q.chat"),
];

fn table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| ALIASES.iter().copied().collect())
}

/// Is `name` a known surface alias?
pub fn has_alias(name: &str) -> bool {
    table().contains_key(name)
}

/// The primitive name an alias expands to, if any.
pub fn get_alias(name: &str) -> Option<&'static str> {
    table().get(name).copied()
}

/// All alias names, sorted.
pub fn list_aliases() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = table().keys().copied().collect();
    names.sort_unstable();
    names
}

/// Rewrite `parts[0]` if it names an alias; splits the replacement on
/// whitespace and prepends it to the remaining tokens. Returns `None` when
/// the head token is not an alias (expander convention: "no change").
pub fn expand(parts: &[String]) -> Option<Vec<String>> {
    let head = parts.first()?;
    let expansion = get_alias(head)?;
    let mut out: Vec<String> = expansion.split_whitespace().map(str::to_string).collect();
    out.extend_from_slice(&parts[1..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_head_token_only() {
        let parts = vec!["mk".to_string(), "$t".to_string()];
        let out = expand(&parts).unwrap();
        assert_eq!(out, vec!["sys.mk".to_string(), "$t".to_string()]);
    }

    #[test]
    fn unknown_head_is_unchanged() {
        let parts = vec!["bogus".to_string()];
        assert!(expand(&parts).is_none());
    }

    #[test]
    fn aliases_sorted_and_complete() {
        let names = list_aliases();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(names.contains(&"Q"));
    }
}
