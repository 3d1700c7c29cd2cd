//! The filesystem boundary: `import.file`/`import.many` read OS files into
//! `$`/`#`, `export.file`/`export.many` write them back out. `import.many`
//! honors a gitignore-style `.ignore` file cascaded down the directory tree.

use crate::addressing::{parse_dollar, parse_hash};
use crate::context::{Context, Handler, Value};
use crate::error::{ShellError, ShellResult};
use crate::stores::tables::{leaf_set, node_ensure_interior, node_get, walk_leaves, Node};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

pub fn commands() -> Vec<(&'static str, Handler)> {
    vec![
        ("sys.io.import.file", import_file_cmd as Handler),
        ("sys.io.import.many", import_many_cmd as Handler),
        ("sys.io.export.file", export_file_cmd as Handler),
        ("sys.io.export.many", export_many_cmd as Handler),
    ]
}

fn import_file_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let [src_file, dst] = args else {
        return Err(ShellError::Parse(
            "import.file requires <src_file> <$sub:key|#path>".to_string(),
        ));
    };

    let p = Path::new(src_file);
    if !p.is_file() {
        return Err(ShellError::Validation(
            "import.file expects a readable file path".to_string(),
        ));
    }
    let text = read_utf8_strict(p)?;

    if dst.starts_with('$') {
        let (sub, key) = parse_dollar(dst)?;
        let key = key.ok_or_else(|| ShellError::Parse("Expected $<sub>:<key>".to_string()))?;
        ctx.stores.texts.lock().entry(sub).or_default().insert(key, text);
        return Ok(Value::text("OK"));
    }
    if dst.starts_with('#') {
        let path = parse_hash(dst)?;
        leaf_set(&mut ctx.stores.tables.lock(), &path, &text)?;
        return Ok(Value::text("OK"));
    }
    Err(ShellError::Validation(
        "import.file dst must be $sub:key or #path".to_string(),
    ))
}

#[derive(Default)]
struct Counters {
    imported: usize,
    skipped_ignore: usize,
    skipped_binary: usize,
    skipped_other: usize,
}

fn import_many_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let [src_dir, dst_root] = args else {
        return Err(ShellError::Parse(
            "import.many requires <src_dir> <#path>".to_string(),
        ));
    };

    let src_base = Path::new(src_dir);
    if !src_base.is_dir() {
        return Err(ShellError::Validation(
            "import.many expects a directory path".to_string(),
        ));
    }
    if !dst_root.starts_with('#') {
        return Err(ShellError::Validation(
            "import.many dst must be #path root".to_string(),
        ));
    }
    let root_path = parse_hash(dst_root)?;
    node_ensure_interior(&mut ctx.stores.tables.lock(), &root_path)?;

    let mut counters = Counters::default();
    walk_dir(ctx, src_base, src_base, &[], &root_path, &mut counters);

    Ok(Value::text(format!(
        "OK imported={} skipped_ignore={} skipped_binary={} skipped_other={}",
        counters.imported, counters.skipped_ignore, counters.skipped_binary, counters.skipped_other
    )))
}

fn walk_dir(
    ctx: &Context,
    src_base: &Path,
    dir_abs: &Path,
    rules_stack: &[IgnoreRule],
    root_path: &[String],
    counters: &mut Counters,
) {
    let local_rules = load_ignore_rules(dir_abs);
    let combined_owned;
    let active: &[IgnoreRule] = if local_rules.is_empty() {
        rules_stack
    } else {
        combined_owned = rules_stack
            .iter()
            .cloned()
            .chain(local_rules.into_iter())
            .collect::<Vec<_>>();
        &combined_owned
    };

    let mut entries: Vec<PathBuf> = match fs::read_dir(dir_abs) {
        Ok(rd) => rd.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => return,
    };
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    for entry in entries {
        let is_dir = entry.is_dir();
        let is_file = entry.is_file();
        if !is_dir && !is_file {
            counters.skipped_other += 1;
            continue;
        }

        if is_ignored(&entry, is_dir, active) {
            counters.skipped_ignore += 1;
            continue;
        }

        if is_dir {
            walk_dir(ctx, src_base, &entry, active, root_path, counters);
            continue;
        }

        let Some(rel_tokens) = rel_components(src_base, &entry) else {
            continue;
        };

        match read_file_lenient(&entry) {
            ReadOutcome::Text(text) => {
                let mut full_path = root_path.to_vec();
                full_path.extend(rel_tokens);
                if leaf_set(&mut ctx.stores.tables.lock(), &full_path, &text).is_ok() {
                    counters.imported += 1;
                } else {
                    counters.skipped_other += 1;
                }
            }
            ReadOutcome::Binary => counters.skipped_binary += 1,
            ReadOutcome::Other => counters.skipped_other += 1,
        }
    }
}

fn export_file_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let src = args
        .first()
        .ok_or_else(|| ShellError::Parse("export.file requires a source".to_string()))?;

    let text = if src.starts_with('$') {
        let (sub, key) = parse_dollar(src)?;
        let key = key.ok_or_else(|| ShellError::Parse("Expected $<sub>:<key>".to_string()))?;
        let texts = ctx.stores.texts.lock();
        let bucket = texts
            .get(&sub)
            .ok_or_else(|| ShellError::NotFound(format!("Sub not found: kv/texts/{sub}")))?;
        bucket
            .get(&key)
            .cloned()
            .ok_or_else(|| ShellError::NotFound("Key not found".to_string()))?
    } else if src.starts_with('#') {
        let path = parse_hash(src)?;
        let tables = ctx.stores.tables.lock();
        match node_get(&tables, &path) {
            None => return Err(ShellError::NotFound("Source #path not found".to_string())),
            Some(Node::Interior(_)) => {
                return Err(ShellError::Validation(
                    "export.file expects a leaf; use export.many for trees".to_string(),
                ))
            }
            Some(Node::Leaf(s)) => s.clone(),
        }
    } else {
        return Err(ShellError::Validation(
            "export.file src must be $sub:key or #path".to_string(),
        ));
    };

    let dst = match args.get(1).filter(|s| !s.is_empty()) {
        Some(dst_file) => PathBuf::from(dst_file),
        None => {
            ensure_output_dir()?;
            Path::new("./output").join(auto_file_name(src))
        }
    };

    atomic_write_text(&dst, &text)?;
    Ok(Value::text(dst.display().to_string()))
}

fn export_many_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let src_root = args
        .first()
        .ok_or_else(|| ShellError::Parse("export.many requires a source root".to_string()))?;
    if !src_root.starts_with('#') {
        return Err(ShellError::Validation(
            "export.many src must be #path root".to_string(),
        ));
    }
    let root_tokens = parse_hash(src_root)?;

    let leaves = {
        let tables = ctx.stores.tables.lock();
        match node_get(&tables, &root_tokens) {
            None => return Err(ShellError::NotFound("Source #root not found".to_string())),
            Some(Node::Leaf(_)) => {
                return Err(ShellError::Validation(
                    "export.many expects a dict root".to_string(),
                ))
            }
            Some(Node::Interior(_)) => walk_leaves(&tables, &root_tokens),
        }
    };

    let dst_root = match args.get(1).filter(|s| !s.is_empty()) {
        Some(dst_dir) => PathBuf::from(dst_dir),
        None => {
            ensure_output_dir()?;
            Path::new("./output").join(auto_dir_name(src_root))
        }
    };
    fs::create_dir_all(&dst_root)?;

    for (path_tokens, text) in leaves {
        let rel_tokens = &path_tokens[root_tokens.len()..];
        if rel_tokens.is_empty() {
            continue;
        }
        let mut out_path = dst_root.clone();
        for token in rel_tokens {
            out_path.push(token);
        }
        atomic_write_text(&out_path, &text)?;
    }

    Ok(Value::text(dst_root.display().to_string()))
}

fn read_utf8_strict(p: &Path) -> ShellResult<String> {
    let bytes = fs::read(p)?;
    String::from_utf8(bytes)
        .map_err(|e| ShellError::Io(format!("UTF-8 decode error in file: {} :: {e}", p.display())))
}

enum ReadOutcome {
    Text(String),
    Binary,
    Other,
}

fn read_file_lenient(p: &Path) -> ReadOutcome {
    match fs::read(p) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(s) => ReadOutcome::Text(s),
            Err(_) => ReadOutcome::Binary,
        },
        Err(_) => ReadOutcome::Other,
    }
}

fn rel_components(base: &Path, path: &Path) -> Option<Vec<String>> {
    let rel = path.strip_prefix(base).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect(),
    )
}

fn ensure_output_dir() -> ShellResult<()> {
    fs::create_dir_all("./output")?;
    Ok(())
}

fn atomic_write_text(dst: &Path, text: &str) -> ShellResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = dst
        .file_name()
        .ok_or_else(|| ShellError::Io(format!("invalid destination path: {}", dst.display())))?
        .to_string_lossy()
        .to_string();
    let tmp = dst.with_file_name(format!("{file_name}.tmp"));
    fs::write(&tmp, text)?;
    fs::rename(&tmp, dst)?;
    Ok(())
}

/// `$sub:key` -> `sub__key.txt`, `#a:b:c` -> `a__b__c.txt`.
fn auto_file_name(src: &str) -> String {
    let body = if src.starts_with('$') || src.starts_with('#') {
        &src[1..]
    } else {
        src
    };
    format!("{}.txt", body.replace(':', "__"))
}

fn auto_dir_name(src_root: &str) -> String {
    let body = src_root.strip_prefix('#').unwrap_or(src_root);
    body.replace(':', "__")
}

#[derive(Debug, Clone)]
struct IgnoreRule {
    base_dir: PathBuf,
    negated: bool,
    dir_only: bool,
    regex: Regex,
}

fn gitignore_unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut esc = false;
    for ch in s.chars() {
        if esc {
            out.push(ch);
            esc = false;
        } else if ch == '\\' {
            esc = true;
        } else {
            out.push(ch);
        }
    }
    if esc {
        out.push('\\');
    }
    out
}

/// `(negated, pattern)`, or `None` for a blank line or comment.
fn gitignore_line_parse(line: &str) -> Option<(bool, String)> {
    let mut s = line.to_string();
    if s.is_empty() {
        return None;
    }
    if s.starts_with('#') {
        return None;
    }
    if s.ends_with(' ') && !s.ends_with("\\ ") {
        s = s.trim_end_matches(' ').to_string();
    }

    let negated = s.starts_with('!');
    if negated {
        s.remove(0);
    }
    let s = gitignore_unescape(&s);
    if s.is_empty() {
        return None;
    }
    Some((negated, s))
}

/// Gitignore glob -> regex body: `*` -> `[^/]*`, `**` -> `.*`, `?` -> `[^/]`,
/// bracket classes preserved (minus any `/`), everything else escaped.
fn gitignore_pattern_to_regex(pat: &str) -> String {
    let chars: Vec<char> = pat.chars().collect();
    let n = chars.len();
    let mut res = String::new();
    let mut i = 0;
    while i < n {
        let c = chars[i];
        match c {
            '*' => {
                if i + 1 < n && chars[i + 1] == '*' {
                    while i + 1 < n && chars[i + 1] == '*' {
                        i += 1;
                    }
                    res.push_str(".*");
                } else {
                    res.push_str("[^/]*");
                }
            }
            '?' => res.push_str("[^/]"),
            '[' => {
                let mut j = i + 1;
                if j < n && (chars[j] == '!' || chars[j] == '^') {
                    j += 1;
                }
                if j < n && chars[j] == ']' {
                    j += 1;
                }
                while j < n && chars[j] != ']' {
                    j += 1;
                }
                if j >= n {
                    res.push_str(&regex::escape(&c.to_string()));
                } else {
                    let mut stuff: String = chars[i + 1..j].iter().collect();
                    if let Some(rest) = stuff.strip_prefix('!') {
                        stuff = format!("^{rest}");
                    }
                    let stuff = stuff.replace('/', "");
                    res.push('[');
                    res.push_str(&stuff);
                    res.push(']');
                    i = j;
                }
            }
            _ => res.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    res
}

fn compile_ignore_rule(base_dir: &Path, negated: bool, raw_pat: &str) -> Option<IgnoreRule> {
    let anchored = raw_pat.starts_with('/');
    let mut pat = if anchored { &raw_pat[1..] } else { raw_pat }.to_string();

    let dir_only = pat.ends_with('/');
    if dir_only {
        pat.pop();
    }
    if !pat.contains('/') {
        pat = format!("**/{pat}");
    }

    let rx = gitignore_pattern_to_regex(&pat);
    let full = if dir_only {
        format!("^{rx}($|/.*$)")
    } else {
        format!("^{rx}$")
    };
    let regex = Regex::new(&full).ok()?;
    Some(IgnoreRule {
        base_dir: base_dir.to_path_buf(),
        negated,
        dir_only,
        regex,
    })
}

fn load_ignore_rules(dir_path: &Path) -> Vec<IgnoreRule> {
    let p = dir_path.join(".ignore");
    if !p.is_file() {
        return Vec::new();
    }
    let Ok(content) = fs::read_to_string(&p) else {
        return Vec::new();
    };
    content
        .lines()
        .filter_map(gitignore_line_parse)
        .filter_map(|(neg, pat)| compile_ignore_rule(dir_path, neg, &pat))
        .collect()
}

fn rel_posix(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// Last match across the stacked `.ignore` files wins.
fn is_ignored(path_abs: &Path, is_dir: bool, rules_stack: &[IgnoreRule]) -> bool {
    let mut decision: Option<bool> = None;
    for rule in rules_stack {
        let Some(rel) = rel_posix(&rule.base_dir, path_abs) else {
            continue;
        };
        if rel.is_empty() {
            continue;
        }
        if rule.dir_only && !is_dir {
            continue;
        }
        if rule.regex.is_match(&rel) {
            decision = Some(!rule.negated);
        }
    }
    decision.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_star_does_not_cross_slash() {
        let rx = gitignore_pattern_to_regex("*.log");
        let re = Regex::new(&format!("^{rx}$")).unwrap();
        assert!(re.is_match("build.log"));
        assert!(!re.is_match("a/build.log"));
    }

    #[test]
    fn pattern_double_star_crosses_slash() {
        let rx = gitignore_pattern_to_regex("**/build.log");
        let re = Regex::new(&format!("^{rx}$")).unwrap();
        assert!(re.is_match("a/b/build.log"));
        assert!(re.is_match("build.log"));
    }

    #[test]
    fn auto_names() {
        assert_eq!(auto_file_name("$texts:greeting"), "texts__greeting.txt");
        assert_eq!(auto_dir_name("#a:b"), "a__b");
    }

    #[test]
    fn line_parse_skips_comments_and_blank() {
        assert!(gitignore_line_parse("# comment").is_none());
        assert!(gitignore_line_parse("").is_none());
        assert_eq!(gitignore_line_parse("!foo"), Some((true, "foo".to_string())));
    }
}
