//! `mk`/`rm`/`ls`/`cat`/`add.item`/`cp`/`mv` across the three stores.

use crate::addressing::{parse_amp, parse_amp_idx, parse_dollar, parse_hash};
use crate::context::{Context, Handler, Value};
use crate::error::{ShellError, ShellResult};
use crate::stores::tables::{leaf_append, node_ensure_interior, node_get, node_rm, node_set, node_take, Node};
use std::collections::BTreeMap;

pub fn commands() -> Vec<(&'static str, Handler)> {
    vec![
        ("sys.mk", mk_cmd as Handler),
        ("sys.rm", rm_cmd as Handler),
        ("sys.ls", ls_cmd as Handler),
        ("sys.cat", cat_cmd as Handler),
        ("sys.add.item", add_item_cmd as Handler),
        ("sys.cp", cp_cmd as Handler),
        ("sys.mv", mv_cmd as Handler),
    ]
}

fn require_routine_unlocked(ctx: &Context, name: &str) -> ShellResult<()> {
    if ctx.runner_locks.lock().contains_key(name) {
        return Err(ShellError::LockConflict(format!("Routine '&{name}' is locked")));
    }
    Ok(())
}

fn not_found_kv(sub: &str) -> ShellError {
    ShellError::NotFound(format!("Sub not found: kv/texts/{sub}"))
}

fn not_found_list(name: &str) -> ShellError {
    ShellError::NotFound(format!("Sub not found: list/routines/{name}"))
}

// ---------------------------------------------------------------- mk -----

fn mk_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let tok = args
        .first()
        .ok_or_else(|| ShellError::Parse("mk expects &<name> OR $<sub> OR #<path>".to_string()))?;

    match tok.chars().next() {
        Some('&') => {
            let name = parse_amp(tok)?;
            ctx.stores.routines.lock().entry(name).or_default();
            Ok(Value::text("OK"))
        }
        Some('$') => {
            let (sub, key) = parse_dollar(tok)?;
            if key.is_some() {
                return Err(ShellError::Validation(
                    "mk expects $<sub> only (not $<sub>:<key>)".to_string(),
                ));
            }
            ctx.stores.texts.lock().entry(sub).or_default();
            Ok(Value::text("OK"))
        }
        Some('#') => {
            let path = parse_hash(tok)?;
            let mut tables = ctx.stores.tables.lock();
            node_ensure_interior(&mut tables, &path)?;
            Ok(Value::text("OK"))
        }
        _ => Err(ShellError::Parse("mk expects &<name> OR $<sub> OR #<path>".to_string())),
    }
}

// ---------------------------------------------------------------- rm -----

fn rm_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let tok = args
        .first()
        .ok_or_else(|| ShellError::Parse("rm expects &<name> OR $<sub> OR #<path>".to_string()))?;

    match tok.chars().next() {
        Some('&') => {
            let name = parse_amp(tok)?;
            if !ctx.stores.routines.lock().contains_key(&name) {
                return Err(not_found_list(&name));
            }
            require_routine_unlocked(ctx, &name)?;
            ctx.stores.routines.lock().remove(&name);
            Ok(Value::text("OK"))
        }
        Some('$') => {
            let (sub, key) = parse_dollar(tok)?;
            if key.is_some() {
                return Err(ShellError::Validation(
                    "rm expects $<sub> only (not $<sub>:<key>)".to_string(),
                ));
            }
            if ctx.stores.texts.lock().remove(&sub).is_none() {
                return Err(not_found_kv(&sub));
            }
            Ok(Value::text("OK"))
        }
        Some('#') => {
            let path = parse_hash(tok)?;
            let mut tables = ctx.stores.tables.lock();
            node_rm(&mut tables, &path)?;
            Ok(Value::text("OK"))
        }
        _ => Err(ShellError::Parse("rm expects &<name> OR $<sub> OR #<path>".to_string())),
    }
}

// ---------------------------------------------------------------- ls -----

const LS_SUMMARY: &str = "$  texts      (key/value symbol store)\n&  routines   (linear execution lists)\n#  tables     (infinite dict store)";

fn ls_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let Some(tok) = args.first() else {
        return Ok(Value::text(LS_SUMMARY));
    };

    if tok == "$" {
        let texts = ctx.stores.texts.lock();
        return Ok(Value::List(texts.keys().cloned().collect()));
    }
    if tok == "&" {
        let routines = ctx.stores.routines.lock();
        return Ok(Value::List(routines.keys().cloned().collect()));
    }

    match tok.chars().next() {
        Some('$') => {
            let (sub, key) = parse_dollar(tok)?;
            if key.is_some() {
                return Err(ShellError::Validation(
                    "ls expects $<sub> only (not $<sub>:<key>)".to_string(),
                ));
            }
            let texts = ctx.stores.texts.lock();
            let keys = texts.get(&sub).ok_or_else(|| not_found_kv(&sub))?;
            Ok(Value::List(keys.keys().cloned().collect()))
        }
        Some('&') => {
            let name = parse_amp(tok)?;
            let routines = ctx.stores.routines.lock();
            let steps = routines.get(&name).ok_or_else(|| not_found_list(&name))?;
            Ok(Value::List(steps.clone()))
        }
        Some('#') => {
            let path = parse_hash(tok)?;
            let tables = ctx.stores.tables.lock();
            match node_get(&tables, &path) {
                None => Ok(Value::text("")),
                Some(Node::Interior(m)) => Ok(Value::Text(m.keys().cloned().collect::<Vec<_>>().join("\n"))),
                Some(Node::Leaf(_)) => Err(ShellError::Validation(
                    "ls expects a dict node; use cat for leaf values".to_string(),
                )),
            }
        }
        _ => Err(ShellError::Parse(
            "ls usage: ls | ls &<name> | ls $ | ls $<sub> | ls #<path>".to_string(),
        )),
    }
}

// --------------------------------------------------------------- cat -----

fn cat_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let tok = args
        .first()
        .ok_or_else(|| ShellError::Parse("cat expects $... or &... or #...".to_string()))?;

    match tok.chars().next() {
        Some('$') => {
            let (sub, key) = parse_dollar(tok)?;
            let key = key.ok_or_else(|| ShellError::Parse("Expected $<sub>:<key>".to_string()))?;
            let texts = ctx.stores.texts.lock();
            let keys = texts.get(&sub).ok_or_else(|| not_found_kv(&sub))?;
            let value = keys.get(&key).ok_or_else(|| ShellError::NotFound("Key not found".to_string()))?;
            Ok(Value::text(value.clone()))
        }
        Some('&') => {
            let name = parse_amp(tok)?;
            let routines = ctx.stores.routines.lock();
            let steps = routines.get(&name).ok_or_else(|| not_found_list(&name))?;
            Ok(Value::text(steps.join("\n")))
        }
        Some('#') => {
            let path = parse_hash(tok)?;
            let tables = ctx.stores.tables.lock();
            match node_get(&tables, &path) {
                None => Ok(Value::text("")),
                Some(Node::Leaf(s)) => Ok(Value::text(s.clone())),
                Some(Node::Interior(_)) => Err(ShellError::Validation(
                    "cat expects a leaf; use ls for dict nodes".to_string(),
                )),
            }
        }
        _ => Err(ShellError::Parse("cat expects $... or &... or #...".to_string())),
    }
}

// ---------------------------------------------------------- add.item -----

fn add_item_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let tok = args
        .first()
        .ok_or_else(|| ShellError::Parse("add.item expects &... or $... or #...".to_string()))?;
    let rest = &args[1..];

    match tok.chars().next() {
        Some('&') => {
            let name = parse_amp(tok)?;
            require_routine_unlocked(ctx, &name)?;
            let mut routines = ctx.stores.routines.lock();
            let steps = routines.get_mut(&name).ok_or_else(|| not_found_list(&name))?;
            steps.push(rest.join(" ").trim().to_string());
            Ok(Value::text("OK"))
        }
        Some('$') => {
            let (sub, key) = parse_dollar(tok)?;
            let mut texts = ctx.stores.texts.lock();
            let keys = texts.entry(sub).or_default();
            match key {
                None => {
                    if rest.len() != 1 {
                        return Err(ShellError::Validation(
                            "add.item $<sub> expects exactly one <key>".to_string(),
                        ));
                    }
                    keys.entry(rest[0].clone()).or_default();
                    Ok(Value::text("OK"))
                }
                Some(k) => {
                    let text = rest.join(" ").trim().to_string();
                    let cur = keys.entry(k).or_default();
                    if !cur.is_empty() {
                        cur.push_str(&text);
                    } else {
                        *cur = text;
                    }
                    Ok(Value::text("OK"))
                }
            }
        }
        Some('#') => {
            let text = rest.join(" ").trim().to_string();
            if text.is_empty() {
                return Err(ShellError::Validation("add.item #<path> expects <text...>".to_string()));
            }
            let path = parse_hash(tok)?;
            let mut tables = ctx.stores.tables.lock();
            leaf_append(&mut tables, &path, &text)?;
            Ok(Value::text("OK"))
        }
        _ => Err(ShellError::Parse("add.item expects &... or $... or #...".to_string())),
    }
}

// ---------------------------------------------------------------- cp -----

fn cp_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let src = args.first().ok_or_else(|| ShellError::Parse("cp requires <src> <dst>".to_string()))?;
    let dst = args.get(1).ok_or_else(|| ShellError::Parse("cp requires <src> <dst>".to_string()))?;

    if src.starts_with('#') && dst.starts_with('#') {
        return cp_hash_hash(ctx, src, dst);
    }
    if src.starts_with('$') && dst.starts_with('#') {
        return cp_dollar_hash(ctx, src, dst);
    }
    if src.starts_with('#') && dst.starts_with('$') {
        return cp_hash_dollar(ctx, src, dst);
    }
    if src.starts_with('&') && dst.starts_with('#') {
        return cp_amp_hash(ctx, src, dst);
    }
    if src.starts_with('#') && dst.starts_with('&') {
        return cp_hash_amp(ctx, src, dst);
    }
    if src.starts_with('$') && dst.starts_with('$') {
        return cp_dollar_dollar(ctx, src, dst);
    }
    if src.starts_with('$') && dst.starts_with('&') {
        return cp_dollar_amp(ctx, src, dst);
    }
    if src.starts_with('&') && dst.starts_with('$') {
        return cp_amp_dollar(ctx, src, dst);
    }
    if src.starts_with('&') && dst.starts_with('&') {
        return cp_amp_amp(ctx, src, dst);
    }

    Err(ShellError::Validation(
        "cp supports $->$, $->&, &->$, &->&, plus $<->#, &<->#, #->#".to_string(),
    ))
}

fn cp_hash_hash(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let s_path = parse_hash(src)?;
    let d_path = parse_hash(dst)?;
    let mut tables = ctx.stores.tables.lock();
    let s_val = node_get(&tables, &s_path)
        .cloned()
        .ok_or_else(|| ShellError::NotFound("Source #path not found".to_string()))?;
    node_set(&mut tables, &d_path, s_val)?;
    Ok(Value::text("OK"))
}

fn cp_dollar_hash(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let (s_sub, s_key) = parse_dollar(src)?;
    let d_path = parse_hash(dst)?;
    let texts = ctx.stores.texts.lock();
    let sub = texts.get(&s_sub).ok_or_else(|| not_found_kv(&s_sub))?;

    let node = match s_key {
        None => Node::Interior(sub.iter().map(|(k, v)| (k.clone(), Node::Leaf(v.clone()))).collect()),
        Some(key) => {
            let value = sub
                .get(&key)
                .ok_or_else(|| ShellError::NotFound("Source key not found".to_string()))?;
            Node::Leaf(value.clone())
        }
    };
    drop(texts);
    let mut tables = ctx.stores.tables.lock();
    node_set(&mut tables, &d_path, node)?;
    Ok(Value::text("OK"))
}

fn cp_hash_dollar(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let s_path = parse_hash(src)?;
    let (d_sub, d_key) = parse_dollar(dst)?;
    let tables = ctx.stores.tables.lock();
    let s_val = node_get(&tables, &s_path)
        .cloned()
        .ok_or_else(|| ShellError::NotFound("Source #path not found".to_string()))?;
    drop(tables);

    let mut texts = ctx.stores.texts.lock();
    match d_key {
        None => {
            let Node::Interior(children) = &s_val else {
                return Err(ShellError::Validation("cp #-> $sub expects #path to be a dict node".to_string()));
            };
            let mut flat = BTreeMap::new();
            for (k, v) in children {
                match v {
                    Node::Leaf(s) => {
                        flat.insert(k.clone(), s.clone());
                    }
                    Node::Interior(_) => {
                        return Err(ShellError::Validation(
                            "Cannot import nested dict into $sub (expected flat dict of scalars)".to_string(),
                        ))
                    }
                }
            }
            texts.insert(d_sub, flat);
            Ok(Value::text("OK"))
        }
        Some(key) => {
            let Node::Leaf(s) = &s_val else {
                return Err(ShellError::Validation(
                    "cp #leaf -> $sub:key requires #path to be a leaf value".to_string(),
                ));
            };
            texts.entry(d_sub).or_default().insert(key, s.clone());
            Ok(Value::text("OK"))
        }
    }
}

fn cp_amp_hash(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let (name, idx) = parse_amp_idx(src)?;
    let idx = idx.ok_or_else(|| ShellError::Validation("cp &-># supports only one step: cp &name:<idx> #path".to_string()))?;
    let d_path = parse_hash(dst)?;

    let routines = ctx.stores.routines.lock();
    let steps = routines.get(&name).ok_or_else(|| not_found_list(&name))?;
    let value = steps
        .get(idx)
        .cloned()
        .ok_or_else(|| ShellError::Validation("Step index out of range".to_string()))?;
    drop(routines);

    let mut tables = ctx.stores.tables.lock();
    node_set(&mut tables, &d_path, Node::Leaf(value))?;
    Ok(Value::text("OK"))
}

fn cp_hash_amp(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let s_path = parse_hash(src)?;
    let tables = ctx.stores.tables.lock();
    let s_val = node_get(&tables, &s_path).ok_or_else(|| ShellError::NotFound("Source #path not found".to_string()))?;
    let Node::Leaf(value) = s_val else {
        return Err(ShellError::Validation("cp #->& requires #path to be a leaf value".to_string()));
    };
    let value = value.clone();
    drop(tables);

    let (name, idx) = parse_amp_idx(dst)?;
    require_routine_unlocked(ctx, &name)?;
    let mut routines = ctx.stores.routines.lock();
    let steps = routines.get_mut(&name).ok_or_else(|| not_found_list(&name))?;
    write_indexed_step(steps, idx, value);
    Ok(Value::text("OK"))
}

fn cp_dollar_dollar(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let (s_sub, s_key) = parse_dollar(src)?;
    let (d_sub, d_key) = parse_dollar(dst)?;
    let mut texts = ctx.stores.texts.lock();

    match (s_key, d_key) {
        (None, None) => {
            let clone = texts.get(&s_sub).ok_or_else(|| not_found_kv(&s_sub))?.clone();
            texts.insert(d_sub, clone);
            Ok(Value::text("OK"))
        }
        (Some(sk), Some(dk)) => {
            let value = texts
                .get(&s_sub)
                .ok_or_else(|| not_found_kv(&s_sub))?
                .get(&sk)
                .cloned()
                .ok_or_else(|| ShellError::NotFound("Source key not found".to_string()))?;
            texts.entry(d_sub).or_default().insert(dk, value);
            Ok(Value::text("OK"))
        }
        _ => Err(ShellError::Validation(
            "cp $->$ requires same level: $sub->$sub or $sub:key->$sub:key".to_string(),
        )),
    }
}

fn cp_dollar_amp(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let (s_sub, s_key) = parse_dollar(src)?;
    let s_key = s_key.ok_or_else(|| {
        ShellError::Validation("cp $->& supports only one key: cp $sub:key &name[[:idx]]".to_string())
    })?;
    let (name, idx) = parse_amp_idx(dst)?;
    require_routine_unlocked(ctx, &name)?;

    let texts = ctx.stores.texts.lock();
    let value = texts
        .get(&s_sub)
        .ok_or_else(|| not_found_kv(&s_sub))?
        .get(&s_key)
        .cloned()
        .ok_or_else(|| ShellError::NotFound("Source key not found".to_string()))?;
    drop(texts);

    let mut routines = ctx.stores.routines.lock();
    let steps = routines.get_mut(&name).ok_or_else(|| not_found_list(&name))?;
    write_indexed_step(steps, idx, value);
    Ok(Value::text("OK"))
}

fn cp_amp_dollar(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let (name, idx) = parse_amp_idx(src)?;
    let idx = idx.ok_or_else(|| {
        ShellError::Validation("cp &->$ supports only one step: cp &name:<idx> $sub:key".to_string())
    })?;
    let (d_sub, d_key) = parse_dollar(dst)?;
    let d_key = d_key.ok_or_else(|| ShellError::Validation("cp &->$ requires $sub:key".to_string()))?;

    let routines = ctx.stores.routines.lock();
    let steps = routines.get(&name).ok_or_else(|| not_found_list(&name))?;
    let value = steps
        .get(idx)
        .cloned()
        .ok_or_else(|| ShellError::Validation("Step index out of range".to_string()))?;
    drop(routines);

    ctx.stores.texts.lock().entry(d_sub).or_default().insert(d_key, value);
    Ok(Value::text("OK"))
}

fn cp_amp_amp(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let s_name = parse_amp(src)?;
    let d_name = parse_amp(dst)?;
    require_routine_unlocked(ctx, &d_name)?;
    let mut routines = ctx.stores.routines.lock();
    let clone = routines.get(&s_name).ok_or_else(|| not_found_list(&s_name))?.clone();
    routines.insert(d_name, clone);
    Ok(Value::text("OK"))
}

fn write_indexed_step(steps: &mut Vec<String>, idx: Option<usize>, value: String) {
    match idx {
        None => steps.push(value),
        Some(i) if i == steps.len() => steps.push(value),
        Some(i) => steps[i] = value,
    }
}

// ---------------------------------------------------------------- mv -----

fn mv_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let src = args.first().ok_or_else(|| ShellError::Parse("mv requires <src> <dst>".to_string()))?;
    let dst = args.get(1).ok_or_else(|| ShellError::Parse("mv requires <src> <dst>".to_string()))?;

    if src == dst {
        return Ok(Value::text("Need coffee?"));
    }

    if src.starts_with('#') && dst.starts_with('#') {
        return mv_hash_hash(ctx, src, dst);
    }
    if src.starts_with('$') && dst.starts_with('$') {
        return mv_dollar_dollar(ctx, src, dst);
    }
    if src.starts_with('&') && dst.starts_with('&') {
        return mv_amp_amp(ctx, src, dst);
    }

    Err(ShellError::Validation("mv supports $->$, &->&, and #-># only".to_string()))
}

fn mv_hash_hash(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let s_path = parse_hash(src)?;
    let d_path = parse_hash(dst)?;
    let mut tables = ctx.stores.tables.lock();
    let node = node_take(&mut tables, &s_path)?.ok_or_else(|| ShellError::NotFound("Source #path not found".to_string()))?;
    node_set(&mut tables, &d_path, node)?;
    Ok(Value::text("OK"))
}

fn mv_dollar_dollar(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let (s_sub, s_key) = parse_dollar(src)?;
    let (d_sub, d_key) = parse_dollar(dst)?;
    let mut texts = ctx.stores.texts.lock();

    match (s_key, d_key) {
        (None, None) => {
            let moved = texts.remove(&s_sub).ok_or_else(|| not_found_kv(&s_sub))?;
            texts.insert(d_sub, moved);
            Ok(Value::text("OK"))
        }
        (Some(sk), Some(dk)) => {
            let value = texts
                .get_mut(&s_sub)
                .ok_or_else(|| not_found_kv(&s_sub))?
                .remove(&sk)
                .ok_or_else(|| ShellError::NotFound("Source key not found".to_string()))?;
            texts.entry(d_sub).or_default().insert(dk, value);
            Ok(Value::text("OK"))
        }
        _ => Err(ShellError::Validation(
            "mv $->$ requires same level: $sub->$sub or $sub:key->$sub:key".to_string(),
        )),
    }
}

fn mv_amp_amp(ctx: &Context, src: &str, dst: &str) -> ShellResult<Value> {
    let (s_name, s_idx) = parse_amp_idx(src)?;
    let (d_name, d_idx) = parse_amp_idx(dst)?;
    require_routine_unlocked(ctx, &s_name)?;
    require_routine_unlocked(ctx, &d_name)?;
    let mut routines = ctx.stores.routines.lock();

    match (s_idx, d_idx) {
        (None, None) => {
            let moved = routines.remove(&s_name).ok_or_else(|| not_found_list(&s_name))?;
            routines.insert(d_name, moved);
            Ok(Value::text("OK"))
        }
        (Some(si), Some(di)) => {
            let step = {
                let src_steps = routines.get_mut(&s_name).ok_or_else(|| not_found_list(&s_name))?;
                if si >= src_steps.len() {
                    return Err(ShellError::Validation("Source index out of range".to_string()));
                }
                src_steps.remove(si)
            };
            let dst_steps = routines.entry(d_name).or_default();
            if di > dst_steps.len() {
                return Err(ShellError::Validation("Destination index out of range".to_string()));
            }
            if di == dst_steps.len() {
                dst_steps.push(step);
            } else {
                dst_steps[di] = step;
            }
            Ok(Value::text("OK"))
        }
        _ => Err(ShellError::Validation(
            "mv &->& requires same level: &name->&name or &name:idx->&name:idx".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoreConfig, LlmConfig};

    fn test_ctx() -> std::sync::Arc<Context> {
        let llm = LlmConfig {
            base_url: "http://localhost".to_string(),
            timeout_ms: 1000,
            poll_interval_ms: 50,
            model: "test".to_string(),
        };
        Context::new(CoreConfig::default(), llm)
    }

    #[test]
    fn mk_then_ls_texts_sub() {
        let ctx = test_ctx();
        mk_cmd(&ctx, &["$t".to_string()]).unwrap();
        let out = ls_cmd(&ctx, &["$t".to_string()]).unwrap();
        assert!(matches!(out, Value::List(v) if v.is_empty()));
    }

    #[test]
    fn add_item_then_cat_greeting() {
        let ctx = test_ctx();
        mk_cmd(&ctx, &["$t".to_string()]).unwrap();
        add_item_cmd(&ctx, &["$t:greeting".to_string(), "hello".to_string()]).unwrap();
        let out = cat_cmd(&ctx, &["$t:greeting".to_string()]).unwrap();
        assert_eq!(out.render(), "hello");
    }

    #[test]
    fn cp_dollar_to_hash_then_mv_within_hash() {
        let ctx = test_ctx();
        mk_cmd(&ctx, &["$t".to_string()]).unwrap();
        add_item_cmd(&ctx, &["$t:greeting".to_string(), "hello".to_string()]).unwrap();
        cp_cmd(&ctx, &["$t:greeting".to_string(), "#a:b".to_string()]).unwrap();
        assert_eq!(cat_cmd(&ctx, &["#a:b".to_string()]).unwrap().render(), "hello");

        mv_cmd(&ctx, &["#a:b".to_string(), "#a:c".to_string()]).unwrap();
        assert_eq!(cat_cmd(&ctx, &["#a:b".to_string()]).unwrap().render(), "");
        assert_eq!(cat_cmd(&ctx, &["#a:c".to_string()]).unwrap().render(), "hello");
    }

    #[test]
    fn mv_same_src_dst_is_noop_sentinel() {
        let ctx = test_ctx();
        let out = mv_cmd(&ctx, &["$a".to_string(), "$a".to_string()]).unwrap();
        assert_eq!(out.render(), "Need coffee?");
    }

    #[test]
    fn rm_locked_routine_rejected() {
        let ctx = test_ctx();
        mk_cmd(&ctx, &["&build".to_string()]).unwrap();
        ctx.runner_locks.lock().insert(
            "build".to_string(),
            crate::runner::RunnerLock {
                runner: "build".to_string(),
                state: crate::runner::LockState::Running,
            },
        );
        let err = rm_cmd(&ctx, &["&build".to_string()]).unwrap_err();
        assert!(matches!(err, ShellError::LockConflict(_)));
    }

    fn lock_routine(ctx: &Context, name: &str) {
        ctx.runner_locks.lock().insert(
            name.to_string(),
            crate::runner::RunnerLock {
                runner: name.to_string(),
                state: crate::runner::LockState::Running,
            },
        );
    }

    #[test]
    fn cp_onto_locked_routine_rejected() {
        let ctx = test_ctx();
        mk_cmd(&ctx, &["$t".to_string()]).unwrap();
        add_item_cmd(&ctx, &["$t:greeting".to_string(), "hello".to_string()]).unwrap();
        mk_cmd(&ctx, &["&build".to_string()]).unwrap();
        mk_cmd(&ctx, &["&other".to_string()]).unwrap();
        lock_routine(&ctx, "build");

        let err = cp_cmd(&ctx, &["$t:greeting".to_string(), "&build".to_string()]).unwrap_err();
        assert!(matches!(err, ShellError::LockConflict(_)));

        add_item_cmd(&ctx, &["#p:leaf".to_string(), "hi".to_string()]).unwrap();
        let err = cp_cmd(&ctx, &["#p:leaf".to_string(), "&build".to_string()]).unwrap_err();
        assert!(matches!(err, ShellError::LockConflict(_)));

        add_item_cmd(&ctx, &["&other".to_string(), "echo hi".to_string()]).unwrap();
        let err = cp_cmd(&ctx, &["&other".to_string(), "&build".to_string()]).unwrap_err();
        assert!(matches!(err, ShellError::LockConflict(_)));
    }

    #[test]
    fn mv_onto_or_from_locked_routine_rejected() {
        let ctx = test_ctx();
        mk_cmd(&ctx, &["&build".to_string()]).unwrap();
        mk_cmd(&ctx, &["&other".to_string()]).unwrap();
        lock_routine(&ctx, "build");

        let err = mv_cmd(&ctx, &["&other".to_string(), "&build".to_string()]).unwrap_err();
        assert!(matches!(err, ShellError::LockConflict(_)));

        let err = mv_cmd(&ctx, &["&build".to_string(), "&other".to_string()]).unwrap_err();
        assert!(matches!(err, ShellError::LockConflict(_)));
    }

    #[test]
    fn ls_with_no_target_returns_summary() {
        let ctx = test_ctx();
        let out = ls_cmd(&ctx, &[]).unwrap();
        assert_eq!(out.render(), LS_SUMMARY);
    }
}
