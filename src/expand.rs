//! Token expansion: alias rewrite plus the three `.trg` numeric expanders,
//! run to a fixpoint with cycle detection.

use crate::addressing::coerce_int;
use crate::alias;
use crate::context::Context;
use crate::error::{ShellError, ShellResult};
use crate::stores::tables::Node;
use std::collections::HashSet;

/// Run every registered expander to a stable fixpoint, or fail on a cycle /
/// the configured pass bound.
pub fn expand_loop(ctx: &Context, mut parts: Vec<String>) -> ShellResult<Vec<String>> {
    let mut seen: HashSet<Vec<String>> = HashSet::new();

    for _ in 0..ctx.expand_max_passes {
        if !seen.insert(parts.clone()) {
            return Err(ShellError::Expansion("Expansion loop detected".to_string()));
        }

        let mut changed = false;
        if let Some(next) = alias::expand(&parts) {
            parts = next;
            changed = true;
        }
        if !changed {
            if let Some(next) = expand_runner_trg(ctx, &parts) {
                parts = next;
                changed = true;
            }
        }
        if !changed {
            if let Some(next) = expand_text_trg(ctx, &parts) {
                parts = next;
                changed = true;
            }
        }
        if !changed {
            if let Some(next) = expand_table_trg(ctx, &parts) {
                parts = next;
                changed = true;
            }
        }

        if !changed {
            return Ok(parts);
        }
    }

    Err(ShellError::Expansion(format!(
        "Expansion depth exceeded (max_passes={})",
        ctx.expand_max_passes
    )))
}

/// `%name.trg` -> current runner trigger, or `0` if the runner is unknown.
fn expand_runner_trg(ctx: &Context, parts: &[String]) -> Option<Vec<String>> {
    let mut changed = false;
    let out: Vec<String> = parts
        .iter()
        .map(|tok| match tok.strip_prefix('%').and_then(|s| s.strip_suffix(".trg")) {
            Some(name) => {
                changed = true;
                let value = ctx.runners.get(name).map(|job| job.trg()).unwrap_or(0);
                value.to_string()
            }
            None => tok.clone(),
        })
        .collect();
    changed.then_some(out)
}

/// `$sub:key.trg` -> the leaf coerced to an integer (missing sub/key -> `0`).
fn expand_text_trg(ctx: &Context, parts: &[String]) -> Option<Vec<String>> {
    let mut changed = false;
    let out: Vec<String> = parts
        .iter()
        .map(|tok| {
            let Some(body) = tok.strip_prefix('$') else {
                return tok.clone();
            };
            let Some((sub, key)) = body.split_once(':') else {
                return tok.clone();
            };
            if !key.ends_with(".trg") {
                return tok.clone();
            }
            changed = true;
            let texts = ctx.stores.texts.lock();
            let raw = texts
                .get(sub)
                .and_then(|keys| keys.get(key))
                .cloned()
                .unwrap_or_else(|| "0".to_string());
            coerce_int(&raw).to_string()
        })
        .collect();
    changed.then_some(out)
}

/// `#a:b:leaf.trg` -> the leaf coerced to an integer (missing/dict -> `0`).
fn expand_table_trg(ctx: &Context, parts: &[String]) -> Option<Vec<String>> {
    let mut changed = false;
    let out: Vec<String> = parts
        .iter()
        .map(|tok| {
            let Some(body) = tok.strip_prefix('#') else {
                return tok.clone();
            };
            let path: Vec<String> = body.split(':').filter(|s| !s.is_empty()).map(str::to_string).collect();
            match path.last() {
                Some(last) if last.ends_with(".trg") => {
                    changed = true;
                    let tables = ctx.stores.tables.lock();
                    let v = match crate::stores::tables::node_get(&tables, &path) {
                        Some(Node::Leaf(s)) => coerce_int(s),
                        _ => 0,
                    };
                    v.to_string()
                }
                _ => tok.clone(),
            }
        })
        .collect();
    changed.then_some(out)
}
