//! Latched bindings on `*.trg` symbols and the 50ms polling worker that
//! re-invokes the dispatcher on a rising edge.

use crate::context::{Context, Handler, Value};
use crate::error::{ShellError, ShellResult};
use crate::runner::is_runner_control;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Binding {
    pub symbol: String,
    pub value: i64,
    pub command: Vec<String>,
}

pub fn commands() -> Vec<(&'static str, Handler)> {
    vec![
        ("sys.ev.on", on_cmd as Handler),
        ("sys.ev.show", show_cmd as Handler),
        ("sys.ev.reset", reset_cmd as Handler),
    ]
}

fn on_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    if args.len() < 3 {
        return Err(ShellError::Parse("ON requires <symbol.trg> <N> <command...>".to_string()));
    }
    let symbol = args[0].clone();
    if !symbol.ends_with(".trg") {
        return Err(ShellError::Validation("ON symbol must end with .trg".to_string()));
    }
    let n: i64 = args[1]
        .parse()
        .map_err(|_| ShellError::Parse("N must be an integer".to_string()))?;
    if n == 0 || n == 3 {
        return Err(ShellError::Validation("ON value must be nonzero and not 3".to_string()));
    }
    let command = args[2..].to_vec();
    if is_runner_control(&command.join(" ")) {
        return Err(ShellError::Validation(
            "ON command may not be a runner-control on %".to_string(),
        ));
    }

    ctx.events.lock().push(Binding { symbol, value: n, command });
    ctx.ensure_event_worker()?;
    Ok(Value::text("OK"))
}

fn show_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let pattern = args
        .first()
        .ok_or_else(|| ShellError::Parse("ON.show requires a pattern".to_string()))?;
    let events = ctx.events.lock();
    let lines: Vec<String> = events
        .iter()
        .filter(|b| matches_pattern(&b.symbol, pattern))
        .map(|b| format!("{} {} {}", b.symbol, b.value, b.command.join(" ")))
        .collect();
    Ok(Value::List(lines))
}

fn reset_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let pattern = args
        .first()
        .ok_or_else(|| ShellError::Parse("ON.reset requires a pattern".to_string()))?;

    let mut removed_symbols = HashSet::new();
    {
        let mut events = ctx.events.lock();
        events.retain(|b| {
            let matched = matches_pattern(&b.symbol, pattern);
            if matched {
                removed_symbols.insert(b.symbol.clone());
            }
            !matched
        });
    }
    let mut latch = ctx.event_latch.lock();
    for symbol in removed_symbols {
        latch.remove(&symbol);
    }
    Ok(Value::text("OK"))
}

fn matches_pattern(symbol: &str, pattern: &str) -> bool {
    pattern == symbol || (pattern == "*.trg" && symbol.ends_with(".trg"))
}

/// Spawn the lazily-started poller thread. Survives `ON.reset` (an empty
/// binding list is a legal, idle tick) and keeps running for the life of the
/// process.
pub fn spawn_poller(ctx: Arc<Context>) {
    std::thread::spawn(move || loop {
        std::thread::sleep(TICK);
        tick(&ctx);
    });
}

fn tick(ctx: &Context) {
    let symbols = distinct_symbols(ctx);

    for symbol in symbols {
        let value = ctx.resolve_trg(&symbol);

        if value == 3 {
            ctx.events.lock().retain(|b| b.symbol != symbol);
            ctx.event_latch.lock().remove(&symbol);
            continue;
        }

        let mut latch = ctx.event_latch.lock();
        if value == 0 {
            latch.insert(symbol.clone(), true);
            continue;
        }

        let armed = *latch.get(&symbol).unwrap_or(&false);
        if !armed {
            continue;
        }
        latch.insert(symbol.clone(), false);
        drop(latch);

        let commands: Vec<Vec<String>> = ctx
            .events
            .lock()
            .iter()
            .filter(|b| b.symbol == symbol && b.value == value)
            .map(|b| b.command.clone())
            .collect();
        for command in commands {
            ctx.execute(&command.join(" "));
        }
    }
}

fn distinct_symbols(ctx: &Context) -> Vec<String> {
    let events = ctx.events.lock();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for b in events.iter() {
        if seen.insert(b.symbol.clone()) {
            out.push(b.symbol.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_exact_and_wildcard() {
        assert!(matches_pattern("%build.trg", "%build.trg"));
        assert!(matches_pattern("%build.trg", "*.trg"));
        assert!(!matches_pattern("%build.trg", "%other.trg"));
    }
}
