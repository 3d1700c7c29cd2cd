//! The single process-wide owner: stores, command table, runner/event
//! tables, the dispatch gate, and the bounded execution log.

use crate::config::{CoreConfig, LlmConfig};
use crate::error::{ShellError, ShellResult};
use crate::stores::Stores;
use crate::{bridges, events, help, primitives, runner};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock, Weak};

/// A handler receives the already-expanded argument tokens (the primitive
/// name itself has been consumed) and produces a value or a `ShellError`,
/// which `Context::execute` turns into an `"Error: ..."` string.
pub type Handler = fn(&Context, &[String]) -> ShellResult<Value>;

/// The result of a primitive invocation.
#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    List(Vec<String>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn render(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::List(items) => items.join("\n"),
        }
    }
}

struct LogEntry {
    at: DateTime<Utc>,
    input: String,
    output: String,
}

const LOG_CAPACITY: usize = 2_000;

pub struct Context {
    pub stores: Stores,
    pub runners: DashMap<String, Arc<runner::Job>>,
    pub runner_locks: Mutex<HashMap<String, runner::RunnerLock>>,
    pub events: Mutex<Vec<events::Binding>>,
    pub event_latch: Mutex<HashMap<String, bool>>,
    pub llm_config: LlmConfig,
    pub expand_max_passes: usize,
    commands: HashMap<&'static str, Handler>,
    log: Mutex<VecDeque<LogEntry>>,
    gate: ReentrantMutex<()>,
    event_worker_started: std::sync::atomic::AtomicBool,
    self_weak: OnceLock<Weak<Context>>,
}

impl Context {
    pub fn new(core: CoreConfig, llm_config: LlmConfig) -> Arc<Context> {
        let mut commands: HashMap<&'static str, Handler> = HashMap::new();
        for (name, handler) in primitives::surface::commands()
            .into_iter()
            .chain(runner::commands())
            .chain(events::commands())
            .chain(bridges::io::commands())
            .chain(bridges::llm::commands())
            .chain(help::commands())
        {
            commands.insert(name, handler);
        }

        let ctx = Arc::new(Context {
            stores: Stores::new(),
            runners: DashMap::new(),
            runner_locks: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            event_latch: Mutex::new(HashMap::new()),
            llm_config,
            expand_max_passes: core.expand_max_passes,
            commands,
            log: Mutex::new(VecDeque::new()),
            gate: ReentrantMutex::new(()),
            event_worker_started: std::sync::atomic::AtomicBool::new(false),
            self_weak: OnceLock::new(),
        });
        let _ = ctx.self_weak.set(Arc::downgrade(&ctx));
        ctx
    }

    /// A strong handle to self, for spawning threads that must outlive the
    /// current call (runner workers, the event poller).
    pub fn self_arc(&self) -> ShellResult<Arc<Context>> {
        self.self_weak
            .get()
            .and_then(|w| w.upgrade())
            .ok_or_else(|| ShellError::Internal("context has been dropped".to_string()))
    }

    /// Start the event poller thread if it hasn't been started yet. Called
    /// after the first successful `ON`.
    pub fn ensure_event_worker(&self) -> ShellResult<()> {
        use std::sync::atomic::Ordering;
        if self.event_worker_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let ctx = self.self_arc()?;
        events::spawn_poller(ctx);
        Ok(())
    }

    /// Raw -> expand -> dispatch -> logged string result. Mirrors the REPL's
    /// `execute` entry point exactly; runner workers and the event poller
    /// re-enter through this same function.
    pub fn execute(&self, raw: &str) -> Option<String> {
        let _guard = self.gate.lock();

        let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
        if parts.is_empty() {
            return None;
        }

        let head = parts[0].as_str();
        if head != "help" && !crate::alias::has_alias(head) {
            let out = "Unknown command".to_string();
            self.log_entry(raw, &out);
            return Some(out);
        }

        let expanded = match crate::expand::expand_loop(self, parts) {
            Ok(p) => p,
            Err(e) => {
                let out = format!("Error: {e}");
                self.log_entry(raw, &out);
                return Some(out);
            }
        };
        if expanded.is_empty() {
            let out = "Error: empty expansion".to_string();
            self.log_entry(raw, &out);
            return Some(out);
        }

        let cmd = expanded[0].as_str();
        let out = match self.commands.get(cmd) {
            None => format!("Unknown command: {cmd}"),
            Some(handler) => match handler(self, &expanded[1..]) {
                Ok(v) => v.render(),
                Err(e) => format!("Error: {e}"),
            },
        };
        self.log_entry(raw, &out);
        Some(out)
    }

    /// Run a pre-expanded primitive sequence directly, bypassing the
    /// alias/trg expansion loop and the surface gate. Used by the LLM bridge
    /// to resolve a `$sub:key` reference via `sys.cat` while a handler is
    /// already running under the gate held by `execute`.
    pub fn dispatch_internal(&self, parts: &[String]) -> ShellResult<Value> {
        if parts.is_empty() {
            return Ok(Value::text(""));
        }
        let cmd = parts[0].as_str();
        let handler = self
            .commands
            .get(cmd)
            .ok_or_else(|| ShellError::Internal(format!("Unknown command: {cmd}")))?;
        handler(self, &parts[1..])
    }

    /// Resolve a `*.trg` symbol's current integer value by passing it
    /// through the expansion loop, defaulting to `0` on any failure or when
    /// the symbol doesn't expand at all. Used by the event poller, which
    /// does *not* hold the dispatch gate while doing this.
    pub fn resolve_trg(&self, symbol: &str) -> i64 {
        let parts = vec![symbol.to_string()];
        match crate::expand::expand_loop(self, parts) {
            Ok(out) if out.len() == 1 && out[0] != symbol => crate::addressing::coerce_int(&out[0]),
            _ => 0,
        }
    }

    fn log_entry(&self, input: &str, output: &str) {
        let mut log = self.log.lock();
        if log.len() >= LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(LogEntry {
            at: Utc::now(),
            input: input.to_string(),
            output: output.to_string(),
        });
    }

    /// Recent `(input, output)` pairs, oldest first.
    pub fn recent_log(&self, n: usize) -> Vec<(String, String)> {
        let log = self.log.lock();
        log.iter()
            .rev()
            .take(n)
            .map(|e| (e.input.clone(), e.output.clone()))
            .rev()
            .collect()
    }
}
