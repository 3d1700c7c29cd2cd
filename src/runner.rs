//! Background jobs: lifecycle, cooperative pause/stop, routine locking, and
//! the per-runner numeric trigger pulse.

use crate::addressing::{parse_dollar, parse_hash, parse_pct};
use crate::context::{Context, Handler, Value};
use crate::error::{ShellError, ShellResult};
use crate::stores::tables::{node_get, Node};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
    Paused,
    Stopped,
    Failed,
    Done,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Stopped => "stopped",
            JobStatus::Failed => "failed",
            JobStatus::Done => "done",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Running,
    Paused,
}

#[derive(Debug, Clone)]
pub struct RunnerLock {
    pub runner: String,
    pub state: LockState,
}

pub struct Job {
    status: Mutex<JobStatus>,
    step_i: AtomicUsize,
    last_error: Mutex<String>,
    stop_requested: AtomicBool,
    paused: AtomicBool,
    pause_lock: Mutex<()>,
    pause_cvar: Condvar,
    trg: AtomicI32,
}

impl Job {
    fn new() -> Self {
        Job {
            status: Mutex::new(JobStatus::Running),
            step_i: AtomicUsize::new(0),
            last_error: Mutex::new(String::new()),
            stop_requested: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            pause_lock: Mutex::new(()),
            pause_cvar: Condvar::new(),
            trg: AtomicI32::new(0),
        }
    }

    pub fn trg(&self) -> i64 {
        self.trg.load(Ordering::SeqCst) as i64
    }

    pub fn status(&self) -> JobStatus {
        *self.status.lock()
    }

    pub fn status_line(&self) -> String {
        let status = *self.status.lock();
        let step = self.step_i.load(Ordering::SeqCst);
        let err = self.last_error.lock().clone();
        let trg = self.trg.load(Ordering::SeqCst);
        format!("{status} step={step} err={err} trg={trg}")
    }
}

pub fn commands() -> Vec<(&'static str, Handler)> {
    vec![
        ("sys.run", run_cmd as Handler),
        ("sys.status", status_cmd as Handler),
        ("sys.pause", pause_cmd as Handler),
        ("sys.stop", stop_cmd as Handler),
    ]
}

fn run_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let Some(head) = args.first() else {
        return Err(ShellError::Validation("run requires arguments".to_string()));
    };

    if !head.starts_with('%') {
        let line = args.join(" ");
        let out = ctx.execute(&line).unwrap_or_default();
        return Ok(Value::text(out));
    }

    let name = parse_pct(head)?;
    start_background(ctx, &name, &args[1..])
}

fn start_background(ctx: &Context, name: &str, target: &[String]) -> ShellResult<Value> {
    if let Some(existing) = ctx.runners.get(name) {
        if matches!(existing.status(), JobStatus::Running | JobStatus::Paused) {
            return Err(ShellError::Validation("Runner already active".to_string()));
        }
    }

    let (steps, lock_target) = resolve_target(ctx, name, target)?;

    if let Some(routine) = &lock_target {
        let mut locks = ctx.runner_locks.lock();
        if locks.contains_key(routine) {
            return Err(ShellError::LockConflict(format!("Routine '&{routine}' is locked")));
        }
        locks.insert(
            routine.clone(),
            RunnerLock {
                runner: name.to_string(),
                state: LockState::Running,
            },
        );
    }

    let job = Arc::new(Job::new());
    ctx.runners.insert(name.to_string(), job.clone());

    let ctx_arc = ctx.self_arc()?;
    std::thread::spawn(move || worker_loop(ctx_arc, job, steps, lock_target));

    Ok(Value::text("OK"))
}

/// Resolve `run %name [target]`'s step sequence and, for the `&R` case, the
/// routine name that must be locked for the duration of the job.
fn resolve_target(ctx: &Context, name: &str, target: &[String]) -> ShellResult<(Vec<String>, Option<String>)> {
    if target.is_empty() {
        return snapshot_routine(ctx, name);
    }

    if target.len() == 1 {
        let tok = &target[0];
        if let Some(routine) = tok.strip_prefix('&') {
            return snapshot_routine(ctx, routine);
        }
        if tok.starts_with('$') {
            let (sub, key) = parse_dollar(tok)?;
            let key = key.ok_or_else(|| ShellError::Parse("Expected $<sub>:<key>".to_string()))?;
            let texts = ctx.stores.texts.lock();
            let text = texts.get(&sub).and_then(|m| m.get(&key)).cloned().unwrap_or_default();
            return Ok((single_step_or_none(text), None));
        }
        if tok.starts_with('#') {
            let path = parse_hash(tok)?;
            let tables = ctx.stores.tables.lock();
            let text = match node_get(&tables, &path) {
                Some(Node::Leaf(s)) => s.clone(),
                _ => String::new(),
            };
            return Ok((single_step_or_none(text), None));
        }
    }

    Ok((vec![target.join(" ")], None))
}

fn snapshot_routine(ctx: &Context, routine: &str) -> ShellResult<(Vec<String>, Option<String>)> {
    let routines = ctx.stores.routines.lock();
    let steps = routines
        .get(routine)
        .cloned()
        .ok_or_else(|| ShellError::NotFound(format!("Routine '&{routine}' not found")))?;
    Ok((steps, Some(routine.to_string())))
}

fn single_step_or_none(text: String) -> Vec<String> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![text]
    }
}

enum StepOutcome {
    Done,
    Failed(String),
    Stopped,
}

fn worker_loop(ctx: Arc<Context>, job: Arc<Job>, steps: Vec<String>, lock_target: Option<String>) {
    let outcome = run_steps(&ctx, &job, &steps);
    if let Some(routine) = &lock_target {
        ctx.runner_locks.lock().remove(routine);
    }
    match outcome {
        StepOutcome::Done => {
            *job.status.lock() = JobStatus::Done;
            pulse(&job, 1);
        }
        StepOutcome::Failed(msg) => {
            *job.last_error.lock() = msg;
            *job.status.lock() = JobStatus::Failed;
            pulse(&job, 2);
        }
        StepOutcome::Stopped => {
            *job.status.lock() = JobStatus::Stopped;
            pulse(&job, 3);
        }
    }
}

fn run_steps(ctx: &Context, job: &Job, steps: &[String]) -> StepOutcome {
    for (i, raw_step) in steps.iter().enumerate() {
        job.step_i.store(i, Ordering::SeqCst);

        if job.stop_requested.load(Ordering::SeqCst) {
            return StepOutcome::Stopped;
        }

        {
            let mut guard = job.pause_lock.lock();
            while job.paused.load(Ordering::SeqCst) {
                job.pause_cvar.wait(&mut guard);
            }
        }
        if job.stop_requested.load(Ordering::SeqCst) {
            return StepOutcome::Stopped;
        }

        let step = raw_step.trim();
        if step.is_empty() {
            continue;
        }
        let step = step.replace("<counter>", &(i + 1).to_string());

        if is_runner_control(&step) {
            return StepOutcome::Failed(
                "Runner cannot execute runner-control commands".to_string(),
            );
        }

        let out = ctx.execute(&step).unwrap_or_default();
        if out.starts_with("Error:") {
            return StepOutcome::Failed(out);
        }
    }
    StepOutcome::Done
}

pub(crate) fn is_runner_control(step: &str) -> bool {
    let mut tokens = step.split_whitespace();
    let Some(head) = tokens.next() else {
        return false;
    };
    if !matches!(head, "run" | "status" | "pause" | "stop") {
        return false;
    }
    tokens.next().map(|t| t.starts_with('%')).unwrap_or(false)
}

/// A transient `0 -> value -> 0` transition on the job's trigger, the edge
/// the event bus observes. Released from the dispatch gate: the caller
/// (`worker_loop`) is not inside an `execute()` call while this runs.
fn pulse(job: &Job, value: i32) {
    job.trg.store(value, Ordering::SeqCst);
    std::thread::sleep(std::time::Duration::from_millis(100));
    job.trg.store(0, Ordering::SeqCst);
}

fn status_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let name = parse_pct(args.first().ok_or_else(|| ShellError::Parse("status requires %<name>".to_string()))?)?;
    match ctx.runners.get(&name) {
        Some(job) => Ok(Value::text(job.status_line())),
        None => Ok(Value::text("NOT_FOUND")),
    }
}

fn pause_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let name = parse_pct(args.first().ok_or_else(|| ShellError::Parse("pause requires %<name>".to_string()))?)?;
    let job = ctx
        .runners
        .get(&name)
        .map(|e| Arc::clone(&e))
        .ok_or_else(|| ShellError::NotFound(format!("Runner '%{name}' not found")))?;

    let mut status = job.status.lock();
    match *status {
        JobStatus::Running => {
            *status = JobStatus::Paused;
            job.paused.store(true, Ordering::SeqCst);
            drop(status);
            update_lock_state(ctx, &name, LockState::Paused);
            Ok(Value::text("OK"))
        }
        JobStatus::Paused => {
            *status = JobStatus::Running;
            job.paused.store(false, Ordering::SeqCst);
            drop(status);
            let _guard = job.pause_lock.lock();
            drop(_guard);
            job.pause_cvar.notify_all();
            update_lock_state(ctx, &name, LockState::Running);
            Ok(Value::text("OK"))
        }
        other => Err(ShellError::Validation(format!("Runner '%{name}' is {other}, cannot pause"))),
    }
}

fn stop_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let name = parse_pct(args.first().ok_or_else(|| ShellError::Parse("stop requires %<name>".to_string()))?)?;
    let job = ctx
        .runners
        .get(&name)
        .map(|e| Arc::clone(&e))
        .ok_or_else(|| ShellError::NotFound("Runner not found".to_string()))?;

    if matches!(job.status(), JobStatus::Running | JobStatus::Paused) {
        job.stop_requested.store(true, Ordering::SeqCst);
        job.paused.store(false, Ordering::SeqCst);
        job.pause_cvar.notify_all();
    }
    Ok(Value::text("OK"))
}

fn update_lock_state(ctx: &Context, job_name: &str, state: LockState) {
    let mut locks = ctx.runner_locks.lock();
    for lock in locks.values_mut() {
        if lock.runner == job_name {
            lock.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_control_rejected() {
        assert!(is_runner_control("run %a"));
        assert!(is_runner_control("stop %build"));
        assert!(!is_runner_control("run &a"));
        assert!(!is_runner_control("echo hi"));
    }

    #[test]
    fn single_step_empty_text_is_zero_steps() {
        assert!(single_step_or_none(String::new()).is_empty());
        assert_eq!(single_step_or_none("hi".to_string()), vec!["hi".to_string()]);
    }
}
