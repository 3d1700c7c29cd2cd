//! End-to-end scenarios from the component design's testable-properties list,
//! driven entirely through `Context::execute` the way the REPL would.

use knhk_symshell::config::{CoreConfig, LlmConfig};
use knhk_symshell::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn test_ctx() -> Arc<Context> {
    Context::new(
        CoreConfig::default(),
        LlmConfig {
            base_url: "http://localhost:0".to_string(),
            timeout_ms: 10,
            poll_interval_ms: 10,
            model: "test".to_string(),
        },
    )
}

fn exec(ctx: &Context, line: &str) -> String {
    ctx.execute(line).unwrap_or_default()
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn scenario_1_routine_runs_to_completion() {
    let ctx = test_ctx();
    assert_eq!(exec(&ctx, "mk &build"), "OK");
    assert_eq!(exec(&ctx, "add.item &build echo a"), "OK");
    assert_eq!(exec(&ctx, "add.item &build echo b"), "OK");
    assert_eq!(exec(&ctx, "ls &build"), "echo a\necho b");
    assert_eq!(exec(&ctx, "run %build &build"), "OK");

    let done = wait_until(Duration::from_millis(500), || {
        exec(&ctx, "status %build").starts_with("done")
    });
    assert!(done, "runner did not reach done in time");
    assert_eq!(exec(&ctx, "status %build"), "done step=1 err= trg=0");
}

#[test]
fn scenario_2_cp_then_mv_across_stores() {
    let ctx = test_ctx();
    assert_eq!(exec(&ctx, "mk $t"), "OK");
    assert_eq!(exec(&ctx, "add.item $t:greeting hello"), "OK");
    assert_eq!(exec(&ctx, "cat $t:greeting"), "hello");
    assert_eq!(exec(&ctx, "cp $t:greeting #a:b"), "OK");
    assert_eq!(exec(&ctx, "cat #a:b"), "hello");
    assert_eq!(exec(&ctx, "mv #a:b #a:c"), "OK");
    assert_eq!(exec(&ctx, "cat #a:b"), "");
    assert_eq!(exec(&ctx, "cat #a:c"), "hello");
}

#[test]
fn scenario_3_event_fires_once_then_rearms_on_next_run() {
    let ctx = test_ctx();
    assert_eq!(exec(&ctx, "mk &build"), "OK");
    assert_eq!(exec(&ctx, "add.item &build echo hi"), "OK");
    assert_eq!(exec(&ctx, "mk $log"), "OK");
    assert_eq!(exec(&ctx, "add.item $log:line start"), "OK");
    assert_eq!(
        exec(&ctx, "ON %build.trg 1 add.item $log:line ok"),
        "OK"
    );

    assert_eq!(exec(&ctx, "run %build &build"), "OK");
    let fired_once = wait_until(Duration::from_millis(500), || {
        exec(&ctx, "cat $log:line").matches("ok").count() == 1
    });
    assert!(fired_once, "event did not fire on first run");

    let rearmed = wait_until(Duration::from_millis(500), || {
        exec(&ctx, "status %build").starts_with("done")
    });
    assert!(rearmed);
    assert_eq!(exec(&ctx, "run %build &build"), "OK");
    let fired_twice = wait_until(Duration::from_millis(500), || {
        exec(&ctx, "cat $log:line").matches("ok").count() == 2
    });
    assert!(fired_twice, "event did not re-arm for the second run");
}

#[test]
fn scenario_4_runner_control_inside_routine_fails_the_job() {
    let ctx = test_ctx();
    assert_eq!(exec(&ctx, "mk &a"), "OK");
    assert_eq!(exec(&ctx, "add.item &a run %a"), "OK");
    assert_eq!(exec(&ctx, "run %a &a"), "OK");

    let failed = wait_until(Duration::from_millis(500), || {
        exec(&ctx, "status %a").starts_with("failed")
    });
    assert!(failed, "job did not fail");
    assert!(exec(&ctx, "status %a").contains("runner-control"));
}

#[test]
fn scenario_5_expansion_cycle_is_rejected() {
    let mut core = CoreConfig::default();
    core.expand_max_passes = 3;
    let ctx = Context::new(
        core,
        LlmConfig {
            base_url: "http://localhost:0".to_string(),
            timeout_ms: 10,
            poll_interval_ms: 10,
            model: "test".to_string(),
        },
    );
    assert_eq!(exec(&ctx, "mk &loop"), "OK");
    assert_eq!(exec(&ctx, "add.item &loop run %loop &loop"), "OK");
    assert_eq!(exec(&ctx, "run %loop &loop"), "OK");
    let failed = wait_until(Duration::from_millis(500), || {
        exec(&ctx, "status %loop").starts_with("failed")
    });
    assert!(failed);
}

/// `add.item` accumulates onto whatever text is already at the key, so
/// setting a trigger to an exact value requires clearing the sub first.
fn set_text_sub(ctx: &Context, sub: &str, key: &str, value: &str) {
    let _ = exec(ctx, &format!("rm {sub}"));
    assert_eq!(exec(ctx, &format!("mk {sub}")), "OK");
    assert_eq!(exec(ctx, &format!("add.item {sub}:{key} {value}")), "OK");
}

#[test]
fn scenario_6_table_trigger_refires_after_reset_to_zero() {
    let ctx = test_ctx();
    assert_eq!(exec(&ctx, "mk $t"), "OK");
    assert_eq!(exec(&ctx, "add.item $t:greeting hi"), "OK");
    set_text_sub(&ctx, "$x", "cfg.trg", "0");
    assert_eq!(
        exec(&ctx, "ON $x:cfg.trg 2 cat $t:greeting"),
        "OK"
    );

    set_text_sub(&ctx, "$x", "cfg.trg", "2");
    let fired_once = wait_until(Duration::from_millis(300), || {
        ctx.recent_log(50)
            .iter()
            .filter(|(input, _)| input == "cat $t:greeting")
            .count()
            >= 1
    });
    assert!(fired_once, "bound command never executed");

    set_text_sub(&ctx, "$x", "cfg.trg", "0");
    std::thread::sleep(Duration::from_millis(100));
    set_text_sub(&ctx, "$x", "cfg.trg", "2");

    let fired_twice = wait_until(Duration::from_millis(300), || {
        ctx.recent_log(50)
            .iter()
            .filter(|(input, _)| input == "cat $t:greeting")
            .count()
            >= 2
    });
    assert!(fired_twice, "trigger did not re-fire after returning to 0");
}
