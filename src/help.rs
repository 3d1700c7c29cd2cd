//! `help [alias]`: surface documentation rendered from the live alias table,
//! not a static string, so it can never drift from what's actually wired up.

use crate::alias;
use crate::context::{Context, Handler, Value};
use crate::error::ShellResult;

pub fn commands() -> Vec<(&'static str, Handler)> {
    vec![("help", help_cmd as Handler)]
}

fn help_cmd(_ctx: &Context, args: &[String]) -> ShellResult<Value> {
    if let Some(name) = args.first() {
        return Ok(Value::text(match alias::get_alias(name) {
            None => "Alias not found".to_string(),
            Some(expansion) => format!(
                "Command: {name}\nType:    User-surface alias\nNote:    Expands internally to sys.* primitive\nExpands: {expansion}"
            ),
        }));
    }

    let mut lines = vec![
        "HGI Command Surface".to_string(),
        "----------------------------------------".to_string(),
        String::new(),
        "Surface commands:".to_string(),
    ];
    for cmd in alias::list_aliases() {
        lines.push(format!("  - {cmd}"));
    }
    lines.extend([
        String::new(),
        "Syntax:".to_string(),
        "  $sub         Text namespace".to_string(),
        "  &name        Routine namespace".to_string(),
        "  #path        Table/tree path (#a:b:c) (infinite dict store; leaf via cat, node via ls)".to_string(),
        "  $sub:key     Specific text key under texts/<sub>".to_string(),
        "  %name        Background runner name (used with run %name ...)".to_string(),
        "  *.trg        Numeric trigger bus (events)".to_string(),
        String::new(),
        "Examples:".to_string(),
        "  run mk $x".to_string(),
        "  run %build &build".to_string(),
        "  ON %build.trg 1 Q build_ok".to_string(),
        "  ON.show *.trg".to_string(),
    ]);
    Ok(Value::text(lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoreConfig, LlmConfig};

    fn test_ctx() -> std::sync::Arc<Context> {
        Context::new(
            CoreConfig::default(),
            LlmConfig {
                base_url: "http://localhost:9".to_string(),
                timeout_ms: 10,
                poll_interval_ms: 10,
                model: "test".to_string(),
            },
        )
    }

    #[test]
    fn bare_help_lists_surface() {
        let ctx = test_ctx();
        let out = help_cmd(&ctx, &[]).unwrap().render();
        assert!(out.starts_with("HGI Command Surface"));
        assert!(out.contains("  - Q"));
        assert!(out.contains("ON.show *.trg"));
    }

    #[test]
    fn help_on_known_alias_shows_expansion() {
        let ctx = test_ctx();
        let out = help_cmd(&ctx, &["mk".to_string()]).unwrap().render();
        assert!(out.contains("Command: mk"));
        assert!(out.contains("Expands: sys.mk"));
    }

    #[test]
    fn help_on_unknown_alias() {
        let ctx = test_ctx();
        let out = help_cmd(&ctx, &["bogus".to_string()]).unwrap().render();
        assert_eq!(out, "Alias not found");
    }
}
