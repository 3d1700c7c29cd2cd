//! The chat bridge: `sys.q.chat` submits a job to the configured LLM
//! endpoint, polls it to completion, and returns only the assistant text.
//!
//! Reachable only via the `Q` alias; `$`/`&`/`#` tokens in the prompt are
//! expanded through `sys.cat` before the request goes out, so `Q $sub:key`
//! sends the resolved text rather than the literal token.

use crate::context::{Context, Handler, Value};
use crate::error::{ShellError, ShellResult};
use serde_json::{json, Value as Json};
use std::time::{Duration, Instant};

pub fn commands() -> Vec<(&'static str, Handler)> {
    vec![("sys.q.chat", q_chat_cmd as Handler)]
}

fn q_chat_cmd(ctx: &Context, args: &[String]) -> ShellResult<Value> {
    let prompt = expand_q_symbols(ctx, args)?;
    if prompt.is_empty() {
        return Ok(Value::text(""));
    }

    let messages = json!([{ "role": "user", "content": prompt }]);
    let text = chat(&ctx.llm_config, &messages).map_err(|e| {
        ShellError::Remote(format!(
            "Q failed (base_url={}, model={}, timeout_ms={}) :: {e}",
            ctx.llm_config.base_url, ctx.llm_config.model, ctx.llm_config.timeout_ms
        ))
    })?;
    Ok(Value::text(text))
}

/// `$sub:key`, `&name`, `#path` tokens resolve through `sys.cat`; everything
/// else (including bare `%name` and `*.trg` tokens, which `sys.cat` doesn't
/// address) passes through verbatim.
fn expand_q_symbols(ctx: &Context, parts: &[String]) -> ShellResult<String> {
    let mut out: Vec<String> = Vec::with_capacity(parts.len());
    for tok in parts {
        let is_symbol = tok.starts_with('$') || tok.starts_with('&') || tok.starts_with('#');
        if is_symbol {
            let resolved = ctx
                .dispatch_internal(&["sys.cat".to_string(), tok.clone()])
                .map_err(|e| ShellError::Validation(format!("Q symbol expansion failed for {tok}: {e}")))?;
            out.push(resolved.render());
        } else {
            out.push(tok.clone());
        }
    }
    Ok(out.join(" ").trim().to_string())
}

fn chat(cfg: &crate::config::LlmConfig, messages: &Json) -> ShellResult<String> {
    let client = reqwest::blocking::Client::new();

    let mut args = json!({ "messages": messages });
    if !cfg.model.is_empty() {
        args["model"] = json!(cfg.model);
    }
    let payload = json!({
        "op": "llm.chat",
        "args": args,
        "timeout_ms": cfg.timeout_ms,
    });

    let job_id = submit(&client, cfg, &payload)?;
    let outcome = poll_to_completion(&client, cfg, &job_id);
    if outcome.is_err() {
        cancel_silent(&client, cfg, &job_id);
    }
    outcome
}

fn submit(client: &reqwest::blocking::Client, cfg: &crate::config::LlmConfig, payload: &Json) -> ShellResult<String> {
    let resp = client
        .post(format!("{}/v1/jobs", cfg.base_url))
        .json(payload)
        .timeout(Duration::from_secs(10))
        .send()
        .map_err(|e| ShellError::Remote(format!("submit failed: {e}")))?;

    let status = resp.status();
    if !(status.as_u16() == 200 || status.as_u16() == 201) {
        let body = resp.text().unwrap_or_default();
        return Err(ShellError::Remote(format!("submit failed: HTTP {status} :: {body}")));
    }

    let data: Json = resp
        .json()
        .map_err(|e| ShellError::Remote(format!("submit failed: {e}")))?;
    match data.get("id").and_then(Json::as_str) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(ShellError::Remote("submit failed: missing job id".to_string())),
    }
}

fn poll_to_completion(client: &reqwest::blocking::Client, cfg: &crate::config::LlmConfig, job_id: &str) -> ShellResult<String> {
    let deadline = (cfg.timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(cfg.timeout_ms));

    loop {
        let status = get_status(client, cfg, job_id)?;
        let state = status.get("state").and_then(Json::as_str).unwrap_or("");

        match state {
            "ok" => {
                let text = status
                    .get("result")
                    .and_then(|r| r.get("text"))
                    .and_then(Json::as_str);
                return match text {
                    Some(t) => Ok(t.to_string()),
                    None => Err(ShellError::Remote("Malformed response: result.text missing".to_string())),
                };
            }
            "fail" | "timeout" | "cancelled" => {
                let err = status.get("error").cloned().unwrap_or(json!({}));
                let code = err.get("code").and_then(Json::as_str).unwrap_or("ERROR");
                let msg = err.get("message").and_then(Json::as_str).unwrap_or("unknown error");
                return Err(ShellError::Remote(format!("{code}: {msg}")));
            }
            _ => {}
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(ShellError::Remote("Q timeout".to_string()));
            }
        }

        if cfg.poll_interval_ms > 0 {
            std::thread::sleep(Duration::from_millis(cfg.poll_interval_ms));
        }
    }
}

fn get_status(client: &reqwest::blocking::Client, cfg: &crate::config::LlmConfig, job_id: &str) -> ShellResult<Json> {
    let resp = client
        .get(format!("{}/v1/jobs/{job_id}", cfg.base_url))
        .timeout(Duration::from_secs(10))
        .send()
        .map_err(|e| ShellError::Remote(format!("poll failed: {e}")))?;

    let status = resp.status();
    if status.as_u16() != 200 {
        let body = resp.text().unwrap_or_default();
        return Err(ShellError::Remote(format!("poll failed: HTTP {status} :: {body}")));
    }
    let data: Json = resp
        .json()
        .map_err(|e| ShellError::Remote(format!("poll failed: {e}")))?;
    if !data.is_object() {
        return Err(ShellError::Remote("poll failed: non-object json".to_string()));
    }
    Ok(data)
}

fn cancel_silent(client: &reqwest::blocking::Client, cfg: &crate::config::LlmConfig, job_id: &str) {
    let _ = client
        .post(format!("{}/v1/jobs/{job_id}/cancel", cfg.base_url))
        .timeout(Duration::from_secs(5))
        .send();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_q_symbols_passes_plain_words_through() {
        let ctx = Context::new(crate::config::CoreConfig::default(), crate::config::LlmConfig {
            base_url: "http://localhost:9".to_string(),
            timeout_ms: 10,
            poll_interval_ms: 10,
            model: "test".to_string(),
        });
        let out = expand_q_symbols(&ctx, &["hello".to_string(), "world".to_string()]).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn runner_tokens_pass_through_unresolved() {
        let ctx = Context::new(crate::config::CoreConfig::default(), crate::config::LlmConfig {
            base_url: "http://localhost:9".to_string(),
            timeout_ms: 10,
            poll_interval_ms: 10,
            model: "test".to_string(),
        });
        let out = expand_q_symbols(&ctx, &["%build".to_string()]).unwrap();
        assert_eq!(out, "%build");
    }
}
