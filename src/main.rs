//! A single read-a-line, write-a-result loop over `knhk_symshell::Context`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use knhk_symshell::config::{CoreConfig, LlmConfig};
use knhk_symshell::Context;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "knhk-symshell", about = "Interactive symbol shell")]
struct Cli {
    /// Path to the dispatcher config (default: config/core.json).
    #[arg(long, default_value = "config/core.json")]
    config: String,

    /// Path to the LLM bridge config (default: config/llm/default.json).
    #[arg(long, default_value = "config/llm/default.json")]
    llm_config: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let core = CoreConfig::load_from_file(&cli.config);
    let llm = LlmConfig::load_from_file(&cli.llm_config).unwrap_or_else(|e| {
        tracing::warn!("LLM bridge unavailable: {e}");
        LlmConfig {
            base_url: String::new(),
            timeout_ms: 0,
            poll_interval_ms: 0,
            model: String::new(),
        }
    });
    let ctx = Context::new(core, llm);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if let Some(result) = ctx.execute(line) {
            let _ = writeln!(out, "{result}");
        }
    }
}
