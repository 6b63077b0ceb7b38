use anyhow::Context;
use rosterd::config::AppConfig;
use rosterd::ipc;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.app.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the protocol; logs go to stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if config.is_json_logging() {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "rosterd starting");

    let mut state = ipc::AppState::new(config);
    if let Some(path) = state.config.workspace.path.clone() {
        if let Err(e) = state.select_workspace(&path) {
            warn!(error = %format!("{e:#}"), "configured workspace could not be opened");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    info!("stdin closed, shutting down");
    Ok(())
}
