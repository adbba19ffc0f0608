//! Excel COM Bridge: a Windows process that relays late-bound COM calls,
//! controlled by JSON commands over stdin/stdout.
//!
//! Runs natively on Windows, or cross-compiled from Linux and run under WINE.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! - Reads `Request` objects from stdin
//! - Writes `Response` objects to stdout
//! - Diagnostic/log messages go to stderr (never stdout)

#[cfg_attr(not(windows), allow(dead_code))]
mod bmp;
#[cfg(windows)]
mod clipboard;
#[cfg(windows)]
mod dispatch;
#[cfg_attr(not(windows), allow(dead_code))]
mod handles;
#[cfg(windows)]
mod session;

#[cfg(not(windows))]
fn main() {
    eprintln!("excel-com-bridge must be compiled for Windows (--target x86_64-pc-windows-gnu)");
    eprintln!("and run natively or under WINE.");
    std::process::exit(1);
}

#[cfg(windows)]
fn main() {
    use std::io::{self, BufRead, Write};

    use excel_com_protocol::{Command, Request, Response, ResponseResult};
    use tracing_subscriber::EnvFilter;

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("starting up");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut session = session::Session::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("stdin read error: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (response, shutdown) = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                tracing::debug!(id = request.id, command = ?request.command, "request");
                let shutdown = matches!(request.command, Command::Shutdown);
                let response = match session.execute(&request.command) {
                    Ok(data) => Response::ok(request.id, data),
                    Err(message) => {
                        tracing::warn!(id = request.id, "{message}");
                        Response::error(request.id, message)
                    }
                };
                (response, shutdown)
            }
            Err(e) => {
                tracing::error!("JSON parse error: {e}; line was: {line}");
                // id 0: the request could not be read far enough to correlate
                (Response::error(0, format!("JSON parse error: {e}")), false)
            }
        };

        match serde_json::to_string(&response) {
            Ok(json) => {
                let _ = writeln!(out, "{json}");
                let _ = out.flush();
            }
            Err(e) => tracing::error!("failed to encode response: {e}"),
        }

        if shutdown && matches!(response.result, ResponseResult::Ok { .. }) {
            tracing::info!("shutdown complete, exiting");
            break;
        }
    }

    // stdin closed without a shutdown command
    if let Err(e) = session.shutdown() {
        tracing::warn!("cleanup on exit failed: {e}");
    }
    tracing::info!("process exiting");
}
