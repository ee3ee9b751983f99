//! Cooperative stop signals
//!
//! A stop never aborts work in progress: every source here only cancels the
//! run's token, and workers finish their current page before exiting. The
//! one exception is a second Ctrl-C, which ends the process on the spot
//! without closing driver sessions or finishing the sink.

use std::io::BufRead;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Stop requested through the presence of a control file
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stop_file: Option<PathBuf>,
}

impl StopSignal {
    pub fn new(stop_file: Option<PathBuf>) -> Self {
        Self { stop_file }
    }

    /// Never requests a stop
    pub fn none() -> Self {
        Self { stop_file: None }
    }

    /// True once the control file exists
    pub fn requested(&self) -> bool {
        self.stop_file.as_ref().is_some_and(|path| path.exists())
    }
}

/// Cancels `token` on the first Ctrl-C; a second one exits immediately
///
/// The second Ctrl-C is for a crawl stuck in a hung page load. Chrome
/// children may be left running and the current run stays `running` in the
/// database.
pub fn watch_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_err() {
                    return;
                }
            }
            _ = token.cancelled() => return,
        }

        tracing::info!("Received Ctrl+C, finishing in-flight pages...");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Force quit requested, exiting immediately");
            std::process::exit(1);
        }
    })
}

/// Cancels `token` when a line reading `q` arrives on stdin
///
/// Reads on a plain thread: a blocked stdin read must not keep the runtime
/// from shutting down once the crawl is over.
pub fn watch_stdin(token: CancellationToken) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if token.is_cancelled() {
                return;
            }
            match line {
                Ok(line) if is_quit_command(&line) => {
                    tracing::info!("Stop requested from stdin");
                    token.cancel();
                    return;
                }
                Ok(_) => continue,
                Err(_) => return,
            }
        }
    })
}

fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}
