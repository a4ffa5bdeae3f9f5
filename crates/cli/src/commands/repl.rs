//! `treeshell repl` — interactive session over stdin.

use std::io::Write;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use treeshell_config::AppConfig;
use treeshell_core::{CancelSignal, Response};

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut shell = super::build_shell(config)?;

    println!("TreeShell ({}): {} nodes", config.tree.app_id, shell.engine().space().len());
    println!("Type `menu`, `back`, `history`, a number, or `jump <address> {{json}}`. `exit` quits.");
    println!("Chain steps with `->`; reference earlier output with $stepN_result or $last_result.");
    println!();
    super::print_response(&Response::Menu(shell.current_menu()));

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("{}> ", shell.session().nav.cursor());
        std::io::stdout().flush()?;

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF (Ctrl+D)
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        };

        let (handle, signal) = CancelSignal::pair();
        let response = {
            let pending = shell.handle_cancellable(&line, &signal);
            tokio::pin!(pending);
            tokio::select! {
                response = &mut pending => response,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted; cancelling the running line");
                    handle.cancel();
                    pending.await
                }
            }
        };

        if matches!(response, Response::Exit) {
            break;
        }
        super::print_response(&response);
    }

    info!(
        session = %shell.session().id,
        results = shell.session().state.len(),
        "Session ended"
    );
    println!("Goodbye.");
    Ok(())
}
