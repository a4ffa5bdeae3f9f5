//! `treeshell run` — execute lines non-interactively.

use treeshell_config::AppConfig;
use treeshell_core::Response;

/// Returns whether every line succeeded.
pub async fn run(config: &AppConfig, lines: &[String]) -> Result<bool, Box<dyn std::error::Error>> {
    let mut shell = super::build_shell(config)?;
    let mut all_ok = true;

    for line in lines {
        let response = shell.handle(line).await;
        if matches!(response, Response::Exit) {
            break;
        }
        all_ok &= !response.is_failure();
        super::print_response(&response);
    }

    Ok(all_ok)
}
