//! Main entry point for the logroll CLI app

fn main() -> std::process::ExitCode {
    logroll::cli_runner::run_cli_app()
}
