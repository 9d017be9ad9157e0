mod cli;
mod infra;
mod routes;
mod server;

use join_github::error::AppError;

/// The admission engine and its clients block on I/O, so the entry point is
/// synchronous and only `serve` starts an async runtime.
pub fn run() -> Result<(), AppError> {
    cli::run()
}
