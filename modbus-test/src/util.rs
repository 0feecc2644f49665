use std::future::Future;

use thiserror::Error;
use tokio::select;

/// The user pressed Ctrl-C before the operation finished.
#[derive(Error, Debug, PartialEq, Clone, Copy)]
#[error("Cancelled")]
pub struct Cancelled;

pub async fn cancel_on_ctrl_c<F: Future>(future: F) -> Result<F::Output, Cancelled> {
    select! {
        result = future => Ok(result),
        Ok(()) = tokio::signal::ctrl_c() => Err(Cancelled),
    }
}

/// Parses a coil value as written by a user: `true`/`false`, `on`/`off` or `1`/`0`.
pub fn parse_coil(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        _ => Err(format!("Invalid coil value: {value}")),
    }
}
