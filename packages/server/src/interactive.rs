//! Interactive mode for the server.
//!
//! Prompts for bind address, port and dataset file before starting the
//! server.

use std::path::PathBuf;

use dialoguer::{Confirm, Input};

use crate::ServerConfig;

/// Runs the server in interactive mode, prompting for configuration.
///
/// Defaults come from [`ServerConfig::from_env`]. The global logger must
/// already be initialized.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Nitrogen Map Server");
    println!();

    let defaults = ServerConfig::from_env();

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default(defaults.bind_addr.clone())
        .interact_text()
        .unwrap_or(defaults.bind_addr);

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(defaults.port)
        .interact_text()
        .unwrap_or(defaults.port);

    let dataset_path: String = Input::new()
        .with_prompt("Dataset file")
        .default(defaults.dataset_path.display().to_string())
        .interact_text()
        .unwrap_or_else(|_| defaults.dataset_path.display().to_string());

    if !Confirm::new()
        .with_prompt(format!("Start server on {bind_addr}:{port}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::serve(ServerConfig {
        bind_addr,
        port,
        dataset_path: PathBuf::from(dataset_path),
    })
    .await
}
