use cachesync_core::logging;
use cachesync_core::settings::SettingsStore;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    let debug = SettingsStore::open_default()
        .map(|store| store.get("debug", false))
        .unwrap_or(false);

    // Initialize logging as early as possible; fall back to stderr when the
    // state directory is unusable.
    if let Err(err) = logging::init_logging(debug) {
        logging::init_logging_stderr(debug);
        tracing::warn!("file logging unavailable: {:#}", err);
    }

    // Parse CLI and dispatch.
    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("cachesync error: {:#}", err);
        std::process::exit(1);
    }
}
