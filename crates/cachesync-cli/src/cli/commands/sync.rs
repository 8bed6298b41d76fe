//! `cachesync sync` – make every manifest entry present and valid.

use anyhow::{bail, Result};
use cachesync_core::command::run_command;
use cachesync_core::config::SyncConfig;
use cachesync_core::sync::{SyncMode, SyncReport};

use super::batch::{run_batch, BatchArgs};

pub async fn run_sync(cfg: &SyncConfig, args: BatchArgs) -> Result<()> {
    let result = run_batch(cfg, args, "Syncing", SyncMode::Ensure).await?;

    let (mut changed, mut unchanged) = (0usize, 0usize);
    for (_, r) in &result.entries {
        match r {
            Ok(SyncReport::Ensured { changed: true }) => changed += 1,
            Ok(_) => unchanged += 1,
            Err(_) => {}
        }
    }
    let failed: Vec<_> = result.failures().collect();
    for (path, err) in &failed {
        eprintln!("  failed: {}: {:#}", path.display(), err);
    }
    println!(
        "{} downloaded, {} up to date, {} failed",
        changed,
        unchanged,
        failed.len()
    );

    if result.interrupted {
        bail!("sync interrupted");
    }
    if !failed.is_empty() {
        bail!("{} of {} files failed to sync", failed.len(), result.entries.len());
    }

    if let Some(command_line) = cfg.post_sync_command.as_deref() {
        let status = run_command(command_line, &result.root)?;
        if !status.success() {
            bail!("post-sync command `{}` exited with {}", command_line, status);
        }
    }
    Ok(())
}
