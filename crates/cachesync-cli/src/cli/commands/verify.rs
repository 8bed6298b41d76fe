//! `cachesync verify` – check each manifest entry, optionally replacing bad copies.

use anyhow::{bail, Result};
use cachesync_core::config::SyncConfig;
use cachesync_core::sync::{SyncMode, SyncReport};

use super::batch::{run_batch, BatchArgs};

pub async fn run_verify(cfg: &SyncConfig, args: BatchArgs, replace: bool) -> Result<()> {
    let result = run_batch(cfg, args, "Verifying", SyncMode::Verify { replace }).await?;

    let mut bad = 0usize;
    for (path, r) in &result.entries {
        match r {
            Ok(SyncReport::Verified(outcome)) => {
                if !outcome.is_good() {
                    bad += 1;
                }
                println!("{:<16} {}", outcome.to_string(), path.display());
            }
            Ok(SyncReport::Ensured { .. }) => {}
            Err(err) => {
                bad += 1;
                println!("{:<16} {} ({:#})", "error", path.display(), err);
            }
        }
    }

    if result.interrupted {
        bail!("verify interrupted");
    }
    if bad > 0 {
        bail!("{} of {} files did not verify", bad, result.entries.len());
    }
    Ok(())
}
