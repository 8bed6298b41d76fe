use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::CurlOptions;

/// Worker count used when the host's parallelism cannot be detected.
pub const DEFAULT_WORKER_COUNT: usize = 3;

/// Global configuration loaded from `~/.config/cachesync/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Fixed worker-pool size. Unset = number of logical CPUs.
    pub workers: Option<usize>,
    /// Root directory that manifest-relative paths are placed under. Unset = current directory.
    pub cache_root: Option<PathBuf>,
    /// Seconds to wait for a TCP/TLS connection.
    pub connect_timeout_secs: u64,
    /// Abort a transfer when throughput stays below this many bytes/s ...
    pub low_speed_limit_bytes: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
    /// Hard per-file transfer timeout in seconds.
    pub timeout_secs: u64,
    pub max_redirections: u32,
    /// Optional User-Agent header.
    pub user_agent: Option<String>,
    /// Command run (in the cache root) after a fully successful `sync`.
    pub post_sync_command: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: None,
            cache_root: None,
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            timeout_secs: 3600,
            max_redirections: 10,
            user_agent: None,
            post_sync_command: None,
        }
    }
}

impl SyncConfig {
    /// Transport options for the curl fetcher.
    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            low_speed_limit: self.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            max_redirections: self.max_redirections,
            user_agent: self.user_agent.clone(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("cachesync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SyncConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SyncConfig = toml::from_str(&data)?;
    Ok(cfg)
}

/// Worker-pool size for `cfg`: the configured value, else the host's logical
/// CPU count, else [`DEFAULT_WORKER_COUNT`]. Never fails.
pub fn resolve_worker_count(cfg: &SyncConfig) -> usize {
    match cfg.workers {
        Some(n) => n.max(1),
        None => worker_count_or_default(std::thread::available_parallelism()),
    }
}

fn worker_count_or_default(detected: io::Result<NonZeroUsize>) -> usize {
    match detected {
        Ok(n) => n.get(),
        Err(e) => {
            tracing::warn!(
                "unable to detect CPU count ({}); using default worker count of {}",
                e,
                DEFAULT_WORKER_COUNT
            );
            DEFAULT_WORKER_COUNT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.workers, None);
        assert_eq!(cfg.connect_timeout_secs, 30);
        assert_eq!(cfg.low_speed_limit_bytes, 1024);
        assert_eq!(cfg.timeout_secs, 3600);
        assert!(cfg.post_sync_command.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SyncConfig {
            workers: Some(6),
            cache_root: Some(PathBuf::from("/var/cache/packs")),
            ..SyncConfig::default()
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SyncConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_partial_uses_defaults() {
        let toml = r#"
            workers = 8
            post_sync_command = "echo done"
        "#;
        let cfg: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.workers, Some(8));
        assert_eq!(cfg.post_sync_command.as_deref(), Some("echo done"));
        assert_eq!(cfg.max_redirections, 10);
        assert!(cfg.cache_root.is_none());
    }

    #[test]
    fn curl_options_follow_config() {
        let cfg = SyncConfig {
            connect_timeout_secs: 5,
            user_agent: Some("cachesync-test".into()),
            ..SyncConfig::default()
        };
        let opts = cfg.curl_options();
        assert_eq!(opts.connect_timeout, Duration::from_secs(5));
        assert_eq!(opts.user_agent.as_deref(), Some("cachesync-test"));
    }

    #[test]
    fn worker_count_resolution() {
        let explicit = SyncConfig {
            workers: Some(0),
            ..SyncConfig::default()
        };
        assert_eq!(resolve_worker_count(&explicit), 1);
        assert!(resolve_worker_count(&SyncConfig::default()) >= 1);
        let failed = Err(io::Error::new(io::ErrorKind::Unsupported, "no cpuinfo"));
        assert_eq!(worker_count_or_default(failed), DEFAULT_WORKER_COUNT);
        assert_eq!(worker_count_or_default(Ok(NonZeroUsize::new(12).unwrap())), 12);
    }
}
