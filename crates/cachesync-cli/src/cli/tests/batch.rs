//! Tests for sync and verify.

use super::parse;
use clap::Parser;
use crate::cli::CliCommand;
use std::path::PathBuf;

#[test]
fn cli_parse_sync() {
    match parse(&["cachesync", "sync", "manifest.json"]) {
        CliCommand::Sync {
            manifest,
            root,
            workers,
        } => {
            assert_eq!(manifest, PathBuf::from("manifest.json"));
            assert!(root.is_none());
            assert!(workers.is_none());
        }
        _ => panic!("expected Sync"),
    }
}

#[test]
fn cli_parse_sync_with_root_and_workers() {
    match parse(&[
        "cachesync",
        "sync",
        "m.json",
        "--root",
        "/srv/cache",
        "--workers",
        "6",
    ]) {
        CliCommand::Sync { root, workers, .. } => {
            assert_eq!(root, Some(PathBuf::from("/srv/cache")));
            assert_eq!(workers, Some(6));
        }
        _ => panic!("expected Sync"),
    }
}

#[test]
fn cli_parse_sync_requires_manifest() {
    assert!(crate::cli::Cli::try_parse_from(["cachesync", "sync"]).is_err());
}

#[test]
fn cli_parse_verify_defaults_to_no_replace() {
    match parse(&["cachesync", "verify", "m.json"]) {
        CliCommand::Verify { replace, .. } => assert!(!replace),
        _ => panic!("expected Verify"),
    }
}

#[test]
fn cli_parse_verify_replace() {
    match parse(&["cachesync", "verify", "m.json", "--replace", "--workers", "2"]) {
        CliCommand::Verify {
            replace, workers, ..
        } => {
            assert!(replace);
            assert_eq!(workers, Some(2));
        }
        _ => panic!("expected Verify"),
    }
}

#[test]
fn cli_parse_rejects_non_numeric_workers() {
    assert!(
        crate::cli::Cli::try_parse_from(["cachesync", "sync", "m.json", "--workers", "many"])
            .is_err()
    );
}
