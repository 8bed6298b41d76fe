pub mod config;
pub mod logging;

pub mod checksum;
pub mod command;
pub mod control;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod scheduler;
pub mod settings;
pub mod storage;
pub mod sync;

pub use error::{SyncError, TaskError, VerifyError};
