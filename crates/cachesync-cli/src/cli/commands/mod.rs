//! CLI command handlers. Each command is in its own file.

mod batch;
mod checksum;
mod settings;
mod sync;
mod verify;

pub use batch::BatchArgs;
pub use checksum::run_checksum;
pub use settings::run_settings;
pub use sync::run_sync;
pub use verify::run_verify;
