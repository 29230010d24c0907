//! Command line glue
//!
//! Snapshot-backed project graph provider, logging setup and the `codeindex`
//! command line.

pub mod cli;
pub mod logging;
pub mod snapshot;

pub use cli::{Cli, Commands};
pub use logging::init_logging;
pub use snapshot::{Snapshot, SnapshotProvider};
