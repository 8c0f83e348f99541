//! CLI subcommand implementations

mod dry_run;
mod init;
mod scan;

pub use init::run_init;
pub use scan::{run_scan, ScanArgs};
