pub mod error;
pub mod rewrite;
pub mod selftest;
pub mod upgrade;

pub use error::TableError;
pub use rewrite::{update_preset_mode_spec, RewriteConfig, RewriteSummary};
pub use upgrade::{read_upgrade_requests, UpgradeRequest};
