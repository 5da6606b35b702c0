//! CLI command implementations

mod config;
mod run;
mod stats;

pub use config::{cmd_config_init, cmd_config_show, load_config};
pub use run::cmd_run;
pub use stats::cmd_stats;
