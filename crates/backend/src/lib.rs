pub mod actor;
pub mod db;
pub mod scoring;
pub mod source;

mod domain;
pub use domain::{config, word};

pub mod dirs;
